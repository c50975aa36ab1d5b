//! Configuration (layered: code > env > settings file).

pub mod backchannel;

pub use backchannel::BackchannelClientBuilder;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use serde::Deserialize;

use crate::auth::TokenStoreConfig;
use crate::defaults;
use crate::error::OAuthError;

pub const DEFAULT_BACKCHANNEL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REFRESH_SAFETY_MARGIN: Duration = Duration::from_secs(60);

/// Tuning for [`TokenManager`](crate::auth::TokenManager).
///
/// # Example
/// ```
/// use std::time::Duration;
/// use strava_oauth::config::TokenManagerConfig;
///
/// let config = TokenManagerConfig::builder()
///     .refresh_safety_margin(Duration::from_secs(120))
///     .build();
/// assert_eq!(config.backchannel_timeout, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Builder)]
pub struct TokenManagerConfig {
    /// Upper bound for one refresh round trip to the provider.
    #[builder(default = DEFAULT_BACKCHANNEL_TIMEOUT)]
    pub backchannel_timeout: Duration,
    /// Tokens expiring within this window are refreshed before use.
    #[builder(default = DEFAULT_REFRESH_SAFETY_MARGIN)]
    pub refresh_safety_margin: Duration,
}

impl Default for TokenManagerConfig {
    fn default() -> Self {
        Self {
            backchannel_timeout: DEFAULT_BACKCHANNEL_TIMEOUT,
            refresh_safety_margin: DEFAULT_REFRESH_SAFETY_MARGIN,
        }
    }
}

/// OAuth client registration and the token endpoint used for refreshes.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"..")
            .field("token_endpoint", &self.token_endpoint)
            .finish()
    }
}

impl ProviderConfig {
    /// Strava registration with the default token endpoint.
    pub fn strava(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_endpoint: default_token_endpoint(),
        }
    }

    pub fn with_token_endpoint(mut self, url: impl Into<String>) -> Self {
        self.token_endpoint = url.into();
        self
    }

    /// Load from environment variables (STRAVA_CLIENT_ID, STRAVA_CLIENT_SECRET,
    /// optional STRAVA_TOKEN_ENDPOINT). A `.env` file is read if present.
    pub fn from_env() -> Result<Self, OAuthError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, OAuthError> {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| OAuthError::Configuration(format!("{name} is not set")))
        };
        let mut config = Self::strava(
            required("STRAVA_CLIENT_ID")?,
            required("STRAVA_CLIENT_SECRET")?,
        );
        if let Some(url) = lookup("STRAVA_TOKEN_ENDPOINT").filter(|v| !v.trim().is_empty()) {
            config.token_endpoint = url;
        }
        Ok(config)
    }

    fn validate(&self) -> Result<(), OAuthError> {
        if self.client_id.trim().is_empty() {
            return Err(OAuthError::Configuration("client_id is empty".to_string()));
        }
        if self.client_secret.trim().is_empty() {
            return Err(OAuthError::Configuration(
                "client_secret is empty".to_string(),
            ));
        }
        if reqwest::Url::parse(&self.token_endpoint).is_err() {
            return Err(OAuthError::Configuration(format!(
                "token_endpoint is not a valid URL: {}",
                self.token_endpoint
            )));
        }
        Ok(())
    }
}

/// Settings file layout.
///
/// ```toml
/// [provider]
/// client_id = "12345"
/// client_secret = "..."
///
/// [manager]
/// backchannel_timeout_secs = 10
/// refresh_safety_margin_secs = 60
///
/// [store]
/// base_dir = "/var/lib/strava-oauth"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub manager: ManagerSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManagerSettings {
    #[serde(default = "default_backchannel_timeout_secs")]
    pub backchannel_timeout_secs: u64,
    #[serde(default = "default_refresh_safety_margin_secs")]
    pub refresh_safety_margin_secs: u64,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            backchannel_timeout_secs: default_backchannel_timeout_secs(),
            refresh_safety_margin_secs: default_refresh_safety_margin_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreSettings {
    pub base_dir: Option<PathBuf>,
}

impl Settings {
    pub fn from_toml_str(raw: &str) -> Result<Self, OAuthError> {
        let settings: Settings = toml::from_str(raw)?;
        settings.provider.validate()?;
        Ok(settings)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, OAuthError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Settings from environment variables only, with default tuning.
    pub fn from_env() -> Result<Self, OAuthError> {
        let provider = ProviderConfig::from_env()?;
        provider.validate()?;
        Ok(Self {
            provider,
            manager: ManagerSettings::default(),
            store: StoreSettings::default(),
        })
    }

    pub fn manager_config(&self) -> TokenManagerConfig {
        TokenManagerConfig::builder()
            .backchannel_timeout(Duration::from_secs(self.manager.backchannel_timeout_secs))
            .refresh_safety_margin(Duration::from_secs(self.manager.refresh_safety_margin_secs))
            .build()
    }

    pub fn token_store_config(&self) -> TokenStoreConfig {
        TokenStoreConfig::new(
            self.store
                .base_dir
                .clone()
                .unwrap_or_else(TokenStoreConfig::default_dir),
        )
    }
}

fn default_token_endpoint() -> String {
    defaults::TOKEN_ENDPOINT.to_string()
}

fn default_backchannel_timeout_secs() -> u64 {
    DEFAULT_BACKCHANNEL_TIMEOUT.as_secs()
}

fn default_refresh_safety_margin_secs() -> u64 {
    DEFAULT_REFRESH_SAFETY_MARGIN.as_secs()
}
