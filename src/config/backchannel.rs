//! HTTP client used for provider back-channel calls.

use std::fmt;
use std::time::Duration;

use super::{TokenManagerConfig, DEFAULT_BACKCHANNEL_TIMEOUT};
use crate::defaults::BACKCHANNEL_HTTP_CLIENT_NAME;
use crate::error::OAuthError;

type ConfigureHook = Box<dyn FnOnce(reqwest::ClientBuilder) -> reqwest::ClientBuilder + Send>;

/// Builds the `reqwest::Client` reserved for server-to-server calls to the
/// provider, separate from any client serving end-user traffic.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use strava_oauth::config::BackchannelClientBuilder;
///
/// let client = BackchannelClientBuilder::new()
///     .timeout(Duration::from_secs(10))
///     .configure(|builder| builder.pool_max_idle_per_host(2))
///     .build()?;
/// # Ok::<(), strava_oauth::error::OAuthError>(())
/// ```
pub struct BackchannelClientBuilder {
    name: String,
    timeout: Duration,
    connect_timeout: Option<Duration>,
    user_agent: String,
    configure: Option<ConfigureHook>,
}

impl fmt::Debug for BackchannelClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackchannelClientBuilder")
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("user_agent", &self.user_agent)
            .field("configure", &self.configure.as_ref().map(|_| ".."))
            .finish()
    }
}

impl Default for BackchannelClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BackchannelClientBuilder {
    pub fn new() -> Self {
        Self {
            name: BACKCHANNEL_HTTP_CLIENT_NAME.to_string(),
            timeout: DEFAULT_BACKCHANNEL_TIMEOUT,
            connect_timeout: None,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            configure: None,
        }
    }

    pub fn from_config(config: &TokenManagerConfig) -> Self {
        Self::new().timeout(config.backchannel_timeout)
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Extra adjustments applied to the underlying `reqwest::ClientBuilder`
    /// after the defaults above.
    pub fn configure<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(reqwest::ClientBuilder) -> reqwest::ClientBuilder + Send + 'static,
    {
        self.configure = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> Result<reqwest::Client, OAuthError> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent);
        if let Some(connect_timeout) = self.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        if let Some(hook) = self.configure {
            builder = hook(builder);
        }
        tracing::debug!(
            client = %self.name,
            timeout_ms = self.timeout.as_millis() as u64,
            "Building back-channel HTTP client"
        );
        builder.build().map_err(|err| {
            OAuthError::Configuration(format!(
                "failed to build back-channel client {}: {err}",
                self.name
            ))
        })
    }
}
