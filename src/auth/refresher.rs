use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use super::error::RefreshError;
use super::token::TokenRecord;
use crate::config::{ProviderConfig, DEFAULT_BACKCHANNEL_TIMEOUT};
use crate::util::timeout::with_timeout;

/// Exchanges a refresh token for a new [`TokenRecord`].
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, old: &TokenRecord) -> Result<TokenRecord, RefreshError>;
}

/// OAuth client credentials sent with every refresh request.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"..")
            .finish()
    }
}

/// Refresher that talks to the provider token endpoint over the back-channel
/// HTTP client.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use strava_oauth::auth::{ClientCredentials, HttpTokenRefresher};
/// use strava_oauth::config::BackchannelClientBuilder;
///
/// # fn example() -> Result<(), strava_oauth::error::OAuthError> {
/// let client = BackchannelClientBuilder::new()
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// let refresher = HttpTokenRefresher::new(
///     client,
///     "https://www.strava.com/oauth/token",
///     ClientCredentials::new("client-id", "client-secret"),
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpTokenRefresher {
    client: reqwest::Client,
    token_endpoint: String,
    credentials: ClientCredentials,
    timeout: Duration,
}

impl HttpTokenRefresher {
    pub fn new(
        client: reqwest::Client,
        token_endpoint: impl Into<String>,
        credentials: ClientCredentials,
    ) -> Self {
        Self {
            client,
            token_endpoint: token_endpoint.into(),
            credentials,
            timeout: DEFAULT_BACKCHANNEL_TIMEOUT,
        }
    }

    pub fn from_provider(client: reqwest::Client, provider: &ProviderConfig) -> Self {
        Self::new(
            client,
            provider.token_endpoint.clone(),
            ClientCredentials::new(provider.client_id.clone(), provider.client_secret.clone()),
        )
    }

    /// Upper bound for a single refresh round trip, including reading the body.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    async fn send_refresh(
        &self,
        refresh_token: &str,
    ) -> Result<RefreshTokenResponse, RefreshError> {
        let resp = self
            .client
            .post(&self.token_endpoint)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RefreshError::ProviderRejected {
                status: status.as_u16(),
                body,
            });
        }

        let raw = resp.bytes().await?;
        let payload: RefreshTokenResponse = serde_json::from_slice(&raw)?;
        if payload.access_token.trim().is_empty() {
            return Err(RefreshError::InvalidResponse(
                "token response has an empty access_token".to_string(),
            ));
        }
        Ok(payload)
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, old: &TokenRecord) -> Result<TokenRecord, RefreshError> {
        if !old.has_refresh_token() {
            return Err(RefreshError::NoRefreshToken);
        }
        let refresh_token = old.refresh_token.as_deref().unwrap_or_default();

        let payload = with_timeout(self.timeout, self.send_refresh(refresh_token)).await?;
        record_from_response(payload, old, Utc::now())
    }
}

#[derive(Debug, Deserialize)]
struct RefreshTokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

fn record_from_response(
    payload: RefreshTokenResponse,
    old: &TokenRecord,
    issued_at: chrono::DateTime<Utc>,
) -> Result<TokenRecord, RefreshError> {
    let expires_in = payload.expires_in;
    let refresh_token = payload
        .refresh_token
        .filter(|token| !token.trim().is_empty())
        .or_else(|| old.refresh_token.clone());
    TokenRecord::issued(payload.access_token, expires_in, refresh_token, issued_at).ok_or_else(
        || {
            RefreshError::InvalidResponse(format!(
                "token response has unusable expires_in {expires_in}"
            ))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn old_record() -> TokenRecord {
        TokenRecord::new(
            "A1",
            Some("R1".to_string()),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn response_without_refresh_token_keeps_previous() {
        let payload: RefreshTokenResponse =
            serde_json::from_str(r#"{"access_token":"A2","expires_in":3600}"#).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        let record = record_from_response(payload, &old_record(), now).unwrap();
        assert_eq!(record.access_token, "A2");
        assert_eq!(record.refresh_token.as_deref(), Some("R1"));
        assert_eq!(record.expires_at, now + ChronoDuration::seconds(3600));
    }

    #[test]
    fn response_with_rotated_refresh_token_replaces_previous() {
        let payload: RefreshTokenResponse = serde_json::from_str(
            r#"{"token_type":"Bearer","access_token":"A2","refresh_token":"R2","expires_at":1700000000,"expires_in":21600}"#,
        )
        .unwrap();
        let record = record_from_response(payload, &old_record(), Utc::now()).unwrap();
        assert_eq!(record.refresh_token.as_deref(), Some("R2"));
    }

    #[test]
    fn response_with_unusable_lifetime_is_invalid() {
        for body in [
            r#"{"access_token":"A2","expires_in":0}"#,
            r#"{"access_token":"A2","expires_in":-3600}"#,
            r#"{"access_token":"A2","expires_in":9000000000000000000}"#,
        ] {
            let payload: RefreshTokenResponse = serde_json::from_str(body).unwrap();
            let result = record_from_response(payload, &old_record(), Utc::now());
            assert!(
                matches!(result, Err(RefreshError::InvalidResponse(ref msg)) if msg.contains("expires_in")),
                "{body}"
            );
        }
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let rendered = format!("{:?}", ClientCredentials::new("id", "super-secret"));
        assert!(rendered.contains("id"));
        assert!(!rendered.contains("super-secret"));
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_fails_before_sending() {
        let refresher = HttpTokenRefresher::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9/never-called",
            ClientCredentials::new("id", "secret"),
        );
        let record = TokenRecord::new("A1", None, Utc::now());
        let result = refresher.refresh(&record).await;
        assert!(matches!(result, Err(RefreshError::NoRefreshToken)));
    }
}
