use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use strum::Display;
use tokio::sync::OnceCell;

use super::error::{AuthError, RefreshError, StoreError};
use super::identity::UserIdentity;
use super::refresher::{HttpTokenRefresher, TokenRefresher};
use super::store::TokenStore;
use super::token::TokenRecord;
use crate::config::{BackchannelClientBuilder, ProviderConfig, TokenManagerConfig};
use crate::error::OAuthError;
use crate::util::retry::RetryPolicy;

/// Observable state of a user's stored token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum TokenState {
    /// Nothing stored; the user has to sign in.
    Absent,
    /// Usable without a refresh.
    Valid,
    /// Inside the safety margin or past expiry; next use refreshes it.
    Expiring,
}

impl TokenState {
    /// Classify `record` as seen at `now` with the given refresh safety margin.
    pub fn of(
        record: Option<&TokenRecord>,
        margin: std::time::Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let margin = chrono::Duration::from_std(margin).unwrap_or(chrono::Duration::MAX);
        match record {
            None => Self::Absent,
            Some(record) if record.expires_within(margin, now) => Self::Expiring,
            Some(_) => Self::Valid,
        }
    }
}

/// Outcome of one refresh, shared by every caller that waited on it.
type InFlightRefresh = Arc<OnceCell<Result<String, AuthError>>>;

/// Hands out currently valid access tokens, refreshing them on demand.
///
/// At most one refresh per user is in flight. Callers arriving while it runs
/// wait for it and receive its outcome, success or failure, instead of
/// sending their own request.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use strava_oauth::auth::{InMemoryTokenStore, TokenManager, UserIdentity};
/// use strava_oauth::config::{ProviderConfig, TokenManagerConfig};
///
/// # async fn example() -> Result<(), strava_oauth::error::OAuthError> {
/// let manager = TokenManager::from_provider(
///     Arc::new(InMemoryTokenStore::new()),
///     &ProviderConfig::from_env()?,
///     TokenManagerConfig::default(),
/// )?;
/// let token = manager
///     .get_valid_access_token(&UserIdentity::new("athlete-42"))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct TokenManager {
    store: Arc<dyn TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    config: TokenManagerConfig,
    in_flight: Mutex<HashMap<UserIdentity, InFlightRefresh>>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("store", &"..")
            .field("refresher", &"..")
            .field("config", &self.config)
            .finish()
    }
}

impl TokenManager {
    pub fn new(
        store: Arc<dyn TokenStore>,
        refresher: Arc<dyn TokenRefresher>,
        config: TokenManagerConfig,
    ) -> Self {
        Self {
            store,
            refresher,
            config,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Wire an [`HttpTokenRefresher`] on a dedicated back-channel client.
    pub fn from_provider(
        store: Arc<dyn TokenStore>,
        provider: &ProviderConfig,
        config: TokenManagerConfig,
    ) -> Result<Self, OAuthError> {
        let client = BackchannelClientBuilder::from_config(&config).build()?;
        let refresher = HttpTokenRefresher::from_provider(client, provider)
            .with_timeout(config.backchannel_timeout);
        Ok(Self::new(store, Arc::new(refresher), config))
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn config(&self) -> &TokenManagerConfig {
        &self.config
    }

    /// Return an access token for `user` that is good for at least the
    /// configured safety margin, refreshing it first if needed.
    pub async fn get_valid_access_token(&self, user: &UserIdentity) -> Result<String, AuthError> {
        let record = self.store.get(user).await?;
        if self.is_fresh(&record) {
            tracing::debug!(user = %user, "Using stored access token");
            return Ok(record.access_token);
        }

        let flight = self.join_refresh(user);
        let outcome = flight
            .get_or_init(|| self.refresh_stored(user))
            .await
            .clone();
        self.finish_refresh(user, &flight);
        outcome
    }

    /// Like [`get_valid_access_token`](Self::get_valid_access_token), retrying
    /// `TemporarilyUnavailable` according to `policy`.
    pub async fn get_valid_access_token_with_retry(
        &self,
        user: &UserIdentity,
        policy: &RetryPolicy,
    ) -> Result<String, AuthError> {
        policy
            .execute(move || self.get_valid_access_token(user))
            .await
    }

    /// Drop the stored tokens for `user`, e.g. on logout.
    pub async fn invalidate(&self, user: &UserIdentity) -> Result<(), AuthError> {
        self.store.clear(user).await?;
        tracing::info!(user = %user, "Cleared stored tokens");
        Ok(())
    }

    pub async fn state(&self, user: &UserIdentity) -> Result<TokenState, AuthError> {
        let record = match self.store.get(user).await {
            Ok(record) => Some(record),
            Err(StoreError::NotFound) => None,
            Err(err) => return Err(err.into()),
        };
        Ok(TokenState::of(
            record.as_ref(),
            self.config.refresh_safety_margin,
            Utc::now(),
        ))
    }

    /// Body of the single in-flight refresh for `user`.
    async fn refresh_stored(&self, user: &UserIdentity) -> Result<String, AuthError> {
        // A refresh that finished after our first read already replaced the record.
        let record = self.store.get(user).await?;
        if self.is_fresh(&record) {
            tracing::debug!(user = %user, "Token refreshed by concurrent caller");
            return Ok(record.access_token);
        }

        match self.refresher.refresh(&record).await {
            Ok(refreshed) => {
                self.store.store(user, &refreshed).await?;
                tracing::info!(
                    user = %user,
                    expires_at = %refreshed.expires_at,
                    "Refreshed access token"
                );
                Ok(refreshed.access_token)
            }
            Err(RefreshError::ProviderRejected { status, .. }) => {
                tracing::warn!(
                    user = %user,
                    status,
                    "Provider rejected refresh token; clearing stored tokens"
                );
                self.store.clear(user).await?;
                Err(AuthError::NotAuthenticated)
            }
            Err(RefreshError::NoRefreshToken) => {
                tracing::warn!(
                    user = %user,
                    "Expired token has no refresh token; clearing stored tokens"
                );
                self.store.clear(user).await?;
                Err(AuthError::NotAuthenticated)
            }
            Err(err @ (RefreshError::Transport(_) | RefreshError::InvalidResponse(_))) => {
                tracing::warn!(
                    user = %user,
                    error = %err,
                    "Token refresh failed; keeping stored tokens"
                );
                Err(AuthError::TemporarilyUnavailable(err.to_string()))
            }
        }
    }

    fn is_fresh(&self, record: &TokenRecord) -> bool {
        TokenState::of(Some(record), self.config.refresh_safety_margin, Utc::now())
            == TokenState::Valid
    }

    /// Join the running refresh for `user`, or register a new one.
    ///
    /// A completed entry left behind by a cancelled caller is replaced so a
    /// stale outcome is never handed out.
    fn join_refresh(&self, user: &UserIdentity) -> InFlightRefresh {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let flight = in_flight.entry(user.clone()).or_default();
        if flight.initialized() {
            *flight = InFlightRefresh::default();
        }
        flight.clone()
    }

    /// Drop the entry for `flight` so the next expiry starts a new refresh.
    /// Callers still waiting on it keep their own handle.
    fn finish_refresh(&self, user: &UserIdentity, flight: &InFlightRefresh) {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if in_flight
            .get(user)
            .is_some_and(|current| Arc::ptr_eq(current, flight))
        {
            in_flight.remove(user);
        }
    }

    #[cfg(test)]
    fn in_flight_refreshes(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
