use thiserror::Error;

use crate::error::OAuthError;

/// Errors raised by [`TokenStore`](super::TokenStore) implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists for the user. Expected for users who never signed in.
    #[error("No token record stored for user")]
    NotFound,
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The record was rejected before reaching storage.
    #[error("Invalid token record: {0}")]
    InvalidRecord(String),
}

impl From<std::io::Error> for StoreError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<toml::de::Error> for StoreError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for StoreError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Errors raised while exchanging a refresh token.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Token record has no refresh token")]
    NoRefreshToken,
    /// The provider answered with a non-success status. Not retryable.
    #[error("Provider rejected refresh (status {status}): {body}")]
    ProviderRejected { status: u16, body: String },
    /// Network failure or timeout talking to the provider.
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for RefreshError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

impl From<serde_json::Error> for RefreshError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidResponse(error.to_string())
    }
}

/// Errors surfaced by [`TokenManager`](super::TokenManager).
///
/// `NotAuthenticated` means the user has to sign in again.
/// `TemporarilyUnavailable` is retryable and must not log the user out.
/// Cloneable so one refresh outcome can be handed to every waiting caller.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Token service temporarily unavailable: {0}")]
    TemporarilyUnavailable(String),
    #[error("Token store error: {0}")]
    Store(String),
}

impl AuthError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TemporarilyUnavailable(_))
    }
}

impl From<StoreError> for AuthError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => Self::NotAuthenticated,
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<AuthError> for OAuthError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::NotAuthenticated => OAuthError::NotAuthenticated,
            other => OAuthError::Authentication(other.to_string()),
        }
    }
}

impl From<StoreError> for OAuthError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => OAuthError::NotAuthenticated,
            StoreError::Io(message) => OAuthError::Storage(message),
            StoreError::Serialization(message) => OAuthError::Storage(message),
            invalid @ StoreError::InvalidRecord(_) => OAuthError::Storage(invalid.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_becomes_not_authenticated() {
        assert!(matches!(
            AuthError::from(StoreError::NotFound),
            AuthError::NotAuthenticated
        ));
    }

    #[test]
    fn store_io_failure_is_not_a_logout() {
        let error = AuthError::from(StoreError::Io("disk full".to_string()));
        assert!(matches!(error, AuthError::Store(ref msg) if msg.contains("disk full")));
        assert!(!error.is_retryable());
    }

    #[test]
    fn invalid_record_is_a_storage_error() {
        let error = OAuthError::from(StoreError::InvalidRecord("expires_in -1".to_string()));
        assert!(matches!(error, OAuthError::Storage(ref msg) if msg.contains("expires_in -1")));
    }

    #[test]
    fn only_temporarily_unavailable_is_retryable() {
        assert!(AuthError::TemporarilyUnavailable("timeout".to_string()).is_retryable());
        assert!(!AuthError::NotAuthenticated.is_retryable());
    }
}
