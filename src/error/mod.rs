//! Crate-level error type.

use strum::Display;
use thiserror::Error;

/// Primary error type for configuration, storage and CLI operations.
///
/// Token operations use the narrower errors in [`crate::auth`]; they convert
/// into this type at the outer edges.
#[derive(Error, Debug)]
pub enum OAuthError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// What the user-facing layer should do about an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RecoveryAction {
    /// Send the user through the sign-in flow again.
    Reauthenticate,
    /// Keep the session and try again later.
    Retry,
    CheckConfiguration,
    None,
}

impl OAuthError {
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            Self::NotAuthenticated => RecoveryAction::Reauthenticate,
            Self::Authentication(_) | Self::Network(_) => RecoveryAction::Retry,
            Self::Configuration(_) => RecoveryAction::CheckConfiguration,
            Self::Storage(_) | Self::Io(_) | Self::Serialization(_) => RecoveryAction::None,
        }
    }
}

impl From<toml::de::Error> for OAuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, OAuthError>;
