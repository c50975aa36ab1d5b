//! Convenience re-exports for common usage.

pub use crate::auth::{
    AuthError, FileTokenStore, HttpTokenRefresher, InMemoryTokenStore, TokenManager,
    TokenRecord, TokenRefresher, TokenState, TokenStore, UserIdentity,
};
pub use crate::config::{BackchannelClientBuilder, ProviderConfig, TokenManagerConfig};
pub use crate::error::{OAuthError, Result};
pub use crate::util::RetryPolicy;
