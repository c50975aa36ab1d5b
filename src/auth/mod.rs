//! Per-user OAuth token storage and refresh-aware retrieval.

pub mod error;
pub mod identity;
pub mod manager;
pub mod refresher;
pub mod store;
pub mod token;

pub use error::{AuthError, RefreshError, StoreError};
pub use identity::UserIdentity;
pub use manager::{TokenManager, TokenState};
pub use refresher::{ClientCredentials, HttpTokenRefresher, TokenRefresher};
pub use store::{FileTokenStore, InMemoryTokenStore, TokenStore, TokenStoreConfig};
pub use token::TokenRecord;
