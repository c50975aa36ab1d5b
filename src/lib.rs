//! strava-oauth — per-user OAuth token storage for Strava.
//!
//! Keeps each user's access and refresh tokens behind a [`TokenStore`],
//! and hands out access tokens through a [`TokenManager`] that refreshes
//! them against the provider's token endpoint when they are about to expire.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use strava_oauth::prelude::*;
//!
//! # async fn example() -> strava_oauth::error::Result<()> {
//! let store = Arc::new(FileTokenStore::new_default());
//! let user = UserIdentity::new("athlete-42");
//! store.store_token(&user, "access", 21600, Some("refresh")).await?;
//!
//! let manager = TokenManager::from_provider(
//!     store,
//!     &ProviderConfig::from_env()?,
//!     TokenManagerConfig::default(),
//! )?;
//! let access_token = manager.get_valid_access_token(&user).await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`TokenStore`]: auth::TokenStore
//! [`TokenManager`]: auth::TokenManager

pub mod auth;
pub mod config;
pub mod defaults;
pub mod error;
pub mod prelude;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
