//! Timeout helper for back-channel calls.

use std::future::Future;
use std::time::Duration;

use crate::auth::RefreshError;

/// Wrap a refresh future with a timeout.
///
/// Expiry is reported as [`RefreshError::Transport`] so callers treat it
/// like any other network failure.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, RefreshError>>,
) -> Result<T, RefreshError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(RefreshError::Transport(format!(
            "timed out after {}ms",
            duration.as_millis()
        ))),
    }
}
