use chrono::{DateTime, Duration, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// OAuth token state stored for a single user.
///
/// Records are replaced as a whole; nothing updates individual fields of a
/// stored record.
///
/// # Example
/// ```
/// use chrono::Utc;
/// use strava_oauth::auth::TokenRecord;
///
/// let record = TokenRecord::issued("access", 3600, Some("refresh".to_string()), Utc::now())
///     .expect("positive lifetime");
/// assert!(!record.is_expired(Utc::now()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at,
        }
    }

    /// Build a record from a provider grant.
    ///
    /// `expires_in` is counted from `issued_at`, the moment the provider
    /// handed out the token, not from any later read. Returns `None` when
    /// the lifetime is not positive or the expiry does not fit in a
    /// `DateTime<Utc>`.
    pub fn issued(
        access_token: impl Into<String>,
        expires_in: i64,
        refresh_token: Option<String>,
        issued_at: DateTime<Utc>,
    ) -> Option<Self> {
        if expires_in <= 0 {
            return None;
        }
        let expires_at = issued_at.checked_add_signed(TimeDelta::try_seconds(expires_in)?)?;
        Some(Self::new(access_token, refresh_token, expires_at))
    }

    /// True when the access token expires at or before `now + margin`.
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        match now.checked_add_signed(margin) {
            Some(deadline) => self.expires_at <= deadline,
            None => true,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.trim().is_empty())
    }
}
