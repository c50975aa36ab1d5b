#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use strava_oauth::auth::{RefreshError, TokenRecord, TokenRefresher};

/// Refresher that replays scripted outcomes and counts calls.
#[derive(Default)]
pub struct ScriptedRefresher {
    outcomes: Mutex<VecDeque<Outcome>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
    seen_refresh_tokens: Mutex<Vec<Option<String>>>,
}

pub enum Outcome {
    Grant {
        access_token: &'static str,
        refresh_token: Option<&'static str>,
        expires_in: i64,
    },
    Rejected(u16),
    Transport,
}

impl ScriptedRefresher {
    pub fn new(outcomes: Vec<Outcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_refresh_tokens(&self) -> Vec<Option<String>> {
        self.seen_refresh_tokens
            .lock()
            .expect("refresher lock poisoned")
            .clone()
    }
}

#[async_trait]
impl TokenRefresher for ScriptedRefresher {
    async fn refresh(&self, old: &TokenRecord) -> Result<TokenRecord, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_refresh_tokens
            .lock()
            .expect("refresher lock poisoned")
            .push(old.refresh_token.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = self
            .outcomes
            .lock()
            .expect("refresher lock poisoned")
            .pop_front()
            .expect("unexpected refresh call");
        match outcome {
            Outcome::Grant {
                access_token,
                refresh_token,
                expires_in,
            } => TokenRecord::issued(
                access_token,
                expires_in,
                refresh_token
                    .map(str::to_string)
                    .or_else(|| old.refresh_token.clone()),
                Utc::now(),
            )
            .ok_or_else(|| RefreshError::InvalidResponse(format!("expires_in {expires_in}"))),
            Outcome::Rejected(status) => Err(RefreshError::ProviderRejected {
                status,
                body: r#"{"message":"Bad Request"}"#.to_string(),
            }),
            Outcome::Transport => Err(RefreshError::Transport("connection reset".to_string())),
        }
    }
}

/// Record issued `age_secs` ago with the given lifetime.
pub fn issued_ago(
    access_token: &str,
    refresh_token: Option<&str>,
    expires_in: i64,
    age_secs: i64,
) -> TokenRecord {
    TokenRecord::issued(
        access_token,
        expires_in,
        refresh_token.map(str::to_string),
        Utc::now() - chrono::Duration::seconds(age_secs),
    )
    .expect("positive lifetime")
}
