use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use super::error::StoreError;
use super::identity::UserIdentity;
use super::token::TokenRecord;

const TOKEN_FILE_VERSION: u32 = 1;

/// Storage abstraction for per-user access and refresh tokens.
///
/// After `store` returns, a `get` on the same instance observes the new
/// record. Callers always receive clones, never references into the store.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert or overwrite the record for `user`.
    async fn store(&self, user: &UserIdentity, record: &TokenRecord) -> Result<(), StoreError>;

    /// Most recently stored record, or [`StoreError::NotFound`].
    async fn get(&self, user: &UserIdentity) -> Result<TokenRecord, StoreError>;

    /// Remove the record for `user`. Succeeds when nothing is stored.
    async fn clear(&self, user: &UserIdentity) -> Result<(), StoreError>;

    /// Store a freshly issued grant, computing expiry from now.
    ///
    /// `expires_in` must be a positive number of seconds whose expiry is
    /// representable, otherwise [`StoreError::InvalidRecord`] is returned and
    /// nothing is written.
    async fn store_token(
        &self,
        user: &UserIdentity,
        access_token: &str,
        expires_in: i64,
        refresh_token: Option<&str>,
    ) -> Result<TokenRecord, StoreError> {
        let record = TokenRecord::issued(
            access_token,
            expires_in,
            refresh_token.map(str::to_string),
            Utc::now(),
        )
        .ok_or_else(|| {
            StoreError::InvalidRecord(format!("expires_in {expires_in} is not a usable lifetime"))
        })?;
        self.store(user, &record).await?;
        Ok(record)
    }
}

/// Process-lifetime token store.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    records: RwLock<HashMap<UserIdentity, TokenRecord>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn store(&self, user: &UserIdentity, record: &TokenRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(user.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, user: &UserIdentity) -> Result<TokenRecord, StoreError> {
        self.records
            .read()
            .await
            .get(user)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn clear(&self, user: &UserIdentity) -> Result<(), StoreError> {
        self.records.write().await.remove(user);
        Ok(())
    }
}

/// Configuration for file-backed token storage.
#[derive(Debug, Clone)]
pub struct TokenStoreConfig {
    pub base_dir: PathBuf,
}

impl TokenStoreConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn default_dir() -> PathBuf {
        default_token_dir()
    }
}

/// File-backed token store, one TOML file per user.
///
/// File names are derived from a SHA-256 digest of the identity so any
/// identity maps to a distinct, path-safe name.
///
/// # Example
/// ```no_run
/// use strava_oauth::auth::{FileTokenStore, TokenStore, TokenStoreConfig, UserIdentity};
///
/// # async fn example() -> Result<(), strava_oauth::auth::StoreError> {
/// let store = FileTokenStore::new(TokenStoreConfig::new("/tmp/tokens".into()));
/// let user = UserIdentity::new("athlete-42");
/// store.store_token(&user, "access", 21600, Some("refresh")).await?;
/// let record = store.get(&user).await?;
/// assert_eq!(record.access_token, "access");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    base_dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(config: TokenStoreConfig) -> Self {
        Self {
            base_dir: config.base_dir,
        }
    }

    pub fn new_default() -> Self {
        Self {
            base_dir: default_token_dir(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn token_path(&self, user: &UserIdentity) -> PathBuf {
        self.base_dir.join(format!("{}.toml", file_stem(user)))
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn store(&self, user: &UserIdentity, record: &TokenRecord) -> Result<(), StoreError> {
        let path = self.token_path(user);
        let file = TokenFile {
            version: TOKEN_FILE_VERSION,
            user: user.clone(),
            saved_at: Utc::now(),
            token: record.clone(),
        };
        let serialized = toml::to_string(&file)?;
        tokio::task::spawn_blocking(move || atomic_write(&path, serialized.as_bytes()))
            .await
            .map_err(|err| StoreError::Io(err.to_string()))?
    }

    async fn get(&self, user: &UserIdentity) -> Result<TokenRecord, StoreError> {
        let path = self.token_path(user);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound)
            }
            Err(err) => return Err(StoreError::Io(err.to_string())),
        };
        let file: TokenFile = toml::from_str(&raw)?;
        if file.version != TOKEN_FILE_VERSION {
            return Err(StoreError::Serialization(format!(
                "unsupported token file version {} in {}",
                file.version,
                path.display()
            )));
        }
        Ok(file.token)
    }

    async fn clear(&self, user: &UserIdentity) -> Result<(), StoreError> {
        let path = self.token_path(user);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StoreError::Io(err.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TokenFile {
    version: u32,
    user: UserIdentity,
    saved_at: DateTime<Utc>,
    token: TokenRecord,
}

fn file_stem(user: &UserIdentity) -> String {
    let digest = Sha256::digest(user.as_str().as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

fn default_token_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".strava-oauth").join("tokens"))
        .unwrap_or_else(|| PathBuf::from(".strava-oauth/tokens"))
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| StoreError::Io(format!("token path {} has no file name", path.display())))?;
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let temp_path = path.with_file_name(format!(
        ".{}.tmp-{}-{nonce}",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let write_result = (|| -> std::io::Result<()> {
        let mut temp_file = options.open(&temp_path)?;
        temp_file.write_all(data)?;
        temp_file.sync_all()?;
        Ok(())
    })();

    if let Err(err) = write_result {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, FileTokenStore) {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(TokenStoreConfig::new(dir.path().to_path_buf()));
        (dir, store)
    }

    fn sample_record() -> TokenRecord {
        TokenRecord::new(
            "access",
            Some("refresh".to_string()),
            Utc::now() + Duration::hours(6),
        )
    }

    #[tokio::test]
    async fn in_memory_get_returns_stored_record() {
        let store = InMemoryTokenStore::new();
        let user = UserIdentity::new("u1");
        let record = sample_record();
        store.store(&user, &record).await.unwrap();
        assert_eq!(store.get(&user).await.unwrap(), record);
    }

    #[tokio::test]
    async fn in_memory_get_missing_is_not_found() {
        let store = InMemoryTokenStore::new();
        let result = store.get(&UserIdentity::new("nobody")).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn in_memory_clear_is_idempotent() {
        let store = InMemoryTokenStore::new();
        let user = UserIdentity::new("u1");
        store.clear(&user).await.unwrap();
        store.store(&user, &sample_record()).await.unwrap();
        store.clear(&user).await.unwrap();
        assert!(matches!(store.get(&user).await, Err(StoreError::NotFound)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn in_memory_users_are_isolated() {
        let store = InMemoryTokenStore::new();
        let first = UserIdentity::new("u1");
        let second = UserIdentity::new("u2");
        store.store(&first, &sample_record()).await.unwrap();
        assert!(matches!(store.get(&second).await, Err(StoreError::NotFound)));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn file_round_trip_preserves_record() {
        let (_dir, store) = temp_store();
        let user = UserIdentity::new("athlete-1");
        let record = sample_record();
        store.store(&user, &record).await.unwrap();
        assert_eq!(store.get(&user).await.unwrap(), record);
    }

    #[tokio::test]
    async fn file_clear_removes_record() {
        let (_dir, store) = temp_store();
        let user = UserIdentity::new("athlete-1");
        store.store(&user, &sample_record()).await.unwrap();
        store.clear(&user).await.unwrap();
        assert!(matches!(store.get(&user).await, Err(StoreError::NotFound)));
        store.clear(&user).await.unwrap();
    }

    #[tokio::test]
    async fn file_store_token_without_refresh_token() {
        let (_dir, store) = temp_store();
        let user = UserIdentity::new("athlete-1");
        let stored = store.store_token(&user, "access", 60, None).await.unwrap();
        let loaded = store.get(&user).await.unwrap();
        assert_eq!(loaded, stored);
        assert!(loaded.refresh_token.is_none());
    }

    #[tokio::test]
    async fn store_token_rejects_unusable_lifetime() {
        let store = InMemoryTokenStore::new();
        let user = UserIdentity::new("athlete-1");
        for expires_in in [0, -60, i64::MAX, 9_000_000_000_000_000_000] {
            let result = store.store_token(&user, "access", expires_in, None).await;
            assert!(
                matches!(result, Err(StoreError::InvalidRecord(_))),
                "expires_in {expires_in}"
            );
        }
        assert!(store.is_empty().await);
    }

    #[test]
    fn file_stem_distinguishes_similar_identities() {
        let a = file_stem(&UserIdentity::new("a b"));
        let b = file_stem(&UserIdentity::new("a-b"));
        assert_ne!(a, b);
        assert!(!a.contains('/'));
    }
}
