mod auth_support;

use std::fs;

use strava_oauth::auth::{FileTokenStore, StoreError, TokenStore, TokenStoreConfig, UserIdentity};
use tempfile::TempDir;

use auth_support::issued_ago;

fn store_in(dir: &TempDir) -> FileTokenStore {
    FileTokenStore::new(TokenStoreConfig::new(dir.path().to_path_buf()))
}

#[tokio::test]
async fn records_survive_a_new_store_instance() {
    let dir = TempDir::new().unwrap();
    let user = UserIdentity::new("athlete-1");
    let record = issued_ago("A1", Some("R1"), 21600, 0);

    store_in(&dir).store(&user, &record).await.unwrap();
    let loaded = store_in(&dir).get(&user).await.unwrap();
    assert_eq!(loaded, record);
}

#[tokio::test]
async fn store_overwrites_previous_record() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let user = UserIdentity::new("athlete-1");

    store
        .store(&user, &issued_ago("A1", Some("R1"), 3600, 0))
        .await
        .unwrap();
    let replacement = issued_ago("A2", None, 3600, 0);
    store.store(&user, &replacement).await.unwrap();

    assert_eq!(store.get(&user).await.unwrap(), replacement);
}

#[tokio::test]
async fn writes_leave_no_temp_files() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    for n in 0..3 {
        store
            .store(
                &UserIdentity::new(format!("athlete-{n}")),
                &issued_ago("A1", Some("R1"), 3600, 0),
            )
            .await
            .unwrap();
    }

    let names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 3);
    assert!(names.iter().all(|name| name.ends_with(".toml")));
    assert!(!names.iter().any(|name| name.contains(".tmp-")));
}

#[tokio::test]
async fn identities_with_path_characters_are_isolated() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let first = UserIdentity::new("../etc/passwd");
    let second = UserIdentity::new("..-etc-passwd");

    store
        .store(&first, &issued_ago("A1", None, 3600, 0))
        .await
        .unwrap();
    assert!(matches!(store.get(&second).await, Err(StoreError::NotFound)));
    assert_eq!(store.get(&first).await.unwrap().access_token, "A1");
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn corrupt_file_is_serialization_error() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let user = UserIdentity::new("athlete-1");
    store
        .store(&user, &issued_ago("A1", None, 3600, 0))
        .await
        .unwrap();

    let path = fs::read_dir(dir.path()).unwrap().next().unwrap().unwrap().path();
    fs::write(&path, "version = \"not-a-number\"").unwrap();

    assert!(matches!(
        store.get(&user).await,
        Err(StoreError::Serialization(_))
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn token_files_are_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store
        .store(
            &UserIdentity::new("athlete-1"),
            &issued_ago("A1", Some("R1"), 3600, 0),
        )
        .await
        .unwrap();

    let path = fs::read_dir(dir.path()).unwrap().next().unwrap().unwrap().path();
    let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}

#[tokio::test]
async fn clear_then_get_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let user = UserIdentity::new("athlete-1");
    store
        .store(&user, &issued_ago("A1", Some("R1"), 3600, 0))
        .await
        .unwrap();

    store.clear(&user).await.unwrap();
    assert!(matches!(store.get(&user).await, Err(StoreError::NotFound)));
}
