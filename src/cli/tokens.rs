//! CLI handlers for the `token` subcommands.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::{
    FileTokenStore, StoreError, TokenManager, TokenState, TokenStore, TokenStoreConfig,
    UserIdentity,
};
use crate::config::{Settings, DEFAULT_REFRESH_SAFETY_MARGIN};
use crate::error::OAuthError;

use super::{Cli, StoreArgs, TokenCommands, UserArgs};

/// Dispatch a `token` subcommand.
pub async fn handle(cli: &Cli, command: &TokenCommands) -> Result<(), OAuthError> {
    match command {
        TokenCommands::Store(args) => handle_store(cli, args).await,
        TokenCommands::Show(args) => handle_show(cli, args).await,
        TokenCommands::Access(args) => handle_access(cli, args).await,
        TokenCommands::Clear(args) => handle_clear(cli, args).await,
    }
}

async fn handle_store(cli: &Cli, args: &StoreArgs) -> Result<(), OAuthError> {
    let settings = local_settings(cli)?;
    let store = FileTokenStore::new(store_config(cli, settings.as_ref()));
    let user = UserIdentity::new(args.user.as_str());
    let record = store
        .store_token(
            &user,
            &args.access_token,
            args.expires_in,
            args.refresh_token.as_deref(),
        )
        .await
        .map_err(|err| match err {
            StoreError::InvalidRecord(message) => {
                OAuthError::Configuration(format!("--expires-in: {message}"))
            }
            other => other.into(),
        })?;
    println!("Stored tokens for {user} (expires {})", record.expires_at);
    Ok(())
}

async fn handle_show(cli: &Cli, args: &UserArgs) -> Result<(), OAuthError> {
    print!("{}", describe(cli, &UserIdentity::new(args.user.as_str())).await?);
    Ok(())
}

/// Render the stored state for `user`, classified with the configured
/// safety margin when a settings file is given.
async fn describe(cli: &Cli, user: &UserIdentity) -> Result<String, OAuthError> {
    let settings = local_settings(cli)?;
    let margin = settings
        .as_ref()
        .map(|settings| settings.manager_config().refresh_safety_margin)
        .unwrap_or(DEFAULT_REFRESH_SAFETY_MARGIN);
    let store = FileTokenStore::new(store_config(cli, settings.as_ref()));
    let record = match store.get(user).await {
        Ok(record) => record,
        Err(StoreError::NotFound) => return Ok(format!("{user}: {}\n", TokenState::Absent)),
        Err(err) => return Err(err.into()),
    };
    let state = TokenState::of(Some(&record), margin, Utc::now());
    Ok(format!(
        "{user}: {state}\n  expires at:    {}\n  refresh token: {}\n",
        record.expires_at,
        if record.has_refresh_token() { "present" } else { "absent" }
    ))
}

async fn handle_access(cli: &Cli, args: &UserArgs) -> Result<(), OAuthError> {
    let settings = load_settings(cli)?;
    let store = Arc::new(FileTokenStore::new(store_config(cli, Some(&settings))));
    let manager =
        TokenManager::from_provider(store, &settings.provider, settings.manager_config())?;
    let token = manager
        .get_valid_access_token(&UserIdentity::new(args.user.as_str()))
        .await?;
    println!("{token}");
    Ok(())
}

async fn handle_clear(cli: &Cli, args: &UserArgs) -> Result<(), OAuthError> {
    let settings = local_settings(cli)?;
    let store = FileTokenStore::new(store_config(cli, settings.as_ref()));
    let user = UserIdentity::new(args.user.as_str());
    store.clear(&user).await?;
    println!("Cleared tokens for {user}");
    Ok(())
}

fn load_settings(cli: &Cli) -> Result<Settings, OAuthError> {
    match &cli.config {
        Some(path) => Settings::load_from_path(path),
        None => Settings::from_env(),
    }
}

/// Settings for commands that never talk to the provider. Only an explicit
/// `--config` is read, so these work without client credentials.
fn local_settings(cli: &Cli) -> Result<Option<Settings>, OAuthError> {
    cli.config
        .as_deref()
        .map(Settings::load_from_path)
        .transpose()
}

fn store_config(cli: &Cli, settings: Option<&Settings>) -> TokenStoreConfig {
    if let Some(dir) = &cli.store_dir {
        return TokenStoreConfig::new(dir.clone());
    }
    settings
        .map(Settings::token_store_config)
        .unwrap_or_else(|| TokenStoreConfig::new(TokenStoreConfig::default_dir()))
}
