//! CLI entry point for strava-oauth.

pub mod tokens;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Inspect and manage stored Strava OAuth tokens.
#[derive(Parser, Debug)]
#[command(name = "strava-oauth", version, about = "Strava OAuth token store CLI")]
pub struct Cli {
    /// Settings file (TOML). Falls back to STRAVA_* environment variables.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding token files. Overrides the settings file.
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Token management
    Token(TokenArgs),
}

/// Arguments for the `token` subcommand group.
#[derive(Parser, Debug)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommands,
}

/// Token subcommands.
#[derive(Subcommand, Debug)]
pub enum TokenCommands {
    /// Store tokens obtained from a completed authorization
    Store(StoreArgs),
    /// Show the stored token state for a user
    Show(UserArgs),
    /// Print a valid access token, refreshing it if needed
    Access(UserArgs),
    /// Remove stored tokens for a user
    Clear(UserArgs),
}

/// Arguments naming a user.
#[derive(Parser, Debug)]
pub struct UserArgs {
    /// User identity key
    pub user: String,
}

/// Arguments for `strava-oauth token store`.
#[derive(Parser, Debug)]
pub struct StoreArgs {
    /// User identity key
    pub user: String,

    #[arg(long)]
    pub access_token: String,

    #[arg(long)]
    pub refresh_token: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long)]
    pub expires_in: i64,
}
