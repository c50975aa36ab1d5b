//! strava-oauth CLI binary entry point.

use clap::Parser;
use strava_oauth::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Token(token_args) => {
            strava_oauth::cli::tokens::handle(&cli, &token_args.command).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        if e.recovery_action() == strava_oauth::error::RecoveryAction::Reauthenticate {
            eprintln!("Sign in again to store new tokens.");
        }
        std::process::exit(1);
    }
}
