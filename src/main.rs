//! Graph Tutorial - Microsoft Graph console client
//!
//! Signs the user in with the device-code flow and calls OneDrive through
//! Microsoft Graph, both as the user and as the app.

#![deny(clippy::all)]

mod auth;
mod config;
mod console;
mod drive;
mod error;
mod graph;
mod secure;
mod session;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::Config;
use session::CredentialSession;

#[derive(Parser, Debug)]
#[command(name = "graphtutorial", version, about = "Microsoft Graph device-code tutorial")]
struct Cli {
    /// Path to an oauth.toml file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set (e.g. "debug", "graphtutorial=trace")
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (if present) before anything else
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            eprintln!("\nEdit oauth.toml or set the following environment variables:");
            eprintln!("  AZURE_CLIENT_ID=<your-app-registration-client-id>");
            eprintln!("  AZURE_AUTH_TENANT=<common|organizations|tenant-id>");
            eprintln!("  GRAPH_USER_SCOPES=<comma-separated scopes>");
            std::process::exit(1);
        }
    };

    init_logging(cli.log_level.as_deref().unwrap_or(&config.logging.level));
    info!("Starting graphtutorial v{}", env!("CARGO_PKG_VERSION"));

    println!("Rust Graph Tutorial");
    println!();

    let on_challenge = console::challenge_handler(config.app.open_browser);
    let mut session = CredentialSession::new();
    if let Err(e) = session.initialize_user_auth(config, on_challenge) {
        error!("Failed to initialize user auth: {}", e);
        println!("Error initializing Graph for user auth");
        println!("{}", e);
        std::process::exit(1);
    }

    console::greet_user(&session).await;
    console::run(&session).await?;

    Ok(())
}

/// Initialize tracing/logging on stderr so it stays out of the menu output.
fn init_logging(fallback: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();
}
