//! Salesdesk server binary - composition root.
//!
//! 1. Load `.env`, the TOML configuration and environment overrides
//! 2. Initialize tracing
//! 3. Open the SQLite session store
//! 4. Build the search, completion, blob and mail clients
//! 5. Start the periodic empty-chat sweep
//! 6. Start the axum HTTP server

mod cli;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use salesdesk_api::{routes, AppState, Backends};
use salesdesk_blob::AzureBlobStore;
use salesdesk_chat::{AzureOpenAiClient, GraphMailClient, SessionManager};
use salesdesk_core::config::SalesdeskConfig;
use salesdesk_search::AzureSearchClient;
use salesdesk_storage::Database;

use crate::cli::CliArgs;

/// Expand ~ to the home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    match data_dir.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(rest)
        }
        None => PathBuf::from(data_dir),
    }
}

/// Soft-delete stale empty chats on a fixed interval.
async fn cleanup_loop(sessions: Arc<SessionManager>, interval_secs: u64) {
    tracing::info!(interval_secs, "Empty-chat cleanup loop started");

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        match sessions.cleanup_empty() {
            Ok(swept) => tracing::debug!(swept, "Empty-chat cleanup finished"),
            Err(e) => tracing::warn!(error = %e, "Empty-chat cleanup failed"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let args = CliArgs::parse();

    // Config: file, then environment, then CLI flags.
    let config_file = args.resolve_config_path();
    let mut config = SalesdeskConfig::load_or_default(&config_file);
    config.apply_env_overrides()?;
    config.general.port = args.resolve_port(config.general.port);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Salesdesk v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }
    tracing::debug!(config = ?config.redacted(), "Effective configuration");
    if config.general.local_dev {
        tracing::warn!("Local development mode: missing identity headers fall back to the debug user");
    }

    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    let db_path = data_dir.join("salesdesk.db");
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // External services.
    let backends = Backends {
        searcher: Arc::new(AzureSearchClient::from_config(&config.search)?),
        completion: Arc::new(AzureOpenAiClient::from_config(&config.openai)?),
        blobs: Arc::new(AzureBlobStore::from_config(&config.blob)?),
        mail: Arc::new(GraphMailClient::from_config(&config.mail)?),
    };
    let state = AppState::new(config.clone(), db, backends);

    // === Background tasks ===

    let sessions = Arc::clone(&state.sessions);
    let cleanup_secs = config.chat.cleanup_interval_secs;
    tokio::spawn(async move {
        cleanup_loop(sessions, cleanup_secs).await;
    });

    // === HTTP server ===

    routes::start_server(&config, state).await?;

    Ok(())
}
