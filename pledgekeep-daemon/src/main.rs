//! Pledgekeep Daemon
//!
//! Background service that keeps a Patreon campaign's member list in
//! memory and answers Discord slash command lookups against it.
//!
//! # Running
//!
//! ```bash
//! cargo run -p pledgekeep-daemon --bin pledgekeepd
//! # or after install:
//! pledgekeepd
//! ```

use anyhow::{Context, Result};
use std::future::IntoFuture;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use pledgekeep_core::{PatreonClient, PostgresCredentialStore, SnapshotStore, SyncConfig, SyncEngine};
use pledgekeep_daemon::config::{self, Config};
use pledgekeep_daemon::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // A .env file feeds the environment in development.
    let _ = dotenvy::dotenv();

    init_logging();

    info!("Starting pledgekeep daemon...");

    let config = config::load_config()?;

    run_daemon(config).await
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run_daemon(config: Config) -> Result<()> {
    let store = PostgresCredentialStore::connect(&config.database_url)
        .await
        .context("Failed to connect to the credential database")?;
    store
        .migrate()
        .await
        .context("Failed to run database migrations")?;

    let snapshots = Arc::new(SnapshotStore::new());

    let client = PatreonClient::new(config.patreon_config())?;
    let mut engine = SyncEngine::new(
        client,
        store,
        snapshots.clone(),
        config.tiers.clone(),
        SyncConfig::default(),
    );
    engine
        .load_credential()
        .await
        .context("Failed to load the stored credential")?;

    let mut sync_task = tokio::spawn(engine.run());

    let state = AppState::new(&config, snapshots)?;
    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind(config.server_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server_addr))?;
    info!("Interaction server listening on {}", config.server_addr);

    tokio::select! {
        served = axum::serve(listener, app).into_future() => {
            served.context("Interaction server exited")?;
            Ok(())
        }
        fatal = &mut sync_task => {
            match fatal {
                Ok(e) => {
                    error!("Sync loop stopped: {}", e);
                    Err(anyhow::anyhow!("sync loop stopped: {}", e))
                }
                Err(e) => Err(anyhow::anyhow!("sync task panicked: {}", e)),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, stopping...");
            sync_task.abort();
            Ok(())
        }
    }
}
