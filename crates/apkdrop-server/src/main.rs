//! # apkdrop-server
//!
//! Distribution server for a single Android app.
//!
//! This binary provides:
//! - **Public download endpoints** that resolve the latest APK (published
//!   pointer first, newest file second) and stream it with per-attempt
//!   download logging
//! - **Metadata APIs** polled by the static landing page
//! - **Admin panel** behind a cookie session: APK and video uploads,
//!   set-latest/delete, password and site settings, download analytics
//! - **Static landing page** served from `STATIC_DIR`

mod admin;
mod analytics;
mod api;
mod config;
mod download;
mod error;
mod logs;
mod resolver;
mod session;
mod store;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::session::{SessionStore, StaticCredentials};
use crate::store::DataStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,apkdrop_server=debug")),
        )
        .init();

    info!("Starting apkdrop server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------

    // Data directory layout (created if missing)
    let store = Arc::new(DataStore::open(config.data_dir.clone()).await?);

    let sessions = SessionStore::new(config.session_ttl_secs);
    let credentials = Arc::new(StaticCredentials::new(
        &config.admin_username,
        &config.admin_password,
    ));

    let http_addr = config.http_addr;
    let app_state = AppState {
        store,
        sessions: sessions.clone(),
        credentials,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic session cleanup (every 5 minutes)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            sessions.purge_expired().await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
