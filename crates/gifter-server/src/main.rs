//! # gifter-server
//!
//! HTTP backend for the gift registry.
//!
//! This binary provides:
//! - **Accounts**: email/password signup and login, optional Google OAuth
//! - **Events** with invited participants
//! - **Gifts** with a claim workflow that hides the buyer from the recipient
//! - **Comments** under each gift
//!
//! State lives in a single SQLite file (see `gifter-store`); sessions are
//! kept in memory and referenced by a signed cookie.

mod api;
mod auth;
mod config;
mod error;
mod oauth;
mod session;

use tracing::info;
use tracing_subscriber::EnvFilter;

use gifter_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,gifter_server=debug,gifter_store=debug")
            }),
        )
        .init();

    info!("Starting gifter server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    if config.google.is_none() {
        info!("Google OAuth not configured; /auth is disabled");
    }

    // -----------------------------------------------------------------------
    // 3. Open the database and build shared state
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)?;
    info!(path = %config.database_path.display(), "Database ready");

    let http_addr = config.http_addr;
    let app_state = AppState::new(db, config);

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic session cleanup (every 10 minutes)
    let sessions = app_state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(600));
        loop {
            interval.tick().await;
            sessions.purge_expired().await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
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
