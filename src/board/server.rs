use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use taskboard_common::ReorderPolicy;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use super::api::{self, AppState, SharedState};
use super::db::{BoardDb, DbHandle};
use super::service::BoardService;

/// Configuration for the board server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub db_path: std::path::PathBuf,
    pub dev_mode: bool,
    pub reorder_policy: ReorderPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3141,
            db_path: std::path::PathBuf::from(".taskboard/board.db"),
            dev_mode: false,
            reorder_policy: ReorderPolicy::default(),
        }
    }
}

/// Shared state over an open database.
pub fn app_state(db: DbHandle, policy: ReorderPolicy) -> SharedState {
    Arc::new(AppState {
        service: BoardService::new(Arc::new(db), policy),
    })
}

/// Build the full application router.
pub fn build_router(state: SharedState) -> Router {
    api::api_router().with_state(state)
}

/// Serve on an already-bound listener until Ctrl+C.
pub async fn serve(listener: TcpListener, state: SharedState, dev_mode: bool) -> Result<()> {
    let mut app = build_router(state);
    if dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let local_addr = listener.local_addr()?;
    info!(%local_addr, dev_mode, "taskboard server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server shut down gracefully");
    Ok(())
}

/// Open the database and start the board server.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    if let Some(parent) = config.db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let db = BoardDb::new(&config.db_path).context("Failed to initialize board database")?;
    let state = app_state(DbHandle::new(db), config.reorder_policy);
    info!(
        db_path = %config.db_path.display(),
        policy = %config.reorder_policy,
        "board database ready"
    );

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    serve(listener, state, config.dev_mode).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl+C handler; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
