use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use super::api::{self, AppState};
use crate::orchestrator::RunOrchestrator;

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Permissive CORS and a wildcard bind, for a separately served dashboard.
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            dev_mode: false,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        let host = if self.dev_mode { "0.0.0.0" } else { self.host.as_str() };
        format!("{}:{}", host, self.port)
    }
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>, dev_mode: bool) -> Router {
    let app = api::api_router().with_state(state);
    if dev_mode {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Bind, serve until Ctrl+C, then drain open connections.
pub async fn start_server(config: ServerConfig, orchestrator: Arc<RunOrchestrator>) -> Result<()> {
    let state = Arc::new(AppState::new(orchestrator));
    let app = build_router(state, config.dev_mode);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, dev = config.dev_mode, "server listening");
    println!("sitelens running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    println!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    println!("\nShutting down...");
}
