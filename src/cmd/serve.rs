//! HTTP server command: `sitelens serve`.

use std::sync::Arc;

use anyhow::Result;
use sitelens::config::SitelensToml;
use sitelens::orchestrator::RunOrchestrator;
use sitelens::web;

pub async fn cmd_serve(config: &SitelensToml, dev: bool, open: bool) -> Result<()> {
    let server_config = config.server_config(dev);
    let orchestrator = Arc::new(RunOrchestrator::from_config(config)?);

    // No browser when bound for a remote dashboard.
    if open && !dev {
        let url = format!("http://{}:{}/api/results", server_config.host, server_config.port);
        tokio::spawn(async move {
            // Small delay to let the server start binding
            tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
            if let Err(e) = open::that(&url) {
                eprintln!("Failed to open browser: {}", e);
            }
        });
    }

    web::start_server(server_config, orchestrator).await
}
