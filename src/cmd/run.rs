//! One-shot audit command: `sitelens run <SITEMAP_URL>`.

use std::sync::Arc;

use anyhow::{Context, Result};
use console::style;
use sitelens::config::SitelensToml;
use sitelens::orchestrator::{RunOrchestrator, RunOutcome};
use sitelens::progress;
use sitelens::ui::{self, RunProgressUI};

pub async fn cmd_run(config: &SitelensToml, sitemap_url: &str, json: bool) -> Result<()> {
    let orchestrator = Arc::new(RunOrchestrator::from_config(config)?);
    let (tx, mut rx) = progress::channel();

    let task = {
        let orchestrator = Arc::clone(&orchestrator);
        let sitemap_url = sitemap_url.to_string();
        tokio::spawn(async move { orchestrator.execute(&sitemap_url, tx).await })
    };

    let mut progress_ui = if json {
        RunProgressUI::hidden()
    } else {
        RunProgressUI::new(sitemap_url)
    };
    while let Some(event) = rx.recv().await {
        progress_ui.handle(&event);
    }

    match task.await.context("Run task panicked")? {
        RunOutcome::Completed(record) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&record.results)?);
            } else {
                ui::print_results(&record);
                println!(
                    "{} of {} pages audited. View again with: {}",
                    style(record.succeeded()).green().bold(),
                    record.results.len(),
                    style(format!(
                        "sitelens results show '{}' '{}'",
                        record.sitemap_url, record.timestamp
                    ))
                    .cyan()
                );
            }
            Ok(())
        }
        RunOutcome::Failed { error, unsaved } => {
            if let Some(record) = unsaved {
                eprintln!(
                    "{} pages were audited but could not be saved.",
                    record.results.len()
                );
            }
            Err(error.into())
        }
    }
}
