//! Stored run commands: `sitelens results`.

use anyhow::{Context, Result};
use dialoguer::Confirm;
use sitelens::models::SitemapIdentity;
use sitelens::store::ResultStore;
use sitelens::ui;

use super::super::ResultsCommands;

pub async fn cmd_results(store: &ResultStore, command: ResultsCommands) -> Result<()> {
    match command {
        ResultsCommands::List { json } => {
            let catalog = store.catalog().await.context("Failed to read result store")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&catalog)?);
                return Ok(());
            }
            let mut runs = Vec::with_capacity(catalog.sitemap_urls.len());
            for sitemap_url in &catalog.sitemap_urls {
                let timestamps = store
                    .runs_for(&SitemapIdentity::from_url(sitemap_url))
                    .await?;
                runs.push((sitemap_url.clone(), timestamps));
            }
            ui::print_catalog(&catalog, &runs);
        }
        ResultsCommands::Show {
            sitemap_url,
            timestamp,
            json,
        } => {
            let record = store
                .get(&SitemapIdentity::from_url(&sitemap_url), &timestamp)
                .await
                .with_context(|| format!("No run for {} at {}", sitemap_url, timestamp))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record.results)?);
            } else {
                ui::print_results(&record);
            }
        }
        ResultsCommands::Delete {
            sitemap_url,
            timestamp,
            yes,
        } => {
            if !yes {
                let confirm = Confirm::new()
                    .with_prompt(format!("Delete run {} of {}?", timestamp, sitemap_url))
                    .default(false)
                    .interact()
                    .unwrap_or(false);

                if !confirm {
                    println!("Deletion cancelled.");
                    return Ok(());
                }
            }

            store
                .delete(&SitemapIdentity::from_url(&sitemap_url), &timestamp)
                .await
                .with_context(|| format!("Failed to delete run {} of {}", timestamp, sitemap_url))?;
            println!("Deleted run {} of {}", timestamp, sitemap_url);
        }
    }

    Ok(())
}
