use anyhow::Result;
use clap::{Parser, Subcommand};
use sitelens::config::{CliOverrides, SitelensConfig};
use sitelens::logging;
use sitelens::store::ResultStore;
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "sitelens")]
#[command(version, about = "Sitemap-driven Lighthouse audits with stored, comparable runs")]
pub struct Cli {
    /// Debug-level logging for sitelens itself
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to sitelens.toml (default: .sitelens/sitelens.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding stored runs. Overrides [storage] results_dir.
    #[arg(long, global = true)]
    pub results_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the analyze stream and results API over HTTP
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,

        /// Permissive CORS and bind 0.0.0.0, for a separately served dashboard
        #[arg(long)]
        dev: bool,

        /// Open the results API in a browser once listening
        #[arg(long)]
        open: bool,
    },
    /// Audit every page of a sitemap once and store the run
    Run {
        sitemap_url: String,

        /// Print the stored results as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Inspect or delete stored runs
    Results {
        #[command(subcommand)]
        command: ResultsCommands,
    },
    /// Show, validate or create sitelens.toml
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ResultsCommands {
    /// Every stored sitemap and its run timestamps
    List {
        #[arg(long)]
        json: bool,
    },
    /// One run's page results
    Show {
        sitemap_url: String,
        timestamp: String,
        #[arg(long)]
        json: bool,
    },
    /// Remove one run
    Delete {
        sitemap_url: String,
        timestamp: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    Show,
    Validate,
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = match &cli.command {
        Commands::Serve { port, host, .. } => CliOverrides {
            results_dir: cli.results_dir.clone(),
            host: host.clone(),
            port: *port,
        },
        _ => CliOverrides {
            results_dir: cli.results_dir.clone(),
            ..CliOverrides::default()
        },
    };
    let config = SitelensConfig::load(cli.config.as_deref(), &overrides)?;

    let quiet = !matches!(cli.command, Commands::Serve { .. });
    let _log_guard = logging::init(
        &config.toml.logging,
        logging::default_directive(cli.verbose, quiet),
    )?;
    for warning in &config.env_warnings {
        tracing::warn!("{}", warning);
    }

    match cli.command {
        Commands::Serve { dev, open, .. } => {
            cmd::cmd_serve(&config.toml, dev, open).await?;
        }
        Commands::Run { sitemap_url, json } => {
            cmd::cmd_run(&config.toml, &sitemap_url, json).await?;
        }
        Commands::Results { command } => {
            let store = ResultStore::new(config.toml.storage.results_dir.clone());
            cmd::cmd_results(&store, command).await?;
        }
        Commands::Config { command } => cmd::cmd_config(&config, command)?,
    }

    Ok(())
}
