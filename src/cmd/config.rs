//! Configuration view and validation commands: `sitelens config`.

use anyhow::{Context, Result};
use sitelens::config::{SitelensConfig, SitelensToml};
use sitelens::ui::icons::WARN;

use super::super::ConfigCommands;

pub fn cmd_config(config: &SitelensConfig, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = &config.path;

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Sitelens Configuration");
            println!("======================");
            println!();

            if config.from_file {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No sitelens.toml found at {}", config_path.display());
                println!("Using defaults. Run 'sitelens config init' to create one.");
            }
            println!();
            println!("Effective values (with env/CLI overrides):");
            println!();
            let rendered =
                toml::to_string_pretty(&config.toml).context("Failed to render configuration")?;
            println!("{}", rendered);
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config.from_file {
                println!("No sitelens.toml found. Using defaults (valid).");
            }

            let warnings = config.warnings();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  {}{}", WARN, warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("sitelens.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            SitelensToml::default().save(config_path)?;

            println!("Created sitelens.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [server] host, port");
            println!("  - [storage] results_dir");
            println!("  - [engine] chrome_cmd, lighthouse_cmd, timeouts, chrome_flags");
            println!("  - [logging] format, directory");
            println!();
        }
    }

    Ok(())
}
