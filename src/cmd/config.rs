//! Configuration view and validation commands: `taskboard config`.

use anyhow::Result;
use taskboard::config::{TaskboardConfig, TaskboardToml};

use super::super::ConfigCommands;

pub fn cmd_config(config: &TaskboardConfig, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Taskboard Configuration");
            println!("=======================");
            println!();
            if config.config_path.exists() {
                println!("Config file: {}", config.config_path.display());
            } else {
                println!(
                    "No taskboard.toml at {}; using defaults.",
                    config.config_path.display()
                );
            }
            println!();
            println!("Effective values (with env overrides):");
            print!("{}", toml::to_string_pretty(&config.toml)?);
        }
        Some(ConfigCommands::Validate) => {
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in &warnings {
                    println!("  - {}", warning);
                }
            }
        }
        Some(ConfigCommands::Init) => {
            if config.config_path.exists() {
                println!(
                    "taskboard.toml already exists at {}",
                    config.config_path.display()
                );
            } else {
                TaskboardToml::default().save(&config.config_path)?;
                println!("Created {}", config.config_path.display());
            }
        }
    }
    Ok(())
}
