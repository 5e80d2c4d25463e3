//! Configuration management commands

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::{Config, CONFIG_FILE_NAME};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a default configuration file to the current directory
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

pub fn run(cmd: ConfigCommands, config: &Config) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(config),
        ConfigCommands::Init { force } => {
            if init(Path::new(CONFIG_FILE_NAME), force)? {
                println!("Configuration file created: {CONFIG_FILE_NAME}");
            } else {
                println!("Configuration file already exists: {CONFIG_FILE_NAME}");
                println!("Use --force to overwrite");
            }
            Ok(())
        }
    }
}

fn show(config: &Config) -> Result<()> {
    match Config::find_config_file() {
        Some(path) => println!("# Config file: {}\n", path.display()),
        None => println!("# No configuration file found, showing defaults and environment overrides\n"),
    }
    print!("{}", config.to_toml()?);
    Ok(())
}

/// Write the default configuration to `path`; returns false if it exists and `force` is unset
fn init(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    let content = Config::default().to_toml()?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}
