//! gradlab CLI - Run optimizer and reinforcement learning experiments
//!
//! Optimizer commands trace hand-written optimizers over 2-D test objectives
//! and run hyperparameter sweeps; RL commands train tabular agents on small
//! grid worlds and solve them by policy iteration.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gradlab_core::util::EnvFile;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

use commands::{optim, rl};

#[derive(Parser)]
#[command(name = "gradlab")]
#[command(author, version, about = "gradlab - optimizer and tabular RL experiments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimizer experiments
    #[command(subcommand)]
    Optim(optim::OptimCommands),

    /// Reinforcement learning experiments
    #[command(subcommand)]
    Rl(rl::RlCommands),

    /// Configuration management
    #[command(subcommand)]
    Config(commands::config::ConfigCommands),
}

fn main() -> Result<()> {
    // Load environment from gradlab.env file (before parsing args)
    let env_file = gradlab_core::util::load_env_file()?;

    let cli = Cli::parse();
    let config_path = config::Config::find_config_file();
    let config = config::Config::load_from(config_path.as_deref())?;

    // Initialize logging based on verbosity, falling back to the configured level
    let log_level = if cli.verbose { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| format!("gradlab={log_level}").into());
    let json = config.logging.json;

    // Logs go to stderr so `--json` output on stdout stays parseable
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
    log_sources(env_file.as_ref(), config_path.as_deref());

    match cli.command {
        Commands::Optim(cmd) => optim::run(cmd, &config),
        Commands::Rl(cmd) => rl::run(cmd, &config),
        Commands::Config(cmd) => commands::config::run(cmd, &config),
    }
}

/// Report where settings came from; both are resolved before logging is up
fn log_sources(env_file: Option<&EnvFile>, config_path: Option<&Path>) {
    if let Some(env_file) = env_file {
        debug!(
            path = %env_file.path.display(),
            keys = ?env_file.applied,
            "Applied env file"
        );
    }
    match config_path {
        Some(path) => info!("Loading config from: {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }
}
