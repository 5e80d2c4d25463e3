//! Configuration loading for the gradlab CLI

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use gradlab_optim::{AdamConfig, ObjectiveKind, OptimizerConfig, RmsPropConfig, SgdConfig, SweepConfig};
use gradlab_rl::{AgentConfig, EnvKind};

/// Name of the config file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "gradlab.toml";

/// Configuration for the CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub optim: OptimConfig,
    pub rl: RlConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Emit log lines as JSON objects
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimConfig {
    pub objective: ObjectiveKind,
    pub start: [f64; 2],
    pub iters: usize,
    pub seed: u64,
    /// Optimizers run side by side by `optim compare`
    pub optimizers: Vec<OptimizerConfig>,
    pub sweep: SweepConfig,
    /// Base optimizer the sweep overrides
    pub sweep_base: OptimizerConfig,
}

impl Default for OptimConfig {
    fn default() -> Self {
        Self {
            objective: ObjectiveKind::Pathological,
            start: [2.5, 2.5],
            iters: 300,
            seed: 0,
            optimizers: vec![
                OptimizerConfig::Sgd(SgdConfig::new(0.03).with_momentum(0.99)),
                OptimizerConfig::RmsProp(RmsPropConfig::new(0.02).with_alpha(0.99).with_momentum(0.8)),
                OptimizerConfig::Adam(AdamConfig::new(0.2).with_betas(0.99, 0.99).with_weight_decay(0.005)),
            ],
            sweep: SweepConfig::default(),
            sweep_base: OptimizerConfig::Sgd(SgdConfig::new(0.01).with_momentum(0.9)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RlConfig {
    pub env: EnvKind,
    pub gamma: f64,
    /// Episodes per training run
    pub runs: usize,
    pub seed: u64,
    pub agent: AgentConfig,
}

impl Default for RlConfig {
    fn default() -> Self {
        Self {
            env: EnvKind::Norvig,
            gamma: 0.99,
            runs: 1000,
            seed: 0,
            agent: AgentConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `path` (if any), then `GRADLAB__*` environment variables.
    ///
    /// Called before the subscriber exists, so the caller logs which file was used.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = ConfigBuilder::<config::builder::DefaultState>::default();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path.to_path_buf()).required(false));
        }

        // e.g. GRADLAB__RL__RUNS=500
        builder = builder.add_source(
            Environment::with_prefix("GRADLAB")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Find the configuration file
    pub fn find_config_file() -> Option<PathBuf> {
        // Check in order: GRADLAB_CONFIG env, ./gradlab.toml, ~/.config/gradlab/gradlab.toml
        if let Ok(path) = std::env::var("GRADLAB_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config").join("gradlab").join(CONFIG_FILE_NAME);
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.optim.start, [2.5, 2.5]);
        assert_eq!(config.optim.optimizers.len(), 3);
        assert_eq!(config.rl.env, EnvKind::Norvig);
        assert_eq!(config.rl.agent, AgentConfig::default());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[rl]
env = "toy"
runs = 50

[rl.agent]
epsilon = 0.2

[optim]
objective = "trimodal"
iters = 40

[[optim.optimizers]]
kind = "adamw"
lr = 0.05
weight_decay = 0.01
"#
        )
        .unwrap();

        let config = Config::load_from(Some(file.path())).unwrap();
        assert_eq!(config.rl.env, EnvKind::Toy);
        assert_eq!(config.rl.runs, 50);
        assert_eq!(config.rl.agent.epsilon, 0.2);
        assert_eq!(config.rl.agent.lr, 0.05);
        assert_eq!(config.rl.gamma, 0.99);
        assert_eq!(config.optim.objective, ObjectiveKind::Trimodal);
        assert_eq!(config.optim.iters, 40);
        assert_eq!(
            config.optim.optimizers,
            vec![OptimizerConfig::AdamW(AdamConfig::new(0.05).with_weight_decay(0.01))]
        );
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.rl, RlConfig::default());
    }

    #[test]
    fn test_toml_round_trip() {
        let text = Config::default().to_toml().unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
