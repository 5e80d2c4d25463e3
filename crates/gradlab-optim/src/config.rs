//! Optimizer configuration
//!
//! Plain serde structs describe hyperparameters; [`OptimizerConfig::build`]
//! validates them and allocates optimizer state for a parameter set.

use std::fmt;

use serde::{Deserialize, Serialize};

use gradlab_core::{GradlabError, ParamId, ParamStore, Result};

use crate::adam::Adam;
use crate::adamw::AdamW;
use crate::optimizer::{check_non_negative, check_positive, check_unit_interval, Optimizer};
use crate::rmsprop::RmsProp;
use crate::sgd::Sgd;

/// SGD with momentum (no dampening, no Nesterov)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SgdConfig {
    pub lr: f64,
    pub momentum: f64,
    pub weight_decay: f64,
}

impl Default for SgdConfig {
    fn default() -> Self {
        Self {
            lr: 0.01,
            momentum: 0.0,
            weight_decay: 0.0,
        }
    }
}

impl SgdConfig {
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            ..Self::default()
        }
    }

    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: f64) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_non_negative("lr", self.lr)?;
        check_non_negative("momentum", self.momentum)?;
        check_non_negative("weight_decay", self.weight_decay)
    }
}

impl fmt::Display for SgdConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SGD(lr={}, momentum={}, weight_decay={})",
            self.lr, self.momentum, self.weight_decay
        )
    }
}

/// RMSprop, non-centered
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RmsPropConfig {
    pub lr: f64,
    pub alpha: f64,
    pub eps: f64,
    pub weight_decay: f64,
    pub momentum: f64,
}

impl Default for RmsPropConfig {
    fn default() -> Self {
        Self {
            lr: 0.01,
            alpha: 0.99,
            eps: 1e-8,
            weight_decay: 0.0,
            momentum: 0.0,
        }
    }
}

impl RmsPropConfig {
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            ..Self::default()
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: f64) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_non_negative("lr", self.lr)?;
        check_unit_interval("alpha", self.alpha, true)?;
        check_positive("eps", self.eps)?;
        check_non_negative("weight_decay", self.weight_decay)?;
        check_non_negative("momentum", self.momentum)
    }
}

impl fmt::Display for RmsPropConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RMSprop(lr={}, eps={}, momentum={}, weight_decay={}, alpha={})",
            self.lr, self.eps, self.momentum, self.weight_decay, self.alpha
        )
    }
}

/// Shared by Adam and AdamW; they differ only in where weight decay is applied
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    pub lr: f64,
    pub betas: (f64, f64),
    pub eps: f64,
    pub weight_decay: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            lr: 1e-3,
            betas: (0.9, 0.999),
            eps: 1e-8,
            weight_decay: 0.0,
        }
    }
}

impl AdamConfig {
    pub fn new(lr: f64) -> Self {
        Self {
            lr,
            ..Self::default()
        }
    }

    pub fn with_betas(mut self, beta1: f64, beta2: f64) -> Self {
        self.betas = (beta1, beta2);
        self
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: f64) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_non_negative("lr", self.lr)?;
        check_unit_interval("beta1", self.betas.0, false)?;
        check_unit_interval("beta2", self.betas.1, false)?;
        check_positive("eps", self.eps)?;
        check_non_negative("weight_decay", self.weight_decay)
    }

    fn describe(&self, name: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{name}(lr={}, beta1={}, beta2={}, eps={}, weight_decay={})",
            self.lr, self.betas.0, self.betas.1, self.eps, self.weight_decay
        )
    }
}

/// Any supported optimizer, tagged by `kind` in serialized form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OptimizerConfig {
    Sgd(SgdConfig),
    RmsProp(RmsPropConfig),
    Adam(AdamConfig),
    AdamW(AdamConfig),
}

impl OptimizerConfig {
    /// Short kind name, as used in config files and on the command line
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sgd(_) => "sgd",
            Self::RmsProp(_) => "rmsprop",
            Self::Adam(_) => "adam",
            Self::AdamW(_) => "adamw",
        }
    }

    /// Default hyperparameters for a kind name
    pub fn from_kind(kind: &str) -> Result<Self> {
        match kind.to_ascii_lowercase().as_str() {
            "sgd" => Ok(Self::Sgd(SgdConfig::default())),
            "rmsprop" => Ok(Self::RmsProp(RmsPropConfig::default())),
            "adam" => Ok(Self::Adam(AdamConfig::default())),
            "adamw" => Ok(Self::AdamW(AdamConfig::default())),
            other => Err(GradlabError::Config(format!("Unknown optimizer: {other}"))),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        match self {
            Self::Sgd(c) => c.lr,
            Self::RmsProp(c) => c.lr,
            Self::Adam(c) | Self::AdamW(c) => c.lr,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Sgd(c) => c.validate(),
            Self::RmsProp(c) => c.validate(),
            Self::Adam(c) | Self::AdamW(c) => c.validate(),
        }
    }

    /// Copy of this config with one named hyperparameter replaced.
    ///
    /// Accepted names: `lr` / `learning_rate`, `momentum`, `weight_decay`,
    /// `alpha`, `eps`, `beta1`, `beta2`, as applicable to the kind.
    pub fn with_override(&self, name: &str, value: f64) -> Result<Self> {
        let mut out = *self;
        let applied = match (&mut out, name) {
            (Self::Sgd(c), "lr" | "learning_rate") => set(&mut c.lr, value),
            (Self::Sgd(c), "momentum") => set(&mut c.momentum, value),
            (Self::Sgd(c), "weight_decay") => set(&mut c.weight_decay, value),
            (Self::RmsProp(c), "lr" | "learning_rate") => set(&mut c.lr, value),
            (Self::RmsProp(c), "alpha") => set(&mut c.alpha, value),
            (Self::RmsProp(c), "eps") => set(&mut c.eps, value),
            (Self::RmsProp(c), "momentum") => set(&mut c.momentum, value),
            (Self::RmsProp(c), "weight_decay") => set(&mut c.weight_decay, value),
            (Self::Adam(c) | Self::AdamW(c), "lr" | "learning_rate") => set(&mut c.lr, value),
            (Self::Adam(c) | Self::AdamW(c), "beta1") => set(&mut c.betas.0, value),
            (Self::Adam(c) | Self::AdamW(c), "beta2") => set(&mut c.betas.1, value),
            (Self::Adam(c) | Self::AdamW(c), "eps") => set(&mut c.eps, value),
            (Self::Adam(c) | Self::AdamW(c), "weight_decay") => set(&mut c.weight_decay, value),
            _ => false,
        };
        if !applied {
            return Err(GradlabError::Config(format!(
                "Hyperparameter `{name}` does not apply to {}",
                self.kind()
            )));
        }
        Ok(out)
    }

    /// Validate and allocate an optimizer over `params`
    pub fn build(&self, params: &[ParamId], store: &ParamStore) -> Result<Box<dyn Optimizer>> {
        Ok(match self {
            Self::Sgd(c) => Box::new(Sgd::new(params, store, *c)?),
            Self::RmsProp(c) => Box::new(RmsProp::new(params, store, *c)?),
            Self::Adam(c) => Box::new(Adam::new(params, store, *c)?),
            Self::AdamW(c) => Box::new(AdamW::new(params, store, *c)?),
        })
    }
}

fn set(slot: &mut f64, value: f64) -> bool {
    *slot = value;
    true
}

impl fmt::Display for OptimizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sgd(c) => fmt::Display::fmt(c, f),
            Self::RmsProp(c) => fmt::Display::fmt(c, f),
            Self::Adam(c) => c.describe("Adam", f),
            Self::AdamW(c) => c.describe("AdamW", f),
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam(AdamConfig::default())
    }
}
