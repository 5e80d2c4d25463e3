//! 2-D test objectives with analytic gradients
//!
//! Small surfaces used to watch optimizers move: a curve with pathological
//! curvature, a single Gaussian bump and a negated sum of three Gaussians.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use gradlab_core::GradlabError;

/// Scalar function of two variables with a known gradient
pub trait Objective: Send + Sync {
    fn name(&self) -> &str;

    fn value(&self, x: f64, y: f64) -> f64;

    /// `(df/dx, df/dy)`
    fn gradient(&self, x: f64, y: f64) -> (f64, f64);
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

/// `tanh(x)^2 + 0.01 |x| + sigmoid(y)`
///
/// Nearly flat along `x` far from the origin and a slow slope along `y`, so
/// plain gradient descent crawls while momentum methods do not. The
/// subgradient of `|x|` at zero is taken as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathologicalCurve;

impl Objective for PathologicalCurve {
    fn name(&self) -> &str {
        "pathological"
    }

    fn value(&self, x: f64, y: f64) -> f64 {
        x.tanh().powi(2) + 0.01 * x.abs() + sigmoid(y)
    }

    fn gradient(&self, x: f64, y: f64) -> (f64, f64) {
        let th = x.tanh();
        let sign = if x == 0.0 { 0.0 } else { x.signum() };
        let s = sigmoid(y);
        (2.0 * th * (1.0 - th * th) + 0.01 * sign, s * (1.0 - s))
    }
}

/// Axis-aligned bivariate normal density
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BivariateGaussian {
    pub x_mean: f64,
    pub y_mean: f64,
    pub x_sig: f64,
    pub y_sig: f64,
}

impl Default for BivariateGaussian {
    fn default() -> Self {
        Self {
            x_mean: 0.0,
            y_mean: 0.0,
            x_sig: 1.0,
            y_sig: 1.0,
        }
    }
}

impl BivariateGaussian {
    pub fn new(x_mean: f64, y_mean: f64, x_sig: f64, y_sig: f64) -> Self {
        Self {
            x_mean,
            y_mean,
            x_sig,
            y_sig,
        }
    }
}

impl Objective for BivariateGaussian {
    fn name(&self) -> &str {
        "gaussian"
    }

    fn value(&self, x: f64, y: f64) -> f64 {
        let norm = 1.0 / (2.0 * PI * self.x_sig * self.y_sig);
        let dx = x - self.x_mean;
        let dy = y - self.y_mean;
        let exponent = -dx * dx / (2.0 * self.x_sig.powi(2)) - dy * dy / (2.0 * self.y_sig.powi(2));
        norm * exponent.exp()
    }

    fn gradient(&self, x: f64, y: f64) -> (f64, f64) {
        let f = self.value(x, y);
        (
            -f * (x - self.x_mean) / self.x_sig.powi(2),
            -f * (y - self.y_mean) / self.y_sig.powi(2),
        )
    }
}

/// Negated sum of three narrow Gaussians: three local minima of different depth
#[derive(Debug, Clone, Copy)]
pub struct NegTrimodal {
    modes: [BivariateGaussian; 3],
}

impl Default for NegTrimodal {
    fn default() -> Self {
        Self {
            modes: [
                BivariateGaussian::new(1.0, -0.5, 0.2, 0.2),
                BivariateGaussian::new(-1.0, 0.5, 0.2, 0.2),
                BivariateGaussian::new(-0.5, -0.8, 0.2, 0.2),
            ],
        }
    }
}

impl NegTrimodal {
    pub fn modes(&self) -> &[BivariateGaussian; 3] {
        &self.modes
    }
}

impl Objective for NegTrimodal {
    fn name(&self) -> &str {
        "trimodal"
    }

    fn value(&self, x: f64, y: f64) -> f64 {
        -self.modes.iter().map(|g| g.value(x, y)).sum::<f64>()
    }

    fn gradient(&self, x: f64, y: f64) -> (f64, f64) {
        self.modes.iter().fold((0.0, 0.0), |(dx, dy), g| {
            let (gx, gy) = g.gradient(x, y);
            (dx - gx, dy - gy)
        })
    }
}

/// Named objective, as selected from config files and the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    #[default]
    Pathological,
    Gaussian,
    Trimodal,
}

impl ObjectiveKind {
    pub const ALL: [ObjectiveKind; 3] = [Self::Pathological, Self::Gaussian, Self::Trimodal];

    pub fn build(self) -> Box<dyn Objective> {
        match self {
            Self::Pathological => Box::new(PathologicalCurve),
            Self::Gaussian => Box::new(BivariateGaussian::default()),
            Self::Trimodal => Box::new(NegTrimodal::default()),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pathological => "pathological",
            Self::Gaussian => "gaussian",
            Self::Trimodal => "trimodal",
        }
    }
}

impl fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectiveKind {
    type Err = GradlabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pathological" => Ok(Self::Pathological),
            "gaussian" => Ok(Self::Gaussian),
            "trimodal" | "neg_trimodal" => Ok(Self::Trimodal),
            other => Err(GradlabError::Config(format!("Unknown objective: {other}"))),
        }
    }
}
