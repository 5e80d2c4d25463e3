//! Hyperparameter sweeps
//!
//! A sweep describes which optimizer hyperparameters to vary and how. Each
//! trial overrides a base [`OptimizerConfig`], runs [`optimize`] on a 2-D
//! objective and is scored by its loss. The file format follows the usual
//! experiment-tracker layout:
//!
//! ```toml
//! method = "random"
//! name = "sgd-sweep"
//! count = 20
//!
//! [metric]
//! name = "final_loss"
//! goal = "minimize"
//!
//! [parameters.lr]
//! distribution = "log_uniform_values"
//! min = 1e-4
//! max = 1e-1
//!
//! [parameters.momentum]
//! values = [0.0, 0.9, 0.99]
//! ```

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use gradlab_core::{GradlabError, NullSink, Result};

use crate::config::OptimizerConfig;
use crate::objective::Objective;
use crate::trajectory::{optimize, Trajectory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepMethod {
    #[default]
    Random,
    /// Cartesian product of every `values` list, in parameter-name order
    Grid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepGoal {
    #[default]
    Minimize,
    Maximize,
}

/// Which number of a trajectory a trial is scored by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    #[default]
    FinalLoss,
    MinLoss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepMetric {
    pub name: MetricName,
    pub goal: SweepGoal,
}

impl SweepMetric {
    fn score(&self, trajectory: &Trajectory) -> f64 {
        match self.name {
            MetricName::FinalLoss => trajectory.final_loss(),
            MetricName::MinLoss => trajectory.min_loss(),
        }
    }

    fn is_better(&self, candidate: f64, incumbent: f64) -> bool {
        match self.goal {
            SweepGoal::Minimize => candidate < incumbent,
            SweepGoal::Maximize => candidate > incumbent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeKind {
    Uniform,
    /// Log-uniform between the two bounds (both must be positive)
    LogUniformValues,
}

/// How one hyperparameter is drawn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Distribution {
    Values {
        values: Vec<f64>,
    },
    Range {
        distribution: RangeKind,
        min: f64,
        max: f64,
    },
}

impl Distribution {
    pub fn values(values: impl Into<Vec<f64>>) -> Self {
        Self::Values {
            values: values.into(),
        }
    }

    pub fn uniform(min: f64, max: f64) -> Self {
        Self::Range {
            distribution: RangeKind::Uniform,
            min,
            max,
        }
    }

    pub fn log_uniform_values(min: f64, max: f64) -> Self {
        Self::Range {
            distribution: RangeKind::LogUniformValues,
            min,
            max,
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        match self {
            Self::Values { values } if values.is_empty() => Err(GradlabError::Sweep(format!(
                "parameter `{name}` has an empty values list"
            ))),
            Self::Values { .. } => Ok(()),
            Self::Range { min, max, .. } if !(min.is_finite() && max.is_finite()) || min > max => {
                Err(GradlabError::Sweep(format!(
                    "parameter `{name}` has an invalid range [{min}, {max}]"
                )))
            }
            Self::Range {
                distribution: RangeKind::LogUniformValues,
                min,
                ..
            } if *min <= 0.0 => Err(GradlabError::Sweep(format!(
                "parameter `{name}` needs a positive minimum for log_uniform_values"
            ))),
            Self::Range { .. } => Ok(()),
        }
    }

    fn sample(&self, rng: &mut StdRng) -> f64 {
        match self {
            Self::Values { values } => values[rng.gen_range(0..values.len())],
            Self::Range {
                distribution: RangeKind::Uniform,
                min,
                max,
            } => rng.gen_range(*min..=*max),
            Self::Range {
                distribution: RangeKind::LogUniformValues,
                min,
                max,
            } => rng.gen_range(min.ln()..=max.ln()).exp(),
        }
    }
}

/// Sweep definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub method: SweepMethod,
    pub name: String,
    pub metric: SweepMetric,
    pub parameters: BTreeMap<String, Distribution>,
    /// Number of trials for random search; upper bound on the grid size for grid search
    pub count: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        let mut parameters = BTreeMap::new();
        parameters.insert("lr".to_string(), Distribution::log_uniform_values(1e-4, 1e-1));
        Self {
            method: SweepMethod::Random,
            name: "sweep".to_string(),
            metric: SweepMetric::default(),
            parameters,
            count: 10,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<()> {
        if self.parameters.is_empty() {
            return Err(GradlabError::Sweep("sweep has no parameters".to_string()));
        }
        if self.count == 0 {
            return Err(GradlabError::Sweep("count must be at least 1".to_string()));
        }
        for (name, dist) in &self.parameters {
            dist.validate(name)?;
            if self.method == SweepMethod::Grid && !matches!(dist, Distribution::Values { .. }) {
                return Err(GradlabError::Sweep(format!(
                    "grid search needs a values list for `{name}`"
                )));
            }
        }
        Ok(())
    }

    /// Hyperparameter assignments, one per trial
    fn assignments(&self, rng: &mut StdRng) -> Vec<BTreeMap<String, f64>> {
        match self.method {
            SweepMethod::Random => (0..self.count)
                .map(|_| {
                    self.parameters
                        .iter()
                        .map(|(name, dist)| (name.clone(), dist.sample(rng)))
                        .collect()
                })
                .collect(),
            SweepMethod::Grid => {
                let mut grid = vec![BTreeMap::new()];
                for (name, dist) in &self.parameters {
                    let Distribution::Values { values } = dist else {
                        continue;
                    };
                    grid = grid
                        .into_iter()
                        .flat_map(|partial| {
                            values.iter().map(move |v| {
                                let mut next = partial.clone();
                                next.insert(name.clone(), *v);
                                next
                            })
                        })
                        .collect();
                }
                grid.truncate(self.count);
                grid
            }
        }
    }
}

/// One evaluated hyperparameter assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub index: usize,
    pub params: BTreeMap<String, f64>,
    pub config: OptimizerConfig,
    pub metric: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub sweep_id: Uuid,
    pub name: String,
    pub metric: SweepMetric,
    pub trials: Vec<Trial>,
    /// Index into `trials` of the best finite metric
    pub best: Option<usize>,
}

impl SweepReport {
    pub fn best_trial(&self) -> Option<&Trial> {
        self.best.and_then(|i| self.trials.get(i))
    }
}

/// Run every trial of `sweep` against `objective`.
///
/// Sampling is driven by a `StdRng` seeded with `seed`, so the same sweep,
/// base config and seed always yield the same trials.
pub fn run_sweep(
    sweep: &SweepConfig,
    base: &OptimizerConfig,
    objective: &dyn Objective,
    start: [f64; 2],
    n_iters: usize,
    seed: u64,
) -> Result<SweepReport> {
    sweep.validate()?;
    let sweep_id = Uuid::new_v4();
    let mut rng = StdRng::seed_from_u64(seed);
    let assignments = sweep.assignments(&mut rng);

    info!(
        %sweep_id,
        name = %sweep.name,
        method = ?sweep.method,
        trials = assignments.len(),
        optimizer = base.kind(),
        "starting sweep"
    );

    let mut trials = Vec::with_capacity(assignments.len());
    let mut best: Option<usize> = None;

    for (index, params) in assignments.into_iter().enumerate() {
        let config = params
            .iter()
            .try_fold(*base, |config, (name, value)| config.with_override(name, *value))?;
        let trajectory = optimize(objective, start, &config, n_iters, &mut NullSink)?;
        let metric = sweep.metric.score(&trajectory);
        debug!(index, %config, metric, "sweep trial finished");

        if metric.is_finite() {
            let improves = match best {
                Some(b) => sweep.metric.is_better(metric, trials_metric(&trials, b)),
                None => true,
            };
            if improves {
                best = Some(index);
            }
        }

        trials.push(Trial {
            index,
            params,
            config,
            metric,
        });
    }

    if let Some(b) = best {
        info!(%sweep_id, best = b, metric = trials_metric(&trials, b), "sweep finished");
    }

    Ok(SweepReport {
        sweep_id,
        name: sweep.name.clone(),
        metric: sweep.metric,
        trials,
        best,
    })
}

fn trials_metric(trials: &[Trial], index: usize) -> f64 {
    trials.get(index).map_or(f64::NAN, |t| t.metric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SgdConfig;
    use crate::objective::PathologicalCurve;

    fn sgd_sweep(method: SweepMethod) -> SweepConfig {
        let mut parameters = BTreeMap::new();
        parameters.insert("lr".to_string(), Distribution::values([0.01, 0.1]));
        parameters.insert("momentum".to_string(), Distribution::values([0.0, 0.9, 0.99]));
        SweepConfig {
            method,
            name: "test".to_string(),
            metric: SweepMetric::default(),
            parameters,
            count: 100,
        }
    }

    #[test]
    fn test_grid_enumerates_product() {
        let sweep = sgd_sweep(SweepMethod::Grid);
        let base = OptimizerConfig::Sgd(SgdConfig::default());
        let report = run_sweep(&sweep, &base, &PathologicalCurve, [2.5, 2.5], 30, 0).unwrap();

        assert_eq!(report.trials.len(), 6);
        assert_eq!(report.trials[0].params["lr"], 0.01);
        assert_eq!(report.trials[0].params["momentum"], 0.0);
        assert_eq!(report.trials[5].params["lr"], 0.1);
        assert_eq!(report.trials[5].params["momentum"], 0.99);

        let best = report.best_trial().unwrap();
        assert!(report.trials.iter().all(|t| best.metric <= t.metric));
    }

    #[test]
    fn test_grid_truncated_by_count() {
        let mut sweep = sgd_sweep(SweepMethod::Grid);
        sweep.count = 4;
        let base = OptimizerConfig::Sgd(SgdConfig::default());
        let report = run_sweep(&sweep, &base, &PathologicalCurve, [2.5, 2.5], 5, 0).unwrap();
        assert_eq!(report.trials.len(), 4);
    }

    #[test]
    fn test_random_sweep_is_seeded() {
        let mut sweep = SweepConfig::default();
        sweep.count = 5;
        sweep
            .parameters
            .insert("momentum".to_string(), Distribution::uniform(0.5, 0.9));
        let base = OptimizerConfig::Sgd(SgdConfig::default());

        let a = run_sweep(&sweep, &base, &PathologicalCurve, [2.5, 2.5], 10, 7).unwrap();
        let b = run_sweep(&sweep, &base, &PathologicalCurve, [2.5, 2.5], 10, 7).unwrap();

        assert_ne!(a.sweep_id, b.sweep_id);
        assert_eq!(a.trials, b.trials);
        for trial in &a.trials {
            let lr = trial.params["lr"];
            assert!((1e-4..=1e-1).contains(&lr), "lr = {lr}");
            let momentum = trial.params["momentum"];
            assert!((0.5..=0.9).contains(&momentum));
        }
    }

    #[test]
    fn test_maximize_picks_largest() {
        let mut sweep = sgd_sweep(SweepMethod::Grid);
        sweep.metric.goal = SweepGoal::Maximize;
        let base = OptimizerConfig::Sgd(SgdConfig::default());
        let report = run_sweep(&sweep, &base, &PathologicalCurve, [2.5, 2.5], 30, 0).unwrap();
        let best = report.best_trial().unwrap();
        assert!(report.trials.iter().all(|t| best.metric >= t.metric));
    }

    #[test]
    fn test_validation() {
        let mut grid = SweepConfig::default();
        grid.method = SweepMethod::Grid;
        assert!(grid.validate().is_err());

        let mut bad_log = SweepConfig::default();
        bad_log
            .parameters
            .insert("lr".to_string(), Distribution::log_uniform_values(0.0, 1.0));
        assert!(bad_log.validate().is_err());

        let mut empty = SweepConfig::default();
        empty.parameters.clear();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_unknown_parameter_fails_trial() {
        let mut sweep = sgd_sweep(SweepMethod::Grid);
        sweep
            .parameters
            .insert("beta1".to_string(), Distribution::values([0.9]));
        let base = OptimizerConfig::Sgd(SgdConfig::default());
        assert!(run_sweep(&sweep, &base, &PathologicalCurve, [2.5, 2.5], 5, 0).is_err());
    }

    #[test]
    fn test_parse_toml() {
        let sweep: SweepConfig = toml::from_str(
            r#"
            method = "random"
            name = "lr-only"
            count = 3

            [metric]
            name = "min_loss"
            goal = "minimize"

            [parameters.lr]
            distribution = "log_uniform_values"
            min = 0.0001
            max = 0.1

            [parameters.momentum]
            values = [0.0, 0.9]
            "#,
        )
        .unwrap();

        assert_eq!(sweep.metric.name, MetricName::MinLoss);
        assert_eq!(
            sweep.parameters["lr"],
            Distribution::log_uniform_values(1e-4, 0.1)
        );
        assert_eq!(sweep.parameters["momentum"], Distribution::values([0.0, 0.9]));
        sweep.validate().unwrap();
    }
}
