//! Optimizer trajectories over 2-D objectives

use ndarray::arr1;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use gradlab_core::{GradlabError, MetricsSink, NullSink, ParamStore, Result, Tensor};

use crate::config::OptimizerConfig;
use crate::objective::Objective;

/// Path taken by one optimizer from a starting point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// Display form of the optimizer config, e.g. `SGD(lr=0.03, ...)`
    pub optimizer: String,
    pub objective: String,
    /// `(x, y)` before each step; `points[0]` is the start
    pub points: Vec<[f64; 2]>,
    /// Loss at each entry of `points`
    pub losses: Vec<f64>,
    /// Position after the last step
    pub end: [f64; 2],
    pub end_loss: f64,
}

impl Trajectory {
    pub fn final_point(&self) -> [f64; 2] {
        self.end
    }

    pub fn final_loss(&self) -> f64 {
        self.end_loss
    }

    /// Smallest loss seen anywhere on the path, including the end point
    pub fn min_loss(&self) -> f64 {
        self.losses.iter().copied().fold(self.end_loss, f64::min)
    }
}

fn point_of(value: &Tensor) -> Result<[f64; 2]> {
    let mut it = value.iter();
    match (it.next(), it.next()) {
        (Some(&x), Some(&y)) => Ok([x, y]),
        _ => Err(GradlabError::Internal(format!(
            "expected a 2-element point, got shape {:?}",
            value.shape()
        ))),
    }
}

/// Minimize `objective` from `start` for `n_iters` steps.
///
/// Each iteration clears the gradient, records the current point and its
/// loss (also sent to `sink` as `loss`), writes the analytic gradient and
/// steps the optimizer.
pub fn optimize(
    objective: &dyn Objective,
    start: [f64; 2],
    config: &OptimizerConfig,
    n_iters: usize,
    sink: &mut dyn MetricsSink,
) -> Result<Trajectory> {
    let mut store = ParamStore::new();
    let xy = store.add(arr1(&start).into_dyn());
    let mut optimizer = config.build(&[xy], &store)?;

    let mut points = Vec::with_capacity(n_iters);
    let mut losses = Vec::with_capacity(n_iters);

    for iter in 0..n_iters {
        optimizer.zero_grad(&mut store)?;
        let [x, y] = point_of(store.value(xy)?)?;
        let loss = objective.value(x, y);
        sink.record("loss", iter as u64, loss)?;
        points.push([x, y]);
        losses.push(loss);

        let (dx, dy) = objective.gradient(x, y);
        store.set_grad(xy, arr1(&[dx, dy]).into_dyn())?;
        optimizer.step(&mut store)?;
    }

    let end = point_of(store.value(xy)?)?;
    let end_loss = objective.value(end[0], end[1]);
    debug!(
        optimizer = %config,
        objective = objective.name(),
        n_iters,
        end_loss,
        "trajectory finished"
    );

    Ok(Trajectory {
        optimizer: config.to_string(),
        objective: objective.name().to_string(),
        points,
        losses,
        end,
        end_loss,
    })
}

/// Run every config from the same start and collect the trajectories
pub fn compare(
    objective: &dyn Objective,
    start: [f64; 2],
    configs: &[OptimizerConfig],
    n_iters: usize,
) -> Result<Vec<Trajectory>> {
    info!(
        objective = objective.name(),
        optimizers = configs.len(),
        n_iters,
        "comparing optimizers"
    );
    configs
        .iter()
        .map(|config| optimize(objective, start, config, n_iters, &mut NullSink))
        .collect()
}
