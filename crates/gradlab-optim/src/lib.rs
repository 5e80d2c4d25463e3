//! gradlab optim - Gradient-based optimizers
//!
//! Stateful update rules (SGD with momentum, RMSprop, Adam, AdamW) that mutate
//! parameters held in a [`gradlab_core::ParamStore`], plus the small
//! experiments used to compare them: 2-D test objectives, trajectories, and
//! random/grid hyperparameter sweeps.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]

pub mod adam;
pub mod adamw;
pub mod config;
pub mod objective;
pub mod optimizer;
pub mod rmsprop;
pub mod sgd;
pub mod sweep;
pub mod trajectory;

pub use adam::Adam;
pub use adamw::AdamW;
pub use config::{AdamConfig, OptimizerConfig, RmsPropConfig, SgdConfig};
pub use objective::{BivariateGaussian, NegTrimodal, Objective, ObjectiveKind, PathologicalCurve};
pub use optimizer::Optimizer;
pub use rmsprop::RmsProp;
pub use sgd::Sgd;
pub use sweep::{
    run_sweep, Distribution, MetricName, RangeKind, SweepConfig, SweepGoal, SweepMethod, SweepMetric,
    SweepReport, Trial,
};
pub use trajectory::{compare, optimize, Trajectory};
