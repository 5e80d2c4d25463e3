//! gradlab Core - Core types, traits, and shared functionality
//!
//! This crate provides the foundational types used by the optimizer and RL crates:
//! the error type, the parameter arena optimizers update in place, metric sinks,
//! and a handful of numeric helpers.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod error;
pub mod metrics;
pub mod param;
pub mod util;

pub use error::{GradlabError, Result};
pub use metrics::{JsonLinesSink, MemorySink, MetricRecord, MetricsSink, NullSink, TracingSink};
pub use param::{ParamId, ParamStore, Parameter, Tensor};
