//! gradlab RL - Tabular reinforcement learning
//!
//! Discrete environments with fully known dynamics, a policy-iteration
//! solver, and epsilon-greedy agents (Q-learning, SARSA) trained episode by
//! episode alongside random and "cheating" baselines.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]

pub mod agent;
pub mod engine;
pub mod env;
pub mod envs;
pub mod experience;
pub mod policy;
pub mod solver;

pub use agent::{Agent, AgentConfig, AgentKind};
pub use engine::{EngineStats, RLEngine, RunSummary};
pub use env::{Act, DiscreteEnv, Environment, Obs, StepOutcome, Transitions};
pub use envs::{EnvKind, Norvig, Toy};
pub use experience::Experience;
pub use policy::{Cheater, EpsilonGreedy, Policy, QLearning, RandomPolicy, Sarsa};
pub use solver::{build_model, find_optimal_policy, policy_eval, policy_improvement};
