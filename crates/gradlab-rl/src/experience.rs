//! One environment transition as seen by an agent

use serde::{Deserialize, Serialize};

use crate::env::{Act, Obs};

/// A single transition (s, a, r, s', a')
///
/// Built once per step and handed to the policy's update rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub obs: Obs,
    pub act: Act,
    pub reward: f64,
    pub new_obs: Obs,
    /// Next action, when the caller already knows it
    pub new_act: Option<Act>,
}

impl Experience {
    pub fn new(obs: Obs, act: Act, reward: f64, new_obs: Obs) -> Self {
        Self {
            obs,
            act,
            reward,
            new_obs,
            new_act: None,
        }
    }

    pub fn with_next_action(mut self, act: Act) -> Self {
        self.new_act = Some(act);
        self
    }
}
