//! Control policies: how an agent picks actions and learns from experience

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::Rng;

use gradlab_core::util::argmax;

use crate::agent::AgentConfig;
use crate::env::{Act, Obs};
use crate::experience::Experience;

/// Action selection plus an (optional) update rule.
///
/// Randomness comes from the agent's generator, passed in on every call.
pub trait Policy: Send {
    fn name(&self) -> &str;

    fn get_action(&mut self, obs: Obs, rng: &mut StdRng) -> Act;

    /// Learn from one transition; no-op by default
    fn observe(&mut self, _exp: &Experience, _rng: &mut StdRng) {}

    /// Called when a new episode begins
    fn begin_episode(&mut self) {}

    /// Value table, for policies that keep one
    fn q_values(&self) -> Option<&Array2<f64>> {
        None
    }
}

/// Uniformly random actions, never learns
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    num_actions: usize,
}

impl RandomPolicy {
    pub fn new(num_actions: usize) -> Self {
        Self { num_actions }
    }
}

impl Policy for RandomPolicy {
    fn name(&self) -> &str {
        "Random"
    }

    fn get_action(&mut self, _obs: Obs, rng: &mut StdRng) -> Act {
        rng.gen_range(0..self.num_actions)
    }
}

/// Looks actions up in a precomputed optimal policy
#[derive(Debug, Clone)]
pub struct Cheater {
    pi: Vec<Act>,
}

impl Cheater {
    pub fn new(pi: Vec<Act>) -> Self {
        Self { pi }
    }

    pub fn policy(&self) -> &[Act] {
        &self.pi
    }
}

impl Policy for Cheater {
    fn name(&self) -> &str {
        "Cheater"
    }

    fn get_action(&mut self, obs: Obs, _rng: &mut StdRng) -> Act {
        self.pi[obs]
    }
}

/// Value table with epsilon-greedy selection, shared by the TD learners
#[derive(Debug, Clone)]
pub struct EpsilonGreedy {
    q: Array2<f64>,
    epsilon: f64,
    lr: f64,
    gamma: f64,
}

impl EpsilonGreedy {
    /// Table of shape `(num_states, num_actions)` filled with `config.optimism`
    pub fn new(num_states: usize, num_actions: usize, config: &AgentConfig, gamma: f64) -> Self {
        Self {
            q: Array2::from_elem((num_states, num_actions), config.optimism),
            epsilon: config.epsilon,
            lr: config.lr,
            gamma,
        }
    }

    /// With probability epsilon a uniform action, otherwise the greedy one
    pub fn select(&self, obs: Obs, rng: &mut StdRng) -> Act {
        if rng.gen::<f64>() < self.epsilon {
            rng.gen_range(0..self.q.ncols())
        } else {
            self.greedy(obs)
        }
    }

    /// First action with the highest value in the row for `obs`
    pub fn greedy(&self, obs: Obs) -> Act {
        let row = self.q.row(obs);
        match row.as_slice() {
            Some(values) => argmax(values),
            None => argmax(&row.to_vec()),
        }
    }

    pub fn max_value(&self, obs: Obs) -> f64 {
        self.q[[obs, self.greedy(obs)]]
    }

    pub fn value(&self, obs: Obs, act: Act) -> f64 {
        self.q[[obs, act]]
    }

    /// `Q[s, a] += lr * (target - Q[s, a])`; returns the TD error
    pub fn update(&mut self, obs: Obs, act: Act, target: f64) -> f64 {
        let td_error = target - self.q[[obs, act]];
        self.q[[obs, act]] += self.lr * td_error;
        td_error
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn table(&self) -> &Array2<f64> {
        &self.q
    }

    /// Greedy action for every state
    pub fn greedy_policy(&self) -> Vec<Act> {
        (0..self.q.nrows()).map(|s| self.greedy(s)).collect()
    }
}

/// Off-policy TD control: bootstraps from the best next action
#[derive(Debug, Clone)]
pub struct QLearning {
    inner: EpsilonGreedy,
}

impl QLearning {
    pub fn new(inner: EpsilonGreedy) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &EpsilonGreedy {
        &self.inner
    }
}

impl Policy for QLearning {
    fn name(&self) -> &str {
        "QLearning"
    }

    fn get_action(&mut self, obs: Obs, rng: &mut StdRng) -> Act {
        self.inner.select(obs, rng)
    }

    fn observe(&mut self, exp: &Experience, _rng: &mut StdRng) {
        let target = exp.reward + self.inner.gamma() * self.inner.max_value(exp.new_obs);
        self.inner.update(exp.obs, exp.act, target);
    }

    fn q_values(&self) -> Option<&Array2<f64>> {
        Some(self.inner.table())
    }
}

/// On-policy TD control: bootstraps from the next action actually taken.
///
/// The next action is drawn in `observe` and handed back by the following
/// `get_action` for the same observation, so the update and the behaviour
/// use one draw.
#[derive(Debug, Clone)]
pub struct Sarsa {
    inner: EpsilonGreedy,
    pending: Option<(Obs, Act)>,
}

impl Sarsa {
    pub fn new(inner: EpsilonGreedy) -> Self {
        Self { inner, pending: None }
    }

    pub fn inner(&self) -> &EpsilonGreedy {
        &self.inner
    }
}

impl Policy for Sarsa {
    fn name(&self) -> &str {
        "SARSA"
    }

    fn get_action(&mut self, obs: Obs, rng: &mut StdRng) -> Act {
        match self.pending.take() {
            Some((pending_obs, act)) if pending_obs == obs => act,
            _ => self.inner.select(obs, rng),
        }
    }

    fn observe(&mut self, exp: &Experience, rng: &mut StdRng) {
        let next = exp
            .new_act
            .unwrap_or_else(|| self.inner.select(exp.new_obs, rng));
        let target = exp.reward + self.inner.gamma() * self.inner.value(exp.new_obs, next);
        self.inner.update(exp.obs, exp.act, target);
        self.pending = Some((exp.new_obs, next));
    }

    fn begin_episode(&mut self) {
        self.pending = None;
    }

    fn q_values(&self) -> Option<&Array2<f64>> {
        Some(self.inner.table())
    }
}
