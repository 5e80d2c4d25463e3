//! Discrete environments and the episode wrapper that samples them

use std::fmt;
use std::sync::Arc;

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use gradlab_core::{GradlabError, Result};

/// State index
pub type Obs = usize;
/// Action index
pub type Act = usize;

/// Outcome distribution of one `(state, action)` pair.
///
/// Entry `i` says: with probability `probs[i]` move to `states[i]` and
/// collect `rewards[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transitions {
    pub states: Vec<Obs>,
    pub rewards: Vec<f64>,
    pub probs: Vec<f64>,
}

impl Transitions {
    /// A single certain outcome
    pub fn deterministic(state: Obs, reward: f64) -> Self {
        Self {
            states: vec![state],
            rewards: vec![reward],
            probs: vec![1.0],
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Fully known dynamics over a finite state and action space
pub trait Environment: Send + Sync {
    fn name(&self) -> &str;

    fn num_states(&self) -> usize;

    fn num_actions(&self) -> usize;

    fn start(&self) -> Obs;

    fn terminal(&self) -> &[Obs];

    /// Distribution over `(next state, reward)` after taking `action` in `state`.
    ///
    /// Probabilities are assumed to sum to 1.
    fn dynamics(&self, state: Obs, action: Act) -> Transitions;

    fn is_terminal(&self, state: Obs) -> bool {
        self.terminal().contains(&state)
    }
}

/// Result of one [`DiscreteEnv::step`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub obs: Obs,
    pub reward: f64,
    /// The episode is over, either in a terminal state or by the time limit
    pub done: bool,
    /// Ended by the time limit rather than a terminal state
    pub truncated: bool,
}

/// Episode wrapper around an [`Environment`].
///
/// Tracks the current position and samples transitions with its own seeded
/// random source, separate from any agent's.
#[derive(Clone)]
pub struct DiscreteEnv {
    env: Arc<dyn Environment>,
    pos: Obs,
    rng: StdRng,
    max_episode_steps: Option<usize>,
    elapsed: usize,
}

impl DiscreteEnv {
    pub fn new(env: Arc<dyn Environment>) -> Self {
        let pos = env.start();
        Self {
            env,
            pos,
            rng: StdRng::seed_from_u64(0),
            max_episode_steps: None,
            elapsed: 0,
        }
    }

    /// End every episode after at most `steps` transitions
    pub fn with_time_limit(mut self, steps: usize) -> Self {
        self.max_episode_steps = Some(steps);
        self
    }

    pub fn env(&self) -> &dyn Environment {
        self.env.as_ref()
    }

    pub fn shared_env(&self) -> Arc<dyn Environment> {
        Arc::clone(&self.env)
    }

    pub fn name(&self) -> &str {
        self.env.name()
    }

    pub fn num_states(&self) -> usize {
        self.env.num_states()
    }

    pub fn num_actions(&self) -> usize {
        self.env.num_actions()
    }

    pub fn max_episode_steps(&self) -> Option<usize> {
        self.max_episode_steps
    }

    pub fn position(&self) -> Obs {
        self.pos
    }

    /// Whether an episode is guaranteed to be able to end
    pub fn can_terminate(&self) -> bool {
        self.max_episode_steps.is_some() || !self.env.terminal().is_empty()
    }

    /// Reseed, move to the start state and return it
    pub fn reset(&mut self, seed: u64) -> Obs {
        self.rng = StdRng::seed_from_u64(seed);
        self.pos = self.env.start();
        self.elapsed = 0;
        self.pos
    }

    /// Sample one transition from the current position
    pub fn step(&mut self, action: Act) -> Result<StepOutcome> {
        if action >= self.env.num_actions() {
            return Err(GradlabError::Environment(format!(
                "action {action} out of range for {} ({} actions)",
                self.env.name(),
                self.env.num_actions()
            )));
        }

        let transitions = self.env.dynamics(self.pos, action);
        let idx = match transitions.len() {
            0 => {
                return Err(GradlabError::Environment(format!(
                    "{} has no transitions from state {} under action {action}",
                    self.env.name(),
                    self.pos
                )))
            }
            1 => 0,
            _ => WeightedIndex::new(&transitions.probs)
                .map_err(|e| GradlabError::Environment(format!("bad transition probabilities: {e}")))?
                .sample(&mut self.rng),
        };

        let from = self.pos;
        self.pos = transitions.states[idx];
        self.elapsed += 1;

        let terminated = self.env.is_terminal(self.pos);
        let truncated = !terminated && self.max_episode_steps.is_some_and(|max| self.elapsed >= max);
        let reward = transitions.rewards[idx];
        trace!(from, action, to = self.pos, reward, "env step");

        Ok(StepOutcome {
            obs: self.pos,
            reward,
            done: terminated || truncated,
            truncated,
        })
    }
}

impl fmt::Debug for DiscreteEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscreteEnv")
            .field("env", &self.env.name())
            .field("pos", &self.pos)
            .field("max_episode_steps", &self.max_episode_steps)
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0 -> 1 with certainty, 1 is terminal
    struct Line;

    impl Environment for Line {
        fn name(&self) -> &str {
            "line"
        }
        fn num_states(&self) -> usize {
            2
        }
        fn num_actions(&self) -> usize {
            1
        }
        fn start(&self) -> Obs {
            0
        }
        fn terminal(&self) -> &[Obs] {
            &[1]
        }
        fn dynamics(&self, state: Obs, _action: Act) -> Transitions {
            Transitions::deterministic((state + 1).min(1), 1.0)
        }
    }

    /// From 0: 50/50 to state 1 or 2, both terminal
    struct Coin;

    impl Environment for Coin {
        fn name(&self) -> &str {
            "coin"
        }
        fn num_states(&self) -> usize {
            3
        }
        fn num_actions(&self) -> usize {
            1
        }
        fn start(&self) -> Obs {
            0
        }
        fn terminal(&self) -> &[Obs] {
            &[1, 2]
        }
        fn dynamics(&self, _state: Obs, _action: Act) -> Transitions {
            Transitions {
                states: vec![1, 2],
                rewards: vec![1.0, -1.0],
                probs: vec![0.5, 0.5],
            }
        }
    }

    #[test]
    fn test_reset_and_terminal_step() {
        let mut env = DiscreteEnv::new(Arc::new(Line));
        assert_eq!(env.reset(3), 0);

        let out = env.step(0).unwrap();
        assert_eq!(out.obs, 1);
        assert_eq!(out.reward, 1.0);
        assert!(out.done);
        assert!(!out.truncated);
    }

    #[test]
    fn test_invalid_action() {
        let mut env = DiscreteEnv::new(Arc::new(Line));
        env.reset(0);
        assert!(matches!(env.step(1), Err(GradlabError::Environment(_))));
    }

    #[test]
    fn test_time_limit_truncates() {
        let mut env = DiscreteEnv::new(Arc::new(Coin)).with_time_limit(1);
        env.reset(0);
        let out = env.step(0).unwrap();
        // Both outcomes are terminal, so termination wins over truncation
        assert!(out.done);
        assert!(!out.truncated);
    }

    #[test]
    fn test_sampling_is_seeded() {
        let outcomes = |seed: u64| {
            let mut env = DiscreteEnv::new(Arc::new(Coin));
            (0..20)
                .map(|i| {
                    env.reset(seed + i);
                    env.step(0).unwrap().obs
                })
                .collect::<Vec<_>>()
        };

        assert_eq!(outcomes(7), outcomes(7));
        let sample = outcomes(7);
        assert!(sample.contains(&1));
        assert!(sample.contains(&2));
    }

    #[test]
    fn test_can_terminate() {
        assert!(DiscreteEnv::new(Arc::new(Line)).can_terminate());
    }
}
