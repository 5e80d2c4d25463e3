//! Agents: a policy bound to an environment and the episode loop

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use gradlab_core::util::{argmax, discounted_sum};
use gradlab_core::{GradlabError, MetricsSink, NullSink, Result};

use crate::env::{Act, DiscreteEnv, Environment};
use crate::experience::Experience;
use crate::policy::{Cheater, EpsilonGreedy, Policy, QLearning, RandomPolicy, Sarsa};
use crate::solver::find_optimal_policy;

/// Hyperparameters for agents
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Exploration rate
    pub epsilon: f64,
    /// TD step size
    pub lr: f64,
    /// Initial value of every table entry
    pub optimism: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.1,
            lr: 0.05,
            optimism: 0.0,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(GradlabError::invalid("epsilon", self.epsilon, "must be in [0, 1]"));
        }
        if !self.lr.is_finite() || self.lr < 0.0 {
            return Err(GradlabError::invalid("lr", self.lr, "must be finite and >= 0"));
        }
        if !self.optimism.is_finite() {
            return Err(GradlabError::invalid("optimism", self.optimism, "must be finite"));
        }
        Ok(())
    }
}

/// Available agent kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Random,
    Cheater,
    QLearning,
    Sarsa,
}

impl AgentKind {
    /// Order used when comparing agents side by side
    pub const ALL: [AgentKind; 4] = [Self::Cheater, Self::QLearning, Self::Sarsa, Self::Random];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Cheater => "cheater",
            Self::QLearning => "q_learning",
            Self::Sarsa => "sarsa",
        }
    }

    /// Build the policy for `env`.
    ///
    /// `Cheater` solves the environment by policy iteration here, so it needs
    /// `gamma < 1`.
    pub fn build_policy(
        self,
        env: &dyn Environment,
        config: &AgentConfig,
        gamma: f64,
    ) -> Result<Box<dyn Policy>> {
        config.validate()?;
        let (ns, na) = (env.num_states(), env.num_actions());
        Ok(match self {
            Self::Random => Box::new(RandomPolicy::new(na)),
            Self::Cheater => Box::new(Cheater::new(find_optimal_policy(env, gamma)?)),
            Self::QLearning => Box::new(QLearning::new(EpsilonGreedy::new(ns, na, config, gamma))),
            Self::Sarsa => Box::new(Sarsa::new(EpsilonGreedy::new(ns, na, config, gamma))),
        })
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = GradlabError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "random" => Ok(Self::Random),
            "cheater" => Ok(Self::Cheater),
            "q_learning" | "qlearning" => Ok(Self::QLearning),
            "sarsa" => Ok(Self::Sarsa),
            other => Err(GradlabError::Config(format!("Unknown agent: {other}"))),
        }
    }
}

/// A policy interacting with its own copy of an environment.
///
/// The value table (if any) lives as long as the agent; each episode only
/// reseeds the agent's generator and resets the environment.
pub struct Agent {
    name: String,
    env: DiscreteEnv,
    policy: Box<dyn Policy>,
    config: AgentConfig,
    gamma: f64,
    rng: StdRng,
    episodes: u64,
    steps: u64,
}

impl Agent {
    pub fn new(env: DiscreteEnv, kind: AgentKind, config: AgentConfig, gamma: f64, seed: u64) -> Result<Self> {
        let policy = kind.build_policy(env.env(), &config, gamma)?;
        Self::with_policy(env, policy, config, gamma, seed)
    }

    /// Wrap an already-built policy
    pub fn with_policy(
        env: DiscreteEnv,
        policy: Box<dyn Policy>,
        config: AgentConfig,
        gamma: f64,
        seed: u64,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&gamma) {
            return Err(GradlabError::invalid("gamma", gamma, "must be in [0, 1]"));
        }
        if !env.can_terminate() {
            return Err(GradlabError::Environment(format!(
                "{} has no terminal states and no time limit, episodes would never end",
                env.name()
            )));
        }
        Ok(Self {
            name: policy.name().to_string(),
            env,
            policy,
            config,
            gamma,
            rng: StdRng::seed_from_u64(seed),
            episodes: 0,
            steps: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn env(&self) -> &DiscreteEnv {
        &self.env
    }

    /// Episodes completed so far
    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    /// Environment steps taken so far
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Reseed the agent's random source and start a fresh episode
    pub fn reset(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
        self.policy.begin_episode();
    }

    /// Play one episode, learning as the policy allows; returns the rewards received
    pub fn run_episode(&mut self, seed: u64) -> Result<Vec<f64>> {
        let mut rewards = Vec::new();
        let mut obs = self.env.reset(seed);
        self.reset(seed);

        loop {
            let act = self.policy.get_action(obs, &mut self.rng);
            let out = self.env.step(act)?;
            let exp = Experience::new(obs, act, out.reward, out.obs);
            self.policy.observe(&exp, &mut self.rng);
            trace!(agent = %self.name, obs, act, reward = out.reward, "observed");

            rewards.push(out.reward);
            self.steps += 1;
            obs = out.obs;
            if out.done {
                break;
            }
        }

        self.episodes += 1;
        Ok(rewards)
    }

    /// Run episodes seeded `0..n_runs`; returns each episode's discounted return
    pub fn train(&mut self, n_runs: usize) -> Result<Vec<f64>> {
        self.train_with_sink(n_runs, &mut NullSink)
    }

    /// [`Agent::train`], also emitting each return as the `return` metric
    pub fn train_with_sink(&mut self, n_runs: usize, sink: &mut dyn MetricsSink) -> Result<Vec<f64>> {
        info!(agent = %self.name, env = self.env.name(), n_runs, "training agent");
        let mut returns = Vec::with_capacity(n_runs);
        for seed in 0..n_runs as u64 {
            let rewards = self.run_episode(seed)?;
            let ret = discounted_sum(&rewards, self.gamma);
            sink.record("return", seed, ret)?;
            debug!(agent = %self.name, episode = seed, steps = rewards.len(), ret, "episode finished");
            returns.push(ret);
        }
        Ok(returns)
    }

    pub fn q_values(&self) -> Option<&Array2<f64>> {
        self.policy.q_values()
    }

    /// Greedy action per state from the value table, if the policy has one
    pub fn greedy_policy(&self) -> Option<Vec<Act>> {
        self.q_values()
            .map(|q| q.rows().into_iter().map(|row| argmax(&row.to_vec())).collect())
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("env", &self.env)
            .field("config", &self.config)
            .field("gamma", &self.gamma)
            .field("episodes", &self.episodes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::{EnvKind, Toy};
    use std::sync::Arc;

    #[test]
    fn test_config_defaults_and_validation() {
        let config = AgentConfig::default();
        assert_eq!(config.epsilon, 0.1);
        assert_eq!(config.lr, 0.05);
        assert_eq!(config.optimism, 0.0);
        assert!(config.validate().is_ok());

        let bad = AgentConfig {
            epsilon: 1.5,
            ..AgentConfig::default()
        };
        assert!(bad.validate().is_err());
        let bad = AgentConfig {
            lr: -0.1,
            ..AgentConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_agent_kind_parsing() {
        assert_eq!("Q-Learning".parse::<AgentKind>().unwrap(), AgentKind::QLearning);
        assert_eq!("sarsa".parse::<AgentKind>().unwrap(), AgentKind::Sarsa);
        assert!("ppo".parse::<AgentKind>().is_err());
        let json = serde_json::to_string(&AgentKind::QLearning).unwrap();
        assert_eq!(json, "\"q_learning\"");
    }

    #[test]
    fn test_cheater_on_toy() {
        let mut agent = Agent::new(EnvKind::Toy.make(), AgentKind::Cheater, AgentConfig::default(), 0.99, 0).unwrap();
        assert_eq!(agent.name(), "Cheater");

        let rewards = agent.run_episode(0).unwrap();
        assert_eq!(rewards, vec![0.0, 2.0]);

        let returns = agent.train(10).unwrap();
        assert!(returns.iter().all(|r| (r - 1.98).abs() < 1e-12));
        assert_eq!(agent.episodes(), 11);
        assert_eq!(agent.steps(), 22);
    }

    #[test]
    fn test_random_on_toy_respects_time_limit() {
        let mut agent = Agent::new(EnvKind::Toy.make(), AgentKind::Random, AgentConfig::default(), 0.99, 0).unwrap();
        for seed in 0..20 {
            assert_eq!(agent.run_episode(seed).unwrap().len(), 2);
        }
        assert!(agent.greedy_policy().is_none());
    }

    #[test]
    fn test_unbounded_env_rejected() {
        let env = DiscreteEnv::new(Arc::new(Toy));
        let err = Agent::new(env, AgentKind::Random, AgentConfig::default(), 0.99, 0).unwrap_err();
        assert!(matches!(err, GradlabError::Environment(_)));
    }

    #[test]
    fn test_training_is_reproducible() {
        let run = || {
            let mut agent =
                Agent::new(EnvKind::Norvig.make(), AgentKind::Sarsa, AgentConfig::default(), 0.99, 1).unwrap();
            agent.train(50).unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_sink_receives_returns() {
        let mut agent = Agent::new(EnvKind::Toy.make(), AgentKind::QLearning, AgentConfig::default(), 0.99, 0).unwrap();
        let mut sink = gradlab_core::MemorySink::new();
        let returns = agent.train_with_sink(5, &mut sink).unwrap();
        assert_eq!(sink.series("return"), returns);
        assert_eq!(agent.greedy_policy().unwrap().len(), 3);
    }
}
