//! RL Engine - Coordinates agents sharing one environment

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use gradlab_core::util::cummean;
use gradlab_core::{GradlabError, MetricsSink, NullSink, Result};

use crate::agent::{Agent, AgentConfig, AgentKind};
use crate::env::DiscreteEnv;

/// Outcome of training one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub agent: String,
    pub env: String,
    /// Discounted return per episode
    pub returns: Vec<f64>,
    /// Running mean of `returns`
    pub cummean: Vec<f64>,
    pub mean_return: f64,
}

impl RunSummary {
    fn new(agent: &str, env: &str, returns: Vec<f64>) -> Self {
        let cummean = cummean(&returns);
        let mean_return = cummean.last().copied().unwrap_or(0.0);
        Self {
            run_id: Uuid::new_v4(),
            agent: agent.to_string(),
            env: env.to_string(),
            returns,
            cummean,
            mean_return,
        }
    }
}

/// RL Engine for managing agents and training
pub struct RLEngine {
    env: DiscreteEnv,
    agents: Vec<Agent>,
    active_agent: Option<usize>,
    gamma: f64,
    seed: u64,
    total_episodes: u64,
    total_return: f64,
}

impl RLEngine {
    /// Create an engine without agents. Every registered agent gets its own
    /// copy of `env`.
    pub fn new(env: DiscreteEnv, gamma: f64, seed: u64) -> Self {
        Self {
            env,
            agents: Vec::new(),
            active_agent: None,
            gamma,
            seed,
            total_episodes: 0,
            total_return: 0.0,
        }
    }

    /// Create an engine with every agent kind registered, in comparison order
    pub fn with_default_agents(env: DiscreteEnv, config: AgentConfig, gamma: f64, seed: u64) -> Result<Self> {
        let mut engine = Self::new(env, gamma, seed);
        for kind in AgentKind::ALL {
            engine.register(kind, config)?;
        }
        Ok(engine)
    }

    /// Add an agent; the first one registered becomes active
    pub fn register(&mut self, kind: AgentKind, config: AgentConfig) -> Result<&mut Agent> {
        let agent = Agent::new(self.env.clone(), kind, config, self.gamma, self.seed)?;
        if self.find(agent.name()).is_some() {
            return Err(GradlabError::Config(format!(
                "Agent already registered: {}",
                agent.name()
            )));
        }
        info!(agent = agent.name(), env = self.env.name(), "registered agent");
        self.agents.push(agent);
        let index = self.agents.len() - 1;
        if self.active_agent.is_none() {
            self.active_agent = Some(index);
        }
        Ok(&mut self.agents[index])
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.agents
            .iter()
            .position(|a| a.name().eq_ignore_ascii_case(name))
    }

    /// Set the active agent
    pub fn set_agent(&mut self, name: &str) -> Result<()> {
        match self.find(name) {
            Some(index) => {
                self.active_agent = Some(index);
                info!("Active agent set to: {}", name);
                Ok(())
            }
            None => Err(GradlabError::NotFound(format!("Unknown agent: {name}"))),
        }
    }

    /// Get the active agent name
    pub fn active_agent(&self) -> Option<&str> {
        self.active_agent.map(|i| self.agents[i].name())
    }

    /// List registered agents in registration order
    pub fn list_agents(&self) -> Vec<&str> {
        self.agents.iter().map(Agent::name).collect()
    }

    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.find(name).map(|i| &self.agents[i])
    }

    /// Train the active agent
    pub fn train(&mut self, n_runs: usize) -> Result<RunSummary> {
        self.train_with_sink(n_runs, &mut NullSink)
    }

    pub fn train_with_sink(&mut self, n_runs: usize, sink: &mut dyn MetricsSink) -> Result<RunSummary> {
        let index = self
            .active_agent
            .ok_or_else(|| GradlabError::NotFound("No agent registered".to_string()))?;
        self.train_index(index, n_runs, sink)
    }

    /// Train every agent in registration order
    pub fn train_all(&mut self, n_runs: usize) -> Result<Vec<RunSummary>> {
        (0..self.agents.len())
            .map(|i| self.train_index(i, n_runs, &mut NullSink))
            .collect()
    }

    fn train_index(&mut self, index: usize, n_runs: usize, sink: &mut dyn MetricsSink) -> Result<RunSummary> {
        let env_name = self.env.name().to_string();
        let agent = &mut self.agents[index];
        let returns = agent.train_with_sink(n_runs, sink)?;
        let summary = RunSummary::new(agent.name(), &env_name, returns);

        self.total_episodes += n_runs as u64;
        self.total_return += summary.returns.iter().sum::<f64>();
        info!(
            run_id = %summary.run_id,
            agent = %summary.agent,
            mean_return = summary.mean_return,
            "training complete"
        );
        Ok(summary)
    }

    /// Get statistics
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            env: self.env.name().to_string(),
            agents: self.agents.len(),
            total_episodes: self.total_episodes,
            total_steps: self.agents.iter().map(Agent::steps).sum(),
            total_return: self.total_return,
            average_return: if self.total_episodes > 0 {
                self.total_return / self.total_episodes as f64
            } else {
                0.0
            },
            active_agent: self.active_agent().map(str::to_string),
        }
    }
}

/// Engine statistics
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub env: String,
    pub agents: usize,
    pub total_episodes: u64,
    pub total_steps: u64,
    pub total_return: f64,
    pub average_return: f64,
    pub active_agent: Option<String>,
}
