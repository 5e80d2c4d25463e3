//! Integration tests for the RL agents
//!
//! These tests verify agents, environments and the solver work correctly together.

#![allow(clippy::float_cmp)]

use std::sync::Arc;

use gradlab_rl::{
    find_optimal_policy, Act, Agent, AgentConfig, AgentKind, DiscreteEnv, EnvKind, Environment,
    Norvig, Obs, RLEngine, Transitions,
};

/// Start in 0; action 0 pays 0, action 1 pays 1, both end the episode in 1
struct TwoState;

impl Environment for TwoState {
    fn name(&self) -> &str {
        "two_state"
    }
    fn num_states(&self) -> usize {
        2
    }
    fn num_actions(&self) -> usize {
        2
    }
    fn start(&self) -> Obs {
        0
    }
    fn terminal(&self) -> &[Obs] {
        &[1]
    }
    fn dynamics(&self, state: Obs, action: Act) -> Transitions {
        if state == 1 {
            return Transitions::deterministic(1, 0.0);
        }
        Transitions::deterministic(1, if action == 1 { 1.0 } else { 0.0 })
    }
}

/// Deterministic corridor 0 -> 1 -> 2 -> 3 (terminal); action 0 pays 1, action 1 pays 0.5
struct Chain;

impl Environment for Chain {
    fn name(&self) -> &str {
        "chain"
    }
    fn num_states(&self) -> usize {
        4
    }
    fn num_actions(&self) -> usize {
        2
    }
    fn start(&self) -> Obs {
        0
    }
    fn terminal(&self) -> &[Obs] {
        &[3]
    }
    fn dynamics(&self, state: Obs, action: Act) -> Transitions {
        if state == 3 {
            return Transitions::deterministic(3, 0.0);
        }
        Transitions::deterministic(state + 1, if action == 0 { 1.0 } else { 0.5 })
    }
}

fn agent(env: Arc<dyn Environment>, kind: AgentKind, config: AgentConfig, gamma: f64) -> Agent {
    Agent::new(DiscreteEnv::new(env), kind, config, gamma, 0).unwrap()
}

/// Q-learning converges on a two-state problem with a known optimal policy
#[test]
fn test_q_learning_converges_on_two_state() {
    let mut agent = agent(Arc::new(TwoState), AgentKind::QLearning, AgentConfig::default(), 0.99);
    agent.train(1000).unwrap();

    let q = agent.q_values().unwrap();
    assert!((q[[0, 1]] - 1.0).abs() < 1e-3, "Q[0,1] = {}", q[[0, 1]]);
    assert_eq!(q[[0, 0]], 0.0);
    assert_eq!(agent.greedy_policy().unwrap()[0], 1);
}

/// With epsilon = 0, SARSA's next action is the greedy one, so both learners update identically
#[test]
fn test_sarsa_matches_q_learning_when_greedy() {
    let config = AgentConfig {
        epsilon: 0.0,
        lr: 0.5,
        optimism: 2.0,
    };
    let mut q_agent = agent(Arc::new(Chain), AgentKind::QLearning, config, 0.9);
    let mut sarsa_agent = agent(Arc::new(Chain), AgentKind::Sarsa, config, 0.9);

    let q_returns = q_agent.train(50).unwrap();
    let sarsa_returns = sarsa_agent.train(50).unwrap();

    assert_eq!(q_returns, sarsa_returns);
    assert_eq!(q_agent.q_values().unwrap(), sarsa_agent.q_values().unwrap());
}

/// An episode never outlasts the longest path to a terminal state
#[test]
fn test_episode_length_is_bounded() {
    for kind in [AgentKind::Random, AgentKind::QLearning, AgentKind::Sarsa] {
        let mut agent = agent(Arc::new(Chain), kind, AgentConfig::default(), 0.99);
        for seed in 0..20 {
            assert_eq!(agent.run_episode(seed).unwrap().len(), 3);
        }
    }

    let mut agent = Agent::new(EnvKind::Norvig.make(), AgentKind::Random, AgentConfig::default(), 0.99, 0).unwrap();
    for seed in 0..50 {
        assert!(agent.run_episode(seed).unwrap().len() <= 100);
    }
}

/// End-to-end: 1000 seeded Q-learning episodes recover the optimal action
#[test]
fn test_two_state_end_to_end() {
    let env: Arc<dyn Environment> = Arc::new(TwoState);
    let optimal = find_optimal_policy(env.as_ref(), 0.99).unwrap();

    let mut agent = agent(env, AgentKind::QLearning, AgentConfig::default(), 0.99);
    let returns = agent.train(1000).unwrap();

    assert_eq!(returns.len(), 1000);
    assert_eq!(agent.greedy_policy().unwrap()[0], optimal[0]);
    assert_eq!(optimal[0], 1);
}

#[test]
fn test_cheater_follows_optimal_policy_on_toy() {
    let mut agent = Agent::new(EnvKind::Toy.make(), AgentKind::Cheater, AgentConfig::default(), 0.99, 0).unwrap();
    let returns = agent.train(100).unwrap();
    assert!(returns.iter().all(|r| (r - 1.98).abs() < 1e-12));
}

#[test]
fn test_learners_beat_random_on_norvig() {
    let mut engine =
        RLEngine::with_default_agents(EnvKind::Norvig.make(), AgentConfig::default(), 0.99, 1).unwrap();
    let summaries = engine.train_all(1000).unwrap();
    let mean = |name: &str| {
        summaries
            .iter()
            .find(|s| s.agent == name)
            .map(|s| s.mean_return)
            .unwrap()
    };

    assert!(mean("QLearning") > mean("Random"));
    assert!(mean("SARSA") > mean("Random"));
    assert!(mean("Cheater") > mean("Random"));
}

#[test]
fn test_norvig_penalty_changes_returns() {
    let train = |penalty: f64| {
        let env = DiscreteEnv::new(Arc::new(Norvig::new(penalty))).with_time_limit(100);
        let mut agent = Agent::new(env, AgentKind::Random, AgentConfig::default(), 0.99, 0).unwrap();
        agent.train(20).unwrap()
    };

    let cheap: f64 = train(0.0).iter().sum();
    let costly: f64 = train(-0.5).iter().sum();
    assert!(costly < cheap);
}

#[test]
fn test_training_accumulates_across_episodes() {
    let mut agent = agent(Arc::new(TwoState), AgentKind::Sarsa, AgentConfig::default(), 0.99);
    agent.train(200).unwrap();
    let after_first = agent.q_values().unwrap()[[0, 1]];
    agent.train(200).unwrap();
    assert!(agent.q_values().unwrap()[[0, 1]] >= after_first);
    assert_eq!(agent.episodes(), 400);
}
