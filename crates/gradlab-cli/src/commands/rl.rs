//! Reinforcement learning commands

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use gradlab_rl::{
    find_optimal_policy, policy_eval, Act, AgentKind, EnvKind, Environment, Norvig, RLEngine, RunSummary,
};

use super::{open_sink, print_json};
use crate::config::Config;

/// Returns averaged over this many final episodes in summaries
const RECENT_WINDOW: usize = 100;

const NORVIG_WIDTH: usize = 4;

#[derive(Subcommand)]
pub enum RlCommands {
    /// Train one agent
    Train {
        /// Environment (toy, norvig)
        #[arg(long)]
        env: Option<EnvKind>,

        /// Agent (random, cheater, q_learning, sarsa)
        #[arg(long, default_value = "q_learning")]
        agent: AgentKind,

        /// Number of episodes
        #[arg(long)]
        runs: Option<usize>,

        /// Exploration rate
        #[arg(long)]
        epsilon: Option<f64>,

        /// TD step size
        #[arg(long)]
        lr: Option<f64>,

        /// Discount factor
        #[arg(long)]
        gamma: Option<f64>,

        /// Write every episode return as JSON lines
        #[arg(long)]
        metrics_out: Option<PathBuf>,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Train every agent kind on the same environment
    Compare {
        /// Environment (toy, norvig)
        #[arg(long)]
        env: Option<EnvKind>,

        /// Number of episodes per agent
        #[arg(long)]
        runs: Option<usize>,

        /// Print the run summaries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Solve an environment by policy iteration
    Policy {
        /// Environment (toy, norvig)
        #[arg(long)]
        env: Option<EnvKind>,

        /// Discount factor
        #[arg(long)]
        gamma: Option<f64>,

        /// Print the policy and state values as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct SolvedPolicy {
    env: String,
    gamma: f64,
    policy: Vec<Act>,
    values: Vec<f64>,
}

pub fn run(cmd: RlCommands, config: &Config) -> Result<()> {
    let settings = &config.rl;
    match cmd {
        RlCommands::Train {
            env,
            agent,
            runs,
            epsilon,
            lr,
            gamma,
            metrics_out,
            json,
        } => {
            let mut agent_config = settings.agent;
            if let Some(epsilon) = epsilon {
                agent_config.epsilon = epsilon;
            }
            if let Some(lr) = lr {
                agent_config.lr = lr;
            }

            let env = env.unwrap_or(settings.env);
            let mut engine = RLEngine::new(env.make(), gamma.unwrap_or(settings.gamma), settings.seed);
            engine.register(agent, agent_config)?;

            let mut sink = open_sink(metrics_out.as_deref(), agent.as_str())?;
            let summary = engine.train_with_sink(runs.unwrap_or(settings.runs), sink.as_mut())?;
            sink.flush()?;

            if json {
                return print_json(&summary);
            }
            print_summaries(std::slice::from_ref(&summary));
            if let Some(greedy) = engine.agent(&summary.agent).and_then(|a| a.greedy_policy()) {
                println!("\nGreedy policy: {greedy:?}");
            }
            Ok(())
        }
        RlCommands::Compare { env, runs, json } => {
            let env = env.unwrap_or(settings.env);
            let mut engine =
                RLEngine::with_default_agents(env.make(), settings.agent, settings.gamma, settings.seed)?;
            let summaries = engine.train_all(runs.unwrap_or(settings.runs))?;

            if json {
                return print_json(&summaries);
            }
            print_summaries(&summaries);
            let stats = engine.stats();
            println!(
                "\n{} episodes, {} steps, average return {:.4}",
                stats.total_episodes, stats.total_steps, stats.average_return
            );
            Ok(())
        }
        RlCommands::Policy { env, gamma, json } => {
            let kind = env.unwrap_or(settings.env);
            let gamma = gamma.unwrap_or(settings.gamma);
            let environment = kind.environment();
            let policy = find_optimal_policy(environment.as_ref(), gamma)?;
            let values = policy_eval(environment.as_ref(), &policy, gamma)?;

            let solved = SolvedPolicy {
                env: kind.to_string(),
                gamma,
                policy,
                values: values.to_vec(),
            };
            if json {
                return print_json(&solved);
            }

            println!("Optimal policy for {} (gamma = {gamma})", solved.env);
            if kind == EnvKind::Norvig {
                print_norvig_grid(&Norvig::default(), &solved.policy);
            }
            println!("\n{:<6} {:<7} VALUE", "STATE", "ACTION");
            for (state, (action, value)) in solved.policy.iter().zip(&solved.values).enumerate() {
                println!("{state:<6} {action:<7} {value:.4}");
            }
            Ok(())
        }
    }
}

fn recent_mean(returns: &[f64]) -> f64 {
    let tail = &returns[returns.len().saturating_sub(RECENT_WINDOW)..];
    if tail.is_empty() {
        0.0
    } else {
        tail.iter().sum::<f64>() / tail.len() as f64
    }
}

fn print_summaries(summaries: &[RunSummary]) {
    println!(
        "{:<10} {:<8} {:<9} {:<12} LAST {RECENT_WINDOW} MEAN",
        "AGENT", "ENV", "EPISODES", "MEAN RETURN"
    );
    println!("{}", "-".repeat(60));
    for s in summaries {
        println!(
            "{:<10} {:<8} {:<9} {:<12.4} {:.4}",
            s.agent,
            s.env,
            s.returns.len(),
            s.mean_return,
            recent_mean(&s.returns)
        );
    }
}

fn print_norvig_grid(grid: &Norvig, policy: &[Act]) {
    let cell = |state: usize| {
        if grid.walls().contains(&state) {
            return '#';
        }
        match grid.terminal().iter().position(|t| *t == state) {
            Some(0) => '+',
            Some(_) => '-',
            None => match policy[state] {
                Norvig::UP => '^',
                Norvig::RIGHT => '>',
                Norvig::DOWN => 'v',
                _ => '<',
            },
        }
    };

    for row in (0..grid.num_states()).collect::<Vec<_>>().chunks(NORVIG_WIDTH) {
        let line: String = row.iter().map(|s| format!("{} ", cell(*s))).collect();
        println!("  {}", line.trim_end());
    }
}
