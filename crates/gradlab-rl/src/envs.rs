//! Built-in environments

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use gradlab_core::GradlabError;

use crate::env::{Act, DiscreteEnv, Environment, Obs, Transitions};

/// Three states, two actions, no terminal states.
///
/// From the start state `LEFT` pays 1 now and `RIGHT` pays 2 one step
/// later; both side states lead straight back to the start.
#[derive(Debug, Clone, Copy, Default)]
pub struct Toy;

impl Toy {
    pub const S0: Obs = 0;
    pub const SL: Obs = 1;
    pub const SR: Obs = 2;
    pub const LEFT: Act = 0;
    pub const RIGHT: Act = 1;
}

impl Environment for Toy {
    fn name(&self) -> &str {
        "toy"
    }

    fn num_states(&self) -> usize {
        3
    }

    fn num_actions(&self) -> usize {
        2
    }

    fn start(&self) -> Obs {
        Self::S0
    }

    fn terminal(&self) -> &[Obs] {
        &[]
    }

    fn dynamics(&self, state: Obs, action: Act) -> Transitions {
        match (state, action) {
            (Self::S0, Self::LEFT) => Transitions::deterministic(Self::SL, 1.0),
            (Self::S0, _) => Transitions::deterministic(Self::SR, 0.0),
            (Self::SR, _) => Transitions::deterministic(Self::S0, 2.0),
            _ => Transitions::deterministic(Self::S0, 0.0),
        }
    }
}

const NORVIG_WIDTH: usize = 4;
const NORVIG_HEIGHT: usize = 3;
/// up, right, down, left
const NORVIG_MOVES: [(isize, isize); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// The 3x4 grid world from Russell & Norvig.
///
/// ```txt
///  0  1  2 [+1]
///  4 ##  6 [-1]
///  8  9 10  11
/// ```
///
/// Moves succeed with probability 0.7 and slip into each of the other three
/// directions with probability 0.1. Bumping into the wall or the edge stays
/// put. Every move costs `penalty` unless it enters a terminal state, which
/// pays that state's goal reward instead.
#[derive(Debug, Clone)]
pub struct Norvig {
    penalty: f64,
    walls: Vec<Obs>,
    terminal: Vec<Obs>,
    goal_rewards: Vec<f64>,
}

impl Default for Norvig {
    fn default() -> Self {
        Self::new(-0.04)
    }
}

impl Norvig {
    pub const UP: Act = 0;
    pub const RIGHT: Act = 1;
    pub const DOWN: Act = 2;
    pub const LEFT: Act = 3;

    pub fn new(penalty: f64) -> Self {
        Self {
            penalty,
            walls: vec![5],
            terminal: vec![3, 7],
            goal_rewards: vec![1.0, -1.0],
        }
    }

    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    pub fn walls(&self) -> &[Obs] {
        &self.walls
    }

    fn neighbour(&self, state: Obs, (dx, dy): (isize, isize)) -> Obs {
        let x = (state % NORVIG_WIDTH) as isize + dx;
        let y = (state / NORVIG_WIDTH) as isize + dy;
        if !(0..NORVIG_WIDTH as isize).contains(&x) || !(0..NORVIG_HEIGHT as isize).contains(&y) {
            return state;
        }
        let next = y as usize * NORVIG_WIDTH + x as usize;
        if self.walls.contains(&next) {
            state
        } else {
            next
        }
    }

    fn entry_reward(&self, next: Obs) -> f64 {
        self.terminal
            .iter()
            .position(|t| *t == next)
            .map_or(self.penalty, |i| self.goal_rewards[i])
    }
}

impl Environment for Norvig {
    fn name(&self) -> &str {
        "norvig"
    }

    fn num_states(&self) -> usize {
        NORVIG_WIDTH * NORVIG_HEIGHT
    }

    fn num_actions(&self) -> usize {
        NORVIG_MOVES.len()
    }

    fn start(&self) -> Obs {
        8
    }

    fn terminal(&self) -> &[Obs] {
        &self.terminal
    }

    fn dynamics(&self, state: Obs, action: Act) -> Transitions {
        if self.terminal.contains(&state) || self.walls.contains(&state) {
            return Transitions::deterministic(state, 0.0);
        }

        let mut out = Transitions {
            states: Vec::with_capacity(NORVIG_MOVES.len()),
            rewards: Vec::with_capacity(NORVIG_MOVES.len()),
            probs: Vec::with_capacity(NORVIG_MOVES.len()),
        };
        for (i, mv) in NORVIG_MOVES.iter().enumerate() {
            let next = self.neighbour(state, *mv);
            out.states.push(next);
            out.rewards.push(self.entry_reward(next));
            out.probs.push(if i == action { 0.7 } else { 0.1 });
        }
        out
    }
}

/// Registered environments, each with its episode time limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvKind {
    #[default]
    Toy,
    Norvig,
}

impl EnvKind {
    pub const ALL: [EnvKind; 2] = [Self::Toy, Self::Norvig];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Toy => "toy",
            Self::Norvig => "norvig",
        }
    }

    pub fn max_episode_steps(self) -> usize {
        match self {
            Self::Toy => 2,
            Self::Norvig => 100,
        }
    }

    pub fn environment(self) -> Arc<dyn Environment> {
        match self {
            Self::Toy => Arc::new(Toy),
            Self::Norvig => Arc::new(Norvig::default()),
        }
    }

    /// Wrapped environment with the registered time limit
    pub fn make(self) -> DiscreteEnv {
        DiscreteEnv::new(self.environment()).with_time_limit(self.max_episode_steps())
    }
}

impl fmt::Display for EnvKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvKind {
    type Err = GradlabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "toy" => Ok(Self::Toy),
            "norvig" | "norvig_grid" => Ok(Self::Norvig),
            other => Err(GradlabError::Config(format!("Unknown environment: {other}"))),
        }
    }
}
