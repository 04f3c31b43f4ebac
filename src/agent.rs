pub mod dqn;
pub mod replaybuffer;
pub mod tabular;

use std::path::Path;

use crate::{error::Result, game::Action};

pub use dqn::DqnAgent;
pub use replaybuffer::ReplayBuffer;
pub use tabular::{QTable, TabularAgent};

/// One environment step as seen by a learner.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: Vec<f32>,
    pub action: Action,
    pub reward: f32,
    pub next_state: Vec<f32>,
    pub done: bool,
}

/// Multiplicative ε decay down to a floor. ε never increases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exploration {
    epsilon: f32,
    min: f32,
    decay: f32,
}

impl Exploration {
    pub fn new(epsilon: f32, min: f32, decay: f32) -> Self {
        Self {
            epsilon: epsilon.max(min),
            min,
            decay,
        }
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn decay(&mut self) {
        self.epsilon = (self.epsilon * self.decay).max(self.min);
    }

    /// Pin ε, e.g. to 0.0 for greedy play. The floor follows so later decays cannot raise it.
    pub fn set_epsilon(&mut self, epsilon: f32) {
        self.epsilon = epsilon;
        self.min = self.min.min(epsilon);
    }
}

/// What the training loop needs from a learner.
pub trait Agent {
    /// ε-greedy action for the encoded state.
    fn act(&mut self, state: &[f32]) -> Result<Action>;

    /// Best known action, no exploration.
    fn greedy_action(&mut self, state: &[f32]) -> Result<Action>;

    fn remember(&mut self, transition: Transition) -> Result<()>;

    /// Returns the training loss when an update happened.
    fn learn(&mut self) -> Result<Option<f32>>;

    fn sync_target(&mut self) -> Result<()> {
        Ok(())
    }

    fn end_episode(&mut self) {}

    fn epsilon(&self) -> f32;

    /// Persist whatever the agent has learned.
    fn save(&self, location: &Path) -> Result<()>;
}

/// Index of the largest value, first one on ties.
pub(crate) fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best_i, best_v), (i, &v)| {
            if v > best_v { (i, v) } else { (best_i, best_v) }
        })
        .0
}
