//! Reward policies
//!
//! Collision and food handling live in `GridWorld::step`; a policy only
//! decides the numbers, so both shaping strategies share one environment.

use serde::{Deserialize, Serialize};

use super::state::Cell;

pub trait RewardPolicy {
    /// Reward for a wall or body collision (terminal).
    fn collision(&self) -> f32;

    /// Reward for moving onto the food cell.
    fn food(&self) -> f32;

    /// Reward for an ordinary move that neither collides nor eats.
    fn shaping(&self, old_head: Cell, new_head: Cell, food: Cell) -> f32;
}

/// Fixed small penalty per step, pushing the agent to reach food quickly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepPenalty {
    pub step: f32,
    pub food: f32,
    pub collision: f32,
}

impl RewardPolicy for StepPenalty {
    fn collision(&self) -> f32 {
        self.collision
    }

    fn food(&self) -> f32 {
        self.food
    }

    fn shaping(&self, _old_head: Cell, _new_head: Cell, _food: Cell) -> f32 {
        self.step
    }
}

/// Manhattan-distance shaping: `closer` when the head strictly approaches
/// the food, `farther` otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceShaping {
    pub closer: f32,
    pub farther: f32,
    pub food: f32,
    pub collision: f32,
}

pub fn manhattan(a: Cell, b: Cell) -> i32 {
    (a.0 - b.0).abs() + (a.1 - b.1).abs()
}

impl RewardPolicy for DistanceShaping {
    fn collision(&self) -> f32 {
        self.collision
    }

    fn food(&self) -> f32 {
        self.food
    }

    fn shaping(&self, old_head: Cell, new_head: Cell, food: Cell) -> f32 {
        if manhattan(new_head, food) < manhattan(old_head, food) {
            self.closer
        } else {
            self.farther
        }
    }
}

/// Configured reward strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewardKind {
    StepPenalty { step: f32, food: f32, collision: f32 },
    DistanceShaping { closer: f32, farther: f32, food: f32, collision: f32 },
}

impl RewardKind {
    pub fn step_penalty() -> Self {
        RewardKind::StepPenalty {
            step: -0.01,
            food: 1.0,
            collision: -1.0,
        }
    }

    pub fn distance_shaping() -> Self {
        RewardKind::DistanceShaping {
            closer: 1.0,
            farther: -0.5,
            food: 10.0,
            collision: -10.0,
        }
    }

    pub fn build(self) -> Box<dyn RewardPolicy> {
        match self {
            RewardKind::StepPenalty { step, food, collision } => Box::new(StepPenalty { step, food, collision }),
            RewardKind::DistanceShaping {
                closer,
                farther,
                food,
                collision,
            } => Box::new(DistanceShaping {
                closer,
                farther,
                food,
                collision,
            }),
        }
    }
}

impl Default for RewardKind {
    fn default() -> Self {
        RewardKind::distance_shaping()
    }
}
