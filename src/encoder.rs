//! State encoders
//!
//! Pure functions from `GridState` to a fixed-length feature vector. The
//! encoder is chosen once from configuration and owned by the `GridWorld`.

use serde::{Deserialize, Serialize};

use crate::game::{Direction, GridState};

pub trait StateEncoder {
    fn feature_count(&self) -> usize;
    fn encode(&self, state: &GridState) -> Vec<f32>;
}

/// Normalized head, food, heading vector and wall distances (10 features).
#[derive(Debug, Clone, Copy, Default)]
pub struct AbsoluteEncoder;

impl StateEncoder for AbsoluteEncoder {
    fn feature_count(&self) -> usize {
        10
    }

    fn encode(&self, state: &GridState) -> Vec<f32> {
        let w = state.width() as f32;
        let h = state.height() as f32;
        let (head_x, head_y) = state.head();
        // after a board-full win there is no food; park it on the head
        let (food_x, food_y) = state.food().unwrap_or((head_x, head_y));
        let (dx, dy) = state.heading().delta();
        let (head_x, head_y) = (head_x as f32, head_y as f32);

        vec![
            head_x / w,
            head_y / h,
            food_x as f32 / w,
            food_y as f32 / h,
            dx as f32,
            dy as f32,
            head_x / w,
            (w - 1.0 - head_x) / w,
            head_y / h,
            (h - 1.0 - head_y) / h,
        ]
    }
}

/// Relative danger flags, one-hot heading and food direction (11 features).
///
/// Layout: `[danger straight, danger right, danger left,
///           heading L, R, U, D, food left, food right, food up, food down]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DangerEncoder;

impl StateEncoder for DangerEncoder {
    fn feature_count(&self) -> usize {
        11
    }

    fn encode(&self, state: &GridState) -> Vec<f32> {
        let head = state.head();
        let heading = state.heading();
        let danger = |direction: Direction| flag(state.is_collision(direction.step_from(head)));

        let mut features = Vec::with_capacity(self.feature_count());
        features.push(danger(heading));
        features.push(danger(heading.turn_right()));
        features.push(danger(heading.turn_left()));
        features.extend(Direction::ALL.iter().map(|&d| flag(d == heading)));

        match state.food() {
            Some((food_x, food_y)) => features.extend([
                flag(food_x < head.0),
                flag(food_x > head.0),
                flag(food_y < head.1),
                flag(food_y > head.1),
            ]),
            None => features.extend([0.0; 4]),
        }

        features
    }
}

fn flag(value: bool) -> f32 {
    if value { 1.0 } else { 0.0 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderKind {
    Absolute,
    #[default]
    Danger,
}

impl EncoderKind {
    pub fn build(self) -> Box<dyn StateEncoder> {
        match self {
            EncoderKind::Absolute => Box::new(AbsoluteEncoder),
            EncoderKind::Danger => Box::new(DangerEncoder),
        }
    }
}

/// Hashable discrete key for the tabular agent.
///
/// Each feature is quantized to `round(value * resolution)`, so binary
/// features map to `{0, resolution}` and normalized coordinates to buckets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey(Vec<i32>);

impl StateKey {
    pub fn from_features(features: &[f32], resolution: f32) -> Self {
        Self(features.iter().map(|&value| (value * resolution).round() as i32).collect())
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }
}

impl From<Vec<i32>> for StateKey {
    fn from(values: Vec<i32>) -> Self {
        Self(values)
    }
}
