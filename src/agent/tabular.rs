//! Tabular Q-learning
//!
//! Off-policy TD(0) control over discretized state keys.

use std::{collections::HashMap, path::Path};

use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom};
use serde::{Deserialize, Serialize};

use super::{Agent, Exploration, Transition};
use crate::{
    config::TabularConfig,
    encoder::StateKey,
    error::Result,
    game::{Action, Direction},
    persistence,
};

/// Values for the four actions of one state, indexed by `Action::index`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionValues(pub [f32; Direction::COUNT]);

impl ActionValues {
    pub fn get(&self, action: Action) -> f32 {
        self.0[action.index()]
    }

    pub fn set(&mut self, action: Action, value: f32) {
        self.0[action.index()] = value;
    }

    pub fn max(&self) -> f32 {
        self.0.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Every action whose value equals the maximum.
    pub fn best_actions(&self) -> Vec<Action> {
        let max = self.max();
        Direction::ALL
            .iter()
            .copied()
            .filter(|&action| self.get(action) == max)
            .collect()
    }
}

/// State key -> action -> value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QTable {
    rows: HashMap<StateKey, ActionValues>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Row for `state`, inserting an all-zero row on first touch.
    ///
    /// Reading an unseen state therefore grows the table; use `peek` to
    /// inspect without that side effect.
    pub fn row(&mut self, state: &StateKey) -> &mut ActionValues {
        self.rows.entry(state.clone()).or_default()
    }

    /// Value of `(state, action)` with insert-on-read semantics, see `row`.
    pub fn value(&mut self, state: &StateKey, action: Action) -> f32 {
        self.row(state).get(action)
    }

    pub fn peek(&self, state: &StateKey, action: Action) -> Option<f32> {
        self.rows.get(state).map(|row| row.get(action))
    }

    pub fn contains(&self, state: &StateKey) -> bool {
        self.rows.contains_key(state)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub struct TabularAgent {
    q_table: QTable,
    alpha: f32,
    gamma: f32,
    exploration: Exploration,
    key_resolution: f32,
    zero_terminal_bootstrap: bool,
    rng: StdRng,
}

impl TabularAgent {
    pub fn new(config: &TabularConfig, seed: u64) -> Self {
        Self {
            q_table: QTable::new(),
            alpha: config.alpha,
            gamma: config.gamma,
            exploration: Exploration::new(config.epsilon, config.epsilon_min, config.epsilon_decay),
            key_resolution: config.key_resolution,
            zero_terminal_bootstrap: config.zero_terminal_bootstrap,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn with_q_table(mut self, q_table: QTable) -> Self {
        self.q_table = q_table;
        self
    }

    pub fn q_table(&self) -> &QTable {
        &self.q_table
    }

    pub fn exploration_mut(&mut self) -> &mut Exploration {
        &mut self.exploration
    }

    pub fn state_key(&self, features: &[f32]) -> StateKey {
        StateKey::from_features(features, self.key_resolution)
    }

    /// ε-greedy with uniform tie-breaking among all maximal actions.
    pub fn choose_action(&mut self, state: &StateKey) -> Action {
        if self.rng.random::<f32>() < self.exploration.epsilon() {
            return Direction::ALL[self.rng.random_range(0..Direction::COUNT)];
        }
        self.best_action(state)
    }

    fn best_action(&mut self, state: &StateKey) -> Action {
        let best = self.q_table.row(state).best_actions();
        // a row of NaNs has no maximum; fall back to any action
        *best.choose(&mut self.rng).unwrap_or(&Direction::ALL[0])
    }

    /// `Q(s,a) += α · (r + γ · max_a' Q(s',a') − Q(s,a))`.
    ///
    /// Always bootstraps through `next_state`, even when it is terminal.
    pub fn td_update(&mut self, state: &StateKey, action: Action, reward: f32, next_state: &StateKey) {
        let future = self.q_table.row(next_state).max();
        self.update(state, action, reward, future);
    }

    /// Like `td_update`, but drops the bootstrap term for terminal transitions
    /// when `zero_terminal_bootstrap` is configured.
    pub fn learn_transition(&mut self, state: &StateKey, action: Action, reward: f32, next_state: &StateKey, done: bool) {
        if done && self.zero_terminal_bootstrap {
            self.update(state, action, reward, 0.0);
        } else {
            self.td_update(state, action, reward, next_state);
        }
    }

    fn update(&mut self, state: &StateKey, action: Action, reward: f32, future: f32) {
        let (alpha, gamma) = (self.alpha, self.gamma);
        let row = self.q_table.row(state);
        let current = row.get(action);
        row.set(action, current + alpha * (reward + gamma * future - current));
    }
}

impl Agent for TabularAgent {
    fn act(&mut self, state: &[f32]) -> Result<Action> {
        let key = self.state_key(state);
        Ok(self.choose_action(&key))
    }

    fn greedy_action(&mut self, state: &[f32]) -> Result<Action> {
        let key = self.state_key(state);
        Ok(self.best_action(&key))
    }

    /// Tabular learning is immediate: each transition updates the table on arrival.
    fn remember(&mut self, transition: Transition) -> Result<()> {
        let state = self.state_key(&transition.state);
        let next_state = self.state_key(&transition.next_state);
        self.learn_transition(&state, transition.action, transition.reward, &next_state, transition.done);
        Ok(())
    }

    fn learn(&mut self) -> Result<Option<f32>> {
        Ok(None)
    }

    fn end_episode(&mut self) {
        self.exploration.decay();
    }

    fn epsilon(&self) -> f32 {
        self.exploration.epsilon()
    }

    fn save(&self, location: &Path) -> Result<()> {
        persistence::save_q_table(&self.q_table, location)
    }
}
