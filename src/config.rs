//! Run configuration
//!
//! One serde tree per run, loaded from JSON and validated before any
//! component is built. Every section falls back to its defaults, so a
//! config file only needs the fields it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    encoder::EncoderKind,
    error::{Error, Result},
    game::{GridState, RewardKind},
    sequential::{loss::LossKind, optimizer::OptimizerKind},
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seed for food placement, exploration, minibatch sampling and weight init
    pub seed: u64,
    pub env: EnvConfig,
    pub training: TrainingConfig,
    pub dqn: DqnConfig,
    pub tabular: TabularConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    pub width: i32,
    pub height: i32,
    pub reward: RewardKind,
    pub encoder: EncoderKind,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            width: 72,
            height: 32,
            reward: RewardKind::default(),
            encoder: EncoderKind::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub episodes: usize,
    /// Hard cap so a policy that never dies cannot stall the run
    pub max_steps_per_episode: usize,
    /// Target network sync cadence, in episodes
    pub target_sync_every: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: 500,
            max_steps_per_episode: 500,
            target_sync_every: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DqnConfig {
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f32,
    pub optimizer: OptimizerKind,
    pub loss: LossKind,
    pub gamma: f32,
    pub epsilon: f32,
    pub epsilon_min: f32,
    pub epsilon_decay: f32,
    pub batch_size: usize,
    pub buffer_capacity: usize,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![128, 128],
            learning_rate: 1e-3,
            optimizer: OptimizerKind::Adam,
            loss: LossKind::Mse,
            gamma: 0.99,
            epsilon: 1.0,
            epsilon_min: 0.05,
            epsilon_decay: 0.995,
            batch_size: 64,
            buffer_capacity: 50_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TabularConfig {
    pub alpha: f32,
    pub gamma: f32,
    pub epsilon: f32,
    pub epsilon_min: f32,
    /// Applied once per episode; 1.0 keeps ε fixed
    pub epsilon_decay: f32,
    /// Feature quantization used to build state keys
    pub key_resolution: f32,
    /// Drop the bootstrap term when the next state is terminal
    pub zero_terminal_bootstrap: bool,
}

impl Default for TabularConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.9,
            epsilon: 0.1,
            epsilon_min: 0.01,
            epsilon_decay: 1.0,
            key_resolution: 10.0,
            zero_terminal_bootstrap: true,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| Error::io(format!("read config {}", path.display()), source))?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.env.validate()?;
        self.training.validate()?;
        self.dqn.validate()?;
        self.tabular.validate()
    }
}

impl EnvConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width <= 0 || self.height <= 0 {
            return Err(Error::config(format!(
                "grid sides must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.width > GridState::MAX_SIDE || self.height > GridState::MAX_SIDE {
            return Err(Error::config(format!(
                "grid sides must be at most {}, got {}x{}",
                GridState::MAX_SIDE,
                self.width,
                self.height
            )));
        }
        if (self.width as i64) * (self.height as i64) < 2 {
            return Err(Error::config("grid needs at least two cells (snake and food)"));
        }
        Ok(())
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.episodes == 0 {
            return Err(Error::config("episodes must be at least 1"));
        }
        if self.max_steps_per_episode == 0 {
            return Err(Error::config("max_steps_per_episode must be at least 1"));
        }
        if self.target_sync_every == 0 {
            return Err(Error::config("target_sync_every must be at least 1"));
        }
        Ok(())
    }
}

impl DqnConfig {
    pub fn validate(&self) -> Result<()> {
        if self.hidden_layers.iter().any(|&width| width == 0) {
            return Err(Error::config("hidden layer widths must be non-zero"));
        }
        if !(self.learning_rate > 0.0) {
            return Err(Error::config("learning_rate must be positive"));
        }
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be at least 1"));
        }
        if self.buffer_capacity < self.batch_size {
            return Err(Error::config(format!(
                "buffer_capacity ({}) must hold at least one batch ({})",
                self.buffer_capacity, self.batch_size
            )));
        }
        check_unit("dqn.gamma", self.gamma)?;
        check_exploration("dqn", self.epsilon, self.epsilon_min, self.epsilon_decay)
    }
}

impl TabularConfig {
    pub fn validate(&self) -> Result<()> {
        check_unit("tabular.alpha", self.alpha)?;
        check_unit("tabular.gamma", self.gamma)?;
        if !(self.key_resolution > 0.0) {
            return Err(Error::config("tabular.key_resolution must be positive"));
        }
        check_exploration("tabular", self.epsilon, self.epsilon_min, self.epsilon_decay)
    }
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::config(format!("{name} must lie in [0, 1], got {value}")))
    }
}

fn check_exploration(section: &str, epsilon: f32, epsilon_min: f32, epsilon_decay: f32) -> Result<()> {
    check_unit(&format!("{section}.epsilon"), epsilon)?;
    check_unit(&format!("{section}.epsilon_min"), epsilon_min)?;
    if !(epsilon_decay > 0.0 && epsilon_decay <= 1.0) {
        return Err(Error::config(format!(
            "{section}.epsilon_decay must lie in (0, 1], got {epsilon_decay}"
        )));
    }
    Ok(())
}
