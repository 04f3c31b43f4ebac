pub mod agent;
pub mod config;
pub mod encoder;
pub mod error;
pub mod estimator;
pub mod game;
pub mod logging;
pub mod persistence;
pub mod render;
pub mod sequential;
pub mod train;

pub use agent::{Agent, DqnAgent, Exploration, QTable, ReplayBuffer, TabularAgent, Transition};
pub use config::{Config, DqnConfig, EnvConfig, TabularConfig, TrainingConfig};
pub use encoder::{AbsoluteEncoder, DangerEncoder, EncoderKind, StateEncoder, StateKey};
pub use error::{Error, Result};
pub use estimator::{ParamBlock, Parameters, QEstimator};
pub use game::{Action, CollisionKind, Direction, GridState, GridWorld, RewardKind, Step, StepInfo, StepOutcome};
pub use persistence::LoadPolicy;
pub use render::{Frame, Presenter};
pub use sequential::Sequential;
pub use train::{EpisodeEnd, EpisodeLog, EpisodeSummary, TrainingLoop, TrainingReport};
