//! Error types for the snake_rl crate

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("step called after the episode ended; call reset() first")]
    StepAfterTerminal,

    #[error("invalid action {0} (expected 0=LEFT, 1=RIGHT, 2=UP, 3=DOWN)")]
    InvalidAction(usize),

    #[error("invalid grid state: {message}")]
    InvalidState { message: String },

    #[error("cannot {operation} on an empty batch")]
    EmptyBatch { operation: &'static str },

    #[error("requested {requested} samples but only {available} transitions are stored")]
    InsufficientSamples { requested: usize, available: usize },

    #[error("batch shape mismatch: {message}")]
    BatchShape { message: String },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("no saved model at {}", path.display())]
    ModelNotFound { path: PathBuf },

    #[error("incompatible model shape: expected {expected}, found {found}")]
    IncompatibleShape { expected: String, found: String },

    #[error("corrupt model file {}: {source}", path.display())]
    CorruptModel {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::InvalidConfiguration {
            message: message.into(),
        }
    }

    pub(crate) fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            operation: operation.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
