//! Function approximation interface
//!
//! The DQN agent only talks to its networks through `QEstimator`, so any
//! numeric backend can stand in for the bundled `Sequential` MLP.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub trait QEstimator {
    fn input_size(&self) -> usize;

    /// Number of Q-values per state (one per action).
    fn output_size(&self) -> usize;

    /// Q-values for each state in the batch. Fails on an empty or ragged batch.
    fn predict(&mut self, states: &[Vec<f32>]) -> Result<Vec<Vec<f32>>>;

    /// One gradient pass over the batch; returns the batch loss.
    fn fit_batch(&mut self, states: &[Vec<f32>], targets: &[Vec<f32>]) -> Result<f32>;

    fn parameters(&self) -> Parameters;

    /// Overwrite all parameters. Fails with `IncompatibleShape` unless every
    /// block matches this estimator's layout.
    fn set_parameters(&mut self, parameters: &Parameters) -> Result<()>;
}

/// One trainable tensor, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamBlock {
    pub shape: [usize; 2],
    pub values: Vec<f32>,
}

/// Backend-independent snapshot of every trainable tensor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Parameters {
    pub blocks: Vec<ParamBlock>,
}

impl Parameters {
    pub fn shapes(&self) -> Vec<[usize; 2]> {
        self.blocks.iter().map(|block| block.shape).collect()
    }

    pub fn len(&self) -> usize {
        self.blocks.iter().map(|block| block.values.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that `self` can be loaded into an estimator whose layout is `expected`.
    pub fn check_layout(&self, expected: &[[usize; 2]]) -> Result<()> {
        let shapes = self.shapes();
        let consistent = self
            .blocks
            .iter()
            .all(|block| block.values.len() == block.shape[0] * block.shape[1]);
        if shapes != expected || !consistent {
            return Err(Error::IncompatibleShape {
                expected: format!("{expected:?}"),
                found: format!("{shapes:?}"),
            });
        }
        Ok(())
    }
}

/// Reject empty batches, mismatched lengths and rows of the wrong width.
pub fn check_batch(operation: &'static str, rows: &[Vec<f32>], width: usize) -> Result<()> {
    if rows.is_empty() {
        return Err(Error::EmptyBatch { operation });
    }
    if let Some(row) = rows.iter().find(|row| row.len() != width) {
        return Err(Error::BatchShape {
            message: format!("{operation}: expected rows of width {width}, got {}", row.len()),
        });
    }
    Ok(())
}
