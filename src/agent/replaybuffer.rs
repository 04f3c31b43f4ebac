use rand::Rng;

use super::Transition;
use crate::error::{Error, Result};

/// Fixed-capacity ring of transitions.
///
/// Appends fill the backing vector until it reaches `capacity`; after that
/// each append overwrites the slot under `cursor`, which is always the
/// oldest transition.
pub struct ReplayBuffer {
    buffer: Vec<Transition>,
    capacity: usize,
    cursor: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "replay buffer capacity must be positive");
        Self {
            buffer: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
        }
    }

    pub fn add(&mut self, transition: Transition) {
        if self.buffer.len() < self.capacity {
            self.buffer.push(transition);
        } else {
            self.buffer[self.cursor] = transition;
            self.cursor = (self.cursor + 1) % self.capacity;
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stored transitions from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> + '_ {
        let (newer, older) = self.buffer.split_at(self.cursor);
        older.iter().chain(newer.iter())
    }

    /// `batch_size` distinct transitions drawn uniformly.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, batch_size: usize) -> Result<Vec<&Transition>> {
        if batch_size == 0 {
            return Err(Error::EmptyBatch { operation: "sample" });
        }
        if self.buffer.len() < batch_size {
            return Err(Error::InsufficientSamples {
                requested: batch_size,
                available: self.buffer.len(),
            });
        }

        let indices = rand::seq::index::sample(rng, self.buffer.len(), batch_size);
        Ok(indices.iter().map(|index| &self.buffer[index]).collect())
    }
}
