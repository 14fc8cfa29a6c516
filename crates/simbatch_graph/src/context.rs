//! Computation context of one run.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use simbatch_random::{BatchRandomState, RandomStream, DEFAULT_MAX_BATCHES};

/// Configuration of a computation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Master seed. `None` draws everything from the ambient stream.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Number of items per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Largest number of batches a seeded run may generate.
    #[serde(default = "default_max_batches")]
    pub max_batches: u64,
}

const fn default_batch_size() -> usize {
    1
}

const fn default_max_batches() -> u64 {
    DEFAULT_MAX_BATCHES
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            seed: None,
            batch_size: default_batch_size(),
            max_batches: default_max_batches(),
        }
    }
}

impl ContextConfig {
    /// Sets the master seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Clears the master seed.
    #[must_use]
    pub const fn without_seed(mut self) -> Self {
        self.seed = None;
        self
    }

    /// Sets the batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the maximum number of batches.
    #[must_use]
    pub const fn with_max_batches(mut self, max_batches: u64) -> Self {
        self.max_batches = max_batches;
        self
    }
}

/// Holds the master seed and the batch stream cache of one run.
///
/// Shared read-only between workers; every batch derives its own stream.
#[derive(Debug)]
pub struct ComputationContext {
    config: ContextConfig,
    streams: BatchRandomState,
}

impl ComputationContext {
    /// Creates a context.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_batches` is zero or too large.
    pub fn new(config: ContextConfig) -> Result<Self> {
        let streams = BatchRandomState::new(config.seed, config.max_batches)?;
        Ok(Self { config, streams })
    }

    /// The configuration this context was built from.
    #[must_use]
    pub const fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// The master seed.
    #[must_use]
    pub const fn seed(&self) -> Option<u64> {
        self.config.seed
    }

    /// Default number of items per batch.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    /// Per-batch random state.
    #[must_use]
    pub const fn batch_random_state(&self) -> &BatchRandomState {
        &self.streams
    }

    /// Returns the stream for a batch.
    ///
    /// Repeated calls for the same index return streams in the same
    /// initial state.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch index exceeds `max_batches`.
    pub fn stream_for(&self, batch_index: u64) -> Result<RandomStream> {
        Ok(self.streams.stream_for(batch_index)?)
    }
}
