//! Per-batch random state.
//!
//! With a master seed, batch `i` gets a stream seeded from the `i`-th
//! sub-seed of the master stream. Without one, every batch draws from the
//! ambient stream.

use crate::error::Result;
use crate::stream::{RandomStream, StreamState};
use crate::subseed::{SubSeed, SubSeedSequence};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Default span for batch sub-seed derivation.
///
/// Bounds the batch indices a seeded run can use. The span itself allocates
/// nothing: sub-seeds are generated up to the highest batch index requested
/// and kept for the life of the [`BatchRandomState`], at 4 bytes in a `Vec`
/// plus a `HashSet` entry each. Requesting indices near the full 2^24 span
/// keeps roughly 200 MB alive. Runs that reach such indices but need less
/// should pass a smaller span (`ContextConfig::with_max_batches` in
/// `simbatch_graph`).
pub const DEFAULT_MAX_BATCHES: u64 = 1 << 24;

/// Derives the stream for one batch without any caching.
///
/// # Errors
///
/// Returns an error if `span` is invalid or `batch_index >= span` while a
/// master seed is set.
pub fn stream_for(master_seed: Option<u64>, batch_index: u64, span: u64) -> Result<RandomStream> {
    BatchRandomState::new(master_seed, span)?.stream_for(batch_index)
}

/// Source of batch streams for one run.
///
/// Derived batch sub-seeds are memoised, so repeated requests for the same
/// batch index return streams in the identical initial state.
#[derive(Debug)]
pub struct BatchRandomState {
    master_seed: Option<u64>,
    span: u64,
    sub_seeds: Option<Mutex<SubSeedSequence>>,
}

impl BatchRandomState {
    /// Creates the batch random state for a master seed.
    ///
    /// # Errors
    ///
    /// Returns an error if `span` is zero or too large.
    pub fn new(master_seed: Option<u64>, span: u64) -> Result<Self> {
        let sub_seeds = match master_seed {
            Some(seed) => Some(Mutex::new(SubSeedSequence::new(
                &StreamState::from_seed(seed),
                span,
            )?)),
            None => None,
        };

        Ok(Self {
            master_seed,
            span,
            sub_seeds,
        })
    }

    /// The master seed, if any.
    #[must_use]
    pub const fn master_seed(&self) -> Option<u64> {
        self.master_seed
    }

    /// Maximum number of batches.
    #[must_use]
    pub const fn span(&self) -> u64 {
        self.span
    }

    /// Sub-seed of a batch, or `None` when running on the ambient stream.
    ///
    /// # Errors
    ///
    /// Returns an error if `batch_index` is outside the span.
    pub fn sub_seed(&self, batch_index: u64) -> Result<Option<SubSeed>> {
        let Some(sequence) = &self.sub_seeds else {
            return Ok(None);
        };
        let mut sequence = sequence.lock().unwrap_or_else(PoisonError::into_inner);
        sequence.get(batch_index).map(Some)
    }

    /// Initial stream snapshot of a batch.
    ///
    /// This is plain data: a worker can rebuild the batch stream from it
    /// with [`RandomStream::from_state`].
    ///
    /// # Errors
    ///
    /// Returns an error if `batch_index` is outside the span.
    pub fn initial_state(&self, batch_index: u64) -> Result<Option<StreamState>> {
        Ok(self
            .sub_seed(batch_index)?
            .map(StreamState::from_sub_seed))
    }

    /// Returns a fresh stream for a batch.
    ///
    /// # Errors
    ///
    /// Returns an error if `batch_index` is outside the span.
    pub fn stream_for(&self, batch_index: u64) -> Result<RandomStream> {
        match self.sub_seed(batch_index)? {
            Some(seed) => {
                debug!(batch_index, sub_seed = seed, "Derived batch stream");
                Ok(RandomStream::from_sub_seed(seed))
            }
            None => Ok(RandomStream::ambient()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    fn draws(mut stream: RandomStream) -> Vec<u64> {
        (0..8).map(|_| stream.next_u64()).collect()
    }

    #[test]
    fn repeated_requests_share_initial_state() {
        let states = BatchRandomState::new(Some(123), 1_000).unwrap();
        assert_eq!(
            draws(states.stream_for(4).unwrap()),
            draws(states.stream_for(4).unwrap())
        );
    }

    #[test]
    fn recreated_state_reproduces_streams() {
        let first = BatchRandomState::new(Some(123), 1_000).unwrap();
        let second = BatchRandomState::new(Some(123), 1_000).unwrap();
        for batch in [0, 1, 17, 999] {
            assert_eq!(
                draws(first.stream_for(batch).unwrap()),
                draws(second.stream_for(batch).unwrap())
            );
        }
    }

    #[test]
    fn batches_get_different_streams() {
        let states = BatchRandomState::new(Some(123), 1_000).unwrap();
        assert_ne!(
            draws(states.stream_for(0).unwrap()),
            draws(states.stream_for(1).unwrap())
        );
    }

    #[test]
    fn different_master_seeds_differ() {
        let a = BatchRandomState::new(Some(1), 10).unwrap();
        let b = BatchRandomState::new(Some(2), 10).unwrap();
        assert_ne!(a.sub_seed(0).unwrap(), b.sub_seed(0).unwrap());
    }

    #[test]
    fn unseeded_state_uses_ambient_stream() {
        let states = BatchRandomState::new(None, 10).unwrap();
        assert!(states.stream_for(3).unwrap().is_ambient());
        assert_eq!(states.sub_seed(3).unwrap(), None);
        assert_eq!(states.initial_state(3).unwrap(), None);
    }

    #[test]
    fn initial_state_rebuilds_the_batch_stream() {
        let states = BatchRandomState::new(Some(9), 100).unwrap();
        let snapshot = states.initial_state(42).unwrap().unwrap();
        assert_eq!(
            draws(RandomStream::from_state(&snapshot)),
            draws(states.stream_for(42).unwrap())
        );
    }

    #[test]
    fn free_function_matches_cached_state() {
        let states = BatchRandomState::new(Some(5), 64).unwrap();
        assert_eq!(
            draws(stream_for(Some(5), 10, 64).unwrap()),
            draws(states.stream_for(10).unwrap())
        );
    }

    #[test]
    fn batch_index_beyond_span_fails() {
        let states = BatchRandomState::new(Some(5), 4).unwrap();
        assert!(states.stream_for(4).is_err());
    }
}
