//! Random streams and their snapshots.
//!
//! A [`RandomStream`] is either an isolated ChaCha8 stream or a handle to the
//! process-wide [ambient](crate::ambient) stream. Both satisfy
//! [`RngCore`], so operations never special-case the ambient stream.

use crate::ambient;
use crate::subseed::{draw_sub_seed, SubSeed};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Plain-data snapshot of a seeded stream.
///
/// Rebuilding a stream from the same snapshot always yields the same draws,
/// which lets a worker reconstruct a batch stream without sharing any live
/// generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamState {
    seed: [u8; 32],
    stream: u64,
    word_pos: u128,
}

impl StreamState {
    /// Snapshot of a fresh stream seeded from an integer.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self::capture(&ChaCha8Rng::seed_from_u64(seed))
    }

    /// Snapshot of the stream a sub-seed selects.
    #[must_use]
    pub fn from_sub_seed(seed: SubSeed) -> Self {
        Self::from_seed(u64::from(seed))
    }

    pub(crate) fn capture(rng: &ChaCha8Rng) -> Self {
        Self {
            seed: rng.get_seed(),
            stream: rng.get_stream(),
            word_pos: rng.get_word_pos(),
        }
    }

    /// Builds a new generator positioned at this snapshot.
    pub(crate) fn restore(&self) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::from_seed(self.seed);
        rng.set_stream(self.stream);
        rng.set_word_pos(self.word_pos);
        rng
    }
}

/// A stateful random stream owned by one evaluation at a time.
#[derive(Debug)]
pub struct RandomStream {
    source: Source,
}

#[derive(Debug)]
enum Source {
    Seeded(ChaCha8Rng),
    Ambient,
}

impl RandomStream {
    /// Creates an isolated stream from an integer seed.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            source: Source::Seeded(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// Creates an isolated stream from a derived sub-seed.
    #[must_use]
    pub fn from_sub_seed(seed: SubSeed) -> Self {
        Self::from_seed(u64::from(seed))
    }

    /// Rebuilds a stream from a snapshot.
    #[must_use]
    pub fn from_state(state: &StreamState) -> Self {
        Self {
            source: Source::Seeded(state.restore()),
        }
    }

    /// Returns a handle to the process-wide ambient stream.
    #[must_use]
    pub const fn ambient() -> Self {
        Self {
            source: Source::Ambient,
        }
    }

    /// Returns true if draws go to the ambient stream.
    #[must_use]
    pub const fn is_ambient(&self) -> bool {
        matches!(self.source, Source::Ambient)
    }

    /// Snapshot of the current position of this stream.
    ///
    /// For the ambient stream this is the ambient stream's current state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        match &self.source {
            Source::Seeded(rng) => StreamState::capture(rng),
            Source::Ambient => ambient::state(),
        }
    }

    /// Draws one sub-seed, advancing the stream by a single `u32` draw.
    pub fn next_sub_seed(&mut self) -> SubSeed {
        draw_sub_seed(self)
    }
}

impl RngCore for RandomStream {
    fn next_u32(&mut self) -> u32 {
        match &mut self.source {
            Source::Seeded(rng) => rng.next_u32(),
            Source::Ambient => ambient::with(RngCore::next_u32),
        }
    }

    fn next_u64(&mut self) -> u64 {
        match &mut self.source {
            Source::Seeded(rng) => rng.next_u64(),
            Source::Ambient => ambient::with(RngCore::next_u64),
        }
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        match &mut self.source {
            Source::Seeded(rng) => rng.fill_bytes(dest),
            Source::Ambient => ambient::with(|rng| rng.fill_bytes(dest)),
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        match &mut self.source {
            Source::Seeded(rng) => rng.try_fill_bytes(dest),
            Source::Ambient => ambient::with(|rng| rng.try_fill_bytes(dest)),
        }
    }
}
