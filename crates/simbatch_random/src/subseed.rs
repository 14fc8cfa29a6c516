//! Sub-seed derivation.
//!
//! A sub-seed is drawn from a private copy of a stream snapshot: the
//! snapshot is re-seeded into a scratch generator, sub-seeds are drawn in
//! order and the draw at the requested index is returned. Draws that repeat
//! an earlier draw are skipped, so the sub-seeds of one span never collide.
//!
//! The caller's stream is never advanced.

use crate::error::{Error, Result};
use crate::stream::StreamState;
use rand::RngCore;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;

/// A derived seed for one batch or one item.
pub type SubSeed = u32;

/// Exclusive upper bound of sub-seed values.
///
/// Kept at 2^31 so a sub-seed is representable by every integer output type
/// an external command may print it as.
pub const SUB_SEED_BOUND: u32 = 1 << 31;

pub(crate) fn draw_sub_seed<R: RngCore + ?Sized>(rng: &mut R) -> SubSeed {
    rng.next_u32() >> 1
}

/// Lazily derived sequence of distinct sub-seeds for one snapshot.
///
/// Entry `i` of the sequence is the `i`-th distinct 31-bit draw of the
/// snapshot. Entries are generated on demand and kept, so repeated lookups
/// are cheap.
#[derive(Debug, Clone)]
pub struct SubSeedSequence {
    rng: ChaCha8Rng,
    span: u64,
    seen: HashSet<SubSeed>,
    seeds: Vec<SubSeed>,
}

impl SubSeedSequence {
    /// Creates the sequence for `state` covering indices `0..span`.
    ///
    /// # Errors
    ///
    /// Returns an error if `span` is zero or larger than the number of
    /// distinct sub-seeds.
    pub fn new(state: &StreamState, span: u64) -> Result<Self> {
        check_span(span)?;
        Ok(Self {
            rng: state.restore(),
            span,
            seen: HashSet::new(),
            seeds: Vec::new(),
        })
    }

    /// Span of this sequence.
    #[must_use]
    pub const fn span(&self) -> u64 {
        self.span
    }

    /// Number of sub-seeds generated so far.
    #[must_use]
    pub fn generated(&self) -> usize {
        self.seeds.len()
    }

    /// Returns the sub-seed at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is not below the span.
    pub fn get(&mut self, index: u64) -> Result<SubSeed> {
        let position = usize::try_from(index)
            .ok()
            .filter(|_| index < self.span)
            .ok_or(Error::IndexOutOfSpan {
                index,
                span: self.span,
            })?;

        while self.seeds.len() <= position {
            let seed = draw_sub_seed(&mut self.rng);
            if self.seen.insert(seed) {
                self.seeds.push(seed);
            }
        }
        Ok(self.seeds[position])
    }
}

fn check_span(span: u64) -> Result<()> {
    if span == 0 {
        return Err(Error::EmptySpan);
    }
    if span > u64::from(SUB_SEED_BOUND) {
        return Err(Error::SpanTooLarge {
            span,
            max: u64::from(SUB_SEED_BOUND),
        });
    }
    Ok(())
}

/// Derives the sub-seed for `index` from a stream snapshot.
///
/// Position `index` is the `index`-th *distinct* draw: each raw `u32` draw
/// is shifted right by one into `0..2^31` and draws equal to an earlier one
/// are skipped, so it can sit past raw draw `index` in the stream.
///
/// Identical `(state, index, span)` always produce the identical sub-seed.
///
/// # Errors
///
/// Returns an error if `span` is invalid or `index >= span`.
///
/// # Example
///
/// ```rust
/// use simbatch_random::{derive_sub_seed, StreamState};
///
/// let state = StreamState::from_seed(42);
/// let a = derive_sub_seed(&state, 3, 100).unwrap();
/// let b = derive_sub_seed(&state, 3, 100).unwrap();
/// assert_eq!(a, b);
/// ```
pub fn derive_sub_seed(state: &StreamState, index: u64, span: u64) -> Result<SubSeed> {
    SubSeedSequence::new(state, span)?.get(index)
}

/// Derives all `span` sub-seeds of a snapshot, in index order.
///
/// # Errors
///
/// Returns an error if `span` is invalid.
pub fn derive_sub_seeds(state: &StreamState, span: u64) -> Result<Vec<SubSeed>> {
    let mut sequence = SubSeedSequence::new(state, span)?;
    (0..span).map(|index| sequence.get(index)).collect()
}
