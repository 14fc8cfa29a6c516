//! The process-wide ambient stream.
//!
//! Used whenever a run has no master seed. It is seeded from OS entropy on
//! first use unless [`seed`] was called beforehand, and nothing in this
//! workspace reseeds it while a run is in progress.

use crate::stream::StreamState;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing::debug;

static AMBIENT: OnceLock<Mutex<ChaCha8Rng>> = OnceLock::new();

fn cell() -> &'static Mutex<ChaCha8Rng> {
    AMBIENT.get_or_init(|| Mutex::new(ChaCha8Rng::from_entropy()))
}

/// Runs `f` with exclusive access to the ambient generator.
pub(crate) fn with<T>(f: impl FnOnce(&mut ChaCha8Rng) -> T) -> T {
    // A panic while drawing cannot leave the generator half-updated.
    let mut rng = cell().lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut rng)
}

/// Seeds the ambient stream.
///
/// Call this before a run to make unseeded runs reproducible.
pub fn seed(seed: u64) {
    debug!(seed, "Seeding ambient stream");
    with(|rng| *rng = ChaCha8Rng::seed_from_u64(seed));
}

/// Snapshot of the ambient stream's current position.
#[must_use]
pub fn state() -> StreamState {
    with(|rng| StreamState::capture(rng))
}
