//! Reproducible random streams for batch simulation.
//!
//! This crate provides:
//! - Sub-seed derivation from a stream snapshot (pure, reproducible)
//! - Seeded and ambient random streams behind one [`rand::RngCore`] interface
//! - Per-batch random state derived from a single master seed
//!
//! # Example
//!
//! ```rust
//! use rand::RngCore;
//! use simbatch_random::BatchRandomState;
//!
//! let states = BatchRandomState::new(Some(123), 1_000).unwrap();
//! let a = states.stream_for(0).unwrap().next_u64();
//! let b = states.stream_for(0).unwrap().next_u64();
//! assert_eq!(a, b);
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod ambient;
pub mod batch;
pub mod error;
pub mod stream;
pub mod subseed;

pub use batch::{stream_for, BatchRandomState, DEFAULT_MAX_BATCHES};
pub use error::{Error, Result};
pub use stream::{RandomStream, StreamState};
pub use subseed::{derive_sub_seed, derive_sub_seeds, SubSeed, SubSeedSequence, SUB_SEED_BOUND};
