//! Vectorize adapter.
//!
//! Turns a single-item operation into a batch operation: list arguments are
//! split into their items, constants are broadcast, and each item gets its
//! own random sub-stream and position.
//!
//! # Example
//!
//! ```rust
//! use simbatch_ops::{vectorize_with, Call, FnOperation, Operation, Value, Wants};
//!
//! let scale = FnOperation::new("scale", Wants::NONE, |args, _| {
//!     Ok(Value::Int(args[0].as_int()? * args[1].as_int()?))
//! });
//! let batch = vectorize_with(scale, 1);
//!
//! let out = batch
//!     .call(&[Value::from(vec![1, 2, 3]), Value::Int(5)], &mut Call::new(3))
//!     .unwrap();
//! assert_eq!(out, Value::from(vec![5, 10, 15]));
//! ```

use crate::error::{Error, Result};
use crate::operation::{Call, Meta, Operation, Wants};
use crate::registry::OperationSpec;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use simbatch_random::{derive_sub_seeds, RandomStream, StreamState, SubSeed};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Argument positions broadcast unchanged to every item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Constants(BTreeSet<usize>);

impl Constants {
    /// No constant positions.
    #[must_use]
    pub const fn none() -> Self {
        Self(BTreeSet::new())
    }

    /// Returns true if `position` is a constant.
    #[must_use]
    pub fn contains(&self, position: usize) -> bool {
        self.0.contains(&position)
    }

    /// Constant positions in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }
}

impl From<usize> for Constants {
    fn from(position: usize) -> Self {
        Self(BTreeSet::from([position]))
    }
}

impl<const N: usize> From<[usize; N]> for Constants {
    fn from(positions: [usize; N]) -> Self {
        Self(BTreeSet::from(positions))
    }
}

impl From<Vec<usize>> for Constants {
    fn from(positions: Vec<usize>) -> Self {
        positions.into_iter().collect()
    }
}

impl FromIterator<usize> for Constants {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Inspectable configuration of a vectorized operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorizeConfig {
    /// Positions broadcast to every item.
    pub constants: Constants,
    /// What the wrapped operation asked for, read when it was wrapped.
    pub wants: Wants,
}

/// A single-item operation applied to every item of a batch.
#[derive(Debug, Clone)]
pub struct Vectorized {
    config: VectorizeConfig,
    target: Arc<dyn Operation>,
}

/// Vectorizes an operation with no constant arguments.
pub fn vectorize(op: impl Operation + 'static) -> Vectorized {
    vectorize_with(op, Constants::none())
}

/// Vectorizes an operation, broadcasting the arguments at `constants`.
pub fn vectorize_with(op: impl Operation + 'static, constants: impl Into<Constants>) -> Vectorized {
    Vectorized::new(Arc::new(op), constants.into())
}

impl Vectorized {
    /// Wraps a shared operation.
    #[must_use]
    pub fn new(target: Arc<dyn Operation>, constants: Constants) -> Self {
        let wants = target.wants();
        Self {
            config: VectorizeConfig { constants, wants },
            target,
        }
    }

    /// The adapter configuration.
    #[must_use]
    pub const fn config(&self) -> &VectorizeConfig {
        &self.config
    }

    /// The wrapped operation.
    #[must_use]
    pub fn target(&self) -> &Arc<dyn Operation> {
        &self.target
    }

    fn check_shapes(&self, args: &[Value], batch_size: usize) -> Result<()> {
        for (position, arg) in args.iter().enumerate() {
            if self.config.constants.contains(position) {
                continue;
            }
            if let Some(actual) = arg.len() {
                if actual != batch_size {
                    return Err(Error::InvalidBatchSize {
                        position,
                        expected: batch_size,
                        actual,
                    });
                }
            }
        }
        Ok(())
    }

    fn item_args(&self, args: &[Value], index: usize) -> Vec<Value> {
        args.iter()
            .enumerate()
            .map(|(position, arg)| match arg {
                Value::List(items) if !self.config.constants.contains(position) => {
                    items[index].clone()
                }
                other => other.clone(),
            })
            .collect()
    }

    /// Per-item sub-seeds, when items need streams or metadata.
    fn item_seeds(&self, call: &mut Call<'_>) -> Result<Option<Vec<SubSeed>>> {
        let base = if let Some(meta) = call.meta {
            meta.seed
        } else if self.config.wants.random_state {
            call.random_state()?.next_sub_seed()
        } else {
            return Ok(None);
        };

        let span = u64::try_from(call.batch_size).unwrap_or(u64::MAX);
        let seeds = derive_sub_seeds(&StreamState::from_sub_seed(base), span)?;
        Ok(Some(seeds))
    }
}

impl Operation for Vectorized {
    fn wants(&self) -> Wants {
        Wants {
            random_state: self.config.wants.random_state,
            index_in_batch: false,
        }
    }

    fn call(&self, args: &[Value], call: &mut Call<'_>) -> Result<Value> {
        let batch_size = call.batch_size;
        self.check_shapes(args, batch_size)?;
        if batch_size == 0 {
            return Ok(Value::List(Vec::new()));
        }

        debug!(
            batch_size,
            constants = ?self.config.constants,
            "Running vectorized operation"
        );

        let seeds = self.item_seeds(call)?;
        let wants = self.config.wants;
        let mut results = Vec::with_capacity(batch_size);

        for index in 0..batch_size {
            let item_args = self.item_args(args, index);
            let seed = seeds.as_ref().map(|seeds| seeds[index]);

            let mut stream = seed
                .filter(|_| wants.random_state)
                .map(RandomStream::from_sub_seed);
            let mut item = Call::new(1);
            if let Some(stream) = stream.as_mut() {
                item = item.with_random_state(stream);
            }
            if wants.index_in_batch {
                item = item.with_index_in_batch(index);
            }
            if let Some(meta) = call.meta {
                item = item.with_meta(Meta {
                    seed: seed.unwrap_or(meta.seed),
                    index_in_batch: Some(index),
                    ..meta
                });
            }

            results.push(self.target.call(&item_args, &mut item)?);
        }

        Ok(Value::List(results))
    }

    fn spec(&self) -> OperationSpec {
        OperationSpec::Vectorize {
            inner: Box::new(self.target.spec()),
            constants: self.config.constants.clone(),
        }
    }
}
