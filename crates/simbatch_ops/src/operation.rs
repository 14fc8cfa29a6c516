//! The batch operation calling convention.
//!
//! An operation receives its positional arguments plus a [`Call`], which
//! carries the batch size and, only when the operation asked for them, the
//! random stream, the item index and the call metadata.

use crate::error::{Error, Result};
use crate::registry::OperationSpec;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use simbatch_random::{RandomStream, SubSeed};
use std::fmt;
use std::sync::Arc;

/// Optional inputs an operation declares it wants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Wants {
    /// Pass the random stream.
    pub random_state: bool,
    /// Pass the zero-based position of the item inside its batch.
    pub index_in_batch: bool,
}

impl Wants {
    /// Wants nothing beyond positional arguments.
    pub const NONE: Self = Self {
        random_state: false,
        index_in_batch: false,
    };

    /// Wants the random stream.
    pub const RANDOM_STATE: Self = Self {
        random_state: true,
        index_in_batch: false,
    };

    /// Also wants the random stream.
    #[must_use]
    pub const fn with_random_state(mut self) -> Self {
        self.random_state = true;
        self
    }

    /// Also wants the item index.
    #[must_use]
    pub const fn with_index_in_batch(mut self) -> Self {
        self.index_in_batch = true;
        self
    }
}

/// Metadata of one batch call.
///
/// Only computed for operations that opted in to metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Seed for this call, or for this item inside a vectorized call.
    pub seed: SubSeed,
    /// Batch being generated.
    pub batch_index: u64,
    /// Number of items in the batch.
    pub batch_size: usize,
    /// Identifier of the call; shared by all items of that call.
    pub submission_index: u64,
    /// Item position, set inside a vectorized call.
    pub index_in_batch: Option<usize>,
}

/// Everything an operation receives besides its positional arguments.
#[derive(Debug)]
pub struct Call<'a> {
    /// Number of items in the batch.
    pub batch_size: usize,
    /// Random stream, if the operation wants one.
    pub random_state: Option<&'a mut RandomStream>,
    /// Item position, if the operation wants it.
    pub index_in_batch: Option<usize>,
    /// Call metadata, if metadata is enabled.
    pub meta: Option<Meta>,
}

impl<'a> Call<'a> {
    /// Creates a call carrying only the batch size.
    #[must_use]
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            random_state: None,
            index_in_batch: None,
            meta: None,
        }
    }

    /// Attaches a random stream.
    #[must_use]
    pub fn with_random_state(mut self, stream: &'a mut RandomStream) -> Self {
        self.random_state = Some(stream);
        self
    }

    /// Attaches the item index.
    #[must_use]
    pub fn with_index_in_batch(mut self, index: usize) -> Self {
        self.index_in_batch = Some(index);
        self
    }

    /// Attaches call metadata.
    #[must_use]
    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Returns the random stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingRandomState`] if the call carries none.
    pub fn random_state(&mut self) -> Result<&mut RandomStream> {
        self.random_state.as_deref_mut().ok_or(Error::MissingRandomState)
    }
}

/// A batch operation.
///
/// Implementations hold plain configuration only, so an equivalent
/// operation can be rebuilt on another worker from [`Operation::spec`].
pub trait Operation: Send + Sync + fmt::Debug {
    /// Optional inputs this operation wants.
    fn wants(&self) -> Wants;

    /// Runs the operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are invalid or the computation
    /// fails.
    fn call(&self, args: &[Value], call: &mut Call<'_>) -> Result<Value>;

    /// Plain-data description of this operation.
    fn spec(&self) -> OperationSpec;
}

impl<T: Operation + ?Sized> Operation for Arc<T> {
    fn wants(&self) -> Wants {
        (**self).wants()
    }

    fn call(&self, args: &[Value], call: &mut Call<'_>) -> Result<Value> {
        (**self).call(args, call)
    }

    fn spec(&self) -> OperationSpec {
        (**self).spec()
    }
}

type Function = dyn Fn(&[Value], &mut Call<'_>) -> Result<Value> + Send + Sync;

/// An operation backed by a named Rust function.
///
/// The name is what travels in an [`OperationSpec`]; the worker resolves it
/// through its [`Registry`](crate::Registry).
#[derive(Clone)]
pub struct FnOperation {
    name: String,
    wants: Wants,
    func: Arc<Function>,
}

impl FnOperation {
    /// Wraps a function under a name.
    pub fn new<F>(name: impl Into<String>, wants: Wants, func: F) -> Self
    where
        F: Fn(&[Value], &mut Call<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            wants,
            func: Arc::new(func),
        }
    }

    /// Name the function is registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for FnOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOperation")
            .field("name", &self.name)
            .field("wants", &self.wants)
            .finish_non_exhaustive()
    }
}

impl Operation for FnOperation {
    fn wants(&self) -> Wants {
        self.wants
    }

    fn call(&self, args: &[Value], call: &mut Call<'_>) -> Result<Value> {
        (self.func)(args, call)
    }

    fn spec(&self) -> OperationSpec {
        OperationSpec::Function {
            name: self.name.clone(),
        }
    }
}
