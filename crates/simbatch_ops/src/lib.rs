//! Batch operation adapters for simbatch.
//!
//! This crate provides:
//! - The batch calling convention ([`Operation`], [`Call`], [`Meta`])
//! - [`vectorize`], turning a single-item operation into a batch operation
//! - [`external_operation`], turning a command template into an operation
//! - Plain-data [`OperationSpec`]s and a [`Registry`] to rebuild operations
//!   on another worker
//!
//! # Example
//!
//! ```rust
//! use simbatch_ops::{vectorize, Call, FnOperation, Operation, Value, Wants};
//!
//! let multiply = FnOperation::new("multiply", Wants::NONE, |args, _call| {
//!     Ok(Value::Int(args[0].as_int()? * args[1].as_int()?))
//! });
//! let batch = vectorize(multiply);
//!
//! let out = batch
//!     .call(
//!         &[Value::from(vec![1, 2, 3]), Value::from(vec![3, 2, 1])],
//!         &mut Call::new(3),
//!     )
//!     .unwrap();
//! assert_eq!(out, Value::from(vec![3, 4, 3]));
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod external;
pub mod operation;
pub mod registry;
pub mod value;
pub mod vectorize;

pub use error::{Error, ExternalError, Result};
pub use external::{external_operation, CommandTemplate, ExternalOperation, Placeholder, ResultType};
pub use operation::{Call, FnOperation, Meta, Operation, Wants};
pub use registry::{OperationSpec, Registry};
pub use value::Value;
pub use vectorize::{vectorize, vectorize_with, Constants, VectorizeConfig, Vectorized};
