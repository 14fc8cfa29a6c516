//! Batch evaluation of simulator models.
//!
//! This crate provides:
//! - [`ComputationContext`]: the master seed and batch stream cache of a run
//! - [`Model`]: a minimal graph of constants and batch operations
//! - [`Client`]: evaluates one node of a model for a given batch index
//!
//! # Example
//!
//! ```rust,ignore
//! use simbatch_graph::{Client, ComputationContext, ContextConfig, Model};
//!
//! let context = ComputationContext::new(ContextConfig::default().with_seed(123))?;
//! let mut model = Model::new("m", context.into());
//! model.add_constant("theta", 2.0.into())?;
//! model.add_operation("sim", simulator, &["theta"])?;
//!
//! let batch = Client::new().compute_batch(&model, "sim", 0)?;
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod client;
pub mod context;
pub mod error;
pub mod model;

pub use client::{Batch, Client};
pub use context::{ComputationContext, ContextConfig};
pub use error::{Error, Result};
pub use model::{Model, ModelSpec, Node, NodeKind, NodeSpec, NodeSpecKind};
