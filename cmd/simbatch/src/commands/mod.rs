//! Command implementations.

pub mod run;
pub mod seeds;
