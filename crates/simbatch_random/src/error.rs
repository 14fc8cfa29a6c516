//! Error types for random stream derivation.

use thiserror::Error;

/// Errors that can occur when deriving sub-seeds or batch streams.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The requested index lies outside the derivation span.
    #[error("index {index} is outside the sub-seed span of {span}")]
    IndexOutOfSpan {
        /// Requested index.
        index: u64,
        /// Span the index must be below.
        span: u64,
    },

    /// A span of zero admits no index at all.
    #[error("sub-seed span must be at least 1")]
    EmptySpan,

    /// The span asks for more distinct sub-seeds than exist.
    #[error("sub-seed span {span} exceeds the {max} distinct sub-seeds available")]
    SpanTooLarge {
        /// Requested span.
        span: u64,
        /// Number of distinct sub-seeds.
        max: u64,
    },
}

/// Result type alias for random stream operations.
pub type Result<T> = std::result::Result<T, Error>;
