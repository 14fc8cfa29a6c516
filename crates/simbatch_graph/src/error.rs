//! Error types for model evaluation.

use thiserror::Error;

/// Errors that can occur while building or evaluating a model.
#[derive(Debug, Error)]
pub enum Error {
    /// No node with this name exists.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// A node with this name already exists.
    #[error("duplicate node: {0}")]
    DuplicateNode(String),

    /// A node's operation failed.
    #[error("node '{node}' failed: {source}")]
    Node {
        /// Name of the failing node.
        node: String,
        /// The operation error.
        #[source]
        source: simbatch_ops::Error,
    },

    /// Building an operation from its spec failed.
    #[error(transparent)]
    Operation(#[from] simbatch_ops::Error),

    /// Deriving the batch stream failed.
    #[error(transparent)]
    Random(#[from] simbatch_random::Error),

    /// A batch worker task could not be joined.
    #[error("batch worker failed: {0}")]
    Worker(String),
}

impl Error {
    /// The operation error behind a node failure.
    #[must_use]
    pub const fn node_error(&self) -> Option<&simbatch_ops::Error> {
        match self {
            Self::Node { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for model evaluation.
pub type Result<T> = std::result::Result<T, Error>;
