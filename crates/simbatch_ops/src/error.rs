//! Error types for batch operations.

use crate::external::ResultType;
use thiserror::Error;

/// Errors that can occur while calling a batch operation.
#[derive(Debug, Error)]
pub enum Error {
    /// A per-item argument does not hold one entry per batch item.
    #[error("argument {position} has {actual} items, expected batch size {expected}")]
    InvalidBatchSize {
        /// Position of the offending argument.
        position: usize,
        /// Declared batch size.
        expected: usize,
        /// Number of items found.
        actual: usize,
    },

    /// A metadata placeholder cannot be filled for this call.
    #[error("metadata placeholder '{{{placeholder}}}' cannot be filled: {reason}")]
    MisconfiguredMetadata {
        /// Placeholder name without braces.
        placeholder: String,
        /// Why the value is unavailable.
        reason: String,
    },

    /// An external command failed.
    #[error(transparent)]
    External(#[from] ExternalError),

    /// The command template is malformed.
    #[error("invalid command template '{template}': {reason}")]
    Template {
        /// The template text.
        template: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A positional placeholder refers to an argument that was not passed.
    #[error("placeholder {{{position}}} has no argument ({provided} provided)")]
    MissingArgument {
        /// Placeholder position.
        position: usize,
        /// Number of arguments passed.
        provided: usize,
    },

    /// The operation needs a random stream but none was supplied.
    #[error("operation requires a random stream but none was supplied")]
    MissingRandomState,

    /// A value has the wrong shape or type for the operation.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Expected kind of value.
        expected: &'static str,
        /// Kind of value found.
        found: &'static str,
    },

    /// No function with this name is registered.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// A wrapped function reported a failure.
    #[error("operation failed: {0}")]
    Operation(String),

    /// Random stream derivation failed.
    #[error(transparent)]
    Random(#[from] simbatch_random::Error),
}

impl Error {
    /// Creates a metadata misconfiguration error.
    pub fn misconfigured(placeholder: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MisconfiguredMetadata {
            placeholder: placeholder.into(),
            reason: reason.into(),
        }
    }

    /// Creates an error for a failing wrapped function.
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation(message.into())
    }
}

/// Failures of an external command, one variant per execution step.
#[derive(Debug, Error)]
pub enum ExternalError {
    /// The rendered command line is empty.
    #[error("command line is empty")]
    EmptyCommand,

    /// The process could not be started.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// Rendered command line.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The process exited unsuccessfully.
    #[error("'{command}' exited unsuccessfully (code {code:?}): {stderr}")]
    NonZeroExit {
        /// Rendered command line.
        command: String,
        /// Exit code, `None` if killed by a signal.
        code: Option<i32>,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },

    /// Standard output could not be decoded.
    #[error("cannot decode output of '{command}' as {result_type}: {reason}")]
    Decode {
        /// Rendered command line.
        command: String,
        /// Requested result type.
        result_type: ResultType,
        /// Captured standard output.
        stdout: String,
        /// Why decoding failed.
        reason: String,
    },
}

/// Result type alias for batch operations.
pub type Result<T> = std::result::Result<T, Error>;
