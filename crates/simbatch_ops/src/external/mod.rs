//! External operation adapter.
//!
//! Wraps a command template into a batch operation. Each call renders the
//! template, runs one process, and decodes its standard output as `float64`
//! unless another [`ResultType`] is declared.
//! Combine with [`vectorize`](crate::vectorize) to run one process per item.
//!
//! # Example
//!
//! ```rust,ignore
//! use simbatch_ops::{external_operation, vectorize, ResultType};
//!
//! let sim = external_operation("./simulate --theta {0} --seed {seed}")?
//!     .with_process_result(ResultType::Float64);
//! let per_item = vectorize(sim);
//! ```

mod decode;
pub mod process;
mod template;

pub use decode::ResultType;
pub use template::{Bindings, CommandTemplate, Placeholder};

use crate::error::{Error, ExternalError, Result};
use crate::operation::{Call, Operation, Wants};
use crate::registry::OperationSpec;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Creates an external operation from a template.
///
/// # Errors
///
/// Returns an error if the template is malformed.
pub fn external_operation(template: &str) -> Result<ExternalOperation> {
    ExternalOperation::new(template)
}

/// A batch operation backed by an external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalOperation {
    template: CommandTemplate,
    #[serde(default)]
    process_result: Option<ResultType>,
}

impl ExternalOperation {
    /// Parses a template into an operation with no declared output type.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is malformed.
    pub fn new(template: &str) -> Result<Self> {
        Ok(Self::from_template(CommandTemplate::parse(template)?))
    }

    /// Creates an operation from a parsed template.
    #[must_use]
    pub const fn from_template(template: CommandTemplate) -> Self {
        Self {
            template,
            process_result: None,
        }
    }

    /// Decodes standard output as `result_type`.
    #[must_use]
    pub const fn with_process_result(mut self, result_type: ResultType) -> Self {
        self.process_result = Some(result_type);
        self
    }

    /// The command template.
    #[must_use]
    pub const fn template(&self) -> &CommandTemplate {
        &self.template
    }

    /// The declared output type, if any.
    #[must_use]
    pub const fn process_result(&self) -> Option<ResultType> {
        self.process_result
    }

    /// Renders the command line for a call without running it.
    ///
    /// Draws the seed from the call's stream when the template needs one and
    /// no metadata is attached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MisconfiguredMetadata`] if the template uses a
    /// metadata placeholder the call cannot fill, or
    /// [`Error::MissingArgument`] for a missing positional argument.
    pub fn command_line(&self, args: &[Value], call: &mut Call<'_>) -> Result<Vec<String>> {
        if call.meta.is_none() {
            if let Some(placeholder) = self.template.first_meta_placeholder() {
                return Err(Error::misconfigured(
                    placeholder.to_string(),
                    "metadata is not enabled for this operation",
                ));
            }
        }

        let seed = if self.template.uses(Placeholder::Seed) {
            match call.meta {
                Some(meta) => Some(meta.seed),
                None => Some(call.random_state()?.next_sub_seed()),
            }
        } else {
            None
        };

        self.template.render(&Bindings {
            args,
            seed,
            batch_index: call.meta.map(|m| m.batch_index),
            index_in_batch: call.meta.and_then(|m| m.index_in_batch),
            submission_index: call.meta.map(|m| m.submission_index),
        })
    }

    fn decode(&self, output: process::CommandOutput) -> Result<Value> {
        let result_type = self.process_result.unwrap_or_default();
        result_type.decode(&output.stdout).map_err(|reason| {
            Error::External(ExternalError::Decode {
                command: output.command,
                result_type,
                stdout: output.stdout,
                reason,
            })
        })
    }
}

impl Operation for ExternalOperation {
    fn wants(&self) -> Wants {
        Wants {
            random_state: self.template.uses(Placeholder::Seed),
            index_in_batch: false,
        }
    }

    fn call(&self, args: &[Value], call: &mut Call<'_>) -> Result<Value> {
        let argv = self.command_line(args, call)?;
        let output = process::run(&argv)?.check_status()?;
        self.decode(output)
    }

    fn spec(&self) -> OperationSpec {
        OperationSpec::External {
            template: self.template.clone(),
            process_result: self.process_result,
        }
    }
}
