//! Plain-data operation descriptions and the registry that rebuilds them.
//!
//! An [`OperationSpec`] holds no live state: functions are referenced by
//! name, adapters by their configuration. Shipping a spec to a worker and
//! building it there with the same [`Registry`] yields an equivalent
//! operation.

use crate::error::{Error, Result};
use crate::external::{CommandTemplate, ExternalOperation, ResultType};
use crate::operation::{FnOperation, Operation};
use crate::vectorize::{Constants, Vectorized};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Description of a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationSpec {
    /// A registered function.
    Function {
        /// Registry name.
        name: String,
    },
    /// An operation applied item by item.
    Vectorize {
        /// The wrapped operation.
        inner: Box<OperationSpec>,
        /// Positions broadcast to every item.
        #[serde(default)]
        constants: Constants,
    },
    /// An external command.
    External {
        /// Command template.
        template: CommandTemplate,
        /// How to decode standard output.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        process_result: Option<ResultType>,
    },
}

/// Named functions available to [`OperationSpec::Function`].
#[derive(Debug, Clone, Default)]
pub struct Registry {
    functions: HashMap<String, Arc<FnOperation>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function under its name, replacing any previous one.
    pub fn register(&mut self, op: FnOperation) -> &mut Self {
        self.functions.insert(op.name().to_string(), Arc::new(op));
        self
    }

    /// Returns true if a function with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Builds the operation a spec describes.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec names an unregistered function.
    pub fn build(&self, spec: &OperationSpec) -> Result<Arc<dyn Operation>> {
        match spec {
            OperationSpec::Function { name } => {
                let op = self
                    .functions
                    .get(name)
                    .ok_or_else(|| Error::UnknownOperation(name.clone()))?;
                Ok(Arc::clone(op) as Arc<dyn Operation>)
            }
            OperationSpec::Vectorize { inner, constants } => Ok(Arc::new(Vectorized::new(
                self.build(inner)?,
                constants.clone(),
            ))),
            OperationSpec::External {
                template,
                process_result,
            } => {
                let mut op = ExternalOperation::from_template(template.clone());
                if let Some(result_type) = process_result {
                    op = op.with_process_result(*result_type);
                }
                Ok(Arc::new(op))
            }
        }
    }
}
