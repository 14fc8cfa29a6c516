//! Model file format.
//!
//! A model file is a [`ModelSpec`] with an optional `context` section:
//!
//! ```yaml
//! name: echo
//! context:
//!   seed: 123
//!   batch_size: 3
//! nodes:
//!   - name: theta
//!     constant: 2.5
//!   - name: sim
//!     parents: [theta]
//!     uses_meta: true
//!     operation:
//!       kind: vectorize
//!       inner:
//!         kind: external
//!         template: ./simulate --theta {0} --seed {seed}
//!         process_result: float64
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use simbatch_graph::{ContextConfig, ModelSpec};
use std::fs;

/// Contents of a model file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    /// Computation context settings.
    #[serde(default)]
    pub context: ContextConfig,
    /// The model graph.
    #[serde(flatten)]
    pub model: ModelSpec,
}

impl ModelFile {
    /// Parses a model file from YAML (JSON is accepted too).
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).with_context(|| "Failed to parse model file")
    }

    /// Reads and parses a model file.
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read model file: {path}"))?;
        Self::parse(&content)
    }
}
