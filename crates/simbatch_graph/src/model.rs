//! A minimal model graph.
//!
//! Nodes are added in dependency order: every parent must exist before the
//! node that reads it, so insertion order is already a topological order.

use crate::context::ComputationContext;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use simbatch_ops::{Operation, OperationSpec, Registry, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// What a node computes.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A fixed value, identical for every batch.
    Constant(Value),
    /// A batch operation over the parents' outputs.
    Operation {
        /// The operation.
        op: Arc<dyn Operation>,
        /// Whether the operation receives call metadata.
        uses_meta: bool,
    },
}

/// A named node of the model.
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    parents: Vec<String>,
    kind: NodeKind,
}

impl Node {
    /// Node name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the nodes feeding this one, in argument order.
    #[must_use]
    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    /// What the node computes.
    #[must_use]
    pub const fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Whether the node receives call metadata.
    #[must_use]
    pub const fn uses_meta(&self) -> bool {
        matches!(self.kind, NodeKind::Operation { uses_meta: true, .. })
    }
}

/// A model: named nodes plus the computation context they run under.
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    context: Arc<ComputationContext>,
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl Model {
    /// Creates an empty model.
    pub fn new(name: impl Into<String>, context: Arc<ComputationContext>) -> Self {
        Self {
            name: name.into(),
            context,
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Model name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The computation context.
    #[must_use]
    pub const fn computation_context(&self) -> &Arc<ComputationContext> {
        &self.context
    }

    /// Replaces the computation context.
    pub fn set_computation_context(&mut self, context: Arc<ComputationContext>) {
        self.context = context;
    }

    /// Looks up a node.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Adds a constant node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateNode`] if the name is taken.
    pub fn add_constant(&mut self, name: impl Into<String>, value: Value) -> Result<&mut Self> {
        self.insert(name.into(), Vec::new(), NodeKind::Constant(value))
    }

    /// Adds an operation node reading `parents` as its positional arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or a parent does not exist.
    pub fn add_operation(
        &mut self,
        name: impl Into<String>,
        op: impl Operation + 'static,
        parents: &[&str],
    ) -> Result<&mut Self> {
        self.add_shared_operation(name, Arc::new(op), parents)
    }

    /// Adds an already shared operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or a parent does not exist.
    pub fn add_shared_operation(
        &mut self,
        name: impl Into<String>,
        op: Arc<dyn Operation>,
        parents: &[&str],
    ) -> Result<&mut Self> {
        let parents = parents.iter().map(|p| (*p).to_string()).collect();
        self.insert(
            name.into(),
            parents,
            NodeKind::Operation {
                op,
                uses_meta: false,
            },
        )
    }

    /// Turns metadata on or off for an operation node.
    ///
    /// Constants ignore the flag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownNode`] if the node does not exist.
    pub fn set_uses_meta(&mut self, name: &str, enabled: bool) -> Result<&mut Self> {
        let i = *self
            .index
            .get(name)
            .ok_or_else(|| Error::UnknownNode(name.to_string()))?;
        if let NodeKind::Operation { uses_meta, .. } = &mut self.nodes[i].kind {
            *uses_meta = enabled;
        }
        Ok(self)
    }

    /// Returns `target` and all its ancestors in evaluation order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownNode`] if the target does not exist.
    pub fn evaluation_order(&self, target: &str) -> Result<Vec<&Node>> {
        let start = *self
            .index
            .get(target)
            .ok_or_else(|| Error::UnknownNode(target.to_string()))?;

        let mut needed = BTreeSet::new();
        let mut pending = vec![start];
        while let Some(i) = pending.pop() {
            if needed.insert(i) {
                pending.extend(self.nodes[i].parents.iter().map(|p| self.index[p]));
            }
        }

        Ok(needed.into_iter().map(|i| &self.nodes[i]).collect())
    }

    /// Plain-data description of the model.
    pub fn spec(&self) -> ModelSpec {
        ModelSpec {
            name: self.name.clone(),
            nodes: self
                .nodes
                .iter()
                .map(|node| NodeSpec {
                    name: node.name.clone(),
                    parents: node.parents.clone(),
                    uses_meta: node.uses_meta(),
                    kind: match &node.kind {
                        NodeKind::Constant(value) => NodeSpecKind::Constant(value.clone()),
                        NodeKind::Operation { op, .. } => NodeSpecKind::Operation(op.spec()),
                    },
                })
                .collect(),
        }
    }

    /// Rebuilds a model from its description.
    ///
    /// # Errors
    ///
    /// Returns an error if an operation cannot be built or the nodes are
    /// not in dependency order.
    pub fn from_spec(
        spec: &ModelSpec,
        registry: &Registry,
        context: Arc<ComputationContext>,
    ) -> Result<Self> {
        let mut model = Self::new(spec.name.clone(), context);
        for node in &spec.nodes {
            match &node.kind {
                NodeSpecKind::Constant(value) => {
                    model.add_constant(node.name.clone(), value.clone())?;
                }
                NodeSpecKind::Operation(op) => {
                    let parents: Vec<&str> = node.parents.iter().map(String::as_str).collect();
                    model.add_shared_operation(node.name.clone(), registry.build(op)?, &parents)?;
                    model.set_uses_meta(&node.name, node.uses_meta)?;
                }
            }
        }
        Ok(model)
    }

    fn insert(&mut self, name: String, parents: Vec<String>, kind: NodeKind) -> Result<&mut Self> {
        if self.index.contains_key(&name) {
            return Err(Error::DuplicateNode(name));
        }
        if let Some(missing) = parents.iter().find(|p| !self.index.contains_key(p.as_str())) {
            return Err(Error::UnknownNode(missing.clone()));
        }
        self.index.insert(name.clone(), self.nodes.len());
        self.nodes.push(Node {
            name,
            parents,
            kind,
        });
        Ok(self)
    }
}

/// Plain-data description of a [`Model`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model name.
    pub name: String,
    /// Nodes in dependency order.
    pub nodes: Vec<NodeSpec>,
}

/// Plain-data description of a [`Node`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Node name.
    pub name: String,
    /// Parent node names, in argument order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
    /// Whether the operation receives call metadata.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub uses_meta: bool,
    /// What the node computes.
    #[serde(flatten)]
    pub kind: NodeSpecKind,
}

/// What a described node computes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeSpecKind {
    /// A fixed value.
    Constant(Value),
    /// A batch operation.
    Operation(OperationSpec),
}
