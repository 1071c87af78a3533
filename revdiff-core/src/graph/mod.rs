//! The computation-graph execution engine.
//!
//! A [`ComputationGraph`] is built once from a [`NetworkArchitecture`]
//! (see [`GraphBuilder`]) and then driven many times:
//!
//! 1. [`ComputationGraph::forward`] clears node state and runs every node in
//!    build order.
//! 2. [`ComputationGraph::backward`] propagates seed gradients in reverse,
//!    firing a node only after every live successor has contributed.
//! 3. [`ComputationGraph::store_intermediates`] /
//!    [`ComputationGraph::restore_intermediates`] let several data groups
//!    share the topology within one training step.
//!
//! [`NetworkArchitecture`]: crate::architecture::NetworkArchitecture

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RevDiffError;
use crate::tensor::Tensor;

pub mod backward;
pub mod builder;
pub mod dependency;
pub mod forward;
pub mod intermediates;
pub mod key;
pub mod node;
pub mod parallel;
pub mod resolver;

pub use backward::BackwardReport;
pub use builder::GraphBuilder;
pub use dependency::DependencyCounts;
pub use key::SpecificId;
pub use node::{NodeIndex, OperationNode};
pub use resolver::{base_name, NameResolver, Resolved};

use intermediates::Snapshot;

/// What the forward executor does when a node produces NaN or infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NanPolicy {
    /// No check.
    Ignore,
    /// Log a warning and continue.
    #[default]
    Warn,
    /// Abort the forward pass with `RevDiffError::NonFiniteOutput`.
    Error,
}

/// How the backward visitor treats failing nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// A single failure is logged and the traversal completes; two or more
    /// are returned together as `RevDiffError::BackwardAggregate`.
    #[default]
    TolerateSingle,
    /// Any failure is returned to the caller.
    Strict,
}

/// Execution options of a graph. These tune engine behaviour only; model
/// hyperparameters live in [`crate::optim::TrainingConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphOptions {
    pub nan_policy: NanPolicy,
    pub failure_policy: FailurePolicy,
    /// Evaluate ready backward nodes one at a time instead of with rayon.
    pub run_sequentially: bool,
}

impl GraphOptions {
    pub fn with_nan_policy(mut self, nan_policy: NanPolicy) -> Self {
        self.nan_policy = nan_policy;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn sequential(mut self, run_sequentially: bool) -> Self {
        self.run_sequentially = run_sequentially;
        self
    }
}

/// A built, reusable graph of operation nodes.
#[derive(Debug)]
pub struct ComputationGraph {
    /// Nodes in build order, which is a topological order.
    pub(crate) nodes: Vec<OperationNode>,
    pub(crate) index: HashMap<SpecificId, NodeIndex>,
    pub(crate) options: GraphOptions,
    pub(crate) time_steps: usize,
    /// Keyed by the sorted terminal set.
    pub(crate) dependency_cache: HashMap<Vec<NodeIndex>, Arc<DependencyCounts>>,
    pub(crate) snapshots: HashMap<String, Snapshot>,
}

impl ComputationGraph {
    pub(crate) fn new(options: GraphOptions, time_steps: usize) -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            options,
            time_steps,
            dependency_cache: HashMap::new(),
            snapshots: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of time steps the graph was unrolled over.
    pub fn time_steps(&self) -> usize {
        self.time_steps
    }

    pub fn options(&self) -> GraphOptions {
        self.options
    }

    pub fn set_options(&mut self, options: GraphOptions) {
        self.options = options;
    }

    /// Nodes in build (topological) order.
    pub fn nodes(&self) -> &[OperationNode] {
        &self.nodes
    }

    pub fn node(&self, key: &SpecificId) -> Option<&OperationNode> {
        self.index.get(key).map(|&idx| &self.nodes[idx])
    }

    pub fn contains(&self, key: &SpecificId) -> bool {
        self.index.contains_key(key)
    }

    /// Build-order position of `key`.
    ///
    /// # Errors
    /// Returns `RevDiffError::UnknownNode` if no node has this key.
    pub fn index_of(&self, key: &SpecificId) -> Result<NodeIndex, RevDiffError> {
        self.index
            .get(key)
            .copied()
            .ok_or_else(|| RevDiffError::UnknownNode(key.to_string()))
    }

    /// The output slot of `key` after a forward pass.
    pub fn output(&self, key: &SpecificId) -> Option<Tensor> {
        self.node(key).and_then(OperationNode::output)
    }

    /// The accumulated gradient of `key` after a backward pass.
    pub fn gradient(&self, key: &SpecificId) -> Option<Tensor> {
        self.node(key).and_then(OperationNode::gradient)
    }

    /// Successor links recorded at build time, by key.
    pub fn out_degrees(&self) -> HashMap<SpecificId, usize> {
        self.nodes
            .iter()
            .map(|node| (node.key.clone(), node.out_degree()))
            .collect()
    }
}

#[cfg(test)]
#[path = "builder_test.rs"]
mod builder_tests;

#[cfg(test)]
#[path = "backward_test.rs"]
mod backward_tests;

#[cfg(test)]
#[path = "intermediates_test.rs"]
mod intermediates_tests;
