use crate::error::RevDiffError;
use crate::graph::SpecificId;
use crate::ops::Operation;
use crate::tensor::Tensor;

/// Position of a node in the graph's build order.
pub type NodeIndex = usize;

/// Where one input of a node comes from. Resolved once at build time.
#[derive(Debug, Clone)]
pub(crate) enum NodeInput {
    Node(NodeIndex),
    External(Tensor),
}

/// One operation instance in a built graph.
#[derive(Debug)]
pub struct OperationNode {
    pub(crate) key: SpecificId,
    pub(crate) type_name: String,
    pub(crate) op: Box<dyn Operation>,
    pub(crate) inputs: Vec<NodeInput>,
    /// One entry per consuming link, appended as consumers are built.
    pub(crate) successors: Vec<NodeIndex>,
    /// Persistent output slot, overwritten in place by each forward pass.
    pub(crate) output: Tensor,
    pub(crate) has_output: bool,
    /// Running sum of gradient contributions from successors.
    pub(crate) gradient: Tensor,
    pub(crate) has_gradient: bool,
    pub(crate) result_to: Option<(String, Tensor)>,
    /// Aligned with `inputs`.
    pub(crate) gradient_to: Vec<Option<Tensor>>,
}

impl OperationNode {
    pub fn key(&self) -> &SpecificId {
        &self.key
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Number of successor links recorded at build time.
    pub fn out_degree(&self) -> usize {
        self.successors.len()
    }

    /// Build-order indices of the consuming nodes, one per link.
    pub fn successors(&self) -> &[NodeIndex] {
        &self.successors
    }

    /// Build-order indices of the predecessor nodes, one per input link.
    pub fn predecessors(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.inputs.iter().filter_map(|input| match input {
            NodeInput::Node(idx) => Some(*idx),
            NodeInput::External(_) => None,
        })
    }

    /// The output slot once a forward pass has written it.
    pub fn output(&self) -> Option<Tensor> {
        self.has_output.then(|| self.output.clone())
    }

    /// The accumulated gradient once at least one contribution arrived.
    pub fn gradient(&self) -> Option<Tensor> {
        self.has_gradient.then(|| self.gradient.clone())
    }

    pub fn result_binding(&self) -> Option<&str> {
        self.result_to.as_ref().map(|(name, _)| name.as_str())
    }

    pub(crate) fn clear_state(&mut self) {
        self.has_output = false;
        self.has_gradient = false;
        self.gradient.fill(0.0);
    }

    /// Adds one backward contribution into this node's accumulator.
    pub(crate) fn accumulate_gradient(&mut self, contribution: &Tensor) -> Result<(), RevDiffError> {
        let expected = self.output.shape();
        let actual = contribution.shape();
        if self.has_output && expected != actual {
            return Err(RevDiffError::ShapeMismatch {
                expected,
                actual,
                operation: format!("gradient accumulation into {}", self.key),
            });
        }
        if self.has_gradient {
            self.gradient.add_assign(contribution)
        } else {
            self.gradient.assign(contribution);
            self.has_gradient = true;
            Ok(())
        }
    }
}
