use log::{debug, warn};

use crate::error::RevDiffError;
use crate::graph::node::NodeInput;
use crate::graph::{ComputationGraph, NanPolicy, NodeIndex};
use crate::tensor::Tensor;

impl ComputationGraph {
    /// Marks every node as having no output and no gradient, and zeroes the
    /// gradient accumulators. Tensors keep their allocations.
    pub fn clear_state(&mut self) {
        for node in &mut self.nodes {
            node.clear_state();
        }
    }

    /// Runs every node in build order.
    ///
    /// Node state is cleared once before the pass. Each output is written
    /// into the node's persistent output slot and, if the node has a result
    /// binding, copied into the bound tensor.
    ///
    /// # Errors
    /// Propagates the first failing operation. With `NanPolicy::Error`, a
    /// non-finite output aborts the pass with `RevDiffError::NonFiniteOutput`.
    pub fn forward(&mut self) -> Result<(), RevDiffError> {
        self.clear_state();
        let mut non_finite = 0usize;
        for idx in 0..self.nodes.len() {
            let inputs = self.gather_inputs(idx)?;
            let node = &self.nodes[idx];
            let result = node.op.forward(&inputs)?;

            if self.options.nan_policy != NanPolicy::Ignore && !result.is_finite() {
                match self.options.nan_policy {
                    NanPolicy::Error => {
                        return Err(RevDiffError::NonFiniteOutput(node.key.to_string()));
                    }
                    _ => {
                        warn!("Forward: node {} produced a non-finite output", node.key);
                        non_finite += 1;
                    }
                }
            }

            let node = &mut self.nodes[idx];
            node.output.assign(&result);
            node.has_output = true;
            if let Some((_, slot)) = &node.result_to {
                slot.assign(&node.output);
            }
        }
        debug!(
            "Forward: evaluated {} nodes ({} non-finite)",
            self.nodes.len(),
            non_finite
        );
        Ok(())
    }

    /// Input tensors of `idx`, by handle. Predecessor outputs are shared, not copied.
    pub(crate) fn gather_inputs(&self, idx: NodeIndex) -> Result<Vec<Tensor>, RevDiffError> {
        self.nodes[idx]
            .inputs
            .iter()
            .map(|input| match input {
                NodeInput::External(tensor) => Ok(tensor.clone()),
                NodeInput::Node(pred) => {
                    let pred = &self.nodes[*pred];
                    pred.output()
                        .ok_or_else(|| RevDiffError::MissingOutput(pred.key.to_string()))
                }
            })
            .collect()
    }
}
