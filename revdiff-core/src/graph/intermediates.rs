use std::collections::HashSet;

use log::{debug, warn};

use crate::error::RevDiffError;
use crate::graph::node::NodeInput;
use crate::graph::ComputationGraph;
use crate::tensor::Tensor;

/// Deep copies of one node's working tensors. `None` means the slot held no
/// value when the snapshot was taken.
#[derive(Debug, Clone)]
struct NodeState {
    output: Option<Tensor>,
    gradient: Option<Tensor>,
}

/// Working tensors of every node, in build order, plus the external tensors
/// the graph reads or writes as `(bound handle, copy)`, one entry per storage.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    states: Vec<NodeState>,
    externals: Vec<(Tensor, Tensor)>,
}

impl ComputationGraph {
    /// Deep-copies every node's output and gradient accumulator under `id`,
    /// together with the external inputs and result slots bound at build time.
    ///
    /// Gradient destinations are not captured; they keep accumulating across
    /// restores. Storing under an id that is already in use replaces the
    /// older snapshot.
    pub fn store_intermediates(&mut self, id: impl Into<String>) {
        let id = id.into();
        let states = self
            .nodes
            .iter()
            .map(|node| NodeState {
                output: node.output().map(|t| t.deep_clone()),
                gradient: node.gradient().map(|t| t.deep_clone()),
            })
            .collect();

        let mut seen = HashSet::new();
        let mut externals = Vec::new();
        for node in &self.nodes {
            let inputs = node.inputs.iter().filter_map(|input| match input {
                NodeInput::External(tensor) => Some(tensor),
                NodeInput::Node(_) => None,
            });
            let results = node.result_to.iter().map(|(_, slot)| slot);
            for tensor in inputs.chain(results) {
                if seen.insert(tensor.storage_id()) {
                    externals.push((tensor.clone(), tensor.deep_clone()));
                }
            }
        }

        let external_count = externals.len();
        if self
            .snapshots
            .insert(id.clone(), Snapshot { states, externals })
            .is_some()
        {
            warn!("Intermediates: replaced an existing snapshot '{}'", id);
        }
        debug!(
            "Intermediates: stored '{}' ({} nodes, {} external tensors)",
            id,
            self.nodes.len(),
            external_count
        );
    }

    /// Overwrites every node's working tensors, and the external tensors
    /// captured with them, from the snapshot `id` and discards the snapshot.
    ///
    /// External inputs are rewound too, so a weight updated between store and
    /// restore goes back to its stored value.
    ///
    /// # Errors
    /// Returns `RevDiffError::UnknownSnapshot` if nothing is stored under `id`.
    pub fn restore_intermediates(&mut self, id: &str) -> Result<(), RevDiffError> {
        let snapshot = self
            .snapshots
            .remove(id)
            .ok_or_else(|| RevDiffError::UnknownSnapshot(id.to_string()))?;

        for (target, copy) in &snapshot.externals {
            target.assign(copy);
        }
        for (node, state) in self.nodes.iter_mut().zip(snapshot.states) {
            match state.output {
                Some(output) => {
                    node.output.assign(&output);
                    node.has_output = true;
                }
                None => node.has_output = false,
            }
            match state.gradient {
                Some(gradient) => {
                    node.gradient.assign(&gradient);
                    node.has_gradient = true;
                }
                None => {
                    node.gradient.fill(0.0);
                    node.has_gradient = false;
                }
            }
        }
        debug!("Intermediates: restored '{}'", id);
        Ok(())
    }

    pub fn has_snapshot(&self, id: &str) -> bool {
        self.snapshots.contains_key(id)
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Drops every stored snapshot.
    pub fn clear_snapshots(&mut self) {
        self.snapshots.clear();
    }
}
