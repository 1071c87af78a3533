use std::sync::Arc;

use log::debug;

use crate::error::RevDiffError;
use crate::graph::{ComputationGraph, NodeIndex, SpecificId};

/// Backward fan-in of every node relative to one terminal set.
///
/// A node is live when at least one terminal is reachable from it. Its
/// fan-in is the number of successor links that point at live nodes, so
/// consumers that never receive a gradient do not hold the node back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyCounts {
    live: Vec<bool>,
    counts: Vec<usize>,
}

impl DependencyCounts {
    /// Number of contributions `idx` waits for before its backward fires.
    /// Zero for nodes that are not live.
    pub fn fan_in(&self, idx: NodeIndex) -> usize {
        self.counts.get(idx).copied().unwrap_or(0)
    }

    pub fn is_live(&self, idx: NodeIndex) -> bool {
        self.live.get(idx).copied().unwrap_or(false)
    }

    /// Number of live nodes.
    pub fn live_count(&self) -> usize {
        self.live.iter().filter(|l| **l).count()
    }

    /// Fan-in per node, in build order.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }
}

impl ComputationGraph {
    /// Computes backward fan-in relative to `terminals`.
    ///
    /// # Errors
    /// Returns `RevDiffError::UnknownNode` if a terminal key is not in the graph.
    pub fn count_dependencies(&self, terminals: &[SpecificId]) -> Result<DependencyCounts, RevDiffError> {
        let indices = terminals
            .iter()
            .map(|key| self.index_of(key))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.compute_dependencies(&indices))
    }

    /// Cached variant used by the backward visitor. The cache key is the
    /// sorted, deduplicated terminal set; the topology never changes after
    /// build, so an entry stays valid for the lifetime of the graph.
    pub(crate) fn dependency_counts_for(&mut self, terminals: &[NodeIndex]) -> Arc<DependencyCounts> {
        let mut key = terminals.to_vec();
        key.sort_unstable();
        key.dedup();
        if let Some(counts) = self.dependency_cache.get(&key) {
            return Arc::clone(counts);
        }
        let counts = Arc::new(self.compute_dependencies(&key));
        debug!(
            "Dependency pass: {} of {} nodes live for {} terminals",
            counts.live_count(),
            self.nodes.len(),
            key.len()
        );
        self.dependency_cache.insert(key, Arc::clone(&counts));
        counts
    }

    /// Number of cached terminal sets.
    pub fn cached_dependency_sets(&self) -> usize {
        self.dependency_cache.len()
    }

    fn compute_dependencies(&self, terminals: &[NodeIndex]) -> DependencyCounts {
        let n = self.nodes.len();
        let mut live = vec![false; n];
        let mut stack: Vec<NodeIndex> = terminals.to_vec();
        while let Some(idx) = stack.pop() {
            if live[idx] {
                continue;
            }
            live[idx] = true;
            stack.extend(self.nodes[idx].predecessors().filter(|p| !live[*p]));
        }

        let counts = self
            .nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| {
                if live[idx] {
                    node.successors.iter().filter(|s| live[**s]).count()
                } else {
                    0
                }
            })
            .collect();
        DependencyCounts { live, counts }
    }
}
