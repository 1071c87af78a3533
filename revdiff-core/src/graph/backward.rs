use log::{debug, error, warn};
use rayon::prelude::*;

use crate::error::RevDiffError;
use crate::graph::node::NodeInput;
use crate::graph::{ComputationGraph, FailurePolicy, NodeIndex, SpecificId};
use crate::tensor::Tensor;

/// Outcome of a completed backward pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackwardReport {
    /// Nodes whose backward transform ran successfully.
    pub visited: usize,
    /// Live nodes that received no gradient and were passed over.
    pub skipped: usize,
    /// Nodes whose backward transform or gradient delivery failed.
    pub failures: Vec<(SpecificId, RevDiffError)>,
}

impl BackwardReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of evaluating one ready node.
enum NodeOutcome {
    Gradients(Vec<Tensor>),
    NoGradient,
    Failed(RevDiffError),
}

impl ComputationGraph {
    /// Propagates `seeds` (terminal key, gradient of the loss with respect to
    /// that node's output) back through the graph.
    ///
    /// A node's backward transform fires once every live successor has
    /// delivered its contribution. Ready nodes form waves; a wave is
    /// evaluated in parallel unless `GraphOptions::run_sequentially` is set,
    /// and its contributions are then applied in descending build order, so
    /// results do not depend on scheduling.
    ///
    /// Gradients for inputs with a gradient destination are added into that
    /// tensor in place. Destination tensors are never zeroed here.
    ///
    /// # Errors
    /// * `MissingArgument` if `seeds` is empty, `UnknownNode` for an unknown
    ///   terminal, a shape error if a seed does not match its node's output.
    /// * Node failures follow `GraphOptions::failure_policy`. Under
    ///   `TolerateSingle` one failure is logged and returned in the report,
    ///   two or more fail the call with `RevDiffError::BackwardAggregate`.
    pub fn backward(&mut self, seeds: &[(SpecificId, Tensor)]) -> Result<BackwardReport, RevDiffError> {
        if seeds.is_empty() {
            return Err(RevDiffError::MissingArgument("seed gradients"));
        }
        let terminals = seeds
            .iter()
            .map(|(key, _)| self.index_of(key))
            .collect::<Result<Vec<_>, _>>()?;

        for node in &mut self.nodes {
            node.has_gradient = false;
        }
        for (&idx, (_, seed)) in terminals.iter().zip(seeds) {
            self.nodes[idx].accumulate_gradient(seed)?;
        }

        let dependencies = self.dependency_counts_for(&terminals);
        // Local to this call, so the next pass starts from the cached counts.
        let mut pending: Vec<usize> = dependencies.counts().to_vec();

        let mut report = BackwardReport::default();
        let mut wave: Vec<NodeIndex> = (0..self.nodes.len())
            .filter(|&idx| dependencies.is_live(idx) && pending[idx] == 0)
            .collect();

        while !wave.is_empty() {
            wave.sort_unstable_by(|a, b| b.cmp(a));
            let outcomes: Vec<(NodeIndex, NodeOutcome)> = if self.options.run_sequentially || wave.len() == 1 {
                wave.iter().map(|&idx| (idx, self.evaluate_backward(idx))).collect()
            } else {
                let graph: &ComputationGraph = self;
                wave.par_iter().map(|&idx| (idx, graph.evaluate_backward(idx))).collect()
            };

            let mut next = Vec::new();
            for (idx, outcome) in outcomes {
                match outcome {
                    NodeOutcome::Gradients(gradients) => match self.deliver(idx, &gradients) {
                        Ok(()) => report.visited += 1,
                        Err(err) => self.record_failure(&mut report, idx, err),
                    },
                    NodeOutcome::NoGradient => report.skipped += 1,
                    NodeOutcome::Failed(err) => self.record_failure(&mut report, idx, err),
                }

                // Released on every outcome so the traversal always drains.
                let predecessors: Vec<NodeIndex> = self.nodes[idx].predecessors().collect();
                for pred in predecessors {
                    if !dependencies.is_live(pred) {
                        continue;
                    }
                    pending[pred] = pending[pred].saturating_sub(1);
                    if pending[pred] == 0 {
                        next.push(pred);
                    }
                }
            }
            wave = next;
        }

        debug!(
            "Backward: {} nodes visited, {} skipped, {} failed",
            report.visited,
            report.skipped,
            report.failures.len()
        );
        self.apply_failure_policy(report)
    }

    fn evaluate_backward(&self, idx: NodeIndex) -> NodeOutcome {
        let node = &self.nodes[idx];
        let Some(gradient) = node.gradient() else {
            return NodeOutcome::NoGradient;
        };
        let Some(output) = node.output() else {
            return NodeOutcome::Failed(RevDiffError::MissingOutput(node.key.to_string()));
        };
        let inputs = match self.gather_inputs(idx) {
            Ok(inputs) => inputs,
            Err(err) => return NodeOutcome::Failed(err),
        };
        match node.op.backward(&inputs, &output, &gradient) {
            Ok(gradients) if gradients.len() == inputs.len() => NodeOutcome::Gradients(gradients),
            Ok(gradients) => NodeOutcome::Failed(RevDiffError::BackwardError(format!(
                "{} returned {} gradients for {} inputs",
                node.type_name,
                gradients.len(),
                inputs.len()
            ))),
            Err(err) => NodeOutcome::Failed(err),
        }
    }

    /// Adds one node's input gradients into its predecessors and
    /// gradient destinations. Keeps going after an error and returns the first.
    fn deliver(&mut self, idx: NodeIndex, gradients: &[Tensor]) -> Result<(), RevDiffError> {
        let inputs = self.nodes[idx].inputs.clone();
        let destinations = self.nodes[idx].gradient_to.clone();
        let mut first_error = None;

        for (position, (input, gradient)) in inputs.iter().zip(gradients).enumerate() {
            if let Some(Some(destination)) = destinations.get(position) {
                if let Err(err) = destination.add_assign(gradient) {
                    first_error.get_or_insert(err);
                }
            }
            if let NodeInput::Node(pred) = input {
                if let Err(err) = self.nodes[*pred].accumulate_gradient(gradient) {
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn record_failure(&self, report: &mut BackwardReport, idx: NodeIndex, err: RevDiffError) {
        let key = self.nodes[idx].key.clone();
        error!("Backward: node {} failed: {}", key, err);
        report.failures.push((key, err));
    }

    fn apply_failure_policy(&self, report: BackwardReport) -> Result<BackwardReport, RevDiffError> {
        match (self.options.failure_policy, report.failures.len()) {
            (_, 0) => Ok(report),
            (FailurePolicy::TolerateSingle, 1) => {
                warn!("Backward: continuing after a single failed node");
                Ok(report)
            }
            (FailurePolicy::Strict, 1) => {
                let (key, err) = &report.failures[0];
                Err(RevDiffError::BackwardError(format!("node {key}: {err}")))
            }
            _ => Err(RevDiffError::BackwardAggregate(
                report
                    .failures
                    .into_iter()
                    .map(|(key, err)| RevDiffError::BackwardError(format!("node {key}: {err}")))
                    .collect(),
            )),
        }
    }
}
