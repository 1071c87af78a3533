//! Data-parallel drivers over independent graph instances that share a
//! topology (for example one graph per batch shard).

use log::{debug, error};
use rayon::prelude::*;

use crate::error::RevDiffError;
use crate::graph::{BackwardReport, ComputationGraph, SpecificId};
use crate::tensor::Tensor;

/// Runs `forward` on every graph.
///
/// # Errors
/// A single failing instance is returned as is; several are returned as
/// `RevDiffError::BackwardAggregate`.
pub fn forward_all(graphs: &mut [ComputationGraph], run_sequentially: bool) -> Result<(), RevDiffError> {
    let results: Vec<Result<(), RevDiffError>> = if run_sequentially {
        graphs.iter_mut().map(ComputationGraph::forward).collect()
    } else {
        graphs.par_iter_mut().map(ComputationGraph::forward).collect()
    };
    collect_results(results, "forward").map(|_| ())
}

/// Runs `backward` on every graph with its own seed list.
///
/// Each instance applies its own failure policy first; only instances
/// whose backward call returned an error count here.
///
/// # Errors
/// `ConfigurationError` if `seeds` and `graphs` differ in length. Otherwise
/// as [`forward_all`].
pub fn backward_all(
    graphs: &mut [ComputationGraph],
    seeds: &[Vec<(SpecificId, Tensor)>],
    run_sequentially: bool,
) -> Result<Vec<BackwardReport>, RevDiffError> {
    if graphs.len() != seeds.len() {
        return Err(RevDiffError::ConfigurationError(format!(
            "{} graphs but {} seed lists",
            graphs.len(),
            seeds.len()
        )));
    }
    let results: Vec<Result<BackwardReport, RevDiffError>> = if run_sequentially {
        graphs
            .iter_mut()
            .zip(seeds)
            .map(|(graph, seeds)| graph.backward(seeds))
            .collect()
    } else {
        graphs
            .par_iter_mut()
            .zip(seeds.par_iter())
            .map(|(graph, seeds)| graph.backward(seeds))
            .collect()
    };
    collect_results(results, "backward")
}

fn collect_results<T>(results: Vec<Result<T, RevDiffError>>, pass: &str) -> Result<Vec<T>, RevDiffError> {
    let total = results.len();
    let mut values = Vec::with_capacity(total);
    let mut errors = Vec::new();
    for (instance, result) in results.into_iter().enumerate() {
        match result {
            Ok(value) => values.push(value),
            Err(err) => {
                error!("Parallel {}: instance {} failed: {}", pass, instance, err);
                errors.push(err);
            }
        }
    }
    match errors.len() {
        0 => {
            debug!("Parallel {}: {} instances completed", pass, total);
            Ok(values)
        }
        1 => Err(errors.remove(0)),
        _ => Err(RevDiffError::BackwardAggregate(errors)),
    }
}
