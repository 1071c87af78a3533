use approx::assert_relative_eq;

use crate::architecture::{NetworkArchitecture, OperationSpec, TimeStepSpec};
use crate::error::RevDiffError;
use crate::graph::{
    ComputationGraph, FailurePolicy, GraphBuilder, GraphOptions, NameResolver, SpecificId,
};
use crate::ops::{Operation, OperationRegistry};
use crate::tensor::{full, zeros, Tensor};
use crate::utils::testing::{check_tensor_near, init_test_logger};

/// Identity forward, always-failing backward.
#[derive(Debug, Default)]
struct FailingOp;

impl Operation for FailingOp {
    fn type_name(&self) -> &'static str {
        "Failing"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor, RevDiffError> {
        Ok(inputs[0].deep_clone())
    }

    fn backward(&self, _: &[Tensor], _: &Tensor, _: &Tensor) -> Result<Vec<Tensor>, RevDiffError> {
        Err(RevDiffError::BackwardError("deliberate failure".to_string()))
    }
}

fn failing() -> Box<dyn Operation> {
    Box::new(FailingOp)
}

fn registry() -> OperationRegistry {
    let mut registry = OperationRegistry::with_builtins();
    registry.register("Failing", failing);
    registry
}

fn start_only(ops: Vec<OperationSpec>) -> NetworkArchitecture {
    NetworkArchitecture::single_step(TimeStepSpec {
        start_operations: ops,
        ..TimeStepSpec::default()
    })
}

fn row(values: &[f64]) -> Tensor {
    Tensor::new(values.to_vec(), vec![1, values.len()]).unwrap()
}

fn at(id: &str) -> SpecificId {
    SpecificId::at_step(id, 0)
}

fn ones_seed(graph: &ComputationGraph, id: &str) -> (SpecificId, Tensor) {
    let key = at(id);
    let shape = graph.output(&key).unwrap().shape();
    (key, full(&shape, 1.0))
}

/// `a = x; b = tanh(a); c = sigmoid(a); d = b + c`, with dL/dx written to `dx`.
fn diamond_graph(x: &[f64], options: GraphOptions) -> (ComputationGraph, Tensor) {
    let registry = registry();
    let dx = zeros(&[1, x.len()]);
    let mut resolver = NameResolver::new();
    resolver.bind_value("x", row(x));
    resolver.bind_value("dx", dx.clone());
    let arch = start_only(vec![
        OperationSpec::new("a", "Identity", ["x"]).with_gradient_result_to([Some("dx")]),
        OperationSpec::new("b", "Tanh", ["a"]),
        OperationSpec::new("c", "Sigmoid", ["a"]),
        OperationSpec::new("d", "MatrixAdd", ["b", "c"]),
    ]);
    let graph = GraphBuilder::new(&registry, &resolver)
        .with_options(options)
        .build(&arch)
        .unwrap();
    (graph, dx)
}

fn diamond_derivative(x: f64) -> f64 {
    let s = 1.0 / (1.0 + (-x).exp());
    (1.0 - x.tanh().powi(2)) + s * (1.0 - s)
}

#[test]
fn test_diamond_sums_both_branches_before_firing() {
    init_test_logger();
    let x = [0.3, -0.7];
    let (mut graph, dx) = diamond_graph(&x, GraphOptions::default());
    graph.forward().unwrap();
    let seed = ones_seed(&graph, "d");
    let report = graph.backward(&[seed]).unwrap();

    assert!(report.is_clean());
    assert_eq!(report.visited, 4);
    let expected: Vec<f64> = x.iter().map(|&v| diamond_derivative(v)).collect();
    check_tensor_near(&graph.gradient(&at("a")).unwrap(), &[1, 2], &expected, 1e-12);
    // `a` fired exactly once, so its destination holds one full gradient.
    check_tensor_near(&dx, &[1, 2], &expected, 1e-12);
}

#[test]
fn test_repeated_backward_reuses_counts_and_accumulates_destinations() {
    let (mut graph, dx) = diamond_graph(&[0.5], GraphOptions::default());
    graph.forward().unwrap();
    let seed = ones_seed(&graph, "d");
    graph.backward(&[seed.clone()]).unwrap();
    graph.backward(&[seed]).unwrap();

    assert_eq!(graph.cached_dependency_sets(), 1);
    // Node accumulators restart on every pass; destinations keep summing.
    assert_relative_eq!(graph.gradient(&at("a")).unwrap().to_vec()[0], diamond_derivative(0.5), epsilon = 1e-12);
    assert_relative_eq!(dx.to_vec()[0], 2.0 * diamond_derivative(0.5), epsilon = 1e-12);
}

#[test]
fn test_sequential_and_parallel_backward_agree() {
    let x = [0.1, 0.9, -1.3, 2.2];
    let (mut parallel, dx_parallel) = diamond_graph(&x, GraphOptions::default());
    let (mut sequential, dx_sequential) = diamond_graph(&x, GraphOptions::default().sequential(true));
    for graph in [&mut parallel, &mut sequential] {
        graph.forward().unwrap();
        let seed = ones_seed(graph, "d");
        graph.backward(&[seed]).unwrap();
    }
    assert_eq!(dx_parallel.to_vec(), dx_sequential.to_vec());
    for id in ["a", "b", "c", "d"] {
        assert_eq!(
            parallel.gradient(&at(id)).unwrap().to_vec(),
            sequential.gradient(&at(id)).unwrap().to_vec()
        );
    }
}

#[test]
fn test_shared_destination_accumulates_across_time_steps() {
    let registry = registry();
    let w = Tensor::from_rows(&[vec![2.0]]).unwrap();
    let dw = zeros(&[1, 1]);
    let mut resolver = NameResolver::new();
    resolver.bind_per_step("x", vec![row(&[1.0]), row(&[2.0]), row(&[3.0])]);
    resolver.bind_value("W", w);
    resolver.bind_value("dW", dw.clone());
    let arch = start_only(vec![
        OperationSpec::new("y", "MatrixMultiply", ["x", "W"]).with_gradient_result_to([None, Some("dW")])
    ]);
    let mut graph = GraphBuilder::new(&registry, &resolver)
        .with_time_steps(3)
        .build(&arch)
        .unwrap();
    graph.forward().unwrap();

    let seeds: Vec<(SpecificId, Tensor)> = (0..3)
        .map(|t| (SpecificId::at_step("y", t), full(&[1, 1], 1.0)))
        .collect();
    let report = graph.backward(&seeds).unwrap();
    assert_eq!(report.visited, 3);
    assert_relative_eq!(dw.to_vec()[0], 6.0, epsilon = 1e-12);
}

#[test]
fn test_single_failure_is_tolerated_and_releases_predecessors() {
    let registry = registry();
    let dx = zeros(&[1, 1]);
    let mut resolver = NameResolver::new();
    resolver.bind_value("x", row(&[0.4]));
    resolver.bind_value("dx", dx.clone());
    let arch = start_only(vec![
        OperationSpec::new("p", "Identity", ["x"]).with_gradient_result_to([Some("dx")]),
        OperationSpec::new("f", "Failing", ["p"]),
        OperationSpec::new("g", "Tanh", ["p"]),
        OperationSpec::new("d", "MatrixAdd", ["f", "g"]),
    ]);
    let mut graph = GraphBuilder::new(&registry, &resolver).build(&arch).unwrap();
    graph.forward().unwrap();

    let seed = ones_seed(&graph, "d");
    let report = graph.backward(&[seed]).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, at("f"));
    assert_eq!(report.visited, 3);
    // Only the healthy branch reached `p`.
    assert_relative_eq!(dx.to_vec()[0], 1.0 - 0.4f64.tanh().powi(2), epsilon = 1e-12);
}

#[test]
fn test_strict_policy_rejects_a_single_failure() {
    let registry = registry();
    let mut resolver = NameResolver::new();
    resolver.bind_value("x", row(&[0.4]));
    let arch = start_only(vec![OperationSpec::new("f", "Failing", ["x"])]);
    let mut graph = GraphBuilder::new(&registry, &resolver)
        .with_options(GraphOptions::default().with_failure_policy(FailurePolicy::Strict))
        .build(&arch)
        .unwrap();
    graph.forward().unwrap();

    let seed = ones_seed(&graph, "f");
    assert!(matches!(
        graph.backward(&[seed]),
        Err(RevDiffError::BackwardError(ref message)) if message.contains("f@t0")
    ));
}

#[test]
fn test_multiple_failures_are_aggregated() {
    let registry = registry();
    let mut resolver = NameResolver::new();
    resolver.bind_value("x", row(&[0.4, 0.1]));
    let arch = start_only(vec![
        OperationSpec::new("f1", "Failing", ["x"]),
        OperationSpec::new("f2", "Failing", ["x"]),
        OperationSpec::new("d", "HadamardProduct", ["f1", "f2"]),
    ]);
    let mut graph = GraphBuilder::new(&registry, &resolver).build(&arch).unwrap();
    graph.forward().unwrap();

    let seed = ones_seed(&graph, "d");
    match graph.backward(&[seed]) {
        Err(RevDiffError::BackwardAggregate(errors)) => assert_eq!(errors.len(), 2),
        other => panic!("expected an aggregate failure, got {other:?}"),
    }
}

#[test]
fn test_node_without_gradient_is_skipped() {
    let registry = registry();
    let mut resolver = NameResolver::new();
    resolver.bind_value("x", row(&[1.0]));
    let arch = start_only(vec![
        OperationSpec::new("p", "Identity", ["x"]),
        OperationSpec::new("f", "Failing", ["p"]),
    ]);
    let mut graph = GraphBuilder::new(&registry, &resolver).build(&arch).unwrap();
    graph.forward().unwrap();

    let seed = ones_seed(&graph, "f");
    let report = graph.backward(&[seed]).unwrap();
    assert_eq!(report.skipped, 1);
    assert!(graph.gradient(&at("p")).is_none());
}

#[test]
fn test_dead_branch_does_not_stall_backward() {
    let registry = registry();
    let mut resolver = NameResolver::new();
    resolver.bind_value("x", row(&[0.2]));
    let arch = start_only(vec![
        OperationSpec::new("a", "Identity", ["x"]),
        OperationSpec::new("probe", "Sigmoid", ["a"]),
        OperationSpec::new("b", "Tanh", ["a"]),
    ]);
    let mut graph = GraphBuilder::new(&registry, &resolver).build(&arch).unwrap();
    graph.forward().unwrap();

    let seed = ones_seed(&graph, "b");
    let report = graph.backward(&[seed]).unwrap();
    assert_eq!(report.visited, 2);
    assert!(graph.gradient(&at("probe")).is_none());
    assert_relative_eq!(graph.gradient(&at("a")).unwrap().to_vec()[0], 1.0 - 0.2f64.tanh().powi(2), epsilon = 1e-12);
}

#[test]
fn test_seed_validation() {
    let (mut graph, _) = diamond_graph(&[0.5, 0.5], GraphOptions::default());
    graph.forward().unwrap();

    assert_eq!(
        graph.backward(&[]).unwrap_err(),
        RevDiffError::MissingArgument("seed gradients")
    );
    assert!(matches!(
        graph.backward(&[(at("nope"), full(&[1, 2], 1.0))]),
        Err(RevDiffError::UnknownNode(_))
    ));
    assert!(matches!(
        graph.backward(&[(at("d"), full(&[2, 2], 1.0))]),
        Err(RevDiffError::ShapeMismatch { .. })
    ));
}
