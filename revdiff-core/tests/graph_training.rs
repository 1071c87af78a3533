mod common;

use common::{init_logger, matrix, mse_with_gradient};
use revdiff_core::checkpoint::{load_checkpoint, save_checkpoint};
use revdiff_core::{
    GraphBuilder, InitScheme, ModelLayer, ModelLayerBuilder, NameResolver, NetworkArchitecture,
    OperationRegistry, OperationSpec, SpecificId, TimeStepSpec, TrainingConfig,
};

fn linear_architecture() -> NetworkArchitecture {
    NetworkArchitecture::single_step(TimeStepSpec {
        start_operations: vec![
            OperationSpec::new("proj", "MatrixMultiply", ["x", "W"])
                .with_gradient_result_to([None, Some("WGradient")]),
            OperationSpec::new("pred", "MatrixAddBroadcasting", ["proj", "b"])
                .with_gradient_result_to([None, Some("bGradient")]),
        ],
        ..TimeStepSpec::default()
    })
}

fn linear_layer() -> ModelLayer {
    ModelLayerBuilder::new("linear")
        .add("W", &[2, 1], InitScheme::Zeros)
        .add("b", &[1, 1], InitScheme::Zeros)
        .build()
        .unwrap()
}

#[test]
fn test_linear_regression_loss_decreases() {
    init_logger();
    // y = 2 x0 - x1 + 0.5
    let x = matrix(&[
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
        vec![-1.0, 2.0],
        vec![0.5, -0.5],
    ]);
    let y = matrix(&[vec![-0.5], vec![2.5], vec![1.5], vec![-3.5], vec![2.0]]);

    let layer = linear_layer();
    let mut resolver = NameResolver::new();
    resolver.bind_value("x", x);
    layer.bind_into(&mut resolver);
    let registry = OperationRegistry::with_builtins();
    let mut graph = GraphBuilder::new(&registry, &resolver)
        .build(&linear_architecture())
        .unwrap();

    let config = TrainingConfig::from_json_str(
        r#"{ "learningRate": 0.05, "clipValue": 5.0, "beta1": 0.9,
             "beta2": 0.999, "epsilon": 1e-8, "minimumGradient": 1e-9 }"#,
    )
    .unwrap();
    let mut optimizer = config.adam().unwrap();
    let pred = SpecificId::at_step("pred", 0);

    let mut losses = Vec::new();
    for _ in 0..400 {
        layer.zero_gradients();
        graph.forward().unwrap();
        let (loss, seed) = mse_with_gradient(&graph.output(&pred).unwrap(), &y);
        losses.push(loss);
        let report = graph.backward(&[(pred.clone(), seed)]).unwrap();
        assert!(report.is_clean());
        optimizer.step(&[&layer]).unwrap();
    }

    let first = losses[0];
    let last = *losses.last().unwrap();
    assert!(last < 0.05 * first, "loss went from {first} to {last}");
    assert_eq!(optimizer.iterations(), 400);
}

#[test]
fn test_checkpoint_resume_reproduces_predictions() {
    let x = matrix(&[vec![0.3, -1.2], vec![2.0, 0.7]]);
    let layer = ModelLayerBuilder::new("linear")
        .add("W", &[2, 1], InitScheme::Xavier)
        .add("b", &[1, 1], InitScheme::Constant(0.1))
        .with_seed(5)
        .build()
        .unwrap();
    let registry = OperationRegistry::with_builtins();
    let pred = SpecificId::at_step("pred", 0);

    let predict = |layer: &ModelLayer| {
        let mut resolver = NameResolver::new();
        resolver.bind_value("x", x.clone());
        layer.bind_into(&mut resolver);
        let mut graph = GraphBuilder::new(&registry, &resolver)
            .build(&linear_architecture())
            .unwrap();
        graph.forward().unwrap();
        graph.output(&pred).unwrap().to_vec()
    };

    let root = tempfile::tempdir().unwrap();
    let dir = save_checkpoint(root.path(), &[&layer], 17).unwrap();

    let restored = linear_layer();
    assert_ne!(predict(&restored), predict(&layer));
    assert_eq!(load_checkpoint(&dir, &[&restored]).unwrap(), 17);
    assert_eq!(predict(&restored), predict(&layer));
}
