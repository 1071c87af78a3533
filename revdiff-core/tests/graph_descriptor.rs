mod common;

use approx::assert_relative_eq;
use common::{init_logger, row};
use revdiff_core::{
    ComputationGraph, GraphBuilder, InitScheme, ModelLayer, ModelLayerBuilder, NameResolver,
    NetworkArchitecture, OperationRegistry, Resolved, SpecificId, Tensor,
};

/// `h[t] = tanh(x[t] · Wx + h[t-1] · Wh)`, one template unrolled over time.
const RNN: &str = r#"{
  "timeSteps": [{
    "startOperations": [
      { "id": "xw",  "type": "MatrixMultiply", "inputs": ["x[t]", "Wx"],
        "gradientResultTo": [null, "WxGradient"] },
      { "id": "hw",  "type": "MatrixMultiply", "inputs": ["h[t-1]", "Wh"],
        "gradientResultTo": [null, "WhGradient"] },
      { "id": "pre", "type": "MatrixAdd", "inputs": ["xw", "hw"] },
      { "id": "h",   "type": "Tanh", "inputs": ["pre"] }
    ]
  }]
}"#;

const STEPS: usize = 3;

struct Rnn {
    layer: ModelLayer,
    inputs: Vec<Tensor>,
    graph: ComputationGraph,
}

fn rnn() -> Rnn {
    let layer = ModelLayerBuilder::new("rnn")
        .add("Wx", &[1, 1], InitScheme::Constant(0.8))
        .add("Wh", &[1, 1], InitScheme::Constant(-0.6))
        .build()
        .unwrap();
    let inputs: Vec<Tensor> = (0..STEPS).map(|_| row(&[0.0])).collect();

    let mut resolver = NameResolver::new();
    layer.bind_into(&mut resolver);
    resolver.bind_per_step("x", inputs.clone());
    let h0 = row(&[0.0]);
    resolver.bind("h", move |t, _| {
        if t == 0 {
            Some(Resolved::Value(h0.clone()))
        } else {
            Some(Resolved::Node(SpecificId::at_step("h", t - 1)))
        }
    });

    let registry = OperationRegistry::with_builtins();
    let architecture = NetworkArchitecture::from_json_str(RNN).unwrap();
    let graph = GraphBuilder::new(&registry, &resolver)
        .with_time_steps(STEPS)
        .build(&architecture)
        .unwrap();
    Rnn {
        layer,
        inputs,
        graph,
    }
}

fn load(rnn: &Rnn, xs: &[f64]) {
    for (slot, x) in rnn.inputs.iter().zip(xs) {
        slot.fill(*x);
    }
}

fn last_hidden(rnn: &mut Rnn) -> f64 {
    rnn.graph.forward().unwrap();
    rnn.graph
        .output(&SpecificId::at_step("h", STEPS - 1))
        .unwrap()
        .to_vec()[0]
}

fn backward_from_last(rnn: &mut Rnn) {
    let seed = (SpecificId::at_step("h", STEPS - 1), row(&[1.0]));
    let report = rnn.graph.backward(&[seed]).unwrap();
    assert_eq!(report.visited, 4 * STEPS);
}

fn numerical_gradient(rnn: &mut Rnn, key: &str, xs: &[f64]) -> f64 {
    let eps = 1e-6;
    let weight = rnn.layer.weight(key).unwrap();
    let original = weight.to_vec()[0];
    load(rnn, xs);
    weight.fill(original + eps);
    let plus = last_hidden(rnn);
    weight.fill(original - eps);
    let minus = last_hidden(rnn);
    weight.fill(original);
    (plus - minus) / (2.0 * eps)
}

#[test]
fn test_unrolled_rnn_matches_manual_recurrence() {
    init_logger();
    let mut rnn = rnn();
    assert_eq!(rnn.graph.len(), 4 * STEPS);
    let xs = [0.5, -1.0, 2.0];
    load(&rnn, &xs);

    let mut h = 0.0f64;
    for x in xs {
        h = (x * 0.8 + h * -0.6).tanh();
    }
    assert_relative_eq!(last_hidden(&mut rnn), h, epsilon = 1e-12);
}

#[test]
fn test_weight_gradients_accumulate_over_time_steps() {
    let mut rnn = rnn();
    let xs = [0.5, -1.0, 2.0];
    let expected_wx = numerical_gradient(&mut rnn, "Wx", &xs);
    let expected_wh = numerical_gradient(&mut rnn, "Wh", &xs);

    load(&rnn, &xs);
    rnn.layer.zero_gradients();
    last_hidden(&mut rnn);
    backward_from_last(&mut rnn);

    assert_relative_eq!(rnn.layer.gradient("Wx").unwrap().to_vec()[0], expected_wx, epsilon = 1e-6);
    assert_relative_eq!(rnn.layer.gradient("Wh").unwrap().to_vec()[0], expected_wh, epsilon = 1e-6);
}

#[test]
fn test_groups_share_topology_through_store_and_restore() {
    let mut rnn = rnn();
    let group_a = [0.5, -1.0, 2.0];
    let group_b = [1.5, 0.25, -0.75];
    let expected_wx = numerical_gradient(&mut rnn, "Wx", &group_a) + numerical_gradient(&mut rnn, "Wx", &group_b);
    let expected_wh = numerical_gradient(&mut rnn, "Wh", &group_a) + numerical_gradient(&mut rnn, "Wh", &group_b);

    rnn.layer.zero_gradients();
    load(&rnn, &group_a);
    last_hidden(&mut rnn);
    rnn.graph.store_intermediates("a");
    load(&rnn, &group_b);
    last_hidden(&mut rnn);
    rnn.graph.store_intermediates("b");

    // Restoring brings back the per-step inputs that dWx is computed from.
    rnn.graph.restore_intermediates("a").unwrap();
    assert_eq!(rnn.inputs[0].to_vec(), vec![group_a[0]]);
    backward_from_last(&mut rnn);
    rnn.graph.restore_intermediates("b").unwrap();
    backward_from_last(&mut rnn);

    assert_relative_eq!(rnn.layer.gradient("Wx").unwrap().to_vec()[0], expected_wx, epsilon = 1e-6);
    assert_relative_eq!(rnn.layer.gradient("Wh").unwrap().to_vec()[0], expected_wh, epsilon = 1e-6);
    assert_eq!(rnn.graph.snapshot_count(), 0);
}
