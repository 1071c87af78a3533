//! # Training a small recurrent network on a declarative graph
//!
//! A tanh RNN reads five samples of a sine wave and predicts the next one.
//! The network is a JSON descriptor with one time-step template:
//!
//! 1. a start operation projects the input of step `t`;
//! 2. a single layer template runs the recurrent cell, reading `h[t-1]`
//!    through the name resolver;
//! 3. an end operation reads the cell output of the last layer.
//!
//! The template is unrolled over the sequence, weights are shared by every
//! step, and their gradients accumulate across steps before each Adam update.
//!
//! ## Running
//! `cargo run --example recurrent_regression`

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use revdiff_core::tensor::zeros;
use revdiff_core::{
    GraphBuilder, InitScheme, ModelLayerBuilder, NameResolver, NetworkArchitecture,
    OperationRegistry, Resolved, RevDiffError, SpecificId, Tensor, TrainingConfig,
};

const STEPS: usize = 5;
const BATCH: usize = 16;
const HIDDEN: usize = 8;
const STRIDE: f64 = 0.3;

const DESCRIPTOR: &str = r#"{
  "timeSteps": [{
    "startOperations": [
      { "id": "xw", "type": "MatrixMultiply", "inputs": ["x[t]", "Wx"],
        "gradientResultTo": [null, "WxGradient"] }
    ],
    "layers": [{ "operations": [
      { "id": "hw",  "type": "MatrixMultiply", "inputs": ["h[t-1]", "Wh"],
        "gradientResultTo": [null, "WhGradient"] },
      { "id": "pre", "type": "MatrixAdd", "inputs": ["xw", "hw"] },
      { "id": "biased", "type": "MatrixAddBroadcasting", "inputs": ["pre", "bh"],
        "gradientResultTo": [null, "bhGradient"] },
      { "id": "h",   "type": "Tanh", "inputs": ["biased"] }
    ]}],
    "endOperations": [
      { "id": "y", "type": "MatrixMultiply", "inputs": ["h", "Wy"],
        "gradientResultTo": [null, "WyGradient"] }
    ]
  }]
}"#;

const CONFIG: &str = r#"{
  "learningRate": 0.01, "clipValue": 5.0, "beta1": 0.9,
  "beta2": 0.999, "epsilon": 1e-8, "minimumGradient": 1e-9
}"#;

/// Fills the per-step input slots and returns the targets for a fresh batch.
fn sample_batch(rng: &mut StdRng, inputs: &[Tensor]) -> Result<Tensor, RevDiffError> {
    let phases: Vec<f64> = (0..BATCH).map(|_| rng.gen_range(0.0..std::f64::consts::TAU)).collect();
    for (t, slot) in inputs.iter().enumerate() {
        let values: Vec<f64> = phases.iter().map(|p| (p + t as f64 * STRIDE).sin()).collect();
        slot.copy_from_slice(&values)?;
    }
    let targets = phases.iter().map(|p| (p + STEPS as f64 * STRIDE).sin()).collect();
    Tensor::new(targets, vec![BATCH, 1])
}

fn mse_with_gradient(prediction: &Tensor, target: &Tensor) -> Result<(f64, Tensor), RevDiffError> {
    let p = prediction.to_vec();
    let n = p.len() as f64;
    let diff: Vec<f64> = p.iter().zip(target.to_vec()).map(|(a, b)| a - b).collect();
    let loss = diff.iter().map(|d| d * d).sum::<f64>() / n;
    let grad = diff.iter().map(|d| 2.0 * d / n).collect();
    Ok((loss, Tensor::new(grad, prediction.shape())?))
}

fn main() -> Result<(), RevDiffError> {
    env_logger::init();

    let layer = ModelLayerBuilder::new("rnn")
        .add("Wx", &[1, HIDDEN], InitScheme::Xavier)
        .add("Wh", &[HIDDEN, HIDDEN], InitScheme::Xavier)
        .add("bh", &[1, HIDDEN], InitScheme::Zeros)
        .add("Wy", &[HIDDEN, 1], InitScheme::Xavier)
        .with_seed(42)
        .build()?;

    let inputs: Vec<Tensor> = (0..STEPS).map(|_| zeros(&[BATCH, 1])).collect();
    let mut resolver = NameResolver::new();
    layer.bind_into(&mut resolver);
    resolver.bind_per_step("x", inputs.clone());
    let h0 = zeros(&[BATCH, HIDDEN]);
    resolver.bind("h", move |t, layer_index| match (t, layer_index) {
        (0, _) => Some(Resolved::Value(h0.clone())),
        (t, Some(l)) => Some(Resolved::Node(SpecificId::at_layer("h", t - 1, l))),
        (_, None) => None,
    });

    let registry = OperationRegistry::with_builtins();
    let architecture = NetworkArchitecture::from_json_str(DESCRIPTOR)?;
    let mut graph = GraphBuilder::new(&registry, &resolver)
        .with_time_steps(STEPS)
        .build(&architecture)?;
    println!("Built {} nodes over {} time steps", graph.len(), graph.time_steps());

    let mut optimizer = TrainingConfig::from_json_str(CONFIG)?.adam()?;
    let mut rng = StdRng::seed_from_u64(7);
    let output = SpecificId::at_step("y", STEPS - 1);

    for iteration in 1..=300 {
        let targets = sample_batch(&mut rng, &inputs)?;
        layer.zero_gradients();
        graph.forward()?;
        let prediction = graph
            .output(&output)
            .ok_or_else(|| RevDiffError::MissingOutput(output.to_string()))?;
        let (loss, seed) = mse_with_gradient(&prediction, &targets)?;
        graph.backward(&[(output.clone(), seed)])?;
        optimizer.step(&[&layer])?;

        if iteration % 50 == 0 {
            println!("Iteration {iteration:>3}: loss = {loss:.5}");
        }
    }
    Ok(())
}
