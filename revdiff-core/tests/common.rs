use revdiff_core::tensor::Tensor;

/// Initialises `env_logger` once per test binary.
#[allow(dead_code)]
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A `[1, n]` row tensor.
#[allow(dead_code)]
pub fn row(values: &[f64]) -> Tensor {
    Tensor::new(values.to_vec(), vec![1, values.len()]).expect("Test tensor creation failed")
}

/// Builds a tensor from rows, panicking on ragged input.
#[allow(dead_code)]
pub fn matrix(rows: &[Vec<f64>]) -> Tensor {
    Tensor::from_rows(rows).expect("Test tensor creation failed")
}

/// Mean squared error and its gradient with respect to `prediction`.
#[allow(dead_code)]
pub fn mse_with_gradient(prediction: &Tensor, target: &Tensor) -> (f64, Tensor) {
    let p = prediction.to_vec();
    let t = target.to_vec();
    let n = p.len() as f64;
    let loss = p.iter().zip(&t).map(|(a, b)| (a - b) * (a - b)).sum::<f64>() / n;
    let grad = p.iter().zip(&t).map(|(a, b)| 2.0 * (a - b) / n).collect();
    let grad = Tensor::new(grad, prediction.shape()).expect("Gradient shape");
    (loss, grad)
}
