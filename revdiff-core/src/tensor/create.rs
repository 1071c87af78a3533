use crate::error::RevDiffError;
use crate::tensor::{Tensor, TensorData};
use rand::distributions::Uniform;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Creates a tensor of the given shape filled with zeros.
pub fn zeros(shape: &[usize]) -> Tensor {
    full(shape, 0.0)
}

/// Creates a tensor of the given shape filled with `value`.
pub fn full(shape: &[usize], value: f64) -> Tensor {
    let numel: usize = shape.iter().product();
    Tensor::from_data(TensorData {
        shape: shape.to_vec(),
        buffer: vec![value; numel],
    })
}

/// Zero tensor with the same shape as `other`.
pub fn zeros_like(other: &Tensor) -> Tensor {
    zeros(&other.shape())
}

/// Samples every element uniformly from `[-bound, bound]`.
///
/// # Errors
/// Returns `RevDiffError::ConfigurationError` if `bound` is not a positive finite number.
pub fn uniform<R: Rng + ?Sized>(
    shape: &[usize],
    bound: f64,
    rng: &mut R,
) -> Result<Tensor, RevDiffError> {
    if !(bound.is_finite() && bound > 0.0) {
        return Err(RevDiffError::ConfigurationError(format!(
            "uniform bound must be positive and finite, got {bound}"
        )));
    }
    let numel: usize = shape.iter().product();
    let dist = Uniform::new_inclusive(-bound, bound);
    let buffer = (0..numel).map(|_| dist.sample(rng)).collect();
    Tensor::new(buffer, shape.to_vec())
}

/// Samples every element from `N(0, std^2)`.
pub fn normal<R: Rng + ?Sized>(shape: &[usize], std: f64, rng: &mut R) -> Tensor {
    let numel: usize = shape.iter().product();
    let buffer = (0..numel)
        .map(|_| {
            let z: f64 = StandardNormal.sample(rng);
            z * std
        })
        .collect();
    Tensor::from_data(TensorData {
        shape: shape.to_vec(),
        buffer,
    })
}
