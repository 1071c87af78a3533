use rand::Rng;

use crate::error::RevDiffError;
use crate::tensor::create::{full, normal, uniform, zeros};
use crate::tensor::Tensor;

/// How a weight tensor is filled when a model layer is created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitScheme {
    /// Glorot uniform: `U(-b, b)` with `b = sqrt(6 / (fan_in + fan_out))`.
    Xavier,
    /// Kaiming normal: `N(0, 2 / fan_in)`.
    He,
    Zeros,
    Constant(f64),
}

impl InitScheme {
    /// Creates a tensor of `shape` filled according to the scheme.
    ///
    /// # Arguments
    /// * `shape`: Weight shape. For matrices used as `x · W` this is
    ///   `[fan_in, fan_out]`; trailing dimensions count as receptive field.
    /// * `rng`: Source of randomness for the random schemes.
    ///
    /// # Errors
    /// Returns `RevDiffError::ConfigurationError` if a random scheme is asked
    /// for a shape with no elements.
    pub fn initialize<R: Rng + ?Sized>(&self, shape: &[usize], rng: &mut R) -> Result<Tensor, RevDiffError> {
        match *self {
            InitScheme::Zeros => Ok(zeros(shape)),
            InitScheme::Constant(value) => Ok(full(shape, value)),
            InitScheme::Xavier => {
                let (fan_in, fan_out) = fans(shape)?;
                let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
                uniform(shape, bound, rng)
            }
            InitScheme::He => {
                let (fan_in, _) = fans(shape)?;
                Ok(normal(shape, (2.0 / fan_in as f64).sqrt(), rng))
            }
        }
    }
}

/// `(fan_in, fan_out)` of a weight shape.
pub fn fans(shape: &[usize]) -> Result<(usize, usize), RevDiffError> {
    let (fan_in, fan_out) = match shape {
        [] => (0, 0),
        [n] => (*n, *n),
        [rows, cols, rest @ ..] => {
            let receptive: usize = rest.iter().product();
            (rows * receptive, cols * receptive)
        }
    };
    if fan_in == 0 || fan_out == 0 {
        return Err(RevDiffError::ConfigurationError(format!(
            "cannot compute fan-in/fan-out for shape {shape:?}"
        )));
    }
    Ok((fan_in, fan_out))
}

#[cfg(test)]
#[path = "init_test.rs"]
mod tests;
