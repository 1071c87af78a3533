// src/ops/arithmetic/mul.rs

use crate::error::RevDiffError;
use crate::ops::Operation;
use crate::tensor::matrix::zip_map;
use crate::tensor::Tensor;

/// Element-wise product `C = A ⊙ B`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HadamardProductOp;

impl Operation for HadamardProductOp {
    fn type_name(&self) -> &'static str {
        "HadamardProduct"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor, RevDiffError> {
        zip_map(&inputs[0], &inputs[1], "HadamardProduct", |a, b| a * b)
    }

    /// dA = dC ⊙ B, dB = dC ⊙ A.
    fn backward(
        &self,
        inputs: &[Tensor],
        _output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, RevDiffError> {
        let grad_a = zip_map(grad_output, &inputs[1], "HadamardProduct backward", |g, b| g * b)?;
        let grad_b = zip_map(grad_output, &inputs[0], "HadamardProduct backward", |g, a| g * a)?;
        Ok(vec![grad_a, grad_b])
    }
}

#[cfg(test)]
#[path = "mul_test.rs"]
mod tests;
