use crate::error::RevDiffError;
use crate::ops::Operation;
use crate::tensor::matrix::{matmul, transpose};
use crate::tensor::Tensor;

/// Matrix product `C = A · B` for `[m, k] x [k, n]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MatrixMultiplyOp;

impl Operation for MatrixMultiplyOp {
    fn type_name(&self) -> &'static str {
        "MatrixMultiply"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor, RevDiffError> {
        matmul(&inputs[0], &inputs[1])
    }

    /// dA = dC · Bᵀ, dB = Aᵀ · dC.
    fn backward(
        &self,
        inputs: &[Tensor],
        _output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, RevDiffError> {
        let grad_a = matmul(grad_output, &transpose(&inputs[1])?)?;
        let grad_b = matmul(&transpose(&inputs[0])?, grad_output)?;
        Ok(vec![grad_a, grad_b])
    }
}

#[cfg(test)]
#[path = "matmul_test.rs"]
mod tests;
