// src/ops/arithmetic/sub.rs

use crate::error::RevDiffError;
use crate::ops::Operation;
use crate::tensor::matrix::{map, zip_map};
use crate::tensor::Tensor;

/// `C = A - B` for identically shaped matrices.
#[derive(Debug, Default, Clone, Copy)]
pub struct MatrixSubtractOp;

impl Operation for MatrixSubtractOp {
    fn type_name(&self) -> &'static str {
        "MatrixSubtract"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor, RevDiffError> {
        zip_map(&inputs[0], &inputs[1], "MatrixSubtract", |a, b| a - b)
    }

    fn backward(
        &self,
        _inputs: &[Tensor],
        _output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, RevDiffError> {
        Ok(vec![grad_output.deep_clone(), map(grad_output, |g| -g)])
    }
}

#[cfg(test)]
#[path = "sub_test.rs"]
mod tests;
