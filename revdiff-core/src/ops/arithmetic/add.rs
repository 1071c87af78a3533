// src/ops/arithmetic/add.rs

use crate::error::RevDiffError;
use crate::ops::Operation;
use crate::tensor::matrix::{add_row_broadcast, sum_rows, zip_map};
use crate::tensor::Tensor;

/// `C = A + B` for identically shaped matrices.
#[derive(Debug, Default, Clone, Copy)]
pub struct MatrixAddOp;

impl Operation for MatrixAddOp {
    fn type_name(&self) -> &'static str {
        "MatrixAdd"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor, RevDiffError> {
        zip_map(&inputs[0], &inputs[1], "MatrixAdd", |a, b| a + b)
    }

    fn backward(
        &self,
        _inputs: &[Tensor],
        _output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, RevDiffError> {
        // The gradient of Add is 1 for both operands.
        Ok(vec![grad_output.deep_clone(), grad_output.deep_clone()])
    }
}

/// `C = A + b`, where `b` is a `[1, cols]` row added to every row of `A`.
///
/// Typically used for biases: the bias gradient is the column sum of dL/dC.
#[derive(Debug, Default, Clone, Copy)]
pub struct MatrixAddBroadcastingOp;

impl Operation for MatrixAddBroadcastingOp {
    fn type_name(&self) -> &'static str {
        "MatrixAddBroadcasting"
    }

    fn arity(&self) -> usize {
        2
    }

    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor, RevDiffError> {
        add_row_broadcast(&inputs[0], &inputs[1])
    }

    fn backward(
        &self,
        _inputs: &[Tensor],
        _output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, RevDiffError> {
        Ok(vec![grad_output.deep_clone(), sum_rows(grad_output)?])
    }
}

#[cfg(test)]
#[path = "add_test.rs"]
mod tests;
