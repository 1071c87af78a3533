use crate::error::RevDiffError;
use crate::ops::Operation;
use crate::tensor::matrix::transpose;
use crate::tensor::Tensor;

/// `B = Aᵀ`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MatrixTransposeOp;

impl Operation for MatrixTransposeOp {
    fn type_name(&self) -> &'static str {
        "MatrixTranspose"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor, RevDiffError> {
        transpose(&inputs[0])
    }

    fn backward(
        &self,
        _inputs: &[Tensor],
        _output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, RevDiffError> {
        Ok(vec![transpose(grad_output)?])
    }
}
