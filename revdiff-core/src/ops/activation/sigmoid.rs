use crate::error::RevDiffError;
use crate::ops::Operation;
use crate::tensor::matrix::{map, zip_map};
use crate::tensor::Tensor;

/// Logistic sigmoid, `1 / (1 + e^-x)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SigmoidOp;

impl Operation for SigmoidOp {
    fn type_name(&self) -> &'static str {
        "Sigmoid"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor, RevDiffError> {
        Ok(map(&inputs[0], |x| 1.0 / (1.0 + (-x).exp())))
    }

    /// dx = dy * y * (1 - y)
    fn backward(
        &self,
        _inputs: &[Tensor],
        output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, RevDiffError> {
        let grad = zip_map(grad_output, output, "Sigmoid backward", |g, y| g * y * (1.0 - y))?;
        Ok(vec![grad])
    }
}
