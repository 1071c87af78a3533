use crate::error::RevDiffError;
use crate::ops::Operation;
use crate::tensor::matrix::{map, zip_map};
use crate::tensor::Tensor;

/// Hyperbolic tangent.
#[derive(Debug, Default, Clone, Copy)]
pub struct TanhOp;

impl Operation for TanhOp {
    fn type_name(&self) -> &'static str {
        "Tanh"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor, RevDiffError> {
        Ok(map(&inputs[0], f64::tanh))
    }

    /// dx = dy * (1 - y^2)
    fn backward(
        &self,
        _inputs: &[Tensor],
        output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, RevDiffError> {
        let grad = zip_map(grad_output, output, "Tanh backward", |g, y| g * (1.0 - y * y))?;
        Ok(vec![grad])
    }
}
