use crate::error::RevDiffError;
use crate::ops::Operation;
use crate::tensor::matrix::{map, zip_map};
use crate::tensor::Tensor;

/// Leaky rectified linear unit: `x` for `x > 0`, `alpha * x` otherwise.
#[derive(Debug, Clone, Copy)]
pub struct LeakyReluOp {
    pub alpha: f64,
}

impl LeakyReluOp {
    pub fn new(alpha: f64) -> Self {
        Self { alpha }
    }
}

impl Default for LeakyReluOp {
    fn default() -> Self {
        Self { alpha: 0.01 }
    }
}

impl Operation for LeakyReluOp {
    fn type_name(&self) -> &'static str {
        "LeakyReLU"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor, RevDiffError> {
        let alpha = self.alpha;
        Ok(map(&inputs[0], |x| if x > 0.0 { x } else { alpha * x }))
    }

    fn backward(
        &self,
        inputs: &[Tensor],
        _output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, RevDiffError> {
        let alpha = self.alpha;
        let grad = zip_map(grad_output, &inputs[0], "LeakyReLU backward", |g, x| {
            if x > 0.0 {
                g
            } else {
                alpha * g
            }
        })?;
        Ok(vec![grad])
    }
}
