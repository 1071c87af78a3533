use crate::error::RevDiffError;
use crate::ops::Operation;
use crate::tensor::Tensor;

/// Passes its single input through unchanged.
///
/// Useful to give an external value (or another node) a new id, e.g. to
/// expose a time-step output under a stable name.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityOp;

impl Operation for IdentityOp {
    fn type_name(&self) -> &'static str {
        "Identity"
    }

    fn arity(&self) -> usize {
        1
    }

    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor, RevDiffError> {
        Ok(inputs[0].deep_clone())
    }

    fn backward(
        &self,
        _inputs: &[Tensor],
        _output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, RevDiffError> {
        Ok(vec![grad_output.deep_clone()])
    }
}
