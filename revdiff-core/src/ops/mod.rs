//! Differentiable operations and the registry that maps type tags to them.
//!
//! An [`Operation`] is stateless: everything its backward transform needs is
//! handed back to it by the graph (the live inputs and the node's own
//! output). This keeps one operation instance safe to share between the
//! parallel backward waves and lets the intermediates store/restore capture
//! a node's state by copying tensors the graph already owns.

use std::fmt::Debug;

use crate::error::RevDiffError;
use crate::tensor::Tensor;

pub mod activation;
pub mod arithmetic;
pub mod grad_check;
pub mod linalg;
pub mod registry;

pub use activation::{LeakyReluOp, SigmoidOp, TanhOp};
pub use arithmetic::{
    HadamardProductOp, IdentityOp, MatrixAddBroadcastingOp, MatrixAddOp, MatrixSubtractOp,
};
pub use linalg::{MatrixMultiplyOp, MatrixTransposeOp};
pub use registry::{OperationFactory, OperationRegistry};

/// Defines the forward and backward transforms of a graph node.
///
/// The trait requires `Debug + Send + Sync` because a built graph evaluates
/// independent ready nodes from rayon worker threads during backward.
pub trait Operation: Debug + Send + Sync {
    /// The type tag this operation is registered under.
    fn type_name(&self) -> &'static str;

    /// Number of inputs the operation consumes. Checked at graph build time.
    fn arity(&self) -> usize;

    /// Computes the node output from its inputs.
    ///
    /// # Arguments
    /// * `inputs`: One tensor per declared input, in declaration order. The
    ///   graph builder guarantees `inputs.len() == self.arity()`.
    fn forward(&self, inputs: &[Tensor]) -> Result<Tensor, RevDiffError>;

    /// Computes dL/dInput for every input given dL/dOutput.
    ///
    /// # Arguments
    /// * `inputs`: The same inputs the forward pass saw.
    /// * `output`: The output the forward pass produced.
    /// * `grad_output`: The summed gradient of all consumers of this node.
    ///
    /// # Returns
    /// One gradient per input. The order **must** match `inputs`.
    fn backward(
        &self,
        inputs: &[Tensor],
        output: &Tensor,
        grad_output: &Tensor,
    ) -> Result<Vec<Tensor>, RevDiffError>;
}
