use crate::error::RevDiffError;
use crate::ops::Operation;
use crate::tensor::Tensor;
use thiserror::Error;

/// Error type specifically for gradient checking failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GradCheckError {
    #[error("Gradient check failed for input tensor at index {input_index}, element index {element_index}: Analytical grad {analytical_grad:?} != Numerical grad {numerical_grad:?}. Difference: {difference:?}")]
    GradientMismatch {
        input_index: usize,
        element_index: usize,
        analytical_grad: f64,
        numerical_grad: f64,
        difference: f64,
    },

    #[error("Operation returned {actual} gradients for {expected} inputs")]
    GradientCountMismatch { expected: usize, actual: usize },

    #[error("Tensor error during gradient check: {0}")]
    TensorError(#[from] RevDiffError),
}

/// Checks an operation's analytical backward against central finite differences.
///
/// The scalar loss is `sum(forward(inputs) ⊙ output_grad)`, so its analytical
/// gradient with respect to each input is exactly what `backward` returns for
/// `grad_output = output_grad`.
///
/// Inputs are perturbed through copies; the tensors passed in are not modified.
pub fn check_grad(
    op: &dyn Operation,
    inputs: &[Tensor],
    output_grad: &Tensor,
    epsilon: f64,
    tolerance: f64,
) -> Result<(), GradCheckError> {
    let working: Vec<Tensor> = inputs.iter().map(Tensor::deep_clone).collect();

    // --- 1. Analytical gradients ---
    let output = op.forward(&working)?;
    let analytical = op.backward(&working, &output, output_grad)?;
    if analytical.len() != working.len() {
        return Err(GradCheckError::GradientCountMismatch {
            expected: working.len(),
            actual: analytical.len(),
        });
    }

    let weights = output_grad.to_vec();
    let loss = |tensors: &[Tensor]| -> Result<f64, RevDiffError> {
        let out = op.forward(tensors)?.to_vec();
        Ok(out.iter().zip(weights.iter()).map(|(o, w)| o * w).sum())
    };

    // --- 2. Numerical gradients, element by element ---
    for (input_index, input) in working.iter().enumerate() {
        let original = input.to_vec();
        let analytical_values = analytical[input_index].to_vec();
        if analytical_values.len() != original.len() {
            return Err(GradCheckError::TensorError(RevDiffError::ShapeMismatch {
                expected: input.shape(),
                actual: analytical[input_index].shape(),
                operation: format!("{} backward", op.type_name()),
            }));
        }
        for element_index in 0..original.len() {
            let mut perturbed = original.clone();
            perturbed[element_index] = original[element_index] + epsilon;
            input.copy_from_slice(&perturbed)?;
            let loss_plus = loss(&working)?;

            perturbed[element_index] = original[element_index] - epsilon;
            input.copy_from_slice(&perturbed)?;
            let loss_minus = loss(&working)?;

            input.copy_from_slice(&original)?;

            let numerical_grad = (loss_plus - loss_minus) / (2.0 * epsilon);
            let analytical_grad = analytical_values[element_index];
            let difference = (analytical_grad - numerical_grad).abs();
            if difference > tolerance * (1.0 + numerical_grad.abs()) {
                return Err(GradCheckError::GradientMismatch {
                    input_index,
                    element_index,
                    analytical_grad,
                    numerical_grad,
                    difference,
                });
            }
        }
    }
    Ok(())
}
