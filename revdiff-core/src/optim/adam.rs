use log::debug;
use rayon::prelude::*;

use crate::error::RevDiffError;
use crate::nn::{LayerElement, ModelLayer};
use crate::optim::GradientClipper;
use crate::tensor::Tensor;

/// Adam hyperparameters. There are no defaults; the owning network supplies
/// them (see [`crate::optim::TrainingConfig`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamConfig {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
}

impl AdamConfig {
    pub fn new(learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
        }
    }

    pub fn validate(&self) -> Result<(), RevDiffError> {
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(RevDiffError::ConfigurationError(
                "Learning rate must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.beta1) {
            return Err(RevDiffError::ConfigurationError(
                "Beta1 must be in [0, 1)".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.beta2) {
            return Err(RevDiffError::ConfigurationError(
                "Beta2 must be in [0, 1)".to_string(),
            ));
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(RevDiffError::ConfigurationError(
                "Epsilon must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Adam over [`ModelLayer`]s, with optional gradient clipping.
///
/// Moments live in the layers, so the optimizer itself only carries the
/// hyperparameters and the iteration counter.
#[derive(Debug, Clone)]
pub struct AdamOptimizer {
    config: AdamConfig,
    clipper: Option<GradientClipper>,
    iterations: u64,
}

impl AdamOptimizer {
    /// # Errors
    /// Returns `RevDiffError::ConfigurationError` for out-of-range hyperparameters.
    pub fn new(config: AdamConfig) -> Result<Self, RevDiffError> {
        config.validate()?;
        Ok(Self {
            config,
            clipper: None,
            iterations: 0,
        })
    }

    /// Clips every gradient before the moment update.
    pub fn with_clipper(mut self, clipper: GradientClipper) -> Self {
        self.clipper = Some(clipper);
        self
    }

    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    pub fn clipper(&self) -> Option<&GradientClipper> {
        self.clipper.as_ref()
    }

    /// Number of completed steps, i.e. the `t` of the last update.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Resumes counting from a checkpointed iteration.
    pub fn set_iterations(&mut self, iterations: u64) {
        self.iterations = iterations;
    }

    /// Applies one Adam step to every element of `layers`.
    ///
    /// Every element is checked before anything changes, so a failing call
    /// leaves weights, moments, gradients and the iteration counter as they
    /// were. Elements are then updated in parallel. Gradients are clipped in
    /// place when a clipper is set and are otherwise left untouched; zero
    /// them with [`ModelLayer::zero_gradients`] before the next accumulation.
    ///
    /// # Errors
    /// As [`AdamOptimizer::update_tensor`].
    pub fn step(&mut self, layers: &[&ModelLayer]) -> Result<(), RevDiffError> {
        let elements: Vec<&LayerElement> = layers
            .iter()
            .flat_map(|layer| layer.elements().map(|(_, element)| element))
            .collect();
        for element in &elements {
            check_tensors(
                element.weight(),
                element.gradient(),
                element.first_moment(),
                element.second_moment(),
            )?;
        }

        self.iterations += 1;
        let t = self.iterations;
        let this: &AdamOptimizer = self;
        elements.par_iter().for_each(|element| {
            if let Some(clipper) = &this.clipper {
                clipper.clip(element.gradient());
            }
            this.apply_update(
                element.weight(),
                element.gradient(),
                element.first_moment(),
                element.second_moment(),
                t,
            );
        });
        debug!("Adam step {}: updated {} tensors", t, elements.len());
        Ok(())
    }

    /// One Adam update of a single weight tensor at iteration `t` (1-based).
    ///
    /// The update is element-wise over the flat buffer, so any rank works.
    ///
    /// # Errors
    /// * `ConfigurationError` if `t == 0` or the weight and moments are not
    ///   distinct tensors.
    /// * `ShapeMismatch` if the gradient or a moment differs in shape from the weight.
    pub fn update_tensor(
        &self,
        weight: &Tensor,
        gradient: &Tensor,
        first_moment: &Tensor,
        second_moment: &Tensor,
        t: u64,
    ) -> Result<(), RevDiffError> {
        if t == 0 {
            return Err(RevDiffError::ConfigurationError(
                "Adam iterations start at 1".to_string(),
            ));
        }
        check_tensors(weight, gradient, first_moment, second_moment)?;
        self.apply_update(weight, gradient, first_moment, second_moment, t);
        Ok(())
    }

    fn apply_update(
        &self,
        weight: &Tensor,
        gradient: &Tensor,
        first_moment: &Tensor,
        second_moment: &Tensor,
        t: u64,
    ) {
        let AdamConfig {
            learning_rate,
            beta1,
            beta2,
            epsilon,
        } = self.config;
        let exponent = i32::try_from(t).unwrap_or(i32::MAX);
        let bias_correction1 = 1.0 - beta1.powi(exponent);
        let bias_correction2 = 1.0 - beta2.powi(exponent);

        // Read first so a gradient aliasing the weight sees pre-update values.
        let g = gradient.to_vec();
        let mut w = weight.write_data();
        let mut m = first_moment.write_data();
        let mut v = second_moment.write_data();
        for (i, g) in g.into_iter().enumerate() {
            m.buffer[i] = beta1 * m.buffer[i] + (1.0 - beta1) * g;
            v.buffer[i] = beta2 * v.buffer[i] + (1.0 - beta2) * g * g;
            let m_hat = m.buffer[i] / bias_correction1;
            let v_hat = v.buffer[i] / bias_correction2;
            w.buffer[i] -= learning_rate * m_hat / (v_hat.sqrt() + epsilon);
        }
    }
}

/// The weight and moments must be distinct tensors, and all four must share a shape.
fn check_tensors(
    weight: &Tensor,
    gradient: &Tensor,
    first_moment: &Tensor,
    second_moment: &Tensor,
) -> Result<(), RevDiffError> {
    if weight.ptr_eq(first_moment) || weight.ptr_eq(second_moment) || first_moment.ptr_eq(second_moment) {
        return Err(RevDiffError::ConfigurationError(
            "Weight and moments must be distinct tensors".to_string(),
        ));
    }
    let shape = weight.shape();
    for other in [gradient, first_moment, second_moment] {
        if other.shape() != shape {
            return Err(RevDiffError::ShapeMismatch {
                expected: shape,
                actual: other.shape(),
                operation: "adam update".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "adam_test.rs"]
mod tests;
