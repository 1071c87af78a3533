use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RevDiffError;
use crate::optim::{AdamConfig, AdamOptimizer, GradientClipper};

/// Training hyperparameters supplied by the owning network.
///
/// Loaded from camelCase JSON, for example:
///
/// ```json
/// { "learningRate": 0.001, "clipValue": 5.0, "beta1": 0.9,
///   "beta2": 0.999, "epsilon": 1e-8, "minimumGradient": 1e-6 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    pub clip_value: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    pub minimum_gradient: f64,
}

impl TrainingConfig {
    /// # Errors
    /// `Parse` for malformed JSON or missing fields, `ConfigurationError`
    /// for out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self, RevDiffError> {
        let config: TrainingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RevDiffError> {
        Self::from_json_str(&fs::read_to_string(path.as_ref())?)
    }

    pub fn validate(&self) -> Result<(), RevDiffError> {
        self.adam_config().validate()?;
        self.clipper().map(|_| ())
    }

    pub fn adam_config(&self) -> AdamConfig {
        AdamConfig::new(self.learning_rate, self.beta1, self.beta2, self.epsilon)
    }

    pub fn clipper(&self) -> Result<GradientClipper, RevDiffError> {
        GradientClipper::new(self.clip_value, self.minimum_gradient)
    }

    /// An optimizer that clips with this configuration's bounds.
    pub fn adam(&self) -> Result<AdamOptimizer, RevDiffError> {
        Ok(AdamOptimizer::new(self.adam_config())?.with_clipper(self.clipper()?))
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
