use crate::error::RevDiffError;
use crate::tensor::Tensor;

/// Standardized gradient clipping with a magnitude floor.
///
/// Each element `g` of a gradient tensor is compared against
/// `bound = min(clip_value, 1 + |z|)`, where `z` is `g` standardized over
/// the whole tensor (population statistics). Elements above the bound are
/// clamped to it; nonzero elements below `minimum_threshold` are raised to
/// it. Signs are kept and zeros stay zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientClipper {
    clip_value: f64,
    minimum_threshold: f64,
}

impl GradientClipper {
    /// # Errors
    /// Returns `RevDiffError::ConfigurationError` unless
    /// `0 <= minimum_threshold < clip_value` and both are finite.
    pub fn new(clip_value: f64, minimum_threshold: f64) -> Result<Self, RevDiffError> {
        if !(clip_value.is_finite() && clip_value > 0.0) {
            return Err(RevDiffError::ConfigurationError(
                "Clip value must be positive and finite".to_string(),
            ));
        }
        if !(minimum_threshold.is_finite() && minimum_threshold >= 0.0) {
            return Err(RevDiffError::ConfigurationError(
                "Minimum gradient must be non-negative and finite".to_string(),
            ));
        }
        if minimum_threshold >= clip_value {
            return Err(RevDiffError::ConfigurationError(format!(
                "Minimum gradient {minimum_threshold} must be below the clip value {clip_value}"
            )));
        }
        Ok(Self {
            clip_value,
            minimum_threshold,
        })
    }

    pub fn clip_value(&self) -> f64 {
        self.clip_value
    }

    pub fn minimum_threshold(&self) -> f64 {
        self.minimum_threshold
    }

    /// Clips `gradient` in place.
    pub fn clip(&self, gradient: &Tensor) {
        let (mean, std) = gradient.mean_and_std();
        gradient.map_inplace(|g| self.clip_element(g, mean, std));
    }

    fn clip_element(&self, g: f64, mean: f64, std: f64) -> f64 {
        let z = if std > 0.0 { (g - mean) / std } else { 0.0 };
        let bound = self.clip_value.min(1.0 + z.abs());
        let magnitude = g.abs();
        if magnitude > bound {
            bound.copysign(g)
        } else if g != 0.0 && magnitude < self.minimum_threshold {
            self.minimum_threshold.copysign(g)
        } else {
            g
        }
    }
}

#[cfg(test)]
#[path = "clipping_test.rs"]
mod tests;
