//! Gradient post-processing: clipping and the Adam update.
//!
//! Both run after a backward pass has finished accumulating into the
//! gradient tensors of the [`ModelLayer`](crate::nn::ModelLayer)s.

pub mod adam;
pub mod clipping;
pub mod config;

pub use adam::{AdamConfig, AdamOptimizer};
pub use clipping::GradientClipper;
pub use config::TrainingConfig;
