//! Trainable parameters: named weight bundles and their initialization.

pub mod init;
pub mod model_layer;

pub use init::InitScheme;
pub use model_layer::{LayerElement, ModelLayer, ModelLayerBuilder, GRADIENT_SUFFIX};
