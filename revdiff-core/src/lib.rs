//! A reverse-mode automatic differentiation runtime built around a reusable
//! computation graph.
//!
//! A graph is described declaratively ([`architecture`]), built once
//! against a registry of operation types and a name resolver
//! ([`graph::GraphBuilder`]), and then driven many times: forward, backward
//! with fan-in-correct gradient accumulation, and store/restore of
//! intermediate state. The [`optim`] module post-processes the accumulated
//! gradients of [`nn::ModelLayer`]s.

pub mod architecture;
pub mod checkpoint;
pub mod error;
pub mod graph;
pub mod nn;
pub mod ops;
pub mod optim;
pub mod tensor;
pub mod utils;

pub use architecture::{LayerSpec, NetworkArchitecture, OperationSpec, TimeStepSpec};
pub use error::RevDiffError;
pub use graph::{
    BackwardReport, ComputationGraph, FailurePolicy, GraphBuilder, GraphOptions, NameResolver,
    NanPolicy, Resolved, SpecificId,
};
pub use nn::{InitScheme, ModelLayer, ModelLayerBuilder};
pub use ops::{Operation, OperationRegistry};
pub use optim::{AdamConfig, AdamOptimizer, GradientClipper, TrainingConfig};
pub use tensor::Tensor;
