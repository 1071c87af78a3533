use std::collections::HashMap;

use super::activation::{LeakyReluOp, SigmoidOp, TanhOp};
use super::arithmetic::{
    HadamardProductOp, IdentityOp, MatrixAddBroadcastingOp, MatrixAddOp, MatrixSubtractOp,
};
use super::linalg::{MatrixMultiplyOp, MatrixTransposeOp};
use super::Operation;

/// Builds a fresh operation instance for one graph node.
pub type OperationFactory = fn() -> Box<dyn Operation>;

/// Maps the `type` field of an operation spec to a factory.
///
/// Lookups happen once per node while the graph is built; an unknown tag
/// aborts the build instead of being skipped.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    factories: HashMap<String, OperationFactory>,
}

impl OperationRegistry {
    /// A registry with no operation types.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry holding every built-in operation type.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry
            .register("MatrixMultiply", || Box::new(MatrixMultiplyOp))
            .register("MatrixTranspose", || Box::new(MatrixTransposeOp))
            .register("MatrixAdd", || Box::new(MatrixAddOp))
            .register("MatrixAddBroadcasting", || Box::new(MatrixAddBroadcastingOp))
            .register("MatrixSubtract", || Box::new(MatrixSubtractOp))
            .register("HadamardProduct", || Box::new(HadamardProductOp))
            .register("Identity", || Box::new(IdentityOp))
            .register("Sigmoid", || Box::new(SigmoidOp))
            .register("Tanh", || Box::new(TanhOp))
            .register("LeakyReLU", || Box::new(LeakyReluOp::default()));
        registry
    }

    /// Registers (or replaces) the factory for `type_name`.
    pub fn register(&mut self, type_name: impl Into<String>, factory: OperationFactory) -> &mut Self {
        let type_name = type_name.into();
        if self.factories.insert(type_name.clone(), factory).is_some() {
            log::debug!("OperationRegistry: replaced factory for '{}'", type_name);
        }
        self
    }

    /// Instantiates the operation registered under `type_name`.
    pub fn create(&self, type_name: &str) -> Option<Box<dyn Operation>> {
        self.factories.get(type_name).map(|factory| factory())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Registered type tags, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
