use std::collections::HashMap;
use std::fmt;

use crate::graph::SpecificId;
use crate::tensor::Tensor;

/// What a resolver binding produces for one `(time_step, layer)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// An external tensor: weight, bias, constant, or a per-time-step buffer.
    Value(Tensor),
    /// A node built earlier in the same graph, typically a previous time step.
    Node(SpecificId),
}

type ResolveFn = Box<dyn Fn(usize, Option<usize>) -> Option<Resolved> + Send + Sync>;

/// Maps base names to `(time_step, layer) -> Resolved` functions.
///
/// The graph builder asks the resolver for every input token that is not
/// the id of an already built node, after stripping any subscript
/// (`h[t-1]` is looked up as `h`). It is consulted only while building.
#[derive(Default)]
pub struct NameResolver {
    bindings: HashMap<String, ResolveFn>,
}

impl NameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to a function of the time step and (for layer
    /// operations) the layer index. Returning `None` means the name has no
    /// value at that position, which fails the build.
    pub fn bind<F>(&mut self, name: impl Into<String>, resolve: F) -> &mut Self
    where
        F: Fn(usize, Option<usize>) -> Option<Resolved> + Send + Sync + 'static,
    {
        self.bindings.insert(name.into(), Box::new(resolve));
        self
    }

    /// Binds `name` to the same tensor at every position.
    pub fn bind_value(&mut self, name: impl Into<String>, tensor: Tensor) -> &mut Self {
        self.bind(name, move |_, _| Some(Resolved::Value(tensor.clone())))
    }

    /// Binds `name` to one tensor per time step.
    pub fn bind_per_step(&mut self, name: impl Into<String>, tensors: Vec<Tensor>) -> &mut Self {
        self.bind(name, move |t, _| tensors.get(t).cloned().map(Resolved::Value))
    }

    /// Binds `name` to one tensor per layer.
    pub fn bind_per_layer(&mut self, name: impl Into<String>, tensors: Vec<Tensor>) -> &mut Self {
        self.bind(name, move |_, layer| {
            tensors.get(layer.unwrap_or(0)).cloned().map(Resolved::Value)
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Resolves a base name (no subscript) at a position.
    pub fn resolve(&self, name: &str, time_step: usize, layer: Option<usize>) -> Option<Resolved> {
        self.bindings.get(name).and_then(|f| f(time_step, layer))
    }
}

impl fmt::Debug for NameResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.bindings.keys().collect();
        names.sort();
        f.debug_struct("NameResolver").field("names", &names).finish()
    }
}

/// Strips a bracketed subscript: `"h[t-1]"` becomes `"h"`.
pub fn base_name(token: &str) -> &str {
    match token.find('[') {
        Some(pos) => token[..pos].trim_end(),
        None => token.trim(),
    }
}
