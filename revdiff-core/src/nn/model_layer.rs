use std::collections::BTreeMap;

use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::RevDiffError;
use crate::graph::NameResolver;
use crate::nn::init::InitScheme;
use crate::tensor::{zeros, Tensor};

/// Suffix under which [`ModelLayer::bind_into`] exposes a gradient tensor.
pub const GRADIENT_SUFFIX: &str = "Gradient";

/// One trainable tensor with its gradient and Adam moments.
#[derive(Debug, Clone)]
pub struct LayerElement {
    shape: Vec<usize>,
    weight: Tensor,
    gradient: Tensor,
    first_moment: Tensor,
    second_moment: Tensor,
}

impl LayerElement {
    fn new(weight: Tensor) -> Self {
        let shape = weight.shape();
        Self {
            gradient: zeros(&shape),
            first_moment: zeros(&shape),
            second_moment: zeros(&shape),
            shape,
            weight,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn gradient(&self) -> &Tensor {
        &self.gradient
    }

    pub fn first_moment(&self) -> &Tensor {
        &self.first_moment
    }

    pub fn second_moment(&self) -> &Tensor {
        &self.second_moment
    }
}

/// A named bundle of trainable tensors.
///
/// Tensors are shared handles: binding a layer into a [`NameResolver`] makes
/// every graph built from it read the weights and accumulate gradients in
/// place, and the optimizer updates the same storage.
#[derive(Debug, Clone)]
pub struct ModelLayer {
    name: String,
    elements: BTreeMap<String, LayerElement>,
}

impl ModelLayer {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Elements in key order.
    pub fn elements(&self) -> impl Iterator<Item = (&str, &LayerElement)> {
        self.elements.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element(&self, key: &str) -> Result<&LayerElement, RevDiffError> {
        self.elements.get(key).ok_or_else(|| RevDiffError::UnknownElement {
            layer: self.name.clone(),
            key: key.to_string(),
        })
    }

    pub fn weight(&self, key: &str) -> Result<Tensor, RevDiffError> {
        Ok(self.element(key)?.weight.clone())
    }

    pub fn gradient(&self, key: &str) -> Result<Tensor, RevDiffError> {
        Ok(self.element(key)?.gradient.clone())
    }

    /// Resets every gradient to zero. Call once per training step, before
    /// the first backward pass.
    pub fn zero_gradients(&self) {
        for element in self.elements.values() {
            element.gradient.fill(0.0);
        }
    }

    /// Binds each element as `key` (the weight) and `key + "Gradient"`.
    pub fn bind_into(&self, resolver: &mut NameResolver) {
        for (key, element) in &self.elements {
            resolver.bind_value(key.clone(), element.weight.clone());
            resolver.bind_value(format!("{key}{GRADIENT_SUFFIX}"), element.gradient.clone());
        }
    }
}

/// Builds a [`ModelLayer`] with initialized weights and zeroed moments.
#[derive(Debug)]
pub struct ModelLayerBuilder {
    name: String,
    specs: Vec<(String, Vec<usize>, InitScheme)>,
    seed: Option<u64>,
}

impl ModelLayerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            specs: Vec::new(),
            seed: None,
        }
    }

    pub fn add(mut self, key: impl Into<String>, shape: &[usize], init: InitScheme) -> Self {
        self.specs.push((key.into(), shape.to_vec(), init));
        self
    }

    /// Fixes the random seed used by the random schemes.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// # Errors
    /// * `ConfigurationError` for a duplicate key or a shape the scheme cannot
    ///   initialize.
    pub fn build(self) -> Result<ModelLayer, RevDiffError> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut elements = BTreeMap::new();
        for (key, shape, init) in self.specs {
            if elements.contains_key(&key) {
                return Err(RevDiffError::ConfigurationError(format!(
                    "layer '{}' declares element '{}' twice",
                    self.name, key
                )));
            }
            let weight = init.initialize(&shape, &mut rng)?;
            elements.insert(key, LayerElement::new(weight));
        }
        debug!("ModelLayer '{}': {} elements", self.name, elements.len());
        Ok(ModelLayer {
            name: self.name,
            elements,
        })
    }
}

#[cfg(test)]
#[path = "model_layer_test.rs"]
mod tests;
