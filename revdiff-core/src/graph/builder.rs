use log::debug;

use crate::architecture::{NetworkArchitecture, OperationSpec};
use crate::error::RevDiffError;
use crate::graph::node::{NodeInput, OperationNode};
use crate::graph::resolver::{base_name, NameResolver, Resolved};
use crate::graph::{ComputationGraph, GraphOptions, NodeIndex, SpecificId};
use crate::ops::OperationRegistry;
use crate::tensor::Tensor;

/// Where an operation sits in the unrolled descriptor.
#[derive(Debug, Clone, Copy)]
enum Scope {
    Start { time_step: usize },
    Layer { time_step: usize, layer: usize },
    End { time_step: usize, last_layer: Option<usize> },
}

impl Scope {
    fn time_step(self) -> usize {
        match self {
            Scope::Start { time_step } | Scope::Layer { time_step, .. } | Scope::End { time_step, .. } => {
                time_step
            }
        }
    }

    fn layer(self) -> Option<usize> {
        match self {
            Scope::Layer { layer, .. } => Some(layer),
            _ => None,
        }
    }

    fn key(self, id: &str) -> SpecificId {
        match self.layer() {
            Some(layer) => SpecificId::at_layer(id, self.time_step(), layer),
            None => SpecificId::at_step(id, self.time_step()),
        }
    }

    /// Keys an input token may refer to, most specific first.
    fn candidates(self, token: &str) -> Vec<SpecificId> {
        match self {
            Scope::Start { time_step } => vec![SpecificId::at_step(token, time_step)],
            Scope::Layer { time_step, layer } => vec![
                SpecificId::at_layer(token, time_step, layer),
                SpecificId::at_step(token, time_step),
            ],
            Scope::End { time_step, last_layer } => {
                let mut keys = vec![SpecificId::at_step(token, time_step)];
                if let Some(layer) = last_layer {
                    keys.push(SpecificId::at_layer(token, time_step, layer));
                }
                keys
            }
        }
    }
}

/// Builds a [`ComputationGraph`] from a descriptor.
///
/// Every input token is resolved exactly once here; the resulting node
/// handles are reused by every forward and backward pass.
#[derive(Debug)]
pub struct GraphBuilder<'a> {
    registry: &'a OperationRegistry,
    resolver: &'a NameResolver,
    time_steps: Option<usize>,
    layers: Option<usize>,
    options: GraphOptions,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(registry: &'a OperationRegistry, resolver: &'a NameResolver) -> Self {
        Self {
            registry,
            resolver,
            time_steps: None,
            layers: None,
            options: GraphOptions::default(),
        }
    }

    /// Unrolls over `count` time steps. A descriptor with a single time-step
    /// template is replicated; otherwise `count` must match the descriptor.
    pub fn with_time_steps(mut self, count: usize) -> Self {
        self.time_steps = Some(count);
        self
    }

    /// Replicates a single layer template `count` times (same rule as
    /// [`GraphBuilder::with_time_steps`]).
    pub fn with_layers(mut self, count: usize) -> Self {
        self.layers = Some(count);
        self
    }

    pub fn with_options(mut self, options: GraphOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the graph.
    ///
    /// # Errors
    /// Construction aborts on the first problem; no partial graph is returned.
    /// * `MissingArgument` for an empty id or type.
    /// * `UnknownOperationType` for a type tag the registry lacks.
    /// * `UnresolvedInput` for a token that is neither a built node nor a
    ///   resolver binding.
    /// * `ArityMismatch`, `DuplicateNode`, `InvalidBinding`,
    ///   `InvalidArchitecture` for structural problems.
    pub fn build(&self, architecture: &NetworkArchitecture) -> Result<ComputationGraph, RevDiffError> {
        architecture.validate()?;
        let step_count = replicated_count(self.time_steps, architecture.time_steps.len(), "time steps")?;
        let mut graph = ComputationGraph::new(self.options, step_count);

        for time_step in 0..step_count {
            let step = template(&architecture.time_steps, time_step);
            let layer_count = replicated_count(self.layers, step.layers.len(), "layers")?;

            for spec in &step.start_operations {
                self.add_node(&mut graph, spec, Scope::Start { time_step })?;
            }
            for layer in 0..layer_count {
                let layer_spec = template(&step.layers, layer);
                for spec in &layer_spec.operations {
                    self.add_node(&mut graph, spec, Scope::Layer { time_step, layer })?;
                }
            }
            let last_layer = layer_count.checked_sub(1);
            for spec in &step.end_operations {
                self.add_node(&mut graph, spec, Scope::End { time_step, last_layer })?;
            }
        }

        debug!(
            "GraphBuilder: built {} nodes over {} time steps",
            graph.len(),
            step_count
        );
        Ok(graph)
    }

    fn add_node(
        &self,
        graph: &mut ComputationGraph,
        spec: &OperationSpec,
        scope: Scope,
    ) -> Result<(), RevDiffError> {
        if spec.id.trim().is_empty() {
            return Err(RevDiffError::MissingArgument("operation id"));
        }
        if spec.type_name.trim().is_empty() {
            return Err(RevDiffError::MissingArgument("operation type"));
        }

        let key = scope.key(&spec.id);
        if graph.index.contains_key(&key) {
            return Err(RevDiffError::DuplicateNode(key.to_string()));
        }

        let op = self
            .registry
            .create(&spec.type_name)
            .ok_or_else(|| RevDiffError::UnknownOperationType {
                type_name: spec.type_name.clone(),
                node: key.to_string(),
            })?;
        if op.arity() != spec.inputs.len() {
            return Err(RevDiffError::ArityMismatch {
                node: key.to_string(),
                expected: op.arity(),
                actual: spec.inputs.len(),
            });
        }
        if spec.gradient_result_to.len() > spec.inputs.len() {
            return Err(RevDiffError::InvalidArchitecture(format!(
                "node {} lists {} gradient destinations for {} inputs",
                key,
                spec.gradient_result_to.len(),
                spec.inputs.len()
            )));
        }

        // --- Resolve inputs ---
        let inputs = spec
            .inputs
            .iter()
            .map(|token| self.resolve_input(graph, token, scope, &key))
            .collect::<Result<Vec<_>, _>>()?;

        // --- Resolve output and gradient bindings ---
        let result_to = spec
            .set_result_to
            .as_ref()
            .map(|name| {
                self.resolve_slot(name, scope, &key)
                    .map(|tensor| (name.clone(), tensor))
            })
            .transpose()?;
        let mut gradient_to = spec
            .gradient_result_to
            .iter()
            .map(|name| {
                name.as_ref()
                    .map(|n| self.resolve_slot(n, scope, &key))
                    .transpose()
            })
            .collect::<Result<Vec<_>, _>>()?;
        gradient_to.resize(inputs.len(), None);

        let idx: NodeIndex = graph.nodes.len();
        for input in &inputs {
            if let NodeInput::Node(pred) = input {
                graph.nodes[*pred].successors.push(idx);
            }
        }
        graph.nodes.push(OperationNode {
            key: key.clone(),
            type_name: spec.type_name.clone(),
            op,
            inputs,
            successors: Vec::new(),
            output: Tensor::empty(),
            has_output: false,
            gradient: Tensor::empty(),
            has_gradient: false,
            result_to,
            gradient_to,
        });
        graph.index.insert(key, idx);
        Ok(())
    }

    fn resolve_input(
        &self,
        graph: &ComputationGraph,
        token: &str,
        scope: Scope,
        node: &SpecificId,
    ) -> Result<NodeInput, RevDiffError> {
        if let Some(&pred) = scope
            .candidates(token)
            .iter()
            .find_map(|candidate| graph.index.get(candidate))
        {
            return Ok(NodeInput::Node(pred));
        }

        let unresolved = || RevDiffError::UnresolvedInput {
            token: token.to_string(),
            node: node.to_string(),
        };
        match self.resolver.resolve(base_name(token), scope.time_step(), scope.layer()) {
            Some(Resolved::Value(tensor)) => Ok(NodeInput::External(tensor)),
            Some(Resolved::Node(key)) => graph
                .index
                .get(&key)
                .map(|&pred| NodeInput::Node(pred))
                .ok_or_else(unresolved),
            None => Err(unresolved()),
        }
    }

    /// Result and gradient bindings must name external tensors.
    fn resolve_slot(&self, name: &str, scope: Scope, node: &SpecificId) -> Result<Tensor, RevDiffError> {
        match self.resolver.resolve(base_name(name), scope.time_step(), scope.layer()) {
            Some(Resolved::Value(tensor)) => Ok(tensor),
            Some(Resolved::Node(target)) => Err(RevDiffError::InvalidBinding {
                name: name.to_string(),
                node: node.to_string(),
                reason: format!("resolves to node {target}, expected an external tensor"),
            }),
            None => Err(RevDiffError::InvalidBinding {
                name: name.to_string(),
                node: node.to_string(),
                reason: "no resolver binding".to_string(),
            }),
        }
    }
}

fn replicated_count(requested: Option<usize>, available: usize, what: &str) -> Result<usize, RevDiffError> {
    match requested {
        None => Ok(available),
        Some(n) if n == available || available == 1 => Ok(n),
        Some(n) => Err(RevDiffError::InvalidArchitecture(format!(
            "requested {n} {what} but the descriptor defines {available}; only a single template can be replicated"
        ))),
    }
}

fn template<T>(items: &[T], position: usize) -> &T {
    if items.len() == 1 {
        &items[0]
    } else {
        &items[position]
    }
}
