//! Declarative description of a network: what operations exist, in which
//! time step and layer, and which names feed them.
//!
//! The JSON form uses camelCase keys:
//!
//! ```json
//! {
//!   "timeSteps": [{
//!     "startOperations": [{ "id": "proj", "type": "MatrixMultiply", "inputs": ["x", "W"] }],
//!     "layers": [{ "operations": [
//!       { "id": "act", "type": "Tanh", "inputs": ["proj"], "setResultTo": "hidden" }
//!     ]}],
//!     "endOperations": []
//!   }]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RevDiffError;

/// One operation in the descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSpec {
    /// Logical id. Unique within its time step and layer.
    pub id: String,
    /// Registry tag of the operation type.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Input tokens: ids of earlier operations or resolver names, optionally
    /// subscripted (`h[t-1]`).
    #[serde(default)]
    pub inputs: Vec<String>,
    /// External slot that receives a copy of the output after forward.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_result_to: Option<String>,
    /// Per input, an external tensor that accumulates that input's gradient.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gradient_result_to: Vec<Option<String>>,
}

impl OperationSpec {
    pub fn new<I, S>(id: impl Into<String>, type_name: impl Into<String>, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            inputs: inputs.into_iter().map(Into::into).collect(),
            set_result_to: None,
            gradient_result_to: Vec::new(),
        }
    }

    pub fn with_result_to(mut self, name: impl Into<String>) -> Self {
        self.set_result_to = Some(name.into());
        self
    }

    /// Sets the gradient destinations, aligned with `inputs`.
    pub fn with_gradient_result_to<I>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = Option<&'static str>>,
    {
        self.gradient_result_to = names.into_iter().map(|n| n.map(str::to_string)).collect();
        self
    }
}

/// Operations replicated once per layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSpec {
    #[serde(default)]
    pub operations: Vec<OperationSpec>,
}

/// Everything that runs in one time step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeStepSpec {
    #[serde(default)]
    pub start_operations: Vec<OperationSpec>,
    #[serde(default)]
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub end_operations: Vec<OperationSpec>,
}

/// The whole descriptor. Read once when a graph is built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkArchitecture {
    pub time_steps: Vec<TimeStepSpec>,
}

impl NetworkArchitecture {
    /// A descriptor with a single time-step template.
    pub fn single_step(step: TimeStepSpec) -> Self {
        Self {
            time_steps: vec![step],
        }
    }

    /// Parses the JSON form.
    ///
    /// # Errors
    /// Returns `RevDiffError::Parse` on malformed JSON and
    /// `RevDiffError::InvalidArchitecture` if the descriptor has no time steps.
    pub fn from_json_str(json: &str) -> Result<Self, RevDiffError> {
        let architecture: NetworkArchitecture = serde_json::from_str(json)?;
        architecture.validate()?;
        Ok(architecture)
    }

    /// Reads and parses a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RevDiffError> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String, RevDiffError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Structural checks that do not need a registry or resolver.
    pub fn validate(&self) -> Result<(), RevDiffError> {
        if self.time_steps.is_empty() {
            return Err(RevDiffError::InvalidArchitecture(
                "at least one time step is required".to_string(),
            ));
        }
        for spec in self.operations() {
            if spec.id.contains('[') || spec.id.contains(']') {
                return Err(RevDiffError::InvalidArchitecture(format!(
                    "operation id '{}' must not contain brackets",
                    spec.id
                )));
            }
        }
        Ok(())
    }

    /// Every operation spec in declaration order (templates, not replicas).
    pub fn operations(&self) -> impl Iterator<Item = &OperationSpec> {
        self.time_steps.iter().flat_map(|step| {
            step.start_operations
                .iter()
                .chain(step.layers.iter().flat_map(|l| l.operations.iter()))
                .chain(step.end_operations.iter())
        })
    }
}

#[cfg(test)]
#[path = "architecture_test.rs"]
mod tests;
