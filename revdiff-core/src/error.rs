use thiserror::Error;

/// Custom error type for the revdiff engine.
#[derive(Error, Debug, PartialEq, Clone)] // PartialEq for easier testing
pub enum RevDiffError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
        operation: String,
    },

    #[error("Rank mismatch: expected rank {expected}, got {actual} during operation {operation}")]
    RankMismatch {
        expected: usize,
        actual: usize,
        operation: String,
    },

    #[error("Tensor creation error: data length {data_len} does not match shape {shape:?}")]
    TensorCreationError { data_len: usize, shape: Vec<usize> },

    #[error("Index out of bounds: index {index:?} for shape {shape:?}")]
    IndexOutOfBounds {
        index: Vec<usize>,
        shape: Vec<usize>,
    },

    // --- Graph construction ---
    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("Input '{token}' of node {node} matches neither a built node nor a resolver binding")]
    UnresolvedInput { token: String, node: String },

    #[error("Unknown operation type '{type_name}' for node {node}")]
    UnknownOperationType { type_name: String, node: String },

    #[error("Node {0} is declared more than once")]
    DuplicateNode(String),

    #[error("Node {node} expects {expected} inputs, got {actual}")]
    ArityMismatch {
        node: String,
        expected: usize,
        actual: usize,
    },

    #[error("Binding '{name}' of node {node} is invalid: {reason}")]
    InvalidBinding {
        name: String,
        node: String,
        reason: String,
    },

    #[error("Invalid architecture: {0}")]
    InvalidArchitecture(String),

    #[error("No node with key {0} in this graph")]
    UnknownNode(String),

    // --- Execution ---
    #[error("Node {0} produced a non-finite output")]
    NonFiniteOutput(String),

    #[error("Node {0} has no output; run forward first")]
    MissingOutput(String),

    #[error("Backward error: {0}")]
    BackwardError(String),

    #[error("{} backward branches failed; first: {}", .0.len(), first_message(.0))]
    BackwardAggregate(Vec<RevDiffError>),

    #[error("No stored intermediates under id '{0}'")]
    UnknownSnapshot(String),

    // --- Model layers ---
    #[error("Layer '{layer}' has no element '{key}'")]
    UnknownElement { layer: String, key: String },

    // --- Configuration and I/O ---
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Malformed checkpoint: {0}")]
    CheckpointFormat(String),
}

fn first_message(errors: &[RevDiffError]) -> String {
    errors
        .first()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "<none>".to_string())
}

impl From<std::io::Error> for RevDiffError {
    fn from(err: std::io::Error) -> Self {
        RevDiffError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RevDiffError {
    fn from(err: serde_json::Error) -> Self {
        RevDiffError::Parse(err.to_string())
    }
}
