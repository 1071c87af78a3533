use std::fmt;

/// Identity of one node instance: logical id, time step and layer.
///
/// Start and end operations carry no layer; a graph built from a
/// single-step descriptor still records `time_step = Some(0)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecificId {
    pub id: String,
    pub time_step: Option<usize>,
    pub layer: Option<usize>,
}

impl SpecificId {
    /// A key with only a logical id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            time_step: None,
            layer: None,
        }
    }

    /// Key of a start or end operation in time step `time_step`.
    pub fn at_step(id: impl Into<String>, time_step: usize) -> Self {
        Self {
            id: id.into(),
            time_step: Some(time_step),
            layer: None,
        }
    }

    /// Key of a layer operation.
    pub fn at_layer(id: impl Into<String>, time_step: usize, layer: usize) -> Self {
        Self {
            id: id.into(),
            time_step: Some(time_step),
            layer: Some(layer),
        }
    }
}

impl fmt::Display for SpecificId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        if let Some(t) = self.time_step {
            write!(f, "@t{t}")?;
        }
        if let Some(l) = self.layer {
            write!(f, "/l{l}")?;
        }
        Ok(())
    }
}
