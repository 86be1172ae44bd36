//! Graph configuration.

use serde::Deserialize;

use crate::errors::GraphError;

/// Configuration for a `Graph`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Label prefixed to generated node and buffer names and log lines.
    pub name: String,
    /// Whether to log a summary of every connection at info level.
    pub verbose: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            name: "graph".to_string(),
            verbose: false,
        }
    }
}

impl GraphConfig {
    /// Creates a new GraphConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the graph label.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets whether to log connection summaries.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
