//! Graph-related error types.

use thiserror::Error;

use crate::graph::{BufferId, GraphId};

/// Errors that can occur outside the wiring phase.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Buffer {buffer} has size {expected}, got {actual} values")]
    SizeMismatch {
        buffer: BufferId,
        expected: usize,
        actual: usize,
    },

    #[error("Buffer {0} is not materialized in this store")]
    UnknownBuffer(BufferId),

    #[error("Store was materialized from graph {expected}, not graph {actual}")]
    GraphMismatch { expected: GraphId, actual: GraphId },

    #[error("Storage error: {message}")]
    Storage { message: String },
}
