//! Error types for graph configuration and buffer storage.
//!
//! Wiring contract violations are not represented here: they panic.

mod graph_error;

pub use graph_error::GraphError;
