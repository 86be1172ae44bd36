//! Layers: the processing nodes that wiring binds.
//!
//! A layer only carries its buffer lists and lifecycle here; what it
//! computes belongs to the execution engine.

mod layer;

pub use layer::{Layer, LayerState};
