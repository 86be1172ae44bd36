//! # wiregraph
//!
//! Placement-aware wiring for distributed computation graphs.
//!
//! Layers live on a placement, a (process-rank, device) pair. Connecting the
//! output of one layer to the input of another inserts transfer nodes
//! whenever the two sides are not co-located:
//!
//! - **Convergent** slices (many origins, one destination) are moved by a
//!   single batched transfer.
//! - **Divergent** slices (per-entry destinations) get one transfer per
//!   buffer that is not already in place.
//!
//! Every buffer list follows the paired convention: values in the first
//! half, gradients in the second, index aligned.
//!
//! ## Example
//!
//! ```
//! use wiregraph::prelude::*;
//!
//! let mut graph = Graph::with_config(GraphConfig::new().name("pipeline"));
//!
//! // Inputs scattered over three ranks feed a layer on rank 0.
//! let input = graph.external_list(
//!     "input",
//!     &[
//!         (Placement::new(0, 0), 8),
//!         (Placement::new(1, 0), 8),
//!         (Placement::new(2, 0), 8),
//!     ],
//! );
//! let encoder = graph.add_layer("encoder", Placement::new(0, 0), &[64]);
//! graph.connect_in(&input, encoder);
//!
//! // Gradient for the rank-0 input is reused in place.
//! assert_eq!(graph.batched_transfer_count(), 1);
//! assert_eq!(graph.transfer_count(), 2);
//! ```

pub mod config;
pub mod errors;
pub mod graph;
pub mod layers;
pub mod storage;

// Re-exports for convenience
pub use config::GraphConfig;
pub use errors::GraphError;
pub use graph::{Graph, PairedBufferList, Placement};
pub use layers::{Layer, LayerState};

/// Default backend for `BufferStore` (CPU).
pub type StoreBackend = burn::backend::NdArray;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::StoreBackend;
    pub use crate::config::GraphConfig;
    pub use crate::errors::GraphError;
    pub use crate::graph::{
        BufferId, Graph, NodeId, NodeKind, PairedBufferList, Placement, TransferDirection,
    };
    pub use crate::layers::{Layer, LayerState};
    pub use crate::storage::BufferStore;
}
