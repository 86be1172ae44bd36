//! Placement-aware computation graph and its connection protocol.
//!
//! This module provides the graph owner, its buffer and node records, and
//! the operators that wire layers to each other and to external buffers.
//!
//! # Example
//!
//! ```
//! use wiregraph::graph::{Graph, Placement};
//!
//! let mut graph = Graph::new();
//! let a = graph.add_layer("a", Placement::new(0, 0), &[16]);
//! let b = graph.add_layer("b", Placement::new(1, 0), &[16]);
//!
//! graph.allocate_top(a, &[4, 4]);
//! graph.connect(a, b);
//!
//! // Values gathered by one batched copy, gradients sent back one by one.
//! assert_eq!(graph.batched_transfer_count(), 1);
//! assert_eq!(graph.transfer_count(), 2);
//! assert_eq!(graph.layer(b).bottom().len(), 4);
//! ```

mod buffer;
mod connect;
mod core;
mod node;
mod paired;
mod placement;

pub use buffer::{Buffer, BufferId, BufferOwner};
pub use self::core::{Graph, GraphId};
pub use node::{
    BatchedTransferNode, GraphNode, NodeId, NodeKind, TransferDirection, TransferNode,
};
pub use paired::PairedBufferList;
pub use placement::Placement;
