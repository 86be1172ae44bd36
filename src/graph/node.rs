//! Graph nodes: layers and the transfer nodes wiring creates.
//!
//! Uses a simple enum instead of trait objects. The execution engine
//! matches on `NodeKind` to decide what to schedule.

use std::fmt;

use crate::layers::Layer;

use super::buffer::BufferId;
use super::placement::Placement;

/// Handle to a node owned by a `Graph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Returns the arena index of this node.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Pass during which a transfer moves data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Carries values toward consumers.
    Forward,
    /// Carries gradients back toward producers.
    Backward,
}

/// Copies one buffer into another, usually on a different placement.
#[derive(Debug, Clone)]
pub struct TransferNode {
    /// Buffer read by the copy.
    pub input: BufferId,
    /// Buffer written by the copy.
    pub output: BufferId,
    pub direction: TransferDirection,
}

/// Copies many buffers to one uniform destination placement in one
/// operation. `outputs[i]` receives `inputs[i]`.
#[derive(Debug, Clone)]
pub struct BatchedTransferNode {
    /// Destination placement shared by every output.
    pub placement: Placement,
    pub inputs: Vec<BufferId>,
    /// Buffers allocated by this node at `placement`.
    pub outputs: Vec<BufferId>,
    pub direction: TransferDirection,
}

impl BatchedTransferNode {
    /// Returns the number of buffers moved.
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Returns true if the node moves nothing.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// What a graph node does.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A processing layer.
    Layer(Layer),
    /// A single-buffer copy.
    Transfer(TransferNode),
    /// A many-buffer copy to one placement.
    BatchedTransfer(BatchedTransferNode),
}

/// A node registered in a `Graph`.
#[derive(Debug, Clone)]
pub struct GraphNode {
    id: NodeId,
    name: String,
    parent: Option<NodeId>,
    placement: Placement,
    kind: NodeKind,
}

impl GraphNode {
    pub(crate) fn new(
        id: NodeId,
        name: String,
        parent: Option<NodeId>,
        placement: Placement,
        kind: NodeKind,
    ) -> Self {
        Self {
            id,
            name,
            parent,
            placement,
            kind,
        }
    }

    /// Returns the handle of this node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the debug name of this node.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the node that created this one, if any.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Returns where this node runs.
    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Returns what this node does.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    /// Returns the layer, if this node is one.
    pub fn as_layer(&self) -> Option<&Layer> {
        match &self.kind {
            NodeKind::Layer(layer) => Some(layer),
            _ => None,
        }
    }

    /// Returns the transfer, if this node is one.
    pub fn as_transfer(&self) -> Option<&TransferNode> {
        match &self.kind {
            NodeKind::Transfer(transfer) => Some(transfer),
            _ => None,
        }
    }

    /// Returns the batched transfer, if this node is one.
    pub fn as_batched_transfer(&self) -> Option<&BatchedTransferNode> {
        match &self.kind {
            NodeKind::BatchedTransfer(batch) => Some(batch),
            _ => None,
        }
    }

    /// Returns the direction of a transfer node, `None` for layers.
    pub fn direction(&self) -> Option<TransferDirection> {
        match &self.kind {
            NodeKind::Layer(_) => None,
            NodeKind::Transfer(t) => Some(t.direction),
            NodeKind::BatchedTransfer(b) => Some(b.direction),
        }
    }
}
