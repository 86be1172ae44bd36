//! Buffer handles and the records they point to.
//!
//! A `BufferId` is a lightweight handle into the owning `Graph`. The record
//! behind it is written once at allocation and never mutated afterwards.

use std::fmt;

use super::node::NodeId;
use super::placement::Placement;

/// Handle to a buffer owned by a `Graph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub(crate) usize);

impl BufferId {
    /// Returns the arena index of this buffer.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Who is responsible for a buffer's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOwner {
    /// Supplied by the caller; the graph only references it.
    External,
    /// Allocated by a graph node, which owns it.
    Node(NodeId),
}

/// Buffer record: a sized slot tagged with its placement.
///
/// It tracks:
/// - The placement the storage lives on
/// - The number of elements
/// - The node (if any) that allocated it
#[derive(Debug, Clone)]
pub struct Buffer {
    id: BufferId,
    name: String,
    placement: Placement,
    size: usize,
    owner: BufferOwner,
}

impl Buffer {
    pub(crate) fn new(
        id: BufferId,
        name: String,
        placement: Placement,
        size: usize,
        owner: BufferOwner,
    ) -> Self {
        Self {
            id,
            name,
            placement,
            size,
            owner,
        }
    }

    /// Returns the handle of this buffer.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Returns the debug name given at allocation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns where this buffer lives.
    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Returns the number of elements.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the owner of this buffer.
    pub fn owner(&self) -> BufferOwner {
        self.owner
    }

    /// Returns true if the caller supplied this buffer.
    pub fn is_external(&self) -> bool {
        self.owner == BufferOwner::External
    }
}
