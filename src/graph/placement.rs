//! Placement - where a buffer or node lives.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A (process-rank, device) execution location.
///
/// Two placements are the same location iff both fields match. Every
/// connection operator checks this first: co-located endpoints are wired
/// directly without any transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Placement {
    /// Process rank.
    pub rank: usize,
    /// Device index within the process.
    pub device: usize,
}

impl Placement {
    /// Creates a new placement.
    pub fn new(rank: usize, device: usize) -> Self {
        Self { rank, device }
    }

    /// Returns true if `self` and `other` name the same location.
    pub fn same(&self, other: &Placement) -> bool {
        self.rank == other.rank && self.device == other.device
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.rank, self.device)
    }
}
