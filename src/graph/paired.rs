//! Paired buffer lists: values in the first half, gradients in the second.

use std::sync::Arc;

use super::buffer::BufferId;

/// An even-length list of buffer handles split into an index-aligned value
/// half and gradient half.
///
/// Element `i` and element `n + i` are the value and gradient of the same
/// logical signal. The handles are shared: cloning a list keeps its
/// identity, which `ptr_eq` observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedBufferList {
    handles: Arc<[BufferId]>,
}

impl PairedBufferList {
    /// Creates a list from `2n` handles.
    ///
    /// # Panics
    ///
    /// Panics if the number of handles is odd.
    pub fn new(handles: Vec<BufferId>) -> Self {
        assert_eq!(
            handles.len() % 2,
            0,
            "Paired buffer list must have an even length, got {}",
            handles.len()
        );
        Self {
            handles: handles.into(),
        }
    }

    /// Creates an empty list.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Joins a value half and a gradient half.
    ///
    /// # Panics
    ///
    /// Panics if the halves differ in length.
    pub fn from_halves(values: &[BufferId], gradients: &[BufferId]) -> Self {
        assert_eq!(
            values.len(),
            gradients.len(),
            "Value and gradient halves must have the same length"
        );
        let mut handles = Vec::with_capacity(values.len() * 2);
        handles.extend_from_slice(values);
        handles.extend_from_slice(gradients);
        Self::new(handles)
    }

    /// Merges several lists into one: all values first, then all gradients.
    ///
    /// Used to feed a layer from more than one upstream source.
    pub fn merge(lists: &[PairedBufferList]) -> Self {
        let values: Vec<BufferId> = lists.iter().flat_map(|l| l.values()).copied().collect();
        let gradients: Vec<BufferId> = lists
            .iter()
            .flat_map(|l| l.gradients())
            .copied()
            .collect();
        Self::from_halves(&values, &gradients)
    }

    /// Returns the total number of handles (`2n`).
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if the list holds no signals.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Returns the number of logical signals (`n`).
    pub fn logical_len(&self) -> usize {
        self.handles.len() / 2
    }

    /// Returns every handle, values first.
    pub fn as_slice(&self) -> &[BufferId] {
        &self.handles
    }

    /// Returns the value half, `[0, n)`.
    pub fn values(&self) -> &[BufferId] {
        &self.handles[..self.logical_len()]
    }

    /// Returns the gradient half, `[n, 2n)`.
    pub fn gradients(&self) -> &[BufferId] {
        &self.handles[self.logical_len()..]
    }

    /// Returns the value handle of signal `index`.
    pub fn value(&self, index: usize) -> BufferId {
        self.check_index(index);
        self.handles[index]
    }

    /// Returns the gradient handle of signal `index`.
    pub fn gradient(&self, index: usize) -> BufferId {
        self.check_index(index);
        self.handles[self.logical_len() + index]
    }

    /// Returns `{value(index), gradient(index)}` as a one-signal list.
    ///
    /// # Panics
    ///
    /// Panics if `index >= logical_len()`.
    pub fn pair_at(&self, index: usize) -> PairedBufferList {
        self.check_index(index);
        PairedBufferList::new(vec![self.value(index), self.gradient(index)])
    }

    /// Returns true if both lists share the same underlying handles.
    pub fn ptr_eq(a: &PairedBufferList, b: &PairedBufferList) -> bool {
        Arc::ptr_eq(&a.handles, &b.handles)
    }

    fn check_index(&self, index: usize) {
        assert!(
            index < self.logical_len(),
            "Signal index {} out of range for paired list of {} signals",
            index,
            self.logical_len()
        );
    }
}

impl Default for PairedBufferList {
    fn default() -> Self {
        Self::empty()
    }
}
