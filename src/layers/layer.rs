//! Layer state: parameters, bound inputs and outputs, and the lifecycle.

use crate::graph::{BufferId, PairedBufferList};

/// Where a layer is in its wiring lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    /// Parameters bound, placement fixed, nothing wired yet.
    Constructed,
    /// Inputs wired, outputs not yet.
    BottomBound,
    /// Outputs wired, inputs not yet.
    TopBound,
    /// Inputs and outputs wired.
    Ready,
}

/// A processing layer of the graph.
///
/// Bottom and top lists are write-once. Parameters and loss may only be read
/// once the layer is `Ready`; reading them earlier means the graph is being
/// queried before wiring finished, which panics.
#[derive(Debug, Clone)]
pub struct Layer {
    weights: PairedBufferList,
    bottom: Option<PairedBufferList>,
    top: Option<PairedBufferList>,
    loss: Vec<BufferId>,
}

impl Layer {
    pub(crate) fn new(weights: PairedBufferList) -> Self {
        Self {
            weights,
            bottom: None,
            top: None,
            loss: Vec::new(),
        }
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> LayerState {
        match (self.bottom.is_some(), self.top.is_some()) {
            (false, false) => LayerState::Constructed,
            (true, false) => LayerState::BottomBound,
            (false, true) => LayerState::TopBound,
            (true, true) => LayerState::Ready,
        }
    }

    /// Returns true if the bottom list has been bound.
    pub fn is_bottom_bound(&self) -> bool {
        self.bottom.is_some()
    }

    /// Returns true if the top list has been bound.
    pub fn is_top_bound(&self) -> bool {
        self.top.is_some()
    }

    /// Returns true once both bottom and top are bound.
    pub fn is_ready(&self) -> bool {
        self.state() == LayerState::Ready
    }

    /// Returns the learnable parameters.
    ///
    /// # Panics
    ///
    /// Panics if the layer is not `Ready`.
    pub fn weights(&self) -> &PairedBufferList {
        self.check_ready("parameters");
        &self.weights
    }

    /// Returns the parameter value buffers.
    pub fn weight_data(&self) -> &[BufferId] {
        self.weights().values()
    }

    /// Returns the parameter gradient buffers.
    pub fn weight_diff(&self) -> &[BufferId] {
        self.weights().gradients()
    }

    /// Returns `{value, gradient}` of parameter `index`.
    pub fn weight_pair(&self, index: usize) -> PairedBufferList {
        self.weights().pair_at(index)
    }

    /// Returns the loss buffers.
    ///
    /// # Panics
    ///
    /// Panics if the layer is not `Ready`.
    pub fn loss(&self) -> &[BufferId] {
        self.check_ready("loss");
        &self.loss
    }

    /// Returns the bound input list.
    ///
    /// # Panics
    ///
    /// Panics if the bottom has not been bound.
    pub fn bottom(&self) -> &PairedBufferList {
        self.bottom
            .as_ref()
            .unwrap_or_else(|| panic!("Layer bottom read before it was bound"))
    }

    /// Returns the input value buffers.
    pub fn bottom_data(&self) -> &[BufferId] {
        self.bottom().values()
    }

    /// Returns the input gradient buffers.
    pub fn bottom_diff(&self) -> &[BufferId] {
        self.bottom().gradients()
    }

    /// Returns `{value, gradient}` of input `index`.
    pub fn bottom_pair(&self, index: usize) -> PairedBufferList {
        self.bottom().pair_at(index)
    }

    /// Returns the bound output list.
    ///
    /// # Panics
    ///
    /// Panics if the top has not been bound.
    pub fn top(&self) -> &PairedBufferList {
        self.top
            .as_ref()
            .unwrap_or_else(|| panic!("Layer top read before it was bound"))
    }

    /// Returns the output value buffers.
    pub fn top_data(&self) -> &[BufferId] {
        self.top().values()
    }

    /// Returns the output gradient buffers.
    pub fn top_diff(&self) -> &[BufferId] {
        self.top().gradients()
    }

    /// Returns `{value, gradient}` of output `index`.
    pub fn top_pair(&self, index: usize) -> PairedBufferList {
        self.top().pair_at(index)
    }

    pub(crate) fn set_bottom(&mut self, bottom: PairedBufferList) {
        assert!(self.bottom.is_none(), "Layer bottom is already bound");
        self.bottom = Some(bottom);
    }

    pub(crate) fn set_top(&mut self, top: PairedBufferList) {
        assert!(self.top.is_none(), "Layer top is already bound");
        self.top = Some(top);
    }

    pub(crate) fn set_loss(&mut self, loss: Vec<BufferId>) {
        self.loss = loss;
    }

    fn check_ready(&self, what: &str) {
        assert!(
            self.is_ready(),
            "Layer {} read before wiring completed (state: {:?})",
            what,
            self.state()
        );
    }
}
