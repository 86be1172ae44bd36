//! Graph - the owner of every node and buffer.
//!
//! Layers, transfer nodes and buffers live in arenas inside the graph and
//! are addressed by `NodeId` / `BufferId` handles. Dropping the graph tears
//! all of them down as a unit.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::GraphConfig;
use crate::layers::Layer;

use super::buffer::{Buffer, BufferId, BufferOwner};
use super::node::{
    BatchedTransferNode, GraphNode, NodeId, NodeKind, TransferDirection, TransferNode,
};
use super::paired::PairedBufferList;
use super::placement::Placement;

/// Global counter for unique graph IDs.
static GRAPH_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Unique identifier for a Graph.
pub type GraphId = usize;

fn next_graph_id() -> GraphId {
    GRAPH_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Graph owns the layers, transfer nodes and buffers of a computation.
///
/// Wiring happens once, up front, through `&mut Graph`. After wiring the
/// graph is only read: the execution engine walks `nodes()` and the
/// transfer nodes in creation order.
///
/// # Example
///
/// ```
/// use wiregraph::graph::{Graph, Placement};
///
/// let mut graph = Graph::new();
/// let a = graph.add_layer("a", Placement::new(0, 0), &[]);
/// let b = graph.add_layer("b", Placement::new(0, 0), &[]);
/// graph.allocate_top(a, &[8]);
/// graph.connect(a, b);
///
/// assert_eq!(graph.transfer_count(), 0);
/// ```
#[derive(Debug)]
pub struct Graph {
    id: GraphId,
    config: GraphConfig,
    nodes: Vec<GraphNode>,
    buffers: Vec<Buffer>,
}

impl Graph {
    /// Creates an empty graph with the default configuration.
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    /// Creates an empty graph with the given configuration.
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            id: next_graph_id(),
            config,
            nodes: Vec::new(),
            buffers: Vec::new(),
        }
    }

    /// Returns the unique ID of this graph.
    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Returns the configuration.
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Adds a layer whose parameters are freshly allocated at `placement`.
    ///
    /// Each entry of `param_sizes` yields a value buffer and a gradient
    /// buffer, both owned by the new layer.
    pub fn add_layer(
        &mut self,
        name: &str,
        placement: Placement,
        param_sizes: &[usize],
    ) -> NodeId {
        let id = self.push_node(
            name.to_string(),
            None,
            placement,
            NodeKind::Layer(Layer::new(PairedBufferList::empty())),
        );

        let values: Vec<BufferId> = param_sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| {
                self.allocate_named(id, format!("{name}/weight_data[{i}]"), size, None)
            })
            .collect();
        let gradients: Vec<BufferId> = param_sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| {
                self.allocate_named(id, format!("{name}/weight_diff[{i}]"), size, None)
            })
            .collect();

        *self.layer_mut(id) = Layer::new(PairedBufferList::from_halves(&values, &gradients));
        id
    }

    /// Adds a layer that references existing parameter buffers.
    ///
    /// The layer does not own `weights`; this is how parameters are shared.
    pub fn add_layer_with_weights(
        &mut self,
        name: &str,
        placement: Placement,
        weights: PairedBufferList,
    ) -> NodeId {
        self.push_node(
            name.to_string(),
            None,
            placement,
            NodeKind::Layer(Layer::new(weights)),
        )
    }

    /// Registers a caller-owned buffer.
    pub fn external_buffer(&mut self, name: &str, placement: Placement, size: usize) -> BufferId {
        self.push_buffer(name.to_string(), placement, size, BufferOwner::External)
    }

    /// Registers a caller-owned paired list, one value and one gradient
    /// buffer per `(placement, size)` entry.
    pub fn external_list(
        &mut self,
        name: &str,
        signals: &[(Placement, usize)],
    ) -> PairedBufferList {
        let values: Vec<BufferId> = signals
            .iter()
            .enumerate()
            .map(|(i, &(placement, size))| {
                self.external_buffer(&format!("{name}/data[{i}]"), placement, size)
            })
            .collect();
        let gradients: Vec<BufferId> = signals
            .iter()
            .enumerate()
            .map(|(i, &(placement, size))| {
                self.external_buffer(&format!("{name}/diff[{i}]"), placement, size)
            })
            .collect();
        PairedBufferList::from_halves(&values, &gradients)
    }

    /// Allocates a buffer owned by `owner`.
    ///
    /// The buffer lives at the owner's placement unless `placement` overrides it.
    pub fn allocate(
        &mut self,
        owner: NodeId,
        size: usize,
        placement: Option<Placement>,
    ) -> BufferId {
        let name = format!("{}/buffer", self.nodes[owner.0].name());
        self.allocate_named(owner, name, size, placement)
    }

    /// Allocates a paired list at the layer's placement and binds it as the
    /// layer's top. Used by layers that produce their own outputs.
    pub fn allocate_top(&mut self, layer: NodeId, sizes: &[usize]) -> PairedBufferList {
        let name = self.nodes[layer.0].name().to_string();
        let values: Vec<BufferId> = sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| {
                self.allocate_named(layer, format!("{name}/top_data[{i}]"), size, None)
            })
            .collect();
        let gradients: Vec<BufferId> = sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| {
                self.allocate_named(layer, format!("{name}/top_diff[{i}]"), size, None)
            })
            .collect();

        let top = PairedBufferList::from_halves(&values, &gradients);
        self.bind_top(layer, top.clone());
        top
    }

    /// Binds the layer's input list.
    ///
    /// # Panics
    ///
    /// Panics if the bottom is already bound or `layer` is not a layer.
    pub fn bind_bottom(&mut self, layer: NodeId, bottom: PairedBufferList) {
        self.layer_mut(layer).set_bottom(bottom);
    }

    /// Binds the layer's output list.
    ///
    /// # Panics
    ///
    /// Panics if the top is already bound or `layer` is not a layer.
    pub fn bind_top(&mut self, layer: NodeId, top: PairedBufferList) {
        self.layer_mut(layer).set_top(top);
    }

    /// Sets the layer's loss buffers.
    pub fn bind_loss(&mut self, layer: NodeId, loss: Vec<BufferId>) {
        self.layer_mut(layer).set_loss(loss);
    }

    /// Creates a single-buffer transfer node owned by `owner`.
    pub fn create_transfer(
        &mut self,
        owner: NodeId,
        name: String,
        input: BufferId,
        output: BufferId,
        direction: TransferDirection,
    ) -> NodeId {
        let placement = self.placement_of(owner);
        log::debug!(
            "[{}] transfer {}: {}@{} -> {}@{} ({:?})",
            self.config.name,
            name,
            input,
            self.buffers[input.0].placement(),
            output,
            self.buffers[output.0].placement(),
            direction
        );
        self.push_node(
            name,
            Some(owner),
            placement,
            NodeKind::Transfer(TransferNode {
                input,
                output,
                direction,
            }),
        )
    }

    /// Creates a batched transfer node owned by `owner` that moves every
    /// buffer of `inputs` to `placement`.
    ///
    /// The node allocates (and owns) one output buffer per input, with the
    /// same size, at `placement`.
    pub fn create_batched_transfer(
        &mut self,
        owner: NodeId,
        name: String,
        placement: Placement,
        inputs: &[BufferId],
        direction: TransferDirection,
    ) -> NodeId {
        log::debug!(
            "[{}] batched transfer {}: {} buffers -> {} ({:?})",
            self.config.name,
            name,
            inputs.len(),
            placement,
            direction
        );
        let id = self.push_node(
            name.clone(),
            Some(owner),
            placement,
            NodeKind::BatchedTransfer(BatchedTransferNode {
                placement,
                inputs: inputs.to_vec(),
                outputs: Vec::with_capacity(inputs.len()),
                direction,
            }),
        );

        let outputs: Vec<BufferId> = inputs
            .iter()
            .enumerate()
            .map(|(i, input)| {
                let size = self.buffers[input.0].size();
                self.allocate_named(id, format!("{name}/out[{i}]"), size, Some(placement))
            })
            .collect();

        if let NodeKind::BatchedTransfer(batch) = self.nodes[id.0].kind_mut() {
            batch.outputs = outputs;
        }
        id
    }

    /// Returns where a node lives.
    pub fn placement_of(&self, node: NodeId) -> Placement {
        self.nodes[node.0].placement()
    }

    /// Returns the node with the given handle.
    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id.0]
    }

    /// Returns every node in creation order.
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Returns the layer with the given handle.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a layer.
    pub fn layer(&self, id: NodeId) -> &Layer {
        self.nodes[id.0]
            .as_layer()
            .unwrap_or_else(|| panic!("Node {} is not a layer", id))
    }

    pub(crate) fn layer_mut(&mut self, id: NodeId) -> &mut Layer {
        match self.nodes[id.0].kind_mut() {
            NodeKind::Layer(layer) => layer,
            _ => panic!("Node {} is not a layer", id),
        }
    }

    /// Returns the handles of every layer in creation order.
    pub fn layer_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|node| node.as_layer().is_some())
            .map(|node| node.id())
    }

    /// Returns the buffer record behind a handle.
    pub fn buffer(&self, id: BufferId) -> &Buffer {
        &self.buffers[id.0]
    }

    /// Returns every buffer in allocation order.
    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    /// Returns the nodes created by `parent`.
    pub fn children(&self, parent: NodeId) -> impl Iterator<Item = &GraphNode> + '_ {
        self.nodes
            .iter()
            .filter(move |node| node.parent() == Some(parent))
    }

    /// Returns transfer and batched transfer nodes in creation order.
    pub fn transfer_nodes(&self) -> impl Iterator<Item = &GraphNode> + '_ {
        self.nodes.iter().filter(|node| node.as_layer().is_none())
    }

    /// Returns the single-buffer transfers in creation order.
    pub fn transfers(&self) -> impl Iterator<Item = &TransferNode> + '_ {
        self.nodes.iter().filter_map(|node| node.as_transfer())
    }

    /// Returns the batched transfers in creation order.
    pub fn batched_transfers(&self) -> impl Iterator<Item = &BatchedTransferNode> + '_ {
        self.nodes.iter().filter_map(|node| node.as_batched_transfer())
    }

    /// Returns the number of single-buffer transfers.
    pub fn transfer_count(&self) -> usize {
        self.transfers().count()
    }

    /// Returns the number of batched transfers.
    pub fn batched_transfer_count(&self) -> usize {
        self.batched_transfers().count()
    }

    pub(crate) fn allocate_named(
        &mut self,
        owner: NodeId,
        name: String,
        size: usize,
        placement: Option<Placement>,
    ) -> BufferId {
        let placement = placement.unwrap_or_else(|| self.placement_of(owner));
        self.push_buffer(name, placement, size, BufferOwner::Node(owner))
    }

    fn push_buffer(
        &mut self,
        name: String,
        placement: Placement,
        size: usize,
        owner: BufferOwner,
    ) -> BufferId {
        let id = BufferId(self.buffers.len());
        self.buffers.push(Buffer::new(id, name, placement, size, owner));
        id
    }

    fn push_node(
        &mut self,
        name: String,
        parent: Option<NodeId>,
        placement: Placement,
        kind: NodeKind,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(GraphNode::new(id, name, parent, placement, kind));
        id
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_ids_are_unique() {
        let graph1 = Graph::new();
        let graph2 = Graph::new();
        assert_ne!(graph1.id(), graph2.id());
    }

    #[test]
    fn test_add_layer_allocates_owned_parameters() {
        let mut graph = Graph::new();
        let placement = Placement::new(1, 3);
        let layer = graph.add_layer("dense", placement, &[12, 4]);

        graph.allocate_top(layer, &[4]);
        let input = graph.external_list("input", &[(placement, 3)]);
        graph.bind_bottom(layer, input);

        let weights = graph.layer(layer).weights().clone();
        assert_eq!(weights.logical_len(), 2);
        for &id in weights.as_slice() {
            let buffer = graph.buffer(id);
            assert_eq!(buffer.placement(), placement);
            assert_eq!(buffer.owner(), BufferOwner::Node(layer));
        }
        assert_eq!(graph.buffer(weights.value(0)).size(), 12);
        assert_eq!(graph.buffer(weights.gradient(1)).size(), 4);
    }

    #[test]
    fn test_shared_weights_are_not_owned() {
        let mut graph = Graph::new();
        let placement = Placement::new(0, 0);
        let weights = graph.external_list("shared", &[(placement, 8)]);

        let user = graph.add_layer_with_weights("user", placement, weights.clone());
        assert!(graph.children(user).next().is_none());
        assert!(graph.buffer(weights.value(0)).is_external());
        assert!(graph.buffers().iter().all(|b| b.owner() != BufferOwner::Node(user)));
    }

    #[test]
    fn test_allocate_defaults_to_owner_placement() {
        let mut graph = Graph::new();
        let layer = graph.add_layer("l", Placement::new(2, 1), &[]);

        let local = graph.allocate(layer, 5, None);
        let remote = graph.allocate(layer, 5, Some(Placement::new(0, 0)));

        assert_eq!(graph.buffer(local).placement(), Placement::new(2, 1));
        assert_eq!(graph.buffer(remote).placement(), Placement::new(0, 0));
        assert_eq!(graph.buffer(remote).owner(), BufferOwner::Node(layer));
    }

    #[test]
    fn test_external_list_layout() {
        let mut graph = Graph::new();
        let list = graph.external_list(
            "x",
            &[(Placement::new(0, 0), 2), (Placement::new(1, 0), 3)],
        );

        assert_eq!(list.logical_len(), 2);
        assert_eq!(graph.buffer(list.gradient(1)).placement(), Placement::new(1, 0));
        assert_eq!(graph.buffer(list.gradient(1)).size(), 3);
        assert!(list.as_slice().iter().all(|&id| graph.buffer(id).is_external()));
    }

    #[test]
    fn test_batched_transfer_allocates_outputs() {
        let mut graph = Graph::new();
        let layer = graph.add_layer("l", Placement::new(1, 0), &[]);
        let a = graph.external_buffer("a", Placement::new(0, 0), 4);
        let b = graph.external_buffer("b", Placement::new(0, 1), 6);

        let id = graph.create_batched_transfer(
            layer,
            "l/copy".to_string(),
            Placement::new(1, 0),
            &[a, b],
            TransferDirection::Forward,
        );

        let batch = graph.node(id).as_batched_transfer().unwrap();
        assert_eq!(batch.outputs.len(), 2);
        assert_eq!(graph.buffer(batch.outputs[1]).size(), 6);
        assert_eq!(
            graph.buffer(batch.outputs[0]).owner(),
            BufferOwner::Node(id)
        );
        assert_eq!(graph.node(id).parent(), Some(layer));
        assert_eq!(graph.children(layer).count(), 1);
    }

    #[test]
    #[should_panic(expected = "is not a layer")]
    fn test_layer_on_transfer_node_panics() {
        let mut graph = Graph::new();
        let layer = graph.add_layer("l", Placement::new(0, 0), &[]);
        let a = graph.external_buffer("a", Placement::new(0, 0), 1);
        let b = graph.allocate(layer, 1, None);
        let copy = graph.create_transfer(
            layer,
            "copy".to_string(),
            a,
            b,
            TransferDirection::Forward,
        );
        graph.layer(copy);
    }
}
