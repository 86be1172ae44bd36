//! Reference buffer storage backed by burn tensors.
//!
//! `BufferStore` gives every buffer of a wired graph a 1-D tensor on the
//! device its placement maps to, and replays the graph's transfer nodes.
//! It is how wiring is checked end to end without an execution engine.

use burn::tensor::{Tensor, backend::Backend};

use crate::errors::GraphError;
use crate::graph::{BufferId, Graph, GraphId, NodeKind, Placement, TransferDirection};

/// Storage slot of one buffer.
struct Slot<B: Backend> {
    tensor: Tensor<B, 1>,
    device: B::Device,
}

/// Tensors for every buffer of one graph, indexed by `BufferId`.
///
/// # Example
///
/// ```
/// use burn::backend::NdArray;
/// use wiregraph::graph::{Graph, Placement};
/// use wiregraph::storage::BufferStore;
///
/// let mut graph = Graph::new();
/// let x = graph.external_list("x", &[(Placement::new(1, 0), 2)]);
/// let layer = graph.add_layer("layer", Placement::new(0, 0), &[]);
/// graph.connect_in(&x, layer);
///
/// let device = Default::default();
/// let mut store = BufferStore::<NdArray>::on_device(&graph, &device);
/// store.write(x.value(0), &[1.0, 2.0]).unwrap();
/// store.run_forward_transfers(&graph).unwrap();
///
/// let bottom = graph.layer(layer).bottom_data()[0];
/// assert_eq!(store.read(bottom).unwrap(), vec![1.0, 2.0]);
/// ```
pub struct BufferStore<B: Backend> {
    graph_id: GraphId,
    slots: Vec<Slot<B>>,
}

impl<B: Backend> BufferStore<B> {
    /// Allocates a zeroed tensor for every buffer of `graph`, on the device
    /// `device_for` returns for the buffer's placement.
    pub fn materialize<F>(graph: &Graph, device_for: F) -> Self
    where
        F: Fn(Placement) -> B::Device,
    {
        let slots = graph
            .buffers()
            .iter()
            .map(|buffer| {
                let device = device_for(buffer.placement());
                Slot {
                    tensor: Tensor::<B, 1>::zeros([buffer.size()], &device),
                    device,
                }
            })
            .collect();

        log::debug!(
            "[{}] materialized {} buffers",
            graph.config().name,
            graph.buffers().len()
        );

        Self {
            graph_id: graph.id(),
            slots,
        }
    }

    /// Allocates every buffer on a single device, whatever its placement.
    pub fn on_device(graph: &Graph, device: &B::Device) -> Self {
        Self::materialize(graph, |_| device.clone())
    }

    /// Returns the number of materialized buffers.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no buffer is materialized.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the tensor backing a buffer.
    pub fn tensor(&self, id: BufferId) -> Result<&Tensor<B, 1>, GraphError> {
        Ok(&self.slot(id)?.tensor)
    }

    /// Overwrites a buffer's contents.
    pub fn write(&mut self, id: BufferId, values: &[f32]) -> Result<(), GraphError> {
        let slot = self
            .slots
            .get_mut(id.index())
            .ok_or(GraphError::UnknownBuffer(id))?;
        let [expected] = slot.tensor.dims();
        if values.len() != expected {
            return Err(GraphError::SizeMismatch {
                buffer: id,
                expected,
                actual: values.len(),
            });
        }
        slot.tensor = Tensor::<B, 1>::from_floats(values, &slot.device);
        Ok(())
    }

    /// Reads a buffer's contents.
    pub fn read(&self, id: BufferId) -> Result<Vec<f32>, GraphError> {
        self.slot(id)?
            .tensor
            .to_data()
            .to_vec::<f32>()
            .map_err(|e| GraphError::Storage {
                message: format!("{e:?}"),
            })
    }

    /// Runs every forward transfer of `graph` in creation order.
    ///
    /// Returns the number of buffers copied.
    pub fn run_forward_transfers(&mut self, graph: &Graph) -> Result<usize, GraphError> {
        self.check_graph(graph)?;
        let mut copied = 0;
        for node in graph.transfer_nodes() {
            copied += self.run_node(node.kind(), TransferDirection::Forward)?;
        }
        Ok(copied)
    }

    /// Runs every backward transfer of `graph` in reverse creation order.
    ///
    /// Returns the number of buffers copied.
    pub fn run_backward_transfers(&mut self, graph: &Graph) -> Result<usize, GraphError> {
        self.check_graph(graph)?;
        let nodes: Vec<_> = graph.transfer_nodes().collect();
        let mut copied = 0;
        for node in nodes.into_iter().rev() {
            copied += self.run_node(node.kind(), TransferDirection::Backward)?;
        }
        Ok(copied)
    }

    fn run_node(
        &mut self,
        kind: &NodeKind,
        direction: TransferDirection,
    ) -> Result<usize, GraphError> {
        match kind {
            NodeKind::Transfer(t) if t.direction == direction => {
                self.copy(t.input, t.output)?;
                Ok(1)
            }
            NodeKind::BatchedTransfer(b) if b.direction == direction => {
                for (&input, &output) in b.inputs.iter().zip(&b.outputs) {
                    self.copy(input, output)?;
                }
                Ok(b.len())
            }
            _ => Ok(0),
        }
    }

    fn copy(&mut self, from: BufferId, to: BufferId) -> Result<(), GraphError> {
        let value = self.slot(from)?.tensor.clone();
        let slot = self
            .slots
            .get_mut(to.index())
            .ok_or(GraphError::UnknownBuffer(to))?;
        slot.tensor = value.to_device(&slot.device);
        Ok(())
    }

    fn slot(&self, id: BufferId) -> Result<&Slot<B>, GraphError> {
        self.slots
            .get(id.index())
            .ok_or(GraphError::UnknownBuffer(id))
    }

    fn check_graph(&self, graph: &Graph) -> Result<(), GraphError> {
        if graph.id() != self.graph_id {
            return Err(GraphError::GraphMismatch {
                expected: self.graph_id,
                actual: graph.id(),
            });
        }
        Ok(())
    }
}
