//! Connection protocol: wiring layers to layers and to external buffers.
//!
//! Every operator first checks whether the endpoints share a placement and,
//! if so, reuses the existing buffers. Otherwise transfers are inserted
//! asymmetrically by direction:
//!
//! - convergent (many origins, one destination placement): one batched
//!   transfer over the whole slice, even for entries that already match;
//! - divergent (one producer, per-entry destination placements): one
//!   single-buffer transfer per entry that is not already co-located.

use super::buffer::BufferId;
use super::core::Graph;
use super::node::{NodeId, TransferDirection};
use super::paired::PairedBufferList;

impl Graph {
    /// Wires `source`'s top into `destination`'s bottom and returns
    /// `destination`.
    ///
    /// Co-located layers share the very same list; otherwise this is
    /// `connect_in(source.top, destination)`.
    ///
    /// # Panics
    ///
    /// Panics if `source` has no top yet or `destination` already has a bottom.
    pub fn connect(&mut self, source: NodeId, destination: NodeId) -> NodeId {
        assert!(
            self.layer(source).is_top_bound(),
            "Cannot connect from layer '{}' before its top is bound",
            self.node(source).name()
        );
        let top = self.layer(source).top().clone();

        if self
            .placement_of(source)
            .same(&self.placement_of(destination))
        {
            self.check_bottom_unbound(destination);
            self.bind_bottom(destination, top);
            self.log_connection("connect", destination, 0);
            destination
        } else {
            self.connect_in(&top, destination)
        }
    }

    /// Binds `buffers` as `destination`'s bottom, inserting transfers for
    /// buffers that live elsewhere, and returns `destination`.
    ///
    /// Values are gathered onto the destination by a single batched
    /// transfer. Each gradient is produced locally and copied back to the
    /// placement of the buffer it came from, unless it already lives here.
    ///
    /// # Panics
    ///
    /// Panics if `destination` already has a bottom.
    pub fn connect_in(&mut self, buffers: &PairedBufferList, destination: NodeId) -> NodeId {
        self.check_bottom_unbound(destination);
        let nodes_before = self.nodes().len();
        let name = self.node(destination).name().to_string();

        let values = self.gather(
            destination,
            format!("{name}/copy_up"),
            buffers.values(),
            TransferDirection::Forward,
        );
        let gradients: Vec<BufferId> = buffers
            .gradients()
            .iter()
            .enumerate()
            .map(|(i, &original)| {
                self.local_or_transfer(
                    destination,
                    format!("{name}/copy_down[{i}]"),
                    original,
                    TransferDirection::Backward,
                )
            })
            .collect();

        self.bind_bottom(
            destination,
            PairedBufferList::from_halves(&values, &gradients),
        );
        self.log_connection("connect_in", destination, self.nodes().len() - nodes_before);
        destination
    }

    /// Binds `buffers` as `source`'s top, inserting transfers for buffers
    /// that live elsewhere, and returns `buffers` unchanged.
    ///
    /// Each value is produced locally and copied out to its external buffer
    /// unless that buffer already lives here. Gradients are gathered onto
    /// the source by a single batched transfer. The layer's own top holds
    /// the local buffers; callers keep composing against the returned list.
    ///
    /// # Panics
    ///
    /// Panics if `source` already has a top.
    pub fn connect_out(&mut self, source: NodeId, buffers: &PairedBufferList) -> PairedBufferList {
        assert!(
            !self.layer(source).is_top_bound(),
            "Layer '{}' top is already bound",
            self.node(source).name()
        );
        let nodes_before = self.nodes().len();
        let name = self.node(source).name().to_string();

        let values: Vec<BufferId> = buffers
            .values()
            .iter()
            .enumerate()
            .map(|(i, &external)| {
                self.local_or_transfer(
                    source,
                    format!("{name}/copy_up[{i}]"),
                    external,
                    TransferDirection::Forward,
                )
            })
            .collect();
        let gradients = self.gather(
            source,
            format!("{name}/copy_down"),
            buffers.gradients(),
            TransferDirection::Backward,
        );

        self.bind_top(source, PairedBufferList::from_halves(&values, &gradients));
        self.log_connection("connect_out", source, self.nodes().len() - nodes_before);
        buffers.clone()
    }

    /// Moves every buffer of `inputs` to `owner`'s placement with one
    /// batched transfer and returns the moved buffers.
    fn gather(
        &mut self,
        owner: NodeId,
        name: String,
        inputs: &[BufferId],
        direction: TransferDirection,
    ) -> Vec<BufferId> {
        if inputs.is_empty() {
            return Vec::new();
        }
        let placement = self.placement_of(owner);
        let batch = self.create_batched_transfer(owner, name, placement, inputs, direction);
        self.node(batch)
            .as_batched_transfer()
            .map(|b| b.outputs.clone())
            .unwrap_or_default()
    }

    /// Returns a buffer at `owner`'s placement standing in for `remote`:
    /// `remote` itself when co-located, else a new owned buffer with a
    /// transfer into `remote`.
    fn local_or_transfer(
        &mut self,
        owner: NodeId,
        name: String,
        remote: BufferId,
        direction: TransferDirection,
    ) -> BufferId {
        let remote_buffer = self.buffer(remote);
        if remote_buffer.placement().same(&self.placement_of(owner)) {
            return remote;
        }

        let size = remote_buffer.size();
        let local = self.allocate_named(owner, format!("{name}/buffer"), size, None);
        self.create_transfer(owner, name, local, remote, direction);
        local
    }

    fn check_bottom_unbound(&self, layer: NodeId) {
        assert!(
            !self.layer(layer).is_bottom_bound(),
            "Layer '{}' bottom is already bound",
            self.node(layer).name()
        );
    }

    fn log_connection(&self, operator: &str, layer: NodeId, created: usize) {
        let level = if self.config().verbose {
            log::Level::Info
        } else {
            log::Level::Debug
        };
        let node = self.node(layer);
        log::log!(
            level,
            "[{}] {} '{}' at {}: {} transfer nodes",
            self.config().name,
            operator,
            node.name(),
            node.placement(),
            created
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BufferOwner, NodeKind, Placement};

    fn layer_with_top(graph: &mut Graph, name: &str, placement: Placement, n: usize) -> NodeId {
        let layer = graph.add_layer(name, placement, &[]);
        graph.allocate_top(layer, &vec![4; n]);
        layer
    }

    #[test]
    fn test_connect_same_placement_shares_top() {
        let mut graph = Graph::new();
        let a = layer_with_top(&mut graph, "a", Placement::new(0, 0), 3);
        let b = graph.add_layer("b", Placement::new(0, 0), &[]);

        let returned = graph.connect(a, b);

        assert_eq!(returned, b);
        assert_eq!(graph.transfer_count(), 0);
        assert_eq!(graph.batched_transfer_count(), 0);
        assert!(PairedBufferList::ptr_eq(
            graph.layer(a).top(),
            graph.layer(b).bottom()
        ));
    }

    #[test]
    fn test_connect_across_placements() {
        let mut graph = Graph::new();
        let a = layer_with_top(&mut graph, "a", Placement::new(0, 0), 3);
        let b = graph.add_layer("b", Placement::new(1, 0), &[]);

        graph.connect(a, b);

        let bottom = graph.layer(b).bottom().clone();
        assert_eq!(bottom.len(), 6);
        assert_eq!(graph.batched_transfer_count(), 1);
        assert_eq!(graph.transfer_count(), 3);
        for &id in bottom.as_slice() {
            assert_eq!(graph.buffer(id).placement(), Placement::new(1, 0));
        }
    }

    #[test]
    fn test_connect_in_all_remote() {
        let mut graph = Graph::new();
        let signals: Vec<(Placement, usize)> =
            (1..=4).map(|rank| (Placement::new(rank, 0), 2)).collect();
        let input = graph.external_list("x", &signals);
        let dest = graph.add_layer("dest", Placement::new(0, 0), &[]);

        graph.connect_in(&input, dest);

        assert_eq!(graph.batched_transfer_count(), 1);
        assert_eq!(graph.transfer_count(), 4);

        let batch = graph.batched_transfers().next().unwrap();
        assert_eq!(batch.inputs, input.values());
        assert_eq!(batch.placement, Placement::new(0, 0));
        assert_eq!(batch.direction, TransferDirection::Forward);
        assert_eq!(graph.layer(dest).bottom_data(), &batch.outputs[..]);

        // Each gradient copy targets the original remote buffer.
        let bottom_diff = graph.layer(dest).bottom_diff().to_vec();
        for (transfer, (&local, &original)) in graph
            .transfers()
            .zip(bottom_diff.iter().zip(input.gradients()))
        {
            assert_eq!(transfer.input, local);
            assert_eq!(transfer.output, original);
            assert_eq!(transfer.direction, TransferDirection::Backward);
            assert_eq!(graph.buffer(local).owner(), BufferOwner::Node(dest));
            assert_eq!(graph.buffer(local).size(), 2);
        }
    }

    #[test]
    fn test_connect_in_reuses_local_gradients() {
        let mut graph = Graph::new();
        let here = Placement::new(0, 0);
        let input = graph.external_list(
            "x",
            &[
                (here, 1),
                (Placement::new(1, 0), 1),
                (here, 1),
                (Placement::new(0, 1), 1),
                (here, 1),
            ],
        );
        let dest = graph.add_layer("dest", here, &[]);

        graph.connect_in(&input, dest);

        // Convergent values are batched even though three already match.
        assert_eq!(graph.batched_transfer_count(), 1);
        assert_eq!(graph.batched_transfers().next().unwrap().len(), 5);
        assert_eq!(graph.transfer_count(), 2);

        let bottom_diff = graph.layer(dest).bottom_diff();
        assert_eq!(bottom_diff[0], input.gradient(0));
        assert_eq!(bottom_diff[2], input.gradient(2));
        assert_eq!(bottom_diff[4], input.gradient(4));
        assert_ne!(bottom_diff[1], input.gradient(1));
    }

    #[test]
    fn test_connect_out_mirrors_connect_in() {
        let mut graph = Graph::new();
        let here = Placement::new(2, 0);
        let output = graph.external_list(
            "y",
            &[(here, 3), (Placement::new(3, 0), 3), (Placement::new(4, 1), 3)],
        );
        let source = graph.add_layer("source", here, &[]);

        let returned = graph.connect_out(source, &output);

        assert!(PairedBufferList::ptr_eq(&returned, &output));
        assert_eq!(graph.transfer_count(), 2);
        assert_eq!(graph.batched_transfer_count(), 1);

        let top = graph.layer(source).top().clone();
        assert_eq!(top.value(0), output.value(0));
        assert_ne!(top.value(1), output.value(1));
        for &id in top.as_slice() {
            assert_eq!(graph.buffer(id).placement(), here);
        }
        for transfer in graph.transfers() {
            assert_eq!(transfer.direction, TransferDirection::Forward);
            assert!(output.values().contains(&transfer.output));
        }

        let batch = graph.batched_transfers().next().unwrap();
        assert_eq!(batch.inputs, output.gradients());
        assert_eq!(batch.direction, TransferDirection::Backward);
        assert_eq!(top.gradients(), &batch.outputs[..]);
    }

    #[test]
    fn test_connect_out_batches_even_when_all_local() {
        let mut graph = Graph::new();
        let here = Placement::new(0, 0);
        let output = graph.external_list("y", &[(here, 1), (here, 1)]);
        let source = graph.add_layer("source", here, &[]);

        graph.connect_out(source, &output);

        assert_eq!(graph.transfer_count(), 0);
        assert_eq!(graph.batched_transfer_count(), 1);
        assert_eq!(graph.layer(source).top_data(), output.values());
    }

    #[test]
    fn test_transfer_nodes_are_children_of_wired_layer() {
        let mut graph = Graph::new();
        let input = graph.external_list("x", &[(Placement::new(1, 0), 1)]);
        let dest = graph.add_layer("dest", Placement::new(0, 0), &[]);

        graph.connect_in(&input, dest);

        let children: Vec<_> = graph.children(dest).collect();
        assert_eq!(children.len(), 2);
        assert!(matches!(children[0].kind(), NodeKind::BatchedTransfer(_)));
        assert!(matches!(children[1].kind(), NodeKind::Transfer(_)));
        assert_eq!(children[1].name(), "dest/copy_down[0]");
    }

    #[test]
    fn test_connect_in_empty_list() {
        let mut graph = Graph::new();
        let dest = graph.add_layer("dest", Placement::new(0, 0), &[]);

        graph.connect_in(&PairedBufferList::empty(), dest);

        assert!(graph.layer(dest).is_bottom_bound());
        assert!(graph.layer(dest).bottom().is_empty());
        assert_eq!(graph.transfer_nodes().count(), 0);
    }

    #[test]
    #[should_panic(expected = "bottom is already bound")]
    fn test_connect_twice_panics() {
        let mut graph = Graph::new();
        let a = layer_with_top(&mut graph, "a", Placement::new(0, 0), 1);
        let b = graph.add_layer("b", Placement::new(0, 0), &[]);
        graph.connect(a, b);
        graph.connect(a, b);
    }

    #[test]
    #[should_panic(expected = "bottom is already bound")]
    fn test_connect_in_twice_panics() {
        let mut graph = Graph::new();
        let input = graph.external_list("x", &[(Placement::new(1, 0), 1)]);
        let dest = graph.add_layer("dest", Placement::new(0, 0), &[]);
        graph.connect_in(&input, dest);
        graph.connect_in(&input, dest);
    }

    #[test]
    #[should_panic(expected = "top is already bound")]
    fn test_connect_out_twice_panics() {
        let mut graph = Graph::new();
        let output = graph.external_list("y", &[(Placement::new(1, 0), 1)]);
        let source = graph.add_layer("source", Placement::new(0, 0), &[]);
        graph.connect_out(source, &output);
        graph.connect_out(source, &output);
    }

    #[test]
    fn test_rejected_rebind_creates_no_nodes() {
        let mut graph = Graph::new();
        let input = graph.external_list("x", &[(Placement::new(1, 0), 1)]);
        let dest = graph.add_layer("dest", Placement::new(0, 0), &[]);
        graph.connect_in(&input, dest);
        let nodes = graph.nodes().len();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            graph.connect_in(&input, dest);
        }));

        assert!(result.is_err());
        assert_eq!(graph.nodes().len(), nodes);
    }

    #[test]
    #[should_panic(expected = "before its top is bound")]
    fn test_connect_from_unbound_top_panics() {
        let mut graph = Graph::new();
        let a = graph.add_layer("a", Placement::new(0, 0), &[]);
        let b = graph.add_layer("b", Placement::new(0, 0), &[]);
        graph.connect(a, b);
    }
}
