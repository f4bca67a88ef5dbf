//! Read-only views shared by the graph algorithms.
//!
//! The algorithms in [`crate::utils::graph::algorithms`] never see a concrete graph
//! type. The flattened control-flow graph and the version dependency graph both
//! implement these traits, so traversal and dominator computation are written once.

use crate::utils::graph::NodeId;

/// Node enumeration common to every graph.
pub trait GraphBase {
    /// Returns the number of node slots; valid ids are `0..node_count()`.
    fn node_count(&self) -> usize;

    /// Returns every node id in index order.
    fn node_ids(&self) -> impl Iterator<Item = NodeId>;
}

/// Forward adjacency.
pub trait Successors: GraphBase {
    /// Returns the direct successors of `node` in insertion order.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// Backward adjacency.
pub trait Predecessors: GraphBase {
    /// Returns the direct predecessors of `node` in insertion order.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// A graph with a single designated entry node.
pub trait RootedGraph: Successors + Predecessors {
    /// Returns the entry node.
    fn entry(&self) -> NodeId;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Edge-list graph used by the algorithm tests.
    pub(crate) struct EdgeListGraph {
        pub(crate) node_count: usize,
        pub(crate) edges: Vec<(usize, usize)>,
    }

    impl EdgeListGraph {
        pub(crate) fn new(node_count: usize, edges: &[(usize, usize)]) -> Self {
            EdgeListGraph {
                node_count,
                edges: edges.to_vec(),
            }
        }
    }

    impl GraphBase for EdgeListGraph {
        fn node_count(&self) -> usize {
            self.node_count
        }

        fn node_ids(&self) -> impl Iterator<Item = NodeId> {
            (0..self.node_count).map(NodeId::new)
        }
    }

    impl Successors for EdgeListGraph {
        fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
            self.edges
                .iter()
                .filter(move |(src, _)| *src == node.index())
                .map(|(_, dst)| NodeId::new(*dst))
        }
    }

    impl Predecessors for EdgeListGraph {
        fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
            self.edges
                .iter()
                .filter(move |(_, dst)| *dst == node.index())
                .map(|(src, _)| NodeId::new(*src))
        }
    }

    #[test]
    fn test_edge_list_adjacency() {
        let graph = EdgeListGraph::new(3, &[(0, 1), (0, 2), (1, 2)]);
        assert_eq!(graph.node_count(), 3);
        let succs: Vec<_> = graph.successors(NodeId::new(0)).collect();
        assert_eq!(succs, vec![NodeId::new(1), NodeId::new(2)]);
        let preds: Vec<_> = graph.predecessors(NodeId::new(2)).collect();
        assert_eq!(preds, vec![NodeId::new(0), NodeId::new(1)]);
    }
}
