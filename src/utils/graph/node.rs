//! Node identifier for the index-based graphs in this crate.
//!
//! Both the flattened control-flow graph and the version dependency graph store
//! their nodes in a `Vec` and hand out [`NodeId`]s as stable indices into it.

use std::fmt;

/// A strongly-typed index of a node inside one graph.
///
/// Ids are assigned sequentially from 0 in creation order and are never reused,
/// so they can index side tables such as per-node version maps.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Creates a `NodeId` from a raw index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// Returns the raw index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<usize> for NodeId {
    #[inline]
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_roundtrip_and_display() {
        let node = NodeId::new(7);
        assert_eq!(node.index(), 7);
        assert_eq!(NodeId::from(7), node);
        assert_eq!(format!("{node}"), "n7");
        assert_eq!(format!("{node:?}"), "NodeId(7)");
    }

    #[test]
    fn test_node_id_ordering_follows_creation() {
        let mut nodes = vec![NodeId::new(3), NodeId::new(0), NodeId::new(2)];
        nodes.sort();
        assert_eq!(nodes, vec![NodeId::new(0), NodeId::new(2), NodeId::new(3)]);
    }
}
