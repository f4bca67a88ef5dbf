//! The version dependency graph built by the dominance-aware builder.
//!
//! Every version the builder hands out is a node. Edges run from a version to
//! the versions derived from it: a read split off its reaching definition, a
//! phi fed by its contributors, a phantom fed by the version it follows. Phi
//! contributors are always routed through an intermediate link node, so a
//! stale contributor can be detached by removing a single edge.
//!
//! After the fixpoint the graph is frozen and its dominator tree cached. The
//! downstream renaming pass asks whether one version dominates another to
//! decide whether a local slot can keep a single source-level name.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt::Write,
};

use bitflags::bitflags;
use strum::Display;

use crate::{
    analysis::ssa::{VarVersion, VersionMap},
    utils::{
        escape_dot,
        graph::{
            algorithms::{compute_dominators_from, DominatorTree},
            EdgeId, GraphBase, NodeId, Predecessors, Successors,
        },
    },
    Error, Result,
};

bitflags! {
    /// Origin markers of a version node
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VersionFlags: u8 {
        /// Value after an increment or decrement of the slot
        const PHANTOM_INCREMENT = 0x01;
        /// Value of the slot as observed leaving a finally handler along one exit
        const PHANTOM_FINALLY_EXIT = 0x02;
        /// Intermediate node between a phi and one of its contributors
        const PHI_LINK = 0x04;
        /// Pseudo-version of a field access site
        const FIELD = 0x08;
    }
}

/// Kind of a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum VersionEdgeKind {
    /// Data flows from the source version into the target
    General,
    /// The target is a phantom version following the source
    Phantom,
}

/// One version in the dependency graph.
#[derive(Debug, Clone)]
pub struct VersionNode {
    version: VarVersion,
    flags: VersionFlags,
    live: Option<VersionMap>,
    preds: Vec<EdgeId>,
    succs: Vec<EdgeId>,
}

impl VersionNode {
    /// The version this node stands for.
    #[must_use]
    pub fn version(&self) -> VarVersion {
        self.version
    }

    /// How the version was created.
    #[must_use]
    pub fn flags(&self) -> VersionFlags {
        self.flags
    }

    /// The map that reached the site using this version, captured after convergence.
    #[must_use]
    pub fn live(&self) -> Option<&VersionMap> {
        self.live.as_ref()
    }

    /// Ids of the edges entering this node.
    #[must_use]
    pub fn incoming(&self) -> &[EdgeId] {
        &self.preds
    }

    /// Ids of the edges leaving this node.
    #[must_use]
    pub fn outgoing(&self) -> &[EdgeId] {
        &self.succs
    }
}

/// A dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionEdge {
    /// Node the edge leaves
    pub source: NodeId,
    /// Node the edge enters
    pub target: NodeId,
    /// Whether the edge links a phantom version
    pub kind: VersionEdgeKind,
}

/// Directed graph over variable versions.
#[derive(Debug, Clone, Default)]
pub struct VersionGraph {
    nodes: Vec<VersionNode>,
    /// Removed edges keep their slot so that ids stay stable
    edges: Vec<VersionEdge>,
    index: HashMap<VarVersion, NodeId>,
    dominators: Option<DominatorTree>,
}

impl VersionGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        VersionGraph::default()
    }

    /// Number of versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no version was created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the node of `version`, creating it if needed.
    pub(crate) fn create_node(&mut self, version: VarVersion) -> NodeId {
        if let Some(id) = self.index.get(&version) {
            return *id;
        }
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(VersionNode {
            version,
            flags: VersionFlags::empty(),
            live: None,
            preds: Vec::new(),
            succs: Vec::new(),
        });
        self.index.insert(version, id);
        id
    }

    /// Returns the node id of `version`.
    #[must_use]
    pub fn node_id(&self, version: VarVersion) -> Option<NodeId> {
        self.index.get(&version).copied()
    }

    pub(crate) fn require(&self, version: VarVersion) -> Result<NodeId> {
        self.node_id(version)
            .ok_or_else(|| Error::GraphError(format!("Version {version} has no graph node")))
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&VersionNode> {
        self.nodes.get(id.index())
    }

    /// Looks up the node of `version`.
    #[must_use]
    pub fn version_node(&self, version: VarVersion) -> Option<&VersionNode> {
        self.node_id(version).and_then(|id| self.node(id))
    }

    /// Looks up an edge by id. Removed edges are still returned.
    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<&VersionEdge> {
        self.edges.get(id.index())
    }

    /// All versions in creation order.
    pub fn versions(&self) -> impl Iterator<Item = VarVersion> + '_ {
        self.nodes.iter().map(|node| node.version)
    }

    pub(crate) fn add_flags(&mut self, id: NodeId, flags: VersionFlags) {
        if let Some(node) = self.nodes.get_mut(id.index()) {
            node.flags |= flags;
        }
    }

    pub(crate) fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        kind: VersionEdgeKind,
    ) -> EdgeId {
        let id = EdgeId::new(self.edges.len());
        self.edges.push(VersionEdge {
            source,
            target,
            kind,
        });
        if let Some(node) = self.nodes.get_mut(source.index()) {
            node.succs.push(id);
        }
        if let Some(node) = self.nodes.get_mut(target.index()) {
            node.preds.push(id);
        }
        id
    }

    /// Detaches an edge from both of its endpoints.
    pub(crate) fn remove_edge(&mut self, id: EdgeId) {
        let Some(edge) = self.edges.get(id.index()).copied() else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(edge.source.index()) {
            node.succs.retain(|e| *e != id);
        }
        if let Some(node) = self.nodes.get_mut(edge.target.index()) {
            node.preds.retain(|e| *e != id);
        }
    }

    /// Ids of the edges currently entering `id`.
    pub(crate) fn incoming(&self, id: NodeId) -> Vec<EdgeId> {
        self.node(id).map(|node| node.preds.clone()).unwrap_or_default()
    }

    /// The version feeding a phi link node.
    pub(crate) fn link_source(&self, link: NodeId) -> Result<VarVersion> {
        self.node(link)
            .and_then(|node| node.preds.first())
            .and_then(|edge| self.edge(*edge))
            .and_then(|edge| self.node(edge.source))
            .map(VersionNode::version)
            .ok_or_else(|| Error::GraphError(format!("Phi link {link} has no contributor")))
    }

    /// Attaches the live snapshot of `version`.
    pub(crate) fn set_live(&mut self, version: VarVersion, live: &VersionMap) -> Result<()> {
        let id = self.require(version)?;
        if let Some(node) = self.nodes.get_mut(id.index()) {
            node.live = Some(live.clone());
        }
        Ok(())
    }

    /// Computes and caches dominance. Every node without predecessors is a root.
    pub(crate) fn compute_dominators(&mut self) {
        let roots: Vec<NodeId> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.preds.is_empty())
            .map(|(index, _)| NodeId::new(index))
            .collect();
        self.dominators = Some(compute_dominators_from(self, &roots));
    }

    /// The cached dominator tree, available once the builder has finished.
    #[must_use]
    pub fn dominator_tree(&self) -> Option<&DominatorTree> {
        self.dominators.as_ref()
    }

    /// Returns `true` if every path from a root to `version` passes through
    /// `dominator`. A version dominates itself.
    ///
    /// Returns `false` before dominance has been computed.
    #[must_use]
    pub fn dominates(&self, dominator: VarVersion, version: VarVersion) -> bool {
        match (
            &self.dominators,
            self.node_id(dominator),
            self.node_id(version),
        ) {
            (Some(tree), Some(a), Some(b)) => tree.dominates(a, b),
            _ => false,
        }
    }

    /// Returns `true` if every path from a root to `version` passes through at
    /// least one member of `dominators`.
    #[must_use]
    pub fn is_dominated_by_set(&self, version: VarVersion, dominators: &HashSet<VarVersion>) -> bool {
        if dominators.len() == 1 {
            return dominators
                .iter()
                .next()
                .is_some_and(|dominator| self.dominates(*dominator, version));
        }
        if dominators.contains(&version) {
            return true;
        }
        let Some(start) = self.node_id(version) else {
            return false;
        };

        let mut marked = HashSet::new();
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            if !marked.insert(id) {
                continue;
            }
            let Some(node) = self.node(id) else {
                continue;
            };
            if node.preds.is_empty() {
                return false;
            }
            for pred in self.predecessors(id) {
                let blocked = self
                    .node(pred)
                    .is_some_and(|pred_node| dominators.contains(&pred_node.version));
                if !blocked && !marked.contains(&pred) {
                    queue.push_back(pred);
                }
            }
        }
        true
    }

    /// Renders the graph in DOT format. Phantom edges are drawn dashed.
    #[must_use]
    pub fn to_dot(&self, title: Option<&str>) -> String {
        let mut dot = String::new();

        dot.push_str("digraph VersionGraph {\n");
        if let Some(title) = title {
            let _ = writeln!(dot, "  label=\"{}\";", escape_dot(title));
            dot.push_str("  labelloc=t;\n");
        }
        dot.push_str("  node [shape=ellipse, fontname=\"Courier\"];\n\n");

        for (index, node) in self.nodes.iter().enumerate() {
            let style = if node.flags.contains(VersionFlags::PHI_LINK) {
                ", style=dotted"
            } else if node
                .flags
                .intersects(VersionFlags::PHANTOM_INCREMENT | VersionFlags::PHANTOM_FINALLY_EXIT)
            {
                ", style=filled, fillcolor=lightgrey"
            } else {
                ""
            };
            let _ = writeln!(dot, "  v{} [label=\"{}\"{}];", index, node.version, style);
        }
        dot.push('\n');

        for node in &self.nodes {
            for edge_id in &node.succs {
                let Some(edge) = self.edge(*edge_id) else {
                    continue;
                };
                let style = match edge.kind {
                    VersionEdgeKind::General => "",
                    VersionEdgeKind::Phantom => " [style=dashed]",
                };
                let _ = writeln!(
                    dot,
                    "  v{} -> v{}{};",
                    edge.source.index(),
                    edge.target.index(),
                    style
                );
            }
        }

        dot.push_str("}\n");
        dot
    }
}

impl GraphBase for VersionGraph {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId::new)
    }
}

impl Successors for VersionGraph {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.node(node)
            .map(|n| n.succs.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|edge| self.edge(*edge).map(|e| e.target))
    }
}

impl Predecessors for VersionGraph {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.node(node)
            .map(|n| n.preds.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|edge| self.edge(*edge).map(|e| e.source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(slot: i32, version: u32) -> VarVersion {
        VarVersion::new(slot, version)
    }

    /// 1 -> 2, 1 -> link 3 -> 5, 4 -> link 6 -> 5
    fn phi_graph() -> VersionGraph {
        let mut graph = VersionGraph::new();
        let n1 = graph.create_node(v(0, 1));
        let n2 = graph.create_node(v(0, 2));
        let n3 = graph.create_node(v(0, 3));
        let n4 = graph.create_node(v(0, 4));
        let n5 = graph.create_node(v(0, 5));
        let n6 = graph.create_node(v(0, 6));
        graph.add_flags(n3, VersionFlags::PHI_LINK);
        graph.add_flags(n6, VersionFlags::PHI_LINK);
        graph.add_edge(n1, n2, VersionEdgeKind::General);
        graph.add_edge(n1, n3, VersionEdgeKind::General);
        graph.add_edge(n3, n5, VersionEdgeKind::General);
        graph.add_edge(n4, n6, VersionEdgeKind::General);
        graph.add_edge(n6, n5, VersionEdgeKind::General);
        graph.compute_dominators();
        graph
    }

    #[test]
    fn test_create_node_is_idempotent() {
        let mut graph = VersionGraph::new();
        let a = graph.create_node(v(1, 1));
        let b = graph.create_node(v(1, 1));
        assert_eq!(a, b);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_remove_edge_detaches_both_ends() {
        let mut graph = VersionGraph::new();
        let a = graph.create_node(v(1, 1));
        let b = graph.create_node(v(1, 2));
        let edge = graph.add_edge(a, b, VersionEdgeKind::General);
        graph.remove_edge(edge);
        assert!(graph.incoming(b).is_empty());
        assert_eq!(graph.successors(a).count(), 0);
    }

    #[test]
    fn test_dominance_with_several_roots() {
        let graph = phi_graph();
        assert!(graph.dominates(v(0, 1), v(0, 2)));
        assert!(graph.dominates(v(0, 5), v(0, 5)));
        assert!(!graph.dominates(v(0, 1), v(0, 5)));
        assert!(!graph.dominates(v(0, 4), v(0, 5)));
    }

    #[test]
    fn test_dominated_by_set() {
        let graph = phi_graph();
        let both: HashSet<_> = [v(0, 1), v(0, 4)].into_iter().collect();
        assert!(graph.is_dominated_by_set(v(0, 5), &both));

        let one_side: HashSet<_> = [v(0, 1), v(0, 2)].into_iter().collect();
        assert!(!graph.is_dominated_by_set(v(0, 5), &one_side));

        let single: HashSet<_> = [v(0, 1)].into_iter().collect();
        assert!(graph.is_dominated_by_set(v(0, 3), &single));
    }

    #[test]
    fn test_link_source() {
        let graph = phi_graph();
        let link = graph.node_id(v(0, 6)).unwrap();
        assert_eq!(graph.link_source(link).unwrap(), v(0, 4));
        let root = graph.node_id(v(0, 1)).unwrap();
        assert!(graph.link_source(root).is_err());
    }

    #[test]
    fn test_set_live_unknown_version() {
        let mut graph = phi_graph();
        assert!(graph.set_live(v(9, 1), &VersionMap::new()).is_err());
        graph.set_live(v(0, 2), &VersionMap::new()).unwrap();
        assert!(graph.version_node(v(0, 2)).unwrap().live().is_some());
    }

    #[test]
    fn test_to_dot_marks_phantom_edges() {
        let mut graph = VersionGraph::new();
        let a = graph.create_node(v(2, 1));
        let b = graph.create_node(v(2, 2));
        graph.add_flags(b, VersionFlags::PHANTOM_FINALLY_EXIT);
        graph.add_edge(a, b, VersionEdgeKind::Phantom);
        let dot = graph.to_dot(Some("m"));
        assert!(dot.contains("v0 -> v1 [style=dashed];"));
        assert!(dot.contains("label=\"2_2\""));
    }
}
