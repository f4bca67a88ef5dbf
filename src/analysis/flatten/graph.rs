//! The flattened control-flow graph.

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    fmt::Write,
};

use crate::{
    analysis::flatten::{DirectNode, DirectNodeKind, FinallyPath},
    ir::{ExprId, StatId},
    utils::{
        escape_dot,
        graph::{GraphBase, NodeId, Predecessors, RootedGraph, Successors},
    },
};

/// Visitor verdict for [`DirectGraph::iterate_exprs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprVisit {
    /// Keep the expression and continue
    Continue,
    /// Abort the iteration
    Stop,
    /// Remove the expression from its node and continue
    Remove,
}

/// Flat control-flow graph produced by [`flatten`](crate::analysis::flatten).
///
/// Besides plain adjacency the graph carries the side tables the SSA builders
/// need to stay precise across structured constructs:
///
/// - the *negative branch* of each conditional node, so the false-path map of a
///   short-circuit condition flows only into the false successor;
/// - *short-range* and *long-range* finally paths per finally-handler exit node,
///   recording which predecessor entered the handler and where control went next;
/// - the *monitor exception exits*, handler exits whose destination is the
///   exception path of a synchronized lowering.
#[derive(Debug, Clone)]
pub struct DirectGraph {
    pub(crate) nodes: Vec<DirectNode>,
    pub(crate) order: Vec<NodeId>,
    pub(crate) keys: HashMap<(StatId, DirectNodeKind), NodeId>,
    pub(crate) statement_entries: HashMap<StatId, NodeId>,
    pub(crate) first: NodeId,
    pub(crate) negative_branches: HashMap<NodeId, NodeId>,
    pub(crate) short_range: BTreeMap<NodeId, Vec<FinallyPath>>,
    pub(crate) long_range: BTreeMap<NodeId, Vec<FinallyPath>>,
    pub(crate) monitor_exits: BTreeMap<NodeId, NodeId>,
}

impl DirectGraph {
    /// Entry node: the entry of the root statement.
    #[must_use]
    pub fn first(&self) -> NodeId {
        self.first
    }

    /// Number of nodes reachable from [`DirectGraph::first`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&DirectNode> {
        self.nodes.get(id.index())
    }

    /// Reachable nodes in reverse postorder from the entry.
    #[must_use]
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Reachable nodes in reverse postorder from the entry.
    pub fn nodes(&self) -> impl Iterator<Item = &DirectNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id.index()))
    }

    /// The node created for `statement` with the given role.
    #[must_use]
    pub fn node_for(&self, statement: StatId, kind: DirectNodeKind) -> Option<NodeId> {
        self.keys.get(&(statement, kind)).copied()
    }

    /// The node control enters when it reaches `statement`.
    #[must_use]
    pub fn statement_entry(&self, statement: StatId) -> Option<NodeId> {
        self.statement_entries.get(&statement).copied()
    }

    /// The successor taken when the condition evaluated by `node` is false.
    #[must_use]
    pub fn negative_branch(&self, node: NodeId) -> Option<NodeId> {
        self.negative_branches.get(&node).copied()
    }

    /// Returns `true` if `node` is the exit node of a finally handler.
    #[must_use]
    pub fn is_finally_exit(&self, node: NodeId) -> bool {
        self.short_range.contains_key(&node)
    }

    /// Paths through the finally handler exiting at `exit`, naming the node that
    /// entered the innermost handler.
    #[must_use]
    pub fn short_range_paths(&self, exit: NodeId) -> &[FinallyPath] {
        self.short_range.get(&exit).map_or(&[], Vec::as_slice)
    }

    /// Paths through the finally handler exiting at `exit`, naming the node that
    /// entered the outermost handler of a nested chain.
    #[must_use]
    pub fn long_range_paths(&self, exit: NodeId) -> &[FinallyPath] {
        self.long_range.get(&exit).map_or(&[], Vec::as_slice)
    }

    /// Every long-range path of every finally exit, ordered by exit node.
    pub fn all_long_range_paths(&self) -> impl Iterator<Item = &FinallyPath> {
        self.long_range.values().flatten()
    }

    /// All finally exit nodes, ascending.
    pub fn finally_exits(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.short_range.keys().copied()
    }

    /// The destination reached from `exit` along the exception path of a
    /// synchronized lowering.
    #[must_use]
    pub fn monitor_exception_exit(&self, exit: NodeId) -> Option<NodeId> {
        self.monitor_exits.get(&exit).copied()
    }

    /// Visits every expression of every reachable node in breadth-first order.
    ///
    /// The visitor can remove the expression it was handed or stop the walk.
    /// Returns `false` if the visitor stopped early.
    pub fn iterate_exprs<F>(&mut self, mut visitor: F) -> bool
    where
        F: FnMut(NodeId, ExprId) -> ExprVisit,
    {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([self.first]);

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = self.nodes.get_mut(id.index()) else {
                continue;
            };

            let mut index = 0;
            while index < node.exprs.len() {
                match visitor(id, node.exprs[index]) {
                    ExprVisit::Continue => index += 1,
                    ExprVisit::Remove => {
                        node.exprs.remove(index);
                    }
                    ExprVisit::Stop => return false,
                }
            }
            queue.extend(node.succs.iter().copied());
        }
        true
    }

    /// Renders the graph in DOT format. Negative branches are drawn dashed.
    #[must_use]
    pub fn to_dot(&self, title: Option<&str>) -> String {
        let mut dot = String::new();

        dot.push_str("digraph DirectGraph {\n");
        if let Some(name) = title {
            let _ = writeln!(dot, "    label=\"{}\";", escape_dot(name));
        }
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n\n");

        for node in self.nodes() {
            let mut label = node.label();
            let _ = write!(label, " [{} exprs]", node.exprs.len());
            let style = if node.id == self.first {
                ", style=filled, fillcolor=lightgreen"
            } else if self.is_finally_exit(node.id) {
                ", style=filled, fillcolor=lightyellow"
            } else {
                ""
            };
            let _ = writeln!(
                dot,
                "    {} [label=\"{}\"{style}];",
                node.id,
                escape_dot(&label)
            );
        }

        dot.push('\n');
        for node in self.nodes() {
            for succ in &node.succs {
                let negative = self.negative_branch(node.id) == Some(*succ);
                let style = if negative { " [style=dashed]" } else { "" };
                let _ = writeln!(dot, "    {} -> {succ}{style};", node.id);
            }
        }

        dot.push_str("}\n");
        dot
    }
}

impl GraphBase for DirectGraph {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId::new)
    }
}

impl Successors for DirectGraph {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.nodes
            .get(node.index())
            .map(|n| n.succs.as_slice())
            .unwrap_or_default()
            .iter()
            .copied()
    }
}

impl Predecessors for DirectGraph {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.nodes
            .get(node.index())
            .map(|n| n.preds.as_slice())
            .unwrap_or_default()
            .iter()
            .copied()
    }
}

impl RootedGraph for DirectGraph {
    fn entry(&self) -> NodeId {
        self.first
    }
}
