//! Nodes of the flattened control-flow graph.

use std::fmt;

use strum::{Display, EnumIter};

use crate::{
    ir::{ExprId, StatId},
    utils::graph::NodeId,
};

/// Role of a [`DirectNode`] relative to the statement it was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum DirectNodeKind {
    /// The expressions of a basic block
    Direct,
    /// The condition appended after an `if`/`switch`/`synchronized` header block
    Tail,
    /// `for` loop initializer
    Init,
    /// Loop condition
    Condition,
    /// `for` loop increment
    Increment,
    /// Empty fan-out node at the start of a try construct
    Try,
}

/// A node of the [`DirectGraph`](crate::analysis::DirectGraph).
///
/// At most one node exists per `(statement, kind)` pair; re-flattening a finally
/// handler for another exit path reuses the nodes created the first time.
#[derive(Debug, Clone)]
pub struct DirectNode {
    pub(crate) id: NodeId,
    pub(crate) kind: DirectNodeKind,
    pub(crate) statement: StatId,
    pub(crate) exprs: Vec<ExprId>,
    pub(crate) preds: Vec<NodeId>,
    pub(crate) succs: Vec<NodeId>,
}

impl DirectNode {
    /// Index of this node in its graph.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Role of this node within its statement.
    #[must_use]
    pub fn kind(&self) -> DirectNodeKind {
        self.kind
    }

    /// The statement this node was created for.
    #[must_use]
    pub fn statement(&self) -> StatId {
        self.statement
    }

    /// Expressions evaluated by this node, in order.
    #[must_use]
    pub fn exprs(&self) -> &[ExprId] {
        &self.exprs
    }

    /// Predecessors, in the order their edges were resolved.
    #[must_use]
    pub fn preds(&self) -> &[NodeId] {
        &self.preds
    }

    /// Successors. The first successor of a condition node is its positive branch.
    #[must_use]
    pub fn succs(&self) -> &[NodeId] {
        &self.succs
    }

    /// Stable textual key, e.g. `12`, `12_tail` or `7_cond`.
    #[must_use]
    pub fn label(&self) -> String {
        match self.kind {
            DirectNodeKind::Direct => self.statement.to_string(),
            DirectNodeKind::Tail => format!("{}_tail", self.statement),
            DirectNodeKind::Init => format!("{}_init", self.statement),
            DirectNodeKind::Condition => format!("{}_cond", self.statement),
            DirectNodeKind::Increment => format!("{}_inc", self.statement),
            DirectNodeKind::Try => format!("{}_try", self.statement),
        }
    }
}

impl fmt::Display for DirectNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.id)
    }
}

/// One path through a finally handler, attached to the handler's exit node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FinallyPath {
    /// Node the path entered the handler from
    pub source: NodeId,
    /// Where control continues once the handler completes
    pub destination: NodeId,
    /// First node of the handler on this path
    pub entry: NodeId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_labels() {
        let mut node = DirectNode {
            id: NodeId::new(3),
            kind: DirectNodeKind::Direct,
            statement: StatId(12),
            exprs: vec![],
            preds: vec![],
            succs: vec![],
        };
        assert_eq!(node.label(), "12");
        node.kind = DirectNodeKind::Condition;
        assert_eq!(node.label(), "12_cond");
        assert_eq!(node.to_string(), "12_cond (n3)");
        assert_eq!(DirectNodeKind::Increment.to_string(), "increment");
    }
}
