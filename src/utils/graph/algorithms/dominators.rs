//! Dominator computation over graphs with one or more roots.
//!
//! The version dependency graph has no single entry: every parameter, catch
//! variable and first definition of a slot starts its own chain. Dominance is
//! therefore computed against a virtual super-root that has an edge to every
//! root. The virtual root never appears in query results; a node whose only
//! dominator is the virtual root has no immediate dominator.
//!
//! The implementation is the iterative scheme of Cooper, Harvey and Kennedy
//! ("A Simple, Fast Dominance Algorithm"), run over reverse postorder until the
//! immediate dominators stop changing.
//!
//! # Examples
//!
//! ```rust,ignore
//! // Diamond: entry -> {a, b} -> exit
//! let dom_tree = compute_dominators(&graph, entry);
//! assert!(dom_tree.dominates(entry, exit));
//! assert_eq!(dom_tree.immediate_dominator(exit), Some(entry));
//! ```

use crate::utils::graph::{
    algorithms::traversal::postorder_from, NodeId, Predecessors, Successors,
};

/// Immediate dominators of every node reachable from the roots.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    roots: Vec<NodeId>,
    /// `None` for roots, unreachable nodes and nodes dominated only by the virtual root
    idom: Vec<Option<NodeId>>,
    reachable: Vec<bool>,
}

impl DominatorTree {
    /// Returns the roots the tree was computed from.
    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Returns the immediate dominator of `node`.
    #[must_use]
    pub fn immediate_dominator(&self, node: NodeId) -> Option<NodeId> {
        self.idom.get(node.index()).copied().flatten()
    }

    /// Returns `true` if `node` was reached from any root.
    #[must_use]
    pub fn is_reachable(&self, node: NodeId) -> bool {
        self.reachable.get(node.index()).copied().unwrap_or(false)
    }

    /// Checks whether `a` dominates `b`.
    ///
    /// A reachable node dominates itself. Unreachable nodes neither dominate nor
    /// are dominated.
    #[must_use]
    pub fn dominates(&self, a: NodeId, b: NodeId) -> bool {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }
        if a == b {
            return true;
        }

        let mut current = b;
        while let Some(idom) = self.immediate_dominator(current) {
            if idom == a {
                return true;
            }
            current = idom;
        }
        false
    }

    /// Checks whether `a` dominates `b` and `a != b`.
    #[must_use]
    pub fn strictly_dominates(&self, a: NodeId, b: NodeId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Returns the number of dominators above `node`, excluding the virtual root.
    #[must_use]
    pub fn depth(&self, node: NodeId) -> usize {
        let mut depth = 0;
        let mut current = node;
        while let Some(idom) = self.immediate_dominator(current) {
            depth += 1;
            current = idom;
        }
        depth
    }
}

/// Computes the dominator tree of the nodes reachable from `entry`.
pub fn compute_dominators<G>(graph: &G, entry: NodeId) -> DominatorTree
where
    G: Successors + Predecessors,
{
    compute_dominators_from(graph, &[entry])
}

/// Computes the dominator tree of the nodes reachable from any of `roots`.
///
/// Roots are attached to a virtual super-root, so two roots never dominate each
/// other and a node reachable from several roots only has the dominators common
/// to all of them.
pub fn compute_dominators_from<G>(graph: &G, roots: &[NodeId]) -> DominatorTree
where
    G: Successors + Predecessors,
{
    let node_count = graph.node_count();
    let virtual_root = node_count;

    let order = postorder_from(graph, roots.iter().copied());
    let mut po_number = vec![usize::MAX; node_count + 1];
    for (number, node) in order.iter().enumerate() {
        po_number[node.index()] = number;
    }
    po_number[virtual_root] = order.len();

    let mut is_root = vec![false; node_count];
    let mut doms: Vec<Option<usize>> = vec![None; node_count + 1];
    doms[virtual_root] = Some(virtual_root);
    for root in roots.iter().filter(|r| r.index() < node_count) {
        is_root[root.index()] = true;
        doms[root.index()] = Some(virtual_root);
    }

    let mut changed = true;
    while changed {
        changed = false;
        for node in order.iter().rev() {
            let b = node.index();
            if is_root[b] {
                continue;
            }

            let mut new_idom: Option<usize> = None;
            for pred in graph.predecessors(*node) {
                let p = pred.index();
                if p >= node_count || doms[p].is_none() {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => p,
                    Some(current) => intersect(&doms, &po_number, virtual_root, p, current),
                });
            }

            if new_idom.is_some() && doms[b] != new_idom {
                doms[b] = new_idom;
                changed = true;
            }
        }
    }

    let idom = (0..node_count)
        .map(|i| match doms[i] {
            Some(d) if d != virtual_root => Some(NodeId::new(d)),
            _ => None,
        })
        .collect();
    let reachable = (0..node_count)
        .map(|i| po_number[i] != usize::MAX)
        .collect();

    DominatorTree {
        roots: roots.to_vec(),
        idom,
        reachable,
    }
}

fn intersect(
    doms: &[Option<usize>],
    po_number: &[usize],
    virtual_root: usize,
    mut a: usize,
    mut b: usize,
) -> usize {
    while a != b {
        while po_number[a] < po_number[b] {
            a = doms[a].unwrap_or(virtual_root);
        }
        while po_number[b] < po_number[a] {
            b = doms[b].unwrap_or(virtual_root);
        }
    }
    a
}
