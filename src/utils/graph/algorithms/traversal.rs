//! Depth-first orderings.
//!
//! Both the flattener and the SSA builders iterate nodes in reverse postorder. The
//! traversal is iterative with an explicit stack, so deeply nested methods cannot
//! overflow the call stack.

use crate::utils::graph::{NodeId, Successors};

/// Computes the postorder of all nodes reachable from `start`.
///
/// Successors are visited in the order the graph reports them. An out-of-range
/// start yields an empty order.
///
/// # Examples
///
/// ```rust,ignore
/// // a -> b -> c
/// let order = postorder(&graph, a);
/// assert_eq!(order, vec![c, b, a]);
/// ```
pub fn postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    postorder_from(graph, [start])
}

/// Computes one combined postorder over the nodes reachable from several roots.
///
/// Roots are explored in iteration order; nodes already reached from an earlier
/// root are not revisited.
#[allow(clippy::items_after_statements)]
pub fn postorder_from<G, I>(graph: &G, roots: I) -> Vec<NodeId>
where
    G: Successors,
    I: IntoIterator<Item = NodeId>,
{
    let node_count = graph.node_count();
    let mut visited = vec![false; node_count];
    let mut result = Vec::with_capacity(node_count);

    #[derive(Clone, Copy)]
    enum State {
        Enter,
        Exit,
    }

    for root in roots {
        if root.index() >= node_count {
            continue;
        }
        let mut stack = vec![(root, State::Enter)];

        while let Some((node, state)) = stack.pop() {
            match state {
                State::Enter => {
                    if visited[node.index()] {
                        continue;
                    }
                    visited[node.index()] = true;
                    stack.push((node, State::Exit));

                    let successors: Vec<NodeId> = graph.successors(node).collect();
                    for &succ in successors.iter().rev() {
                        if succ.index() < node_count && !visited[succ.index()] {
                            stack.push((succ, State::Enter));
                        }
                    }
                }
                State::Exit => result.push(node),
            }
        }
    }

    result
}

/// Computes the reverse postorder of all nodes reachable from `start`.
pub fn reverse_postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let mut result = postorder(graph, start);
    result.reverse();
    result
}

/// Reverse of [`postorder_from`].
pub fn reverse_postorder_from<G, I>(graph: &G, roots: I) -> Vec<NodeId>
where
    G: Successors,
    I: IntoIterator<Item = NodeId>,
{
    let mut result = postorder_from(graph, roots);
    result.reverse();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::graph::EdgeListGraph;

    fn ids(raw: &[usize]) -> Vec<NodeId> {
        raw.iter().copied().map(NodeId::new).collect()
    }

    #[test]
    fn test_postorder_linear() {
        let graph = EdgeListGraph::new(3, &[(0, 1), (1, 2)]);
        assert_eq!(postorder(&graph, NodeId::new(0)), ids(&[2, 1, 0]));
        assert_eq!(reverse_postorder(&graph, NodeId::new(0)), ids(&[0, 1, 2]));
    }

    #[test]
    fn test_reverse_postorder_diamond_visits_first_successor_first() {
        // 0 -> {1, 2} -> 3
        let graph = EdgeListGraph::new(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        assert_eq!(reverse_postorder(&graph, NodeId::new(0)), ids(&[0, 2, 1, 3]));
    }

    #[test]
    fn test_reverse_postorder_loop_and_unreachable() {
        // 0 -> 1 -> 2 -> 1, node 3 unreachable
        let graph = EdgeListGraph::new(4, &[(0, 1), (1, 2), (2, 1)]);
        let order = reverse_postorder(&graph, NodeId::new(0));
        assert_eq!(order, ids(&[0, 1, 2]));
    }

    #[test]
    fn test_postorder_from_multiple_roots() {
        // 0 -> 2, 1 -> 2
        let graph = EdgeListGraph::new(3, &[(0, 2), (1, 2)]);
        let order = reverse_postorder_from(&graph, ids(&[0, 1]));
        assert_eq!(order, ids(&[1, 0, 2]));
    }

    #[test]
    fn test_postorder_invalid_start() {
        let graph = EdgeListGraph::new(2, &[(0, 1)]);
        assert!(postorder(&graph, NodeId::new(5)).is_empty());
    }
}
