//! Flattening of structured statement trees.
//!
//! The decompiler's structured view of a method is a tree of statements with
//! successor edges between them. Dataflow needs the opposite: a plain graph of
//! nodes that each hold a straight-line list of expressions. This module walks
//! the tree once and produces that graph.
//!
//! # Key Components
//!
//! - [`flatten`] - Builds a [`DirectGraph`] from a [`crate::ir::StatementTree`]
//! - [`DirectGraph`] - Nodes in reverse postorder plus the side tables for
//!   negative branches, finally paths and monitor exits
//! - [`DirectNode`] - A node, keyed by its statement and a [`DirectNodeKind`]
//! - [`FinallyPath`] - One way through a finally handler
//!
//! # Node Layout
//!
//! | Statement                   | Nodes                                         |
//! |-----------------------------|-----------------------------------------------|
//! | basic block                 | `Direct`, plus `Tail` holding a header condition |
//! | `while` / `do-while`        | `Condition`                                   |
//! | `for`                       | `Init`, `Condition`, `Increment`              |
//! | `try` / `catch` / `finally` | `Try`, with an edge to the body and every handler |
//! | dummy exit                  | `Direct`, always the last node created        |
//!
//! Edges that leave the protected body of a `finally` are routed through the
//! handler; the handler's exit node then records the path in the short-range
//! and long-range tables.

mod flattener;
mod graph;
mod node;

pub use flattener::flatten;
pub use graph::{DirectGraph, ExprVisit};
pub use node::{DirectNode, DirectNodeKind, FinallyPath};

#[cfg(test)]
mod tests {
    use crate::{
        analysis::flatten::{flatten, DirectNodeKind, ExprVisit, FinallyPath},
        ir::{EdgeKind, ExprArena, TreeBuilder},
        test::scenarios,
        utils::graph::NodeId,
        Error,
    };

    fn ids(raw: &[usize]) -> Vec<NodeId> {
        raw.iter().copied().map(NodeId::new).collect()
    }

    #[test]
    fn test_if_header_splits_tail() {
        let s = scenarios::if_merge();
        let graph = flatten(&s.tree).unwrap();

        assert_eq!(graph.len(), 6);
        assert_eq!(graph.first(), NodeId::new(0));
        assert_eq!(graph.order(), ids(&[0, 1, 2, 3, 4, 5]).as_slice());

        let header = s.stat("header");
        assert_eq!(graph.node_for(header, DirectNodeKind::Direct), Some(NodeId::new(1)));
        assert_eq!(graph.node_for(header, DirectNodeKind::Tail), Some(NodeId::new(2)));
        assert_eq!(graph.statement_entry(s.stat("if")), Some(NodeId::new(1)));

        let tail = graph.node(NodeId::new(2)).unwrap();
        assert_eq!(tail.exprs(), &[s.expr("c_cond")]);
        assert_eq!(tail.succs(), ids(&[3, 4]).as_slice());
        assert_eq!(graph.negative_branch(NodeId::new(2)), Some(NodeId::new(4)));
        assert_eq!(graph.negative_branch(NodeId::new(1)), None);

        let exit = graph.node(NodeId::new(5)).unwrap();
        assert!(exit.succs().is_empty());
        assert_eq!(exit.statement(), s.tree.dummy_exit());
    }

    #[test]
    fn test_for_loop_layout() {
        let s = scenarios::for_loop();
        let graph = flatten(&s.tree).unwrap();

        let looped = s.stat("loop");
        assert_eq!(graph.node_for(looped, DirectNodeKind::Init), Some(NodeId::new(2)));
        assert_eq!(graph.node_for(looped, DirectNodeKind::Condition), Some(NodeId::new(3)));
        assert_eq!(graph.node_for(looped, DirectNodeKind::Increment), Some(NodeId::new(4)));
        assert_eq!(graph.order(), ids(&[0, 2, 3, 5, 6, 1, 4]).as_slice());

        // the body's continue edge lands on the increment
        assert_eq!(graph.node(NodeId::new(1)).unwrap().succs(), ids(&[4]).as_slice());
        assert_eq!(graph.node(NodeId::new(3)).unwrap().succs(), ids(&[1, 5]).as_slice());
        let mut preds = graph.node(NodeId::new(3)).unwrap().preds().to_vec();
        preds.sort();
        assert_eq!(preds, ids(&[2, 4]));
    }

    #[test]
    fn test_missing_continue_is_synthesized() {
        let s = scenarios::do_while_without_continue();
        let graph = flatten(&s.tree).unwrap();

        let body = graph.statement_entry(s.stat("body")).unwrap();
        let cond = graph
            .node_for(s.stat("loop"), DirectNodeKind::Condition)
            .unwrap();
        assert_eq!(graph.statement_entry(s.stat("loop")), Some(body));
        assert_eq!(graph.node(body).unwrap().succs(), &[cond]);
        assert_eq!(graph.node(cond).unwrap().succs()[0], body);
    }

    #[test]
    fn test_finally_paths() {
        let s = scenarios::try_finally(false);
        let graph = flatten(&s.tree).unwrap();

        let try_node = graph.statement_entry(s.stat("try")).unwrap();
        let body = graph.statement_entry(s.stat("body")).unwrap();
        let handler = graph.statement_entry(s.stat("handler")).unwrap();
        let after = graph.statement_entry(s.stat("after")).unwrap();
        let exit = graph.statement_entry(s.tree.dummy_exit()).unwrap();

        assert_eq!(graph.node(try_node).unwrap().kind(), DirectNodeKind::Try);
        assert_eq!(graph.node(try_node).unwrap().succs(), &[body, handler]);
        assert_eq!(graph.node(handler).unwrap().succs(), &[after, exit]);

        let expected = vec![
            FinallyPath {
                source: body,
                destination: after,
                entry: handler,
            },
            FinallyPath {
                source: try_node,
                destination: exit,
                entry: handler,
            },
        ];
        assert_eq!(graph.short_range_paths(handler), expected.as_slice());
        assert_eq!(graph.long_range_paths(handler), expected.as_slice());
        assert_eq!(graph.finally_exits().collect::<Vec<_>>(), vec![handler]);
        assert!(graph.is_finally_exit(handler));
        assert!(!graph.is_finally_exit(body));
        assert_eq!(graph.monitor_exception_exit(handler), None);
        assert!(graph.short_range_paths(body).is_empty());
    }

    #[test]
    fn test_monitor_exception_exit() {
        let s = scenarios::monitor();
        let graph = flatten(&s.tree).unwrap();

        let handler = graph.statement_entry(s.stat("handler")).unwrap();
        let exit = graph.statement_entry(s.tree.dummy_exit()).unwrap();
        assert_eq!(graph.monitor_exception_exit(handler), Some(exit));
    }

    #[test]
    fn test_edge_out_of_body_is_unresolved() {
        let mut exprs = ExprArena::new();
        let one = exprs.int(1);
        let assign = exprs.assign_var(0, one);
        let mut builder = TreeBuilder::new();
        let block = builder.block(vec![assign]);
        let orphan = builder.block(vec![]);
        builder.edge(block, EdgeKind::Regular, orphan);
        let tree = builder.finish(block).unwrap();

        assert!(matches!(flatten(&tree), Err(Error::UnresolvedEdge(stat)) if stat == orphan));
    }

    #[test]
    fn test_header_without_branch_is_malformed() {
        let mut builder = TreeBuilder::new();
        let header = builder.if_header(vec![]);
        let then = builder.block(vec![]);
        let branch = builder.if_then(header, then, None);
        let tree = builder.finish(branch).unwrap();

        assert!(matches!(flatten(&tree), Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_iterate_exprs_remove_and_stop() {
        let s = scenarios::if_merge();
        let mut graph = flatten(&s.tree).unwrap();

        let mut seen = 0;
        assert!(!graph.iterate_exprs(|_, _| {
            seen += 1;
            ExprVisit::Stop
        }));
        assert_eq!(seen, 1);

        assert!(graph.iterate_exprs(|_, _| ExprVisit::Remove));
        assert!(graph.nodes().all(|n| n.exprs().is_empty()));
    }

    #[test]
    fn test_dot_marks_negative_branch() {
        let s = scenarios::if_merge();
        let graph = flatten(&s.tree).unwrap();

        let dot = graph.to_dot(Some("m"));
        assert!(dot.starts_with("digraph DirectGraph {"));
        assert!(dot.contains("label=\"m\";"));
        assert!(dot.contains("n2 -> n4 [style=dashed];"));
        assert!(dot.contains("n2 -> n3;"));
    }
}
