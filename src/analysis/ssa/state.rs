//! Dataflow state and merge rules shared by both SSA builders.
//!
//! Both builders run the same forward fixpoint over the flattened graph: the
//! in-map of a node is the union of its predecessors' out-maps, and a node's
//! expressions turn its in-map into its out-map. They differ only in what
//! happens inside a node and in two knobs of the finally-crossing rule, which
//! are captured by [`MergePolicy`].

use std::collections::{HashMap, HashSet};

use crate::{
    analysis::{flatten::DirectGraph, ssa::VersionMap},
    ir::{ExprArena, ExprId, FunctionOp, StatId, StatementKind, StatementTree},
    utils::graph::NodeId,
    Error, Result,
};

/// Per-node version maps.
#[derive(Debug, Clone, Default)]
pub(crate) struct DataflowState {
    pub(crate) in_maps: HashMap<NodeId, VersionMap>,
    pub(crate) out_maps: HashMap<NodeId, VersionMap>,
    pub(crate) out_neg_maps: HashMap<NodeId, VersionMap>,
    /// Seeds merged into a node's in-map (parameters, exception variables)
    pub(crate) extra_maps: HashMap<NodeId, VersionMap>,
}

impl DataflowState {
    /// The map flowing along the edge `pred -> node`. The false-path map is used
    /// when `node` is the negative branch of `pred`.
    pub(crate) fn edge_out(
        &self,
        graph: &DirectGraph,
        pred: NodeId,
        node: NodeId,
    ) -> Option<&VersionMap> {
        if graph.negative_branch(pred) == Some(node) {
            self.out_neg_maps.get(&pred)
        } else {
            self.out_maps.get(&pred)
        }
    }

    /// Stores the out-maps of `node`. Returns `true` if anything changed.
    pub(crate) fn store_out(
        &mut self,
        graph: &DirectGraph,
        node: NodeId,
        maps: BranchMaps,
    ) -> bool {
        let (direct, negative) = maps.into_out();
        let changed = self.out_maps.get(&node) != Some(&direct)
            || self
                .out_neg_maps
                .get(&node)
                .is_some_and(|existing| *existing != negative);

        if changed {
            self.out_maps.insert(node, direct);
            if graph.negative_branch(node).is_some() {
                self.out_neg_maps.insert(node, negative);
            }
        }
        changed
    }
}

/// The true-path and, after a short-circuit condition, false-path maps while
/// the expressions of one node are processed.
#[derive(Debug, Clone)]
pub(crate) struct BranchMaps {
    pub(crate) direct: VersionMap,
    pub(crate) negative: Option<VersionMap>,
}

impl BranchMaps {
    pub(crate) fn new(direct: VersionMap) -> Self {
        BranchMaps {
            direct,
            negative: None,
        }
    }

    /// The map flowing into the false successor.
    pub(crate) fn false_path(&self) -> VersionMap {
        self.negative.clone().unwrap_or_else(|| self.direct.clone())
    }

    pub(crate) fn into_out(self) -> (VersionMap, VersionMap) {
        let negative = self.negative.unwrap_or_else(|| self.direct.clone());
        (self.direct, negative)
    }
}

/// Hands out fresh versions per slot, starting at 1.
#[derive(Debug, Clone, Default)]
pub(crate) struct VersionCounter {
    last: HashMap<i32, u32>,
}

impl VersionCounter {
    pub(crate) fn next(&mut self, slot: i32) -> u32 {
        let last = self.last.entry(slot).or_insert(0);
        *last += 1;
        *last
    }
}

/// Expression recursion used by [`walk_short_circuit`].
pub(crate) trait ExprWalker {
    fn walk(&mut self, expr: ExprId, maps: &mut BranchMaps) -> Result<()>;
}

/// Processes `&&`, `||` and `?:` so that each operand sees the map of the paths
/// on which it is actually evaluated, and leaves the false-path map of the whole
/// condition in `maps.negative`.
pub(crate) fn walk_short_circuit<W: ExprWalker>(
    walker: &mut W,
    op: FunctionOp,
    operands: &[ExprId],
    maps: &mut BranchMaps,
) -> Result<()> {
    match (op, operands) {
        (FunctionOp::Ternary, &[condition, then, otherwise]) => {
            walker.walk(condition, maps)?;
            let mut otherwise_maps = BranchMaps::new(maps.false_path());
            maps.negative = None;
            walker.walk(then, maps)?;
            walker.walk(otherwise, &mut otherwise_maps)?;

            let then_false = maps.negative.take();
            let otherwise_false = otherwise_maps.negative.take();
            if then_false.is_some() || otherwise_false.is_some() {
                let mut false_path = then_false.unwrap_or_else(|| maps.direct.clone());
                false_path.union_with(otherwise_false.as_ref().unwrap_or(&otherwise_maps.direct));
                maps.negative = Some(false_path);
            }
            maps.direct.union_with(&otherwise_maps.direct);
        }
        (FunctionOp::CondAnd, &[left, right]) => {
            walker.walk(left, maps)?;
            let mut right_maps = BranchMaps::new(maps.direct.clone());
            walker.walk(right, &mut right_maps)?;

            let mut false_path = maps.false_path();
            false_path.union_with(right_maps.negative.as_ref().unwrap_or(&right_maps.direct));
            maps.negative = Some(false_path);
            maps.direct = right_maps.direct;
        }
        (FunctionOp::CondOr, &[left, right]) => {
            walker.walk(left, maps)?;
            let mut right_maps = BranchMaps::new(maps.false_path());
            walker.walk(right, &mut right_maps)?;

            maps.negative = Some(right_maps.false_path());
            maps.direct.union_with(&right_maps.direct);
        }
        _ => {
            return Err(malformed_error!(
                "Operator {} with {} operands is not a short-circuit condition",
                op,
                operands.len()
            ))
        }
    }
    Ok(())
}

/// Knobs of the finally-crossing rule that differ between the builders.
#[derive(Debug, Clone, Default)]
pub(crate) struct MergePolicy {
    /// Union the node's previously computed in-map into the filter (flat builder)
    pub(crate) include_previous_in: bool,
    /// Skip filtering when the handler exit's out-map is empty (flat builder)
    pub(crate) skip_empty: bool,
    /// Attribute true paths using the long-range paths of every exit instead of
    /// only those of the exit being merged (dominance-aware builder)
    pub(crate) all_long_range: Option<HashSet<(NodeId, NodeId)>>,
}

impl MergePolicy {
    pub(crate) fn flat() -> Self {
        MergePolicy {
            include_previous_in: true,
            skip_empty: true,
            all_long_range: None,
        }
    }

    pub(crate) fn dominance(graph: &DirectGraph) -> Self {
        MergePolicy {
            include_previous_in: false,
            skip_empty: false,
            all_long_range: Some(
                graph
                    .all_long_range_paths()
                    .map(|path| (path.destination, path.source))
                    .collect(),
            ),
        }
    }
}

/// Result of filtering one predecessor's out-map.
#[derive(Debug, Clone, Default)]
pub(crate) struct FilteredMap {
    pub(crate) map: VersionMap,
    /// Union of the contributions of the paths that really lead to the destination
    pub(crate) true_source: VersionMap,
    pub(crate) finally_exit: bool,
    pub(crate) monitor_exit: bool,
}

/// Hook run on every filtered finally-exit map, including nested ones.
pub(crate) trait ExitPhantoms {
    fn substitute(&mut self, exit: NodeId, filtered: &mut FilteredMap) -> Result<()>;
}

/// The flat builder keeps handler-observed versions as they are.
pub(crate) struct NoPhantoms;

impl ExitPhantoms for NoPhantoms {
    fn substitute(&mut self, _exit: NodeId, _filtered: &mut FilteredMap) -> Result<()> {
        Ok(())
    }
}

/// Computes the map flowing from `pred` into `node` when control is heading
/// for `dest`.
///
/// For an ordinary predecessor this is its out-map. For the exit node of a
/// finally handler, the handler merged every path that entered it; only the
/// versions contributed by paths that actually continue to `dest` are kept.
/// Nested handlers are resolved recursively.
pub(crate) fn filtered_out_map<P: ExitPhantoms>(
    graph: &DirectGraph,
    state: &DataflowState,
    policy: &MergePolicy,
    phantoms: &mut P,
    node: NodeId,
    pred: NodeId,
    dest: NodeId,
) -> Result<FilteredMap> {
    let raw = state
        .edge_out(graph, pred, node)
        .cloned()
        .unwrap_or_default();

    let paths = graph.short_range_paths(pred);
    if paths.is_empty() || (policy.skip_empty && raw.is_empty()) {
        return Ok(FilteredMap {
            map: raw,
            ..FilteredMap::default()
        });
    }

    let exit_only: HashSet<(NodeId, NodeId)>;
    let long_range = if let Some(all) = &policy.all_long_range {
        all
    } else {
        exit_only = graph
            .long_range_paths(pred)
            .iter()
            .map(|path| (path.destination, path.source))
            .collect();
        &exit_only
    };

    let mut temp = raw.clone();
    let mut true_source = VersionMap::new();
    for path in paths {
        let nested = graph.is_finally_exit(path.source);
        let contribution = if nested {
            Some(
                filtered_out_map(graph, state, policy, phantoms, path.entry, path.source, dest)?
                    .map,
            )
        } else {
            state.edge_out(graph, path.source, path.entry).cloned()
        };

        let is_false_path = if nested {
            path.destination != node
        } else {
            !long_range.contains(&(dest, path.source))
        };

        if let Some(contribution) = contribution {
            if is_false_path {
                temp.complement(&contribution);
            } else {
                true_source.union_with(&contribution);
            }
        }
    }

    let monitor_exit = graph.monitor_exception_exit(pred) == Some(node);
    let map = if monitor_exit {
        true_source.clone()
    } else {
        temp.union_with(&true_source);
        if policy.include_previous_in {
            if let Some(previous) = state.in_maps.get(&node) {
                temp.union_with(previous);
            }
        }
        let mut map = raw;
        map.intersect_with(&temp);
        map
    };

    let mut filtered = FilteredMap {
        map,
        true_source,
        finally_exit: true,
        monitor_exit,
    };
    phantoms.substitute(pred, &mut filtered)?;
    Ok(filtered)
}

/// Computes the in-map of `node`: the union of the filtered out-maps of all
/// predecessors plus the node's seed map.
pub(crate) fn merge_in<P: ExitPhantoms>(
    graph: &DirectGraph,
    state: &DataflowState,
    policy: &MergePolicy,
    phantoms: &mut P,
    node: NodeId,
) -> Result<VersionMap> {
    let mut merged = VersionMap::new();
    if let Some(direct) = graph.node(node) {
        for pred in direct.preds() {
            let filtered = filtered_out_map(graph, state, policy, phantoms, node, *pred, node)?;
            merged.union_with(&filtered.map);
        }
    }
    if let Some(extra) = state.extra_maps.get(&node) {
        merged.union_with(extra);
    }
    Ok(merged)
}

/// A handler variable to seed before the fixpoint.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CatchSeed {
    /// The try construct owning the handler
    pub(crate) construct: StatId,
    /// Entry node of the handler
    pub(crate) node: NodeId,
    pub(crate) var: ExprId,
    pub(crate) slot: i32,
}

/// Handler variables of every try construct, in tree pre-order.
///
/// Handlers that did not make it into the graph are skipped.
pub(crate) fn catch_seeds(
    tree: &StatementTree,
    graph: &DirectGraph,
    exprs: &ExprArena,
) -> Result<Vec<CatchSeed>> {
    let mut seeds = Vec::new();
    for id in tree.preorder() {
        let stat = tree.statement(id)?;
        if !matches!(
            stat.kind(),
            StatementKind::TryCatch { .. } | StatementKind::CatchAll { .. }
        ) {
            continue;
        }

        let vars = stat.kind().handler_vars();
        for (handler, var) in stat.children().iter().skip(1).zip(vars) {
            let slot = exprs
                .var(*var)
                .ok_or_else(|| malformed_error!("Handler variable {} of {} is not a variable", var, id))?
                .slot;
            let Some(node) = graph.statement_entry(*handler) else {
                continue;
            };
            seeds.push(CatchSeed {
                construct: id,
                node,
                var: *var,
                slot,
            });
        }
    }
    Ok(seeds)
}

/// Fails on the first variable of a reachable node that never received a version.
pub(crate) fn validate_reads(graph: &DirectGraph, exprs: &ExprArena) -> Result<()> {
    for node in graph.nodes() {
        for expr in node.exprs() {
            for id in exprs.descendants(*expr) {
                if let Some(var) = exprs.var(id) {
                    if var.version == 0 {
                        return Err(Error::UninitializedRead {
                            slot: var.slot,
                            statement: node.statement(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ssa::VarVersion;

    struct Recorder {
        arena: ExprArena,
        writes: Vec<(ExprId, u32)>,
        next: u32,
    }

    // Treats every constant as a write of a fresh version of slot 0.
    impl ExprWalker for Recorder {
        fn walk(&mut self, expr: ExprId, maps: &mut BranchMaps) -> Result<()> {
            if self.arena.var(expr).is_none() {
                self.next += 1;
                maps.direct.set_current(0, self.next);
                self.writes.push((expr, self.next));
            }
            Ok(())
        }
    }

    fn recorder() -> (Recorder, ExprId, ExprId, ExprId) {
        let mut arena = ExprArena::new();
        let a = arena.int(0);
        let b = arena.int(1);
        let c = arena.int(2);
        (
            Recorder {
                arena,
                writes: Vec::new(),
                next: 0,
            },
            a,
            b,
            c,
        )
    }

    fn start() -> BranchMaps {
        BranchMaps::new([VarVersion::new(0, 100)].into_iter().collect())
    }

    #[test]
    fn test_cond_and_false_path_merges_both_exits() {
        let (mut rec, a, b, _) = recorder();
        let mut maps = start();
        walk_short_circuit(&mut rec, FunctionOp::CondAnd, &[a, b], &mut maps).unwrap();

        // true path: both operands ran
        assert_eq!(maps.direct.versions(0), vec![2]);
        // false path: left failed (after write 1) or right failed (after write 2)
        assert_eq!(maps.negative.unwrap().versions(0), vec![1, 2]);
    }

    #[test]
    fn test_cond_or_right_sees_false_path_of_left() {
        let (mut rec, a, b, _) = recorder();
        let mut maps = start();
        walk_short_circuit(&mut rec, FunctionOp::CondOr, &[a, b], &mut maps).unwrap();

        assert_eq!(maps.direct.versions(0), vec![1, 2]);
        assert_eq!(maps.negative.unwrap().versions(0), vec![2]);
    }

    #[test]
    fn test_ternary_merges_branches() {
        let (mut rec, a, b, c) = recorder();
        let mut maps = start();
        walk_short_circuit(&mut rec, FunctionOp::Ternary, &[a, b, c], &mut maps).unwrap();

        assert_eq!(maps.direct.versions(0), vec![2, 3]);
        assert!(maps.negative.is_none());
    }

    #[test]
    fn test_wrong_arity_rejected() {
        let (mut rec, a, _, _) = recorder();
        let mut maps = start();
        assert!(walk_short_circuit(&mut rec, FunctionOp::CondAnd, &[a], &mut maps).is_err());
    }

    #[test]
    fn test_version_counter_per_slot() {
        let mut counter = VersionCounter::default();
        assert_eq!(counter.next(3), 1);
        assert_eq!(counter.next(3), 2);
        assert_eq!(counter.next(-1), 1);
    }
}
