//! The dominance-aware SSA builder.
//!
//! Runs the same fixpoint as the flat builder but records every version in a
//! [`VersionGraph`]:
//!
//! - each read gets a use version of its own, linked from the version that
//!   reaches it, or turned into a phi node when several do;
//! - phi contributors are routed through link nodes so that stale ones can be
//!   detached on later sweeps;
//! - increments and decrements get a phantom version linked from the
//!   operand's version, which later reads see instead of the operand;
//! - field accesses get a pseudo-slot per access site, invalidated by calls,
//!   field stores and object creation;
//! - versions leaving a finally handler along different exits are replaced by
//!   phantom versions per exit, linked from the versions the exit was entered
//!   with.
//!
//! After convergence one more sweep captures the live map at every use site
//! and the dominator tree of the version graph is computed.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use log::{debug, trace};

use crate::{
    analysis::{
        flatten::{DirectGraph, DirectNode},
        ssa::{
            state::{
                catch_seeds, merge_in, validate_reads, walk_short_circuit, BranchMaps,
                DataflowState, ExitPhantoms, ExprWalker, FilteredMap, MergePolicy,
                VersionCounter,
            },
            VarVersion, VersionEdgeKind, VersionFlags, VersionGraph, VersionMap,
        },
    },
    config::SsaConfig,
    ir::{Expr, ExprArena, ExprId, MethodDescriptor, StatId, StatementTree, VarExpr},
    utils::graph::NodeId,
    Result,
};

/// A phantom version created for one finally exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhantomExit {
    /// Version seen at the handler exit
    pub observed: VarVersion,
    /// Versions of the same slot contributed by the paths that really continue
    /// to the destination being merged, with finally-exit phantoms replaced by
    /// the versions they stand for
    pub true_path: Vec<u32>,
    /// The version substituted for `observed`
    pub phantom: VarVersion,
}

/// Result of [`DominanceSsaBuilder::build`].
#[derive(Debug, Clone)]
pub struct DominanceSsa {
    state: DataflowState,
    versions: VersionGraph,
    phantom_increments: BTreeMap<VarVersion, VarVersion>,
    phantom_exits: BTreeMap<NodeId, Vec<PhantomExit>>,
    field_slots: BTreeMap<ExprId, i32>,
    first_ranges: BTreeMap<VarVersion, StatId>,
    start_vars: Vec<VarVersion>,
    sweeps: usize,
}

impl DominanceSsa {
    /// Versions reaching the start of `node`.
    #[must_use]
    pub fn in_map(&self, node: NodeId) -> Option<&VersionMap> {
        self.state.in_maps.get(&node)
    }

    /// Versions leaving `node`; for a condition node, along its positive branch.
    #[must_use]
    pub fn out_map(&self, node: NodeId) -> Option<&VersionMap> {
        self.state.out_maps.get(&node)
    }

    /// Versions leaving a condition node along its negative branch.
    #[must_use]
    pub fn out_neg_map(&self, node: NodeId) -> Option<&VersionMap> {
        self.state.out_neg_maps.get(&node)
    }

    /// The version dependency graph.
    #[must_use]
    pub fn versions(&self) -> &VersionGraph {
        &self.versions
    }

    /// See [`VersionGraph::dominates`].
    #[must_use]
    pub fn dominates(&self, dominator: VarVersion, version: VarVersion) -> bool {
        self.versions.dominates(dominator, version)
    }

    /// See [`VersionGraph::is_dominated_by_set`].
    #[must_use]
    pub fn is_dominated_by_set(&self, version: VarVersion, dominators: &HashSet<VarVersion>) -> bool {
        self.versions.is_dominated_by_set(version, dominators)
    }

    /// The live map captured at the site using `version`.
    #[must_use]
    pub fn live(&self, version: VarVersion) -> Option<&VersionMap> {
        self.versions.version_node(version).and_then(|node| node.live())
    }

    /// The phantom version standing for the value after incrementing or
    /// decrementing `operand`.
    #[must_use]
    pub fn phantom_increment(&self, operand: VarVersion) -> Option<VarVersion> {
        self.phantom_increments.get(&operand).copied()
    }

    /// Every increment phantom, keyed by operand version.
    #[must_use]
    pub fn phantom_increments(&self) -> &BTreeMap<VarVersion, VarVersion> {
        &self.phantom_increments
    }

    /// Phantom versions created at the finally exit node `exit`.
    #[must_use]
    pub fn phantom_exits(&self, exit: NodeId) -> &[PhantomExit] {
        self.phantom_exits.get(&exit).map_or(&[], Vec::as_slice)
    }

    /// Finally phantom versions of every exit node.
    #[must_use]
    pub fn all_phantom_exits(&self) -> &BTreeMap<NodeId, Vec<PhantomExit>> {
        &self.phantom_exits
    }

    /// The pseudo-slot of a field access expression.
    #[must_use]
    pub fn field_slot(&self, expr: ExprId) -> Option<i32> {
        self.field_slots.get(&expr).copied()
    }

    /// Pseudo-slots of all field access sites.
    #[must_use]
    pub fn field_slots(&self) -> &BTreeMap<ExprId, i32> {
        &self.field_slots
    }

    /// The innermost try or synchronized construct whose protected body
    /// contains the definition of `version`.
    #[must_use]
    pub fn first_range(&self, version: VarVersion) -> Option<StatId> {
        self.first_ranges.get(&version).copied()
    }

    /// See [`DominanceSsa::first_range`].
    #[must_use]
    pub fn first_ranges(&self) -> &BTreeMap<VarVersion, StatId> {
        &self.first_ranges
    }

    /// Parameter versions seeded at the first node.
    #[must_use]
    pub fn start_vars(&self) -> &[VarVersion] {
        &self.start_vars
    }

    /// Number of fixpoint sweeps until convergence, not counting the capture sweep.
    #[must_use]
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }
}

/// Version allocation and the version graph.
///
/// Kept apart from [`DataflowState`] so the finally-crossing rule can read the
/// maps while creating phantom versions here.
#[derive(Debug, Default)]
struct VersionStore {
    counter: VersionCounter,
    versions: VersionGraph,
    first_ranges: BTreeMap<VarVersion, StatId>,
    phantom_increments: BTreeMap<VarVersion, VarVersion>,
    phantom_exits: BTreeMap<NodeId, Vec<PhantomExit>>,
    /// Finally-exit phantom to the version its handler observed
    exit_origins: BTreeMap<VarVersion, VarVersion>,
}

impl VersionStore {
    /// Allocates the next version of `slot` and creates its node.
    fn allocate(&mut self, slot: i32, range: Option<StatId>) -> (VarVersion, NodeId) {
        let version = VarVersion::new(slot, self.counter.next(slot));
        if let Some(range) = range {
            self.first_ranges.insert(version, range);
        }
        let node = self.versions.create_node(version);
        (version, node)
    }

    /// Replaces finally-exit phantoms among `versions` by the versions they
    /// stand for. Phantoms that travel around a loop back into a true path
    /// must not produce a new key on every sweep.
    fn canonical_path(&self, slot: i32, versions: Vec<u32>) -> Vec<u32> {
        let mut canonical = BTreeSet::new();
        for version in versions {
            let mut current = VarVersion::new(slot, version);
            while let Some(origin) = self.exit_origins.get(&current) {
                current = *origin;
            }
            canonical.insert(current.version);
        }
        canonical.into_iter().collect()
    }

    /// Makes `phi` merge exactly the contributors in `sources`.
    ///
    /// A node with a single incoming edge is a split use and loses that edge.
    /// Otherwise every link whose contributor is no longer a source is
    /// detached. A new link is created for each remaining source.
    fn update_phi(&mut self, phi: VarVersion, sources: &[u32], range: Option<StatId>) -> Result<()> {
        let phi_node = self.versions.require(phi)?;
        let mut pending: BTreeSet<u32> = sources.iter().copied().collect();

        let incoming = self.versions.incoming(phi_node);
        if let [single] = incoming.as_slice() {
            self.versions.remove_edge(*single);
        } else {
            for edge in incoming {
                let Some(link) = self.versions.edge(edge).map(|e| e.source) else {
                    continue;
                };
                let contributor = self.versions.link_source(link)?.version;
                if sources.contains(&contributor) {
                    pending.remove(&contributor);
                } else {
                    self.versions.remove_edge(edge);
                }
            }
        }

        for version in pending {
            let source = self.versions.require(VarVersion::new(phi.slot, version))?;
            let (_, link) = self.allocate(phi.slot, range);
            self.versions.add_flags(link, VersionFlags::PHI_LINK);
            self.versions.add_edge(source, link, VersionEdgeKind::General);
            self.versions.add_edge(link, phi_node, VersionEdgeKind::General);
        }
        Ok(())
    }
}

impl ExitPhantoms for VersionStore {
    fn substitute(&mut self, exit: NodeId, filtered: &mut FilteredMap) -> Result<()> {
        if !filtered.finally_exit
            || filtered.monitor_exit
            || filtered.true_source.is_empty()
            || filtered.map.is_empty()
        {
            return Ok(());
        }

        let mut exit_vars = filtered.map.clone();
        exit_vars.complement(&filtered.true_source);

        for observed in exit_vars.pairs().collect::<Vec<_>>() {
            let true_path =
                self.canonical_path(observed.slot, filtered.true_source.versions(observed.slot));
            filtered.map.remove(observed.slot, observed.version);

            let existing = self.phantom_exits.get(&exit).and_then(|phantoms| {
                phantoms
                    .iter()
                    .find(|p| p.observed == observed && p.true_path == true_path)
                    .map(|p| p.phantom)
            });
            let phantom = match existing {
                Some(phantom) => phantom,
                None => {
                    let sources = true_path
                        .iter()
                        .map(|version| self.versions.require(VarVersion::new(observed.slot, *version)))
                        .collect::<Result<Vec<_>>>()?;
                    let (phantom, node) = self.allocate(observed.slot, None);
                    self.versions
                        .add_flags(node, VersionFlags::PHANTOM_FINALLY_EXIT);
                    for source in sources {
                        self.versions
                            .add_edge(source, node, VersionEdgeKind::Phantom);
                    }
                    trace!("finally exit {}: {} -> phantom {}", exit, observed, phantom);
                    self.exit_origins.insert(phantom, observed);
                    self.phantom_exits.entry(exit).or_default().push(PhantomExit {
                        observed,
                        true_path,
                        phantom,
                    });
                    phantom
                }
            };
            filtered.map.insert(phantom.slot, phantom.version);
        }
        Ok(())
    }
}

/// Builds dominance-aware SSA form for one flattened method.
///
/// Versions are written into the variable expressions of `exprs` in place.
pub struct DominanceSsaBuilder<'a> {
    tree: &'a StatementTree,
    graph: &'a DirectGraph,
    exprs: &'a mut ExprArena,
    state: DataflowState,
    store: VersionStore,
    policy: MergePolicy,
    field_slots: BTreeMap<ExprId, i32>,
    next_field_slot: i32,
    track_fields: bool,
    /// Protected range of the statement owning the node being processed
    range: Option<StatId>,
    capture: bool,
}

impl<'a> DominanceSsaBuilder<'a> {
    /// Creates a builder over a tree and the graph flattened from it.
    pub fn new(tree: &'a StatementTree, graph: &'a DirectGraph, exprs: &'a mut ExprArena) -> Self {
        DominanceSsaBuilder {
            tree,
            graph,
            exprs,
            state: DataflowState::default(),
            store: VersionStore::default(),
            policy: MergePolicy::dominance(graph),
            field_slots: BTreeMap::new(),
            next_field_slot: -1,
            track_fields: true,
            range: None,
            capture: false,
        }
    }

    /// Runs the fixpoint, the live-capture sweep and the dominance computation.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for inconsistent expressions,
    /// [`crate::Error::GraphError`] if the version graph loses a node that a map
    /// still refers to, and [`crate::Error::UninitializedRead`] when read
    /// validation is enabled and a read has no reaching version.
    pub fn build(mut self, descriptor: &MethodDescriptor, config: &SsaConfig) -> Result<DominanceSsa> {
        self.track_fields = config.track_field_accesses;
        let start_vars = self.seed(descriptor)?;

        let mut dirty = HashSet::new();
        let mut sweeps = 0;
        loop {
            sweeps += 1;
            self.sweep(&mut dirty)?;
            trace!("dominance ssa sweep {}: {} nodes dirty", sweeps, dirty.len());
            if dirty.is_empty() {
                break;
            }
        }

        self.capture = true;
        self.sweep(&mut dirty)?;
        self.store.versions.compute_dominators();

        if config.validate_reads {
            validate_reads(self.graph, self.exprs)?;
        }
        debug!(
            "dominance ssa converged after {} sweeps: {} nodes, {} versions, {} field slots",
            sweeps,
            self.graph.len(),
            self.store.versions.len(),
            self.field_slots.len()
        );

        Ok(DominanceSsa {
            state: self.state,
            versions: self.store.versions,
            phantom_increments: self.store.phantom_increments,
            phantom_exits: self.store.phantom_exits,
            field_slots: self.field_slots,
            first_ranges: self.store.first_ranges,
            start_vars,
            sweeps,
        })
    }

    fn seed(&mut self, descriptor: &MethodDescriptor) -> Result<Vec<VarVersion>> {
        let mut first = VersionMap::new();
        let mut start_vars = Vec::new();
        for slot in descriptor.param_slots() {
            let (version, _) = self.store.allocate(slot, None);
            first.set_current(slot, version.version);
            start_vars.push(version);
        }
        self.state.extra_maps.insert(self.graph.first(), first);

        for seed in catch_seeds(self.tree, self.graph, self.exprs)? {
            let range = self.tree.first_protected_range(seed.construct);
            let (version, _) = self.store.allocate(seed.slot, range);
            self.exprs.set_version(seed.var, version.version)?;
            self.state
                .extra_maps
                .entry(seed.node)
                .or_default()
                .set_current(seed.slot, version.version);
        }
        Ok(start_vars)
    }

    fn sweep(&mut self, dirty: &mut HashSet<NodeId>) -> Result<()> {
        let graph = self.graph;
        for node in graph.nodes() {
            let id = node.id();
            dirty.remove(&id);

            let merged = merge_in(graph, &self.state, &self.policy, &mut self.store, id)?;
            self.state.in_maps.insert(id, merged.clone());

            self.range = self.tree.first_protected_range(node.statement());
            let mut maps = BranchMaps::new(merged);
            for expr in node.exprs() {
                self.walk(*expr, &mut maps)?;
            }

            if !fields_cross(graph, node) {
                maps.direct.remove_fields();
                if let Some(negative) = maps.negative.as_mut() {
                    negative.remove_fields();
                }
            }

            if self.state.store_out(graph, id, maps) {
                dirty.extend(node.succs().iter().copied());
            }
        }
        Ok(())
    }

    fn capture_live(&mut self, version: VarVersion, maps: &BranchMaps) -> Result<()> {
        if self.capture {
            self.store.versions.set_live(version, &maps.direct)?;
        }
        Ok(())
    }

    fn write(&mut self, target: ExprId, maps: &mut BranchMaps) -> Result<()> {
        let Some(var) = self.exprs.var(target) else {
            return Ok(());
        };
        if var.version == 0 {
            let (version, _) = self.store.allocate(var.slot, self.range);
            self.exprs.set_version(target, version.version)?;
            maps.direct.set_current(var.slot, version.version);
        } else {
            self.capture_live(VarVersion::new(var.slot, var.version), maps)?;
            maps.direct.set_current(var.slot, var.version);
        }
        Ok(())
    }

    fn read(&mut self, expr: ExprId, var: VarExpr, maps: &mut BranchMaps) -> Result<()> {
        let reaching = maps.direct.versions(var.slot);
        let mut current = VarVersion::new(var.slot, var.version);

        match (reaching.as_slice(), var.version) {
            ([], _) => return Ok(()),
            ([_], version) if version != 0 => {
                self.capture_live(current, maps)?;
                maps.direct.set_current(var.slot, version);
                return Ok(());
            }
            ([last], _) => {
                let (used, node) = self.store.allocate(var.slot, self.range);
                self.exprs.set_version(expr, used.version)?;
                maps.direct.set_current(var.slot, used.version);
                let source = self.store.versions.require(VarVersion::new(var.slot, *last))?;
                self.store
                    .versions
                    .add_edge(source, node, VersionEdgeKind::General);
                return Ok(());
            }
            (_, version) if version != 0 => {
                self.capture_live(current, maps)?;
                maps.direct.set_current(var.slot, version);
            }
            _ => {
                let (used, _) = self.store.allocate(var.slot, self.range);
                self.exprs.set_version(expr, used.version)?;
                maps.direct.set_current(var.slot, used.version);
                current = used;
            }
        }
        self.store.update_phi(current, &reaching, self.range)
    }

    /// Allocates the phantom version of an incremented or decremented variable
    /// and makes it current in place of the operand.
    fn increment(&mut self, operand: ExprId, maps: &mut BranchMaps) -> Result<()> {
        let Some(var) = self.exprs.var(operand) else {
            return Ok(());
        };
        if var.version == 0 {
            return Ok(());
        }
        let pair = VarVersion::new(var.slot, var.version);

        let phantom = match self.store.phantom_increments.get(&pair) {
            Some(phantom) => *phantom,
            None => {
                let node = self.store.versions.require(pair)?;
                let (phantom, phantom_node) = self.store.allocate(var.slot, None);
                self.store
                    .versions
                    .add_flags(phantom_node, VersionFlags::PHANTOM_INCREMENT);
                self.store
                    .versions
                    .add_edge(node, phantom_node, VersionEdgeKind::Phantom);
                trace!("increment of {} -> phantom {}", pair, phantom);
                self.store.phantom_increments.insert(pair, phantom);
                phantom
            }
        };

        self.capture_live(pair, maps)?;
        maps.direct.set_current(var.slot, phantom.version);
        Ok(())
    }

    /// Maintains field pseudo-slots after the children of `expr` were processed.
    fn track_field(&mut self, expr: ExprId, maps: &mut BranchMaps) -> Result<()> {
        let invalidates = match self.exprs.expr(expr)? {
            Expr::Field { .. } => {
                let slot = match self.field_slots.get(&expr) {
                    Some(slot) => *slot,
                    None => {
                        let slot = self.next_field_slot;
                        self.next_field_slot -= 1;
                        self.field_slots.insert(expr, slot);
                        let node = self.store.versions.create_node(VarVersion::new(slot, 1));
                        self.store.versions.add_flags(node, VersionFlags::FIELD);
                        slot
                    }
                };
                maps.direct.set_current(slot, 1);
                false
            }
            Expr::Invoke { .. } | Expr::New { array: false, .. } => true,
            Expr::Assign { left, .. } => self.is_field(*left),
            Expr::Function { op, operands } if op.is_increment_decrement() => {
                operands.first().is_some_and(|operand| self.is_field(*operand))
            }
            _ => false,
        };
        if invalidates {
            maps.direct.remove_fields();
        }
        Ok(())
    }

    fn is_field(&self, expr: ExprId) -> bool {
        matches!(self.exprs.get(expr), Some(Expr::Field { .. }))
    }
}

impl ExprWalker for DominanceSsaBuilder<'_> {
    fn walk(&mut self, expr: ExprId, maps: &mut BranchMaps) -> Result<()> {
        let current = self.exprs.expr(expr)?;
        let mut increment = None;
        let (target, children) = match current {
            Expr::Function { op, operands } if op.is_short_circuit() => {
                let (op, operands) = (*op, operands.clone());
                return walk_short_circuit(self, op, &operands, maps);
            }
            Expr::Function { op, operands } if op.is_increment_decrement() => {
                increment = operands.first().copied();
                (None, operands.clone())
            }
            Expr::Assign {
                left,
                right,
                compound: None,
            } if self.exprs.var(*left).is_some() => (Some(*left), vec![*right]),
            other => (None, other.children()),
        };

        for child in children {
            self.walk(child, maps)?;
        }

        if self.track_fields {
            self.track_field(expr, maps)?;
        }

        if let Some(target) = target {
            self.write(target, maps)
        } else if let Some(var) = self.exprs.var(expr) {
            self.read(expr, var, maps)
        } else if let Some(operand) = increment {
            self.increment(operand, maps)
        } else {
            Ok(())
        }
    }
}

/// Field pseudo-versions survive a node only into a successor that has no
/// other predecessor.
fn fields_cross(graph: &DirectGraph, node: &DirectNode) -> bool {
    match node.succs() {
        [] => true,
        [succ] => graph.node(*succ).is_some_and(|s| s.preds().len() == 1),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::{
        analysis::{
            flatten::{flatten, DirectGraph},
            ssa::{DominanceSsa, DominanceSsaBuilder, VarVersion, VersionEdgeKind, VersionFlags},
        },
        config::SsaConfig,
        test::scenarios::{self, Scenario},
    };

    fn build(s: &mut Scenario) -> DominanceSsa {
        build_with_graph(s).1
    }

    fn build_with_graph(s: &mut Scenario) -> (DirectGraph, DominanceSsa) {
        let graph = flatten(&s.tree).unwrap();
        let ssa = DominanceSsaBuilder::new(&s.tree, &graph, &mut s.exprs)
            .build(&s.descriptor, &SsaConfig::default())
            .unwrap();
        (graph, ssa)
    }

    fn v(slot: i32, version: u32) -> VarVersion {
        VarVersion::new(slot, version)
    }

    /// Sources and kinds of the edges entering `version`.
    fn feeds(ssa: &DominanceSsa, version: VarVersion) -> Vec<(VarVersion, VersionEdgeKind)> {
        let graph = ssa.versions();
        graph
            .version_node(version)
            .unwrap()
            .incoming()
            .iter()
            .map(|id| {
                let edge = graph.edge(*id).unwrap();
                (graph.node(edge.source).unwrap().version(), edge.kind)
            })
            .collect()
    }

    #[test]
    fn test_if_merge_use_splitting() {
        let mut s = scenarios::if_merge();
        let ssa = build(&mut s);

        assert_eq!(s.version_of("c_cond"), 2);
        assert_eq!(s.version_of("x_use"), 3);
        assert!(ssa.dominates(v(0, 1), v(0, 2)));
        assert!(!ssa.dominates(v(1, 1), v(1, 3)));

        let phi = ssa.versions().version_node(v(1, 3)).unwrap();
        assert_eq!(phi.incoming().len(), 2);
        let links: Vec<_> = [v(1, 4), v(1, 5)]
            .iter()
            .map(|link| ssa.versions().version_node(*link).unwrap().flags())
            .collect();
        assert!(links.iter().all(|f| f.contains(VersionFlags::PHI_LINK)));

        let both: HashSet<_> = [v(1, 1), v(1, 2)].into_iter().collect();
        assert!(ssa.is_dominated_by_set(v(1, 3), &both));

        let live = ssa.live(v(1, 3)).unwrap();
        assert_eq!(live.versions(0), vec![2]);
        assert_eq!(live.versions(1), vec![1, 2]);
    }

    #[test]
    fn test_increment_phantom() {
        let mut s = scenarios::increment();
        let ssa = build(&mut s);

        let operand = v(0, s.version_of("x_inc"));
        assert_eq!(operand, v(0, 2));
        assert_eq!(ssa.phantom_increment(operand), Some(v(0, 3)));
        assert!(ssa
            .versions()
            .version_node(v(0, 3))
            .unwrap()
            .flags()
            .contains(VersionFlags::PHANTOM_INCREMENT));

        // the phantom follows the operand and the later read follows the phantom
        assert_eq!(feeds(&ssa, v(0, 3)), vec![(operand, VersionEdgeKind::Phantom)]);
        assert_eq!(feeds(&ssa, operand), vec![(v(0, 1), VersionEdgeKind::General)]);
        assert_eq!(s.version_of("x_use"), 4);
        assert!(ssa.dominates(operand, v(0, 4)));
        assert!(ssa.dominates(v(0, 3), v(0, 4)));
    }

    #[test]
    fn test_field_slots_per_site() {
        let mut s = scenarios::field_reads();
        let (graph, ssa) = build_with_graph(&mut s);

        assert_eq!(ssa.field_slot(s.expr("first_field")), Some(-1));
        assert_eq!(ssa.field_slot(s.expr("second_field")), Some(-2));
        let block = graph.statement_entry(s.stat("reads")).unwrap();
        let out = ssa.out_map(block).unwrap();
        // the call between the reads dropped the first pseudo-slot
        assert!(out.get(-1).is_none());
        assert_eq!(out.versions(-2), vec![1]);
    }

    #[test]
    fn test_field_slots_cross_straight_line_only() {
        let mut s = scenarios::field_across_blocks();
        let (graph, ssa) = build_with_graph(&mut s);
        let entry = |name| graph.statement_entry(s.stat(name)).unwrap();

        assert_eq!(ssa.field_slot(s.expr("first_field")), Some(-1));
        assert_eq!(ssa.field_slot(s.expr("then_field")), Some(-2));

        // first has one successor and second one predecessor
        assert_eq!(ssa.out_map(entry("first")).unwrap().versions(-1), vec![1]);
        assert_eq!(ssa.in_map(entry("second")).unwrap().versions(-1), vec![1]);

        // the if header branches two ways
        assert!(ssa.in_map(entry("then")).unwrap().get(-1).is_none());

        // then has one successor but the merge block joins two paths
        let merge = entry("merge");
        assert_eq!(graph.node(merge).unwrap().preds().len(), 2);
        assert!(ssa.out_map(entry("then")).unwrap().get(-2).is_none());
        let merged = ssa.in_map(merge).unwrap();
        assert!(merged.get(-1).is_none());
        assert!(merged.get(-2).is_none());
    }

    #[test]
    fn test_field_tracking_disabled() {
        let mut s = scenarios::field_reads();
        let graph = flatten(&s.tree).unwrap();
        let config = SsaConfig {
            track_field_accesses: false,
            ..SsaConfig::default()
        };
        let ssa = DominanceSsaBuilder::new(&s.tree, &graph, &mut s.exprs)
            .build(&s.descriptor, &config)
            .unwrap();
        assert!(ssa.field_slots().is_empty());
    }

    #[test]
    fn test_finally_exception_variable_shares_phantom() {
        let mut s = scenarios::try_finally(false);
        let ssa = build(&mut s);

        let exits: Vec<_> = ssa.all_phantom_exits().values().flatten().collect();
        assert!(exits.iter().all(|p| p.observed.slot != 0));
        let exception: HashSet<_> = exits
            .iter()
            .filter(|p| p.observed.slot == 1)
            .map(|p| p.phantom)
            .collect();
        assert_eq!(exception, [v(1, 2)].into_iter().collect());
    }

    #[test]
    fn test_finally_exits_split_phantoms() {
        let mut s = scenarios::try_finally(true);
        let ssa = build(&mut s);

        let x_exits: Vec<_> = ssa
            .all_phantom_exits()
            .values()
            .flatten()
            .filter(|p| p.observed == v(0, 3))
            .collect();
        assert_eq!(x_exits.len(), 2);
        assert_ne!(x_exits[0].phantom, x_exits[1].phantom);
        for exit in x_exits {
            let node = ssa.versions().version_node(exit.phantom).unwrap();
            assert!(node.flags().contains(VersionFlags::PHANTOM_FINALLY_EXIT));

            // linked from the version the exit was entered with, not from the handler
            assert_eq!(exit.true_path.len(), 1);
            let entered = v(0, exit.true_path[0]);
            assert_eq!(feeds(&ssa, exit.phantom), vec![(entered, VersionEdgeKind::Phantom)]);
            assert!(ssa.dominates(entered, exit.phantom));
            assert!(!ssa.dominates(exit.observed, exit.phantom));
        }
    }

    #[test]
    fn test_monitor_exit_keeps_entry_versions() {
        let mut s = scenarios::monitor_then_spin();
        let (graph, ssa) = build_with_graph(&mut s);

        let handler = graph.statement_entry(s.stat("handler")).unwrap();
        let exit = graph.statement_entry(s.tree.dummy_exit()).unwrap();
        assert_eq!(graph.monitor_exception_exit(handler), Some(exit));

        let merged = ssa.in_map(exit).unwrap();
        assert_eq!(merged.versions(1), vec![s.version_of("x_zero")]);
        assert!(merged.get(2).is_none());
        assert_eq!(merged.versions(0), vec![1]);
        assert!(!merged.versions(1).contains(&s.version_of("x_body")));
    }

    #[test]
    fn test_first_range_of_try_body_write() {
        let mut s = scenarios::try_finally(false);
        let ssa = build(&mut s);

        assert_eq!(ssa.first_range(v(0, 2)), Some(s.stat("try")));
        assert_eq!(ssa.first_range(v(0, 1)), None);
    }
}
