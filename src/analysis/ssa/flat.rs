//! The flat SSA builder.
//!
//! Versions live in sparse per-node maps only. A read reached by a single
//! version is annotated with it; a read reached by several gets a phi version
//! recorded in the phi table. Increment/decrement and field accesses need no
//! special treatment here.

use std::collections::{BTreeMap, HashSet};

use log::{debug, trace};

use crate::{
    analysis::{
        flatten::DirectGraph,
        ssa::{
            state::{
                catch_seeds, merge_in, validate_reads, walk_short_circuit, BranchMaps,
                DataflowState, ExprWalker, MergePolicy, NoPhantoms, VersionCounter,
            },
            VarVersion, VersionMap,
        },
    },
    config::SsaConfig,
    ir::{Expr, ExprArena, ExprId, MethodDescriptor, StatementTree, VarExpr},
    utils::{graph::NodeId, BitSet},
    Result,
};

/// Result of [`FlatSsaBuilder::build`].
#[derive(Debug, Clone)]
pub struct FlatSsa {
    state: DataflowState,
    phi: BTreeMap<VarVersion, BitSet>,
    start_vars: Vec<VarVersion>,
    sweeps: usize,
}

impl FlatSsa {
    /// Versions reaching the entry of `node`.
    #[must_use]
    pub fn in_map(&self, node: NodeId) -> Option<&VersionMap> {
        self.state.in_maps.get(&node)
    }

    /// Versions leaving `node` along its regular successors.
    #[must_use]
    pub fn out_map(&self, node: NodeId) -> Option<&VersionMap> {
        self.state.out_maps.get(&node)
    }

    /// Versions leaving `node` towards its negative branch.
    #[must_use]
    pub fn out_neg_map(&self, node: NodeId) -> Option<&VersionMap> {
        self.state.out_neg_maps.get(&node)
    }

    /// Phi versions and the versions merged into each.
    #[must_use]
    pub fn phi(&self) -> &BTreeMap<VarVersion, BitSet> {
        &self.phi
    }

    /// Versions merged into `phi`, ascending.
    #[must_use]
    pub fn phi_sources(&self, phi: VarVersion) -> Option<Vec<u32>> {
        self.phi.get(&phi).map(|set| {
            set.iter()
                .filter_map(|version| u32::try_from(version).ok())
                .collect()
        })
    }

    /// Parameter versions seeded at the first node.
    #[must_use]
    pub fn start_vars(&self) -> &[VarVersion] {
        &self.start_vars
    }

    /// Number of fixpoint sweeps until convergence.
    #[must_use]
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }
}

/// Builds flat SSA form for one flattened method.
///
/// Versions are written into the variable expressions of `exprs` in place.
pub struct FlatSsaBuilder<'a> {
    tree: &'a StatementTree,
    graph: &'a DirectGraph,
    exprs: &'a mut ExprArena,
    state: DataflowState,
    counter: VersionCounter,
    phi: BTreeMap<VarVersion, BitSet>,
    policy: MergePolicy,
}

impl<'a> FlatSsaBuilder<'a> {
    /// Creates a builder over a tree and the graph flattened from it.
    pub fn new(tree: &'a StatementTree, graph: &'a DirectGraph, exprs: &'a mut ExprArena) -> Self {
        FlatSsaBuilder {
            tree,
            graph,
            exprs,
            state: DataflowState::default(),
            counter: VersionCounter::default(),
            phi: BTreeMap::new(),
            policy: MergePolicy::flat(),
        }
    }

    /// Runs the fixpoint.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for inconsistent expressions and
    /// [`crate::Error::UninitializedRead`] when read validation is enabled and
    /// a read has no reaching version.
    pub fn build(mut self, descriptor: &MethodDescriptor, config: &SsaConfig) -> Result<FlatSsa> {
        let start_vars = self.seed(descriptor)?;

        let mut dirty = HashSet::new();
        let mut sweeps = 0;
        loop {
            sweeps += 1;
            self.sweep(&mut dirty)?;
            trace!("flat ssa sweep {}: {} nodes dirty", sweeps, dirty.len());
            if dirty.is_empty() {
                break;
            }
        }

        if config.validate_reads {
            validate_reads(self.graph, self.exprs)?;
        }
        debug!(
            "flat ssa converged after {} sweeps: {} nodes, {} phi versions",
            sweeps,
            self.graph.len(),
            self.phi.len()
        );

        Ok(FlatSsa {
            state: self.state,
            phi: self.phi,
            start_vars,
            sweeps,
        })
    }

    fn seed(&mut self, descriptor: &MethodDescriptor) -> Result<Vec<VarVersion>> {
        let mut first = VersionMap::new();
        let mut start_vars = Vec::new();
        for slot in descriptor.param_slots() {
            let version = self.counter.next(slot);
            first.set_current(slot, version);
            start_vars.push(VarVersion::new(slot, version));
        }
        self.state.extra_maps.insert(self.graph.first(), first);

        for seed in catch_seeds(self.tree, self.graph, self.exprs)? {
            let version = self.counter.next(seed.slot);
            self.exprs.set_version(seed.var, version)?;
            self.state
                .extra_maps
                .entry(seed.node)
                .or_default()
                .set_current(seed.slot, version);
        }
        Ok(start_vars)
    }

    fn sweep(&mut self, dirty: &mut HashSet<NodeId>) -> Result<()> {
        let graph = self.graph;
        for node in graph.nodes() {
            let id = node.id();
            dirty.remove(&id);

            let merged = merge_in(graph, &self.state, &self.policy, &mut NoPhantoms, id)?;
            self.state.in_maps.insert(id, merged.clone());

            let mut maps = BranchMaps::new(merged);
            for expr in node.exprs() {
                self.walk(*expr, &mut maps)?;
            }

            if self.state.store_out(graph, id, maps) {
                dirty.extend(node.succs().iter().copied());
            }
        }
        Ok(())
    }

    fn write(&mut self, target: ExprId, maps: &mut BranchMaps) -> Result<()> {
        let Some(var) = self.exprs.var(target) else {
            return Ok(());
        };
        let version = if var.version == 0 {
            let version = self.counter.next(var.slot);
            self.exprs.set_version(target, version)?;
            version
        } else {
            var.version
        };
        maps.direct.set_current(var.slot, version);
        Ok(())
    }

    fn read(&mut self, expr: ExprId, var: VarExpr, maps: &mut BranchMaps) -> Result<()> {
        let Some(reaching) = maps.direct.get(var.slot).cloned() else {
            return Ok(());
        };

        if let Some(version) = maps.direct.single(var.slot) {
            return self.exprs.set_version(expr, version);
        }

        let current = VarVersion::new(var.slot, var.version);
        if var.version != 0 {
            if let Some(sources) = self.phi.get_mut(&current) {
                sources.union_with(&reaching);
                maps.direct.set_current(var.slot, var.version);
                return Ok(());
            }
        }

        let version = self.counter.next(var.slot);
        self.exprs.set_version(expr, version)?;
        maps.direct.set_current(var.slot, version);
        self.phi.insert(VarVersion::new(var.slot, version), reaching);
        Ok(())
    }
}

impl ExprWalker for FlatSsaBuilder<'_> {
    fn walk(&mut self, expr: ExprId, maps: &mut BranchMaps) -> Result<()> {
        let current = self.exprs.expr(expr)?;
        let (target, children) = match current {
            Expr::Function { op, operands } if op.is_short_circuit() => {
                let (op, operands) = (*op, operands.clone());
                return walk_short_circuit(self, op, &operands, maps);
            }
            Expr::Assign {
                left,
                right,
                compound: None,
            } if self.exprs.var(*left).is_some() => (Some(*left), vec![*right]),
            Expr::Var(var) => {
                let var = *var;
                return self.read(expr, var, maps);
            }
            other => (None, other.children()),
        };

        for child in children {
            self.walk(child, maps)?;
        }
        if let Some(target) = target {
            self.write(target, maps)?;
        }
        Ok(())
    }
}
