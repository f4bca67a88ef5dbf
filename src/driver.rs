//! Per-method entry point and the batch driver.
//!
//! [`analyze_method`] runs the whole pipeline for one method: the statement
//! tree is flattened into a [`DirectGraph`] and the builder selected by
//! [`SsaConfig::strategy`] annotates every variable expression with its
//! version. [`analyze_methods`] does the same for many methods at once.
//! Each method owns its expression arena, so methods are independent and the
//! batch can run on the rayon thread pool.
//!
//! # Examples
//!
//! ```rust
//! use jdssa::ir::{EdgeKind, ExprArena, MethodDescriptor, TreeBuilder};
//! use jdssa::{analyze_methods, BatchConfig, MethodInput};
//!
//! let mut exprs = ExprArena::new();
//! let one = exprs.int(1);
//! let assign = exprs.assign_var(0, one);
//! let mut builder = TreeBuilder::new();
//! let block = builder.block(vec![assign]);
//! let exit = builder.dummy_exit();
//! builder.edge(block, EdgeKind::Break, exit);
//!
//! let input = MethodInput {
//!     name: "m".to_string(),
//!     tree: builder.finish(block)?,
//!     exprs,
//!     descriptor: MethodDescriptor::new(true, vec![]),
//! };
//! let outcomes = analyze_methods(vec![input], &BatchConfig::default());
//! assert!(outcomes[0].result.is_ok());
//! # Ok::<(), jdssa::Error>(())
//! ```

use log::{debug, warn};
use rayon::prelude::*;

use crate::{
    analysis::{
        flatten::{flatten, DirectGraph},
        ssa::{DominanceSsa, DominanceSsaBuilder, FlatSsa, FlatSsaBuilder},
    },
    config::{BatchConfig, SsaConfig, SsaStrategy},
    ir::{ExprArena, MethodDescriptor, StatementTree},
    Error, Result,
};

/// Output of the configured SSA builder.
#[derive(Debug, Clone)]
pub enum SsaResult {
    /// Produced by [`FlatSsaBuilder`]
    Flat(FlatSsa),
    /// Produced by [`DominanceSsaBuilder`]
    DominanceAware(DominanceSsa),
}

impl SsaResult {
    /// The strategy that produced this result.
    #[must_use]
    pub fn strategy(&self) -> SsaStrategy {
        match self {
            SsaResult::Flat(_) => SsaStrategy::Flat,
            SsaResult::DominanceAware(_) => SsaStrategy::DominanceAware,
        }
    }

    /// The flat result, if the flat builder ran.
    #[must_use]
    pub fn as_flat(&self) -> Option<&FlatSsa> {
        match self {
            SsaResult::Flat(ssa) => Some(ssa),
            SsaResult::DominanceAware(_) => None,
        }
    }

    /// The dominance-aware result, if that builder ran.
    #[must_use]
    pub fn as_dominance(&self) -> Option<&DominanceSsa> {
        match self {
            SsaResult::DominanceAware(ssa) => Some(ssa),
            SsaResult::Flat(_) => None,
        }
    }

    /// Number of fixpoint sweeps until convergence.
    #[must_use]
    pub fn sweeps(&self) -> usize {
        match self {
            SsaResult::Flat(ssa) => ssa.sweeps(),
            SsaResult::DominanceAware(ssa) => ssa.sweeps(),
        }
    }
}

/// Flattened graph and SSA result of one method.
#[derive(Debug, Clone)]
pub struct MethodAnalysis {
    /// The flattened control-flow graph
    pub graph: DirectGraph,
    /// Maps and tables of the builder that ran
    pub ssa: SsaResult,
}

/// Flattens `tree` and runs the builder selected by `config`.
///
/// Versions are written into the variable expressions of `exprs`.
///
/// # Errors
///
/// Returns any error of [`flatten`] or of the selected builder. The arena may
/// hold partially assigned versions afterwards.
pub fn analyze_method(
    tree: &StatementTree,
    exprs: &mut ExprArena,
    descriptor: &MethodDescriptor,
    config: &SsaConfig,
) -> Result<MethodAnalysis> {
    let graph = flatten(tree)?;
    let ssa = match config.strategy {
        SsaStrategy::Flat => {
            SsaResult::Flat(FlatSsaBuilder::new(tree, &graph, exprs).build(descriptor, config)?)
        }
        SsaStrategy::DominanceAware => SsaResult::DominanceAware(
            DominanceSsaBuilder::new(tree, &graph, exprs).build(descriptor, config)?,
        ),
    };
    Ok(MethodAnalysis { graph, ssa })
}

/// One method handed to [`analyze_methods`].
#[derive(Debug, Clone)]
pub struct MethodInput {
    /// Name used in log output and in [`Error::MethodFailed`]
    pub name: String,
    /// The method's statement tree
    pub tree: StatementTree,
    /// Expressions referenced by `tree`
    pub exprs: ExprArena,
    /// Parameter layout
    pub descriptor: MethodDescriptor,
}

/// Result of one method of a batch.
#[derive(Debug)]
pub struct MethodOutcome {
    /// Name from the [`MethodInput`]
    pub name: String,
    /// The method's expressions, annotated with versions on success
    pub exprs: ExprArena,
    /// The analysis, or the failure wrapped in [`Error::MethodFailed`]
    pub result: Result<MethodAnalysis>,
}

/// Analyzes every method of a batch, in input order.
///
/// A failing method is logged and reported in its own [`MethodOutcome`]; the
/// other methods are unaffected.
#[must_use]
pub fn analyze_methods(methods: Vec<MethodInput>, config: &BatchConfig) -> Vec<MethodOutcome> {
    debug!(
        "analyzing {} methods ({}, {})",
        methods.len(),
        config.ssa.strategy,
        if config.parallel { "parallel" } else { "sequential" }
    );

    if config.parallel {
        methods
            .into_par_iter()
            .map(|method| analyze_one(method, &config.ssa))
            .collect()
    } else {
        methods
            .into_iter()
            .map(|method| analyze_one(method, &config.ssa))
            .collect()
    }
}

fn analyze_one(method: MethodInput, config: &SsaConfig) -> MethodOutcome {
    let MethodInput {
        name,
        tree,
        mut exprs,
        descriptor,
    } = method;

    let result = analyze_method(&tree, &mut exprs, &descriptor, config).map_err(|source| {
        warn!("could not analyze method {}: {}", name, source);
        Error::MethodFailed {
            method: name.clone(),
            source: Box::new(source),
        }
    });

    MethodOutcome {
        name,
        exprs,
        result,
    }
}
