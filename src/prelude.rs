//! # jdssa Prelude
//!
//! Convenient re-exports of the types needed to build a statement tree, run
//! the analysis and inspect its result.
//!
//! ```rust
//! use jdssa::prelude::*;
//!
//! let mut exprs = ExprArena::new();
//! let value = exprs.int(7);
//! let assign = exprs.assign_var(0, value);
//! let mut builder = TreeBuilder::new();
//! let block = builder.block(vec![assign]);
//! let exit = builder.dummy_exit();
//! builder.edge(block, EdgeKind::Break, exit);
//! let tree = builder.finish(block)?;
//!
//! let descriptor = MethodDescriptor::new(true, vec![]);
//! let analysis = analyze_method(&tree, &mut exprs, &descriptor, &SsaConfig::flat())?;
//! assert_eq!(analysis.ssa.strategy(), SsaStrategy::Flat);
//! # Ok::<(), jdssa::Error>(())
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

pub use crate::{Error, Result};

// ================================================================================================
// Entry Points and Configuration
// ================================================================================================

pub use crate::{
    analyze_method, analyze_methods, BatchConfig, MethodAnalysis, MethodInput, MethodOutcome,
    SsaConfig, SsaResult, SsaStrategy,
};

// ================================================================================================
// Input Model
// ================================================================================================

pub use crate::ir::{
    EdgeKind, Expr, ExprArena, ExprId, FunctionOp, IfKind, LoopKind, MethodDescriptor, StatId,
    StatementKind, StatementTree, TreeBuilder,
};

// ================================================================================================
// Analysis Results
// ================================================================================================

pub use crate::analysis::{
    flatten::{flatten, DirectGraph, DirectNode, DirectNodeKind, ExprVisit, FinallyPath},
    ssa::{
        DominanceSsa, FlatSsa, PhantomExit, VarVersion, VersionFlags, VersionGraph, VersionMap,
    },
};

pub use crate::utils::graph::NodeId;
