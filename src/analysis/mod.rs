//! Flattening and SSA construction.
//!
//! # Architecture
//!
//! - [`flatten`] - Turns a [`crate::ir::StatementTree`] into a [`DirectGraph`]
//! - [`ssa`] - Builds SSA form over a [`DirectGraph`], either flat or with a
//!   [`VersionGraph`] answering dominance queries between versions
//!
//! Both stages are pure functions of their input apart from the versions
//! written into the method's [`crate::ir::ExprArena`].

pub mod flatten;
pub mod ssa;

pub use flatten::{flatten, DirectGraph, DirectNode, DirectNodeKind, FinallyPath};
pub use ssa::{DominanceSsa, FlatSsa, VarVersion, VersionGraph, VersionMap};
