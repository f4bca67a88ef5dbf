// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # jdssa
//!
//! Control-flow flattening and SSA construction for the structured statement
//! trees of a Java decompiler.
//!
//! A decompiler front-end recovers `if`, loops, `switch`, `synchronized` and
//! `try`/`catch`/`finally` from bytecode and hands over a tree of statements.
//! Before local variables can be named, every read of a bytecode slot has to
//! be tied to the writes that can reach it. This crate does that in two steps:
//!
//! 1. [`analysis::flatten`] turns the tree into a [`analysis::DirectGraph`],
//!    a flat graph of nodes holding straight-line expression lists. Finally
//!    handlers are shared by every path through them; the graph records which
//!    entry each handler exit belongs to.
//! 2. An SSA builder runs a forward fixpoint over that graph and writes a
//!    version into every variable expression. The flat builder keeps a phi
//!    table; the dominance-aware builder also records a version dependency
//!    graph answering "does this definition dominate that one".
//!
//! ## Quick Start
//!
//! ```rust
//! use jdssa::prelude::*;
//!
//! // static void m(boolean c) { x = 1; if (c) { x = 2; } print(x); }
//! let mut exprs = ExprArena::new();
//! let one = exprs.int(1);
//! let x_one = exprs.assign_var(1, one);
//! let two = exprs.int(2);
//! let x_two = exprs.assign_var(1, two);
//! let cond = exprs.var_ref(0);
//! let x_use = exprs.var_ref(1);
//! let print = exprs.call("print", vec![x_use]);
//!
//! let mut builder = TreeBuilder::new();
//! let entry = builder.block(vec![x_one]);
//! let header = builder.if_header(vec![]);
//! let then = builder.block(vec![x_two]);
//! let branch = builder.if_then(header, then, Some(cond));
//! let merge = builder.block(vec![print]);
//! let body = builder.sequence(vec![entry, branch, merge]);
//! let exit = builder.dummy_exit();
//! builder
//!     .edge(entry, EdgeKind::Regular, branch)
//!     .edge(header, EdgeKind::Regular, then)
//!     .edge(branch, EdgeKind::Regular, merge)
//!     .edge(then, EdgeKind::Regular, merge)
//!     .edge(merge, EdgeKind::Break, exit);
//! let tree = builder.finish(body)?;
//!
//! let descriptor = MethodDescriptor::new(true, vec![1]);
//! let analysis = analyze_method(&tree, &mut exprs, &descriptor, &SsaConfig::flat())?;
//! let ssa = analysis.ssa.as_flat().unwrap();
//!
//! // the read in print(x) is a phi of both assignments
//! let phi = VarVersion::new(1, exprs.var(x_use).unwrap().version);
//! assert_eq!(ssa.phi_sources(phi), Some(vec![1, 2]));
//! # Ok::<(), jdssa::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types
//! - [`ir`] - The input model: expressions, statements, method descriptor
//! - [`analysis`] - Flattening and both SSA builders
//! - [`config`] - [`SsaConfig`] and [`BatchConfig`]
//! - [`utils`] - Bit sets, DOT output and the generic graph layer
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade and never installs a logger.

#[macro_use]
pub(crate) mod error;

#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
pub mod prelude;

/// The input model handed over by the decompiler front-end.
///
/// A method is a [`ir::StatementTree`] whose basic blocks reference
/// expressions in an [`ir::ExprArena`], plus an [`ir::MethodDescriptor`]
/// describing `this` and the parameters.
pub mod ir;

/// Flattening and SSA construction.
pub mod analysis;

/// Configuration of single-method and batch analysis.
pub mod config;

/// Shared utilities.
pub mod utils;

mod driver;

/// `jdssa` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `jdssa` Error type
///
/// Every variant aborts the analysis of the current method only.
pub use error::Error;

pub use config::{BatchConfig, SsaConfig, SsaStrategy};
pub use driver::{
    analyze_method, analyze_methods, MethodAnalysis, MethodInput, MethodOutcome, SsaResult,
};
