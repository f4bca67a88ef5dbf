//! Static Single Assignment (SSA) form for flattened methods.
//!
//! Both builders run a forward dataflow fixpoint over a
//! [`DirectGraph`](crate::analysis::flatten::DirectGraph) in reverse postorder.
//! Each node's in-map records, per variable slot, the set of versions that can
//! reach it; reading a variable with more than one reaching version creates a
//! phi. Versions are written back into the variable expressions, so after a
//! successful build every reachable read carries a nonzero version.
//!
//! # Architecture
//!
//! - [`version`] - [`VarVersion`] and the per-slot [`VersionMap`]
//! - [`FlatSsaBuilder`] - Plain construction with a phi table keyed by version
//! - [`DominanceSsaBuilder`] - Construction that additionally splits every use
//!   into its own version and records the dependencies in a [`VersionGraph`],
//!   with phantom versions for increments and finally exits
//!
//! Finally handlers are shared between all paths through them. When a handler
//! exit is merged into a successor, only the versions that actually arrived
//! through the matching entry are kept; both builders share this resolution
//! and differ only in the merge policy they apply.
//!
//! # Usage
//!
//! ```rust
//! use jdssa::analysis::{flatten, ssa::{DominanceSsaBuilder, VarVersion}};
//! use jdssa::ir::{EdgeKind, ExprArena, MethodDescriptor, TreeBuilder};
//! use jdssa::SsaConfig;
//!
//! let mut exprs = ExprArena::new();
//! let param = exprs.var_ref(0);
//! let ret = exprs.ret(Some(param));
//! let mut builder = TreeBuilder::new();
//! let block = builder.block(vec![ret]);
//! let exit = builder.dummy_exit();
//! builder.edge(block, EdgeKind::Break, exit);
//! let tree = builder.finish(block)?;
//!
//! let graph = flatten(&tree)?;
//! let descriptor = MethodDescriptor::new(true, vec![1]);
//! let ssa = DominanceSsaBuilder::new(&tree, &graph, &mut exprs)
//!     .build(&descriptor, &SsaConfig::default())?;
//! assert_eq!(exprs.var(param).map(|v| v.version), Some(2));
//! assert!(ssa.dominates(VarVersion::new(0, 1), VarVersion::new(0, 2)));
//! # Ok::<(), jdssa::Error>(())
//! ```

mod dominance;
mod flat;
mod graph;
pub(crate) mod state;
pub mod version;

pub use dominance::{DominanceSsa, DominanceSsaBuilder, PhantomExit};
pub use flat::{FlatSsa, FlatSsaBuilder};
pub use graph::{VersionEdge, VersionEdgeKind, VersionFlags, VersionGraph, VersionNode};
pub use version::{VarVersion, VersionMap};
