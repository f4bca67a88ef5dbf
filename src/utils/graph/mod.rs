//! Index-based graph infrastructure.
//!
//! Concrete graphs live next to the analyses that build them
//! ([`crate::analysis::DirectGraph`], [`crate::analysis::VersionGraph`]); this module
//! only provides the identifiers, the adjacency traits and the generic algorithms.

pub mod algorithms;
mod edge;
mod node;
mod traits;

pub use edge::EdgeId;
pub use node::NodeId;
pub use traits::{GraphBase, Predecessors, RootedGraph, Successors};

#[cfg(test)]
pub(crate) use traits::tests::EdgeListGraph;
