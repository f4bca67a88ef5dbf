//! Graph algorithms used by the flattener and the SSA builders.
//!
//! - [`reverse_postorder`] / [`reverse_postorder_from`] - iteration order for every sweep
//! - [`compute_dominators`] / [`compute_dominators_from`] - dominance over the version graph

mod dominators;
mod traversal;

pub use dominators::{compute_dominators, compute_dominators_from, DominatorTree};
pub use traversal::{postorder, postorder_from, reverse_postorder, reverse_postorder_from};
