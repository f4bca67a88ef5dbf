//! Shared utilities: bit sets, DOT output and the graph layer.

mod bitset;
mod dot;
pub mod graph;

pub use bitset::{BitSet, BitSetIter};
pub use dot::escape_dot;
