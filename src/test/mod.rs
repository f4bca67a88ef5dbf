//! Shared helpers for unit tests.
//!
//! [`scenarios`] builds small methods as statement trees together with their
//! expression arenas, naming the statements and variable expressions that the
//! tests inspect afterwards.
