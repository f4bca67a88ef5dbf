//! Configuration for flattening and SSA construction.
//!
//! [`SsaConfig`] selects the builder and its optional behavior for a single
//! method; [`BatchConfig`] adds the knobs of the batch driver.

use strum::{Display, EnumIter};

/// Which SSA builder runs after flattening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter)]
pub enum SsaStrategy {
    /// Sparse version maps plus a phi table
    Flat,
    /// Version dependency graph with dominance, phantom and field pseudo-versions
    #[default]
    DominanceAware,
}

/// Configuration of one method analysis.
#[derive(Debug, Clone)]
pub struct SsaConfig {
    /// Builder to run (default: [`SsaStrategy::DominanceAware`]).
    pub strategy: SsaStrategy,

    /// Give every field access site a pseudo-slot (dominance-aware builder
    /// only, default: `true`).
    pub track_field_accesses: bool,

    /// Fail with [`crate::Error::UninitializedRead`] when a read is left
    /// without a version after convergence (default: `true`).
    pub validate_reads: bool,
}

impl Default for SsaConfig {
    fn default() -> Self {
        Self {
            strategy: SsaStrategy::DominanceAware,
            track_field_accesses: true,
            validate_reads: true,
        }
    }
}

impl SsaConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration running the flat builder.
    #[must_use]
    pub fn flat() -> Self {
        Self {
            strategy: SsaStrategy::Flat,
            ..Self::default()
        }
    }

    /// Creates a configuration running the dominance-aware builder.
    #[must_use]
    pub fn dominance_aware() -> Self {
        Self::default()
    }
}

/// Configuration of [`crate::analyze_methods`].
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Analyze methods on the rayon thread pool (default: `true`).
    pub parallel: bool,

    /// Per-method configuration.
    pub ssa: SsaConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            ssa: SsaConfig::default(),
        }
    }
}

impl BatchConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that analyzes methods one after another.
    #[must_use]
    pub fn sequential(ssa: SsaConfig) -> Self {
        Self {
            parallel: false,
            ssa,
        }
    }
}
