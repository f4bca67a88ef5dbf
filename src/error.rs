use thiserror::Error;

use crate::ir::StatId;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every variant describes a failure of the *current method* only. The statement tree and the
/// expression arena of a method are a pure function input, so none of these errors is worth a
/// retry: the caller is expected to fall back to a degraded rendering of the affected method
/// and continue with the rest of the class.
///
/// # Error Categories
///
/// ## Structural errors in the input tree
/// - [`Error::Malformed`] - Inconsistent statement tree (missing child, unknown id, wrong shape)
/// - [`Error::UnresolvedEdge`] - A successor edge targets a statement that never received a node
///
/// ## Algorithmic failures
/// - [`Error::UninitializedRead`] - A variable read has no reaching version after convergence
/// - [`Error::GraphError`] - The version dependency graph lost an internal invariant
///
/// ## Batch processing
/// - [`Error::MethodFailed`] - Wraps any of the above with the name of the affected method
///
/// # Examples
///
/// ```rust,no_run
/// use jdssa::{analyze_method, Error, SsaConfig};
/// # fn demo(tree: &jdssa::ir::StatementTree, exprs: &mut jdssa::ir::ExprArena) {
/// let descriptor = jdssa::ir::MethodDescriptor::new(true, vec![]);
/// match analyze_method(tree, exprs, &descriptor, &SsaConfig::default()) {
///     Ok(analysis) => println!("{} nodes", analysis.graph.len()),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed tree: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("Could not decompile this method: {}", e),
/// }
/// # }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The statement tree is structurally inconsistent.
    ///
    /// Raised for unknown statement or expression ids, statements missing a
    /// mandatory child or successor edge, and loops whose continuation point
    /// cannot be resolved. The error includes the source location where the
    /// inconsistency was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A successor edge points at a statement that was never flattened.
    ///
    /// Edges are staged symbolically while the tree is walked and resolved
    /// once every statement has an entry node; a destination without one
    /// means the edge leaves the method body.
    #[error("Edge to statement {0} could not be resolved to a graph node")]
    UnresolvedEdge(StatId),

    /// A variable read has no reaching version once the fixpoint converged.
    ///
    /// Verified bytecode never reads an unassigned slot, so this indicates an
    /// inconsistent statement tree.
    #[error("Read of variable slot {slot} in statement {statement} has no reaching definition")]
    UninitializedRead {
        /// The variable slot that was read
        slot: i32,
        /// The statement owning the graph node that performs the read
        statement: StatId,
    },

    /// Version dependency graph invariant violated.
    ///
    /// Raised when a version that is still referenced by a live version map
    /// has no node in the dependency graph, or when a phi contributor edge
    /// does not have the expected intermediate shape.
    #[error("{0}")]
    GraphError(String),

    /// Analysis of a single method failed inside a batch run.
    #[error("Method '{method}' could not be analyzed: {source}")]
    MethodFailed {
        /// Name of the method that failed
        method: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },
}
