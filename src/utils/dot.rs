//! DOT format helpers for graph dumps.
//!
//! [`DirectGraph::to_dot`](crate::analysis::DirectGraph::to_dot) and
//! [`VersionGraph::to_dot`](crate::analysis::VersionGraph::to_dot) render their graphs
//! for Graphviz. Node labels contain statement ids, node kinds and variable
//! versions, which are escaped here.

/// Escapes a string for use inside a quoted DOT label.
///
/// # Examples
///
/// ```rust
/// use jdssa::utils::escape_dot;
///
/// assert_eq!(escape_dot("a<b>"), "a\\<b\\>");
/// ```
#[must_use]
pub fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
        .replace('<', "\\<")
        .replace('>', "\\>")
}
