//! Input model: the structured statement tree and its expressions.
//!
//! A method arrives as a [`StatementTree`] built with a [`TreeBuilder`], an
//! [`ExprArena`] holding every expression the tree references, and a
//! [`MethodDescriptor`] describing its parameters.

mod builder;
mod expr;
mod method;
mod statement;

pub use builder::TreeBuilder;
pub use expr::{Constant, ExitKind, Expr, ExprArena, ExprId, FunctionOp, VarExpr};
pub use method::MethodDescriptor;
pub use statement::{
    EdgeKind, IfKind, LoopKind, StatEdge, StatId, Statement, StatementKind, StatementTree,
};
