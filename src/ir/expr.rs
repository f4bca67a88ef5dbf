//! Expression arena.
//!
//! Expressions are owned by one [`ExprArena`] per method and addressed by
//! [`ExprId`]. The flattener copies ids into graph nodes; the SSA builders later
//! write version numbers into the [`Expr::Var`] nodes in place, so the same arena is
//! shared by the statement tree, the flattened graph and every analysis result.

use std::fmt;

use strum::{Display, EnumIter, IntoStaticStr};

use crate::Result;

/// Index of an expression inside its [`ExprArena`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExprId(pub(crate) usize);

impl ExprId {
    /// Returns the raw arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExprId({})", self.0)
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// A local-variable slot reference with its SSA version.
///
/// Version `0` means "not yet assigned"; the builders never hand out `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarExpr {
    /// Local variable slot index
    pub slot: i32,
    /// SSA version, `0` until a builder assigns one
    pub version: u32,
}

/// Operators of [`Expr::Function`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum FunctionOp {
    /// `a + b`
    Add,
    /// `a - b`
    Sub,
    /// `a * b`
    Mul,
    /// `a / b`
    Div,
    /// `a % b`
    Rem,
    /// `a & b`
    And,
    /// `a | b`
    Or,
    /// `a ^ b`
    Xor,
    /// `a << b`
    Shl,
    /// `a >> b`
    Shr,
    /// `a >>> b`
    Ushr,
    /// `-a`
    Neg,
    /// `~a`
    BitNot,
    /// `!a`
    BoolNot,
    /// `a == b`
    Eq,
    /// `a != b`
    Ne,
    /// `a < b`
    Lt,
    /// `a <= b`
    Le,
    /// `a > b`
    Gt,
    /// `a >= b`
    Ge,
    /// `a && b`
    CondAnd,
    /// `a || b`
    CondOr,
    /// `c ? a : b`
    Ternary,
    /// `++x`
    PreInc,
    /// `x++`
    PostInc,
    /// `--x`
    PreDec,
    /// `x--`
    PostDec,
    /// `(T) a`
    Cast,
    /// `a instanceof T`
    InstanceOf,
    /// `a.length`
    ArrayLength,
}

impl FunctionOp {
    /// `++x`, `x++`, `--x` or `x--`.
    #[must_use]
    pub const fn is_increment_decrement(self) -> bool {
        matches!(
            self,
            FunctionOp::PreInc | FunctionOp::PostInc | FunctionOp::PreDec | FunctionOp::PostDec
        )
    }

    /// Operators whose operands are not all evaluated on every path.
    #[must_use]
    pub const fn is_short_circuit(self) -> bool {
        matches!(
            self,
            FunctionOp::CondAnd | FunctionOp::CondOr | FunctionOp::Ternary
        )
    }
}

/// How an [`Expr::Exit`] leaves the method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ExitKind {
    /// `return [value]`
    Return,
    /// `throw value`
    Throw,
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Any integral value
    Int(i64),
    /// Any floating point value
    Float(f64),
    /// String literal
    Str(String),
    /// `null`
    Null,
}

/// One expression node.
///
/// Children are referenced by id. Evaluation order of the children is the order
/// returned by [`Expr::children`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A local variable read, or the target of an assignment
    Var(VarExpr),
    /// A literal
    Const(Constant),
    /// `left = right`, or `left op= right` when `compound` is set
    Assign {
        /// Variable, field or array element written
        left: ExprId,
        /// Value assigned
        right: ExprId,
        /// Operator of a compound assignment
        compound: Option<FunctionOp>,
    },
    /// Operator application
    Function {
        /// The operator
        op: FunctionOp,
        /// Operands in evaluation order
        operands: Vec<ExprId>,
    },
    /// Instance or static field access
    Field {
        /// Receiver, `None` for a static field
        instance: Option<ExprId>,
        /// Field name
        name: String,
    },
    /// Method call
    Invoke {
        /// Receiver, `None` for a static call
        instance: Option<ExprId>,
        /// Method name
        name: String,
        /// Arguments in evaluation order
        args: Vec<ExprId>,
    },
    /// Object creation when `array` is false, array creation otherwise
    New {
        /// `true` for `new T[n]`
        array: bool,
        /// Constructor arguments or array dimensions
        args: Vec<ExprId>,
    },
    /// `array[index]`
    ArrayElement {
        /// The array
        array: ExprId,
        /// The index
        index: ExprId,
    },
    /// `return` or `throw`
    Exit {
        /// Which of the two
        kind: ExitKind,
        /// Returned or thrown value
        value: Option<ExprId>,
    },
    /// `monitorenter` or `monitorexit`
    Monitor {
        /// `true` for `monitorenter`
        enter: bool,
        /// The lock object
        value: ExprId,
    },
}

impl Expr {
    /// Returns the direct sub-expressions in evaluation order.
    #[must_use]
    pub fn children(&self) -> Vec<ExprId> {
        match self {
            Expr::Var(_) | Expr::Const(_) => Vec::new(),
            Expr::Assign { left, right, .. } => vec![*left, *right],
            Expr::Function { operands, .. } => operands.clone(),
            Expr::Field { instance, .. } => instance.iter().copied().collect(),
            Expr::Invoke { instance, args, .. } => {
                instance.iter().chain(args.iter()).copied().collect()
            }
            Expr::New { args, .. } => args.clone(),
            Expr::ArrayElement { array, index } => vec![*array, *index],
            Expr::Exit { value, .. } => value.iter().copied().collect(),
            Expr::Monitor { value, .. } => vec![*value],
        }
    }
}

/// Owner of all expressions of one method.
#[derive(Debug, Clone, Default)]
pub struct ExprArena {
    exprs: Vec<Expr>,
}

impl ExprArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        ExprArena { exprs: Vec::new() }
    }

    /// Number of expressions allocated so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    /// Returns `true` if nothing has been allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// Stores `expr` and returns its id.
    pub fn alloc(&mut self, expr: Expr) -> ExprId {
        self.exprs.push(expr);
        ExprId(self.exprs.len() - 1)
    }

    /// Looks up an expression.
    #[must_use]
    pub fn get(&self, id: ExprId) -> Option<&Expr> {
        self.exprs.get(id.0)
    }

    /// Looks up an expression, failing with [`crate::Error::Malformed`] for unknown ids.
    ///
    /// # Errors
    /// Returns an error if `id` was not allocated by this arena.
    pub fn expr(&self, id: ExprId) -> Result<&Expr> {
        self.exprs
            .get(id.0)
            .ok_or_else(|| malformed_error!("Unknown expression {}", id))
    }

    /// Returns the variable reference if `id` is an [`Expr::Var`].
    #[must_use]
    pub fn var(&self, id: ExprId) -> Option<VarExpr> {
        match self.exprs.get(id.0) {
            Some(Expr::Var(var)) => Some(*var),
            _ => None,
        }
    }

    /// Writes an SSA version into the variable expression `id`.
    ///
    /// # Errors
    /// Returns an error if `id` is not a variable expression.
    pub fn set_version(&mut self, id: ExprId, version: u32) -> Result<()> {
        match self.exprs.get_mut(id.0) {
            Some(Expr::Var(var)) => {
                var.version = version;
                Ok(())
            }
            _ => Err(malformed_error!("Expression {} is not a variable", id)),
        }
    }

    /// Returns `id` and all of its transitive sub-expressions in pre-order.
    #[must_use]
    pub fn descendants(&self, id: ExprId) -> Vec<ExprId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(expr) = self.exprs.get(current.0) else {
                continue;
            };
            result.push(current);
            let children = expr.children();
            stack.extend(children.into_iter().rev());
        }
        result
    }

    /// Allocates an unversioned variable reference.
    pub fn var_ref(&mut self, slot: i32) -> ExprId {
        self.alloc(Expr::Var(VarExpr { slot, version: 0 }))
    }

    /// Allocates an integer literal.
    pub fn int(&mut self, value: i64) -> ExprId {
        self.alloc(Expr::Const(Constant::Int(value)))
    }

    /// Allocates `slot = value` with a fresh target variable.
    pub fn assign_var(&mut self, slot: i32, value: ExprId) -> ExprId {
        let left = self.var_ref(slot);
        self.alloc(Expr::Assign {
            left,
            right: value,
            compound: None,
        })
    }

    /// Allocates an operator application.
    pub fn function(&mut self, op: FunctionOp, operands: Vec<ExprId>) -> ExprId {
        self.alloc(Expr::Function { op, operands })
    }

    /// Allocates a static call.
    pub fn call(&mut self, name: &str, args: Vec<ExprId>) -> ExprId {
        self.alloc(Expr::Invoke {
            instance: None,
            name: name.to_string(),
            args,
        })
    }

    /// Allocates a `return` with an optional value.
    pub fn ret(&mut self, value: Option<ExprId>) -> ExprId {
        self.alloc(Expr::Exit {
            kind: ExitKind::Return,
            value,
        })
    }
}

impl fmt::Display for ExprArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, expr) in self.exprs.iter().enumerate() {
            writeln!(f, "x{index}: {expr:?}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_children_in_evaluation_order() {
        let mut arena = ExprArena::new();
        let obj = arena.var_ref(0);
        let a = arena.int(1);
        let b = arena.int(2);
        let call = arena.alloc(Expr::Invoke {
            instance: Some(obj),
            name: "m".into(),
            args: vec![a, b],
        });

        assert_eq!(arena.expr(call).unwrap().children(), vec![obj, a, b]);
        assert_eq!(arena.descendants(call), vec![call, obj, a, b]);
    }

    #[test]
    fn test_set_version_only_on_variables() {
        let mut arena = ExprArena::new();
        let v = arena.var_ref(3);
        let c = arena.int(4);

        arena.set_version(v, 2).unwrap();
        assert_eq!(arena.var(v), Some(VarExpr { slot: 3, version: 2 }));
        assert!(arena.set_version(c, 1).is_err());
        assert!(arena.expr(ExprId(99)).is_err());
    }

    #[test]
    fn test_function_op_classification() {
        let inc: Vec<_> = FunctionOp::iter()
            .filter(|op| op.is_increment_decrement())
            .collect();
        assert_eq!(inc.len(), 4);
        assert!(FunctionOp::Ternary.is_short_circuit());
        assert!(!FunctionOp::Add.is_short_circuit());
        assert_eq!(FunctionOp::CondAnd.to_string(), "cond_and");
    }
}
