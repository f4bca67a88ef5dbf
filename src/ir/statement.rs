//! Structured statement tree.
//!
//! The tree is the output of control-flow structuring: basic blocks nested inside
//! sequences, ifs, loops, switches, synchronized blocks and try constructs. It is
//! immutable once built by [`TreeBuilder`](crate::ir::TreeBuilder); statements
//! are addressed by [`StatId`] and know their parent, so enclosing constructs can
//! be found without back references.

use std::fmt;

use strum::Display;

use crate::{ir::ExprId, Result};

/// Identifier of a statement, unique within one [`StatementTree`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatId(pub(crate) u32);

impl StatId {
    /// Returns the raw id.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for StatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatId({})", self.0)
    }
}

impl fmt::Display for StatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a structural successor edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EdgeKind {
    /// Plain fall-through
    Regular,
    /// Leaves an enclosing construct
    Break,
    /// Jumps to a loop's continuation point
    Continue,
    /// Leaves a finally handler along whatever path entered it
    FinallyExit,
}

/// A successor edge of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatEdge {
    /// How control leaves the statement
    pub kind: EdgeKind,
    /// Statement control continues at
    pub destination: StatId,
}

/// Shape of an `if`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum IfKind {
    /// `if (c) { .. }`; the false path is the statement's own successor edge
    If,
    /// `if (c) { .. } else { .. }`
    IfElse,
}

/// Shape of a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum LoopKind {
    /// Infinite loop `while (true)`
    Do,
    /// `while (c) { .. }`
    While,
    /// `do { .. } while (c)`
    DoWhile,
    /// `for (init; c; increment) { .. }`
    For,
}

/// Kind-specific payload of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// Straight-line code. `ends_in_if` marks the header block of an `if`, whose
    /// first successor edge is the positive branch.
    BasicBlock {
        /// Expressions in evaluation order
        exprs: Vec<ExprId>,
        /// Set on the header block of an `if`
        ends_in_if: bool,
    },
    /// Children run one after another
    Sequence,
    /// Children: header block, then-branch, optional else-branch
    If {
        /// With or without an else-branch
        kind: IfKind,
        /// The condition
        head: Option<ExprId>,
    },
    /// Single child: the body
    Loop {
        /// Loop shape
        kind: LoopKind,
        /// `for` initializer
        init: Option<ExprId>,
        /// Condition, absent for `Do`
        condition: Option<ExprId>,
        /// `for` increment
        increment: Option<ExprId>,
    },
    /// Children: header block, then one child per case body
    Switch {
        /// The selector
        head: Option<ExprId>,
    },
    /// Children: header block, protected body, exception cleanup
    Synchronized {
        /// The monitor expression
        head: Option<ExprId>,
    },
    /// Children: protected body, then one handler per entry of `vars`
    TryCatch {
        /// Exception variable of each handler
        vars: Vec<ExprId>,
    },
    /// Children: protected body and one handler. `monitor` is set when the
    /// construct is the lowering of a synchronized block.
    CatchAll {
        /// The handler's exception variable
        vars: Vec<ExprId>,
        /// `true` for finally, `false` for catch-all
        is_finally: bool,
        /// Lock released by the handler
        monitor: Option<ExprId>,
    },
    /// Method body root. Its single child is the body; `dummy_exit` is the
    /// target of every return and uncaught throw.
    Root {
        /// The synthetic exit statement
        dummy_exit: StatId,
    },
    /// Synthetic target of returns and uncaught throws
    DummyExit,
}

impl StatementKind {
    /// Short name used in logs and DOT labels.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            StatementKind::BasicBlock { .. } => "block",
            StatementKind::Sequence => "sequence",
            StatementKind::If { .. } => "if",
            StatementKind::Loop { .. } => "loop",
            StatementKind::Switch { .. } => "switch",
            StatementKind::Synchronized { .. } => "synchronized",
            StatementKind::TryCatch { .. } => "trycatch",
            StatementKind::CatchAll { .. } => "catchall",
            StatementKind::Root { .. } => "root",
            StatementKind::DummyExit => "exit",
        }
    }

    /// Handler variables of a try construct, empty for every other kind.
    #[must_use]
    pub fn handler_vars(&self) -> &[ExprId] {
        match self {
            StatementKind::TryCatch { vars } | StatementKind::CatchAll { vars, .. } => vars,
            _ => &[],
        }
    }
}

/// One node of the statement tree.
#[derive(Debug, Clone)]
pub struct Statement {
    pub(crate) id: StatId,
    pub(crate) kind: StatementKind,
    pub(crate) children: Vec<StatId>,
    pub(crate) successors: Vec<StatEdge>,
    pub(crate) parent: Option<StatId>,
}

impl Statement {
    /// Index of this statement in its tree.
    #[must_use]
    pub fn id(&self) -> StatId {
        self.id
    }

    /// Kind and payload.
    #[must_use]
    pub fn kind(&self) -> &StatementKind {
        &self.kind
    }

    /// Child statements; their meaning depends on [`Statement::kind`].
    #[must_use]
    pub fn children(&self) -> &[StatId] {
        &self.children
    }

    /// Structural successor edges in declaration order.
    #[must_use]
    pub fn successors(&self) -> &[StatEdge] {
        &self.successors
    }

    /// Enclosing statement, `None` for the root and the dummy exit.
    #[must_use]
    pub fn parent(&self) -> Option<StatId> {
        self.parent
    }

    /// The first child, which is where control enters a compound statement.
    #[must_use]
    pub fn first(&self) -> Option<StatId> {
        self.children.first().copied()
    }
}

/// The frozen statement tree of one method.
#[derive(Debug, Clone)]
pub struct StatementTree {
    pub(crate) stats: Vec<Statement>,
    pub(crate) root: StatId,
    pub(crate) dummy_exit: StatId,
}

impl StatementTree {
    /// The root statement.
    #[must_use]
    pub fn root(&self) -> StatId {
        self.root
    }

    /// The synthetic exit every return and uncaught throw targets.
    #[must_use]
    pub fn dummy_exit(&self) -> StatId {
        self.dummy_exit
    }

    /// Number of statements including root and dummy exit.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    /// Always `false`: a frozen tree holds at least its root and dummy exit.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Looks up a statement.
    #[must_use]
    pub fn get(&self, id: StatId) -> Option<&Statement> {
        self.stats.get(id.index())
    }

    /// Looks up a statement, failing with [`crate::Error::Malformed`] for unknown ids.
    ///
    /// # Errors
    /// Returns an error if `id` does not belong to this tree.
    pub fn statement(&self, id: StatId) -> Result<&Statement> {
        self.stats
            .get(id.index())
            .ok_or_else(|| malformed_error!("Unknown statement {}", id))
    }

    /// All statements in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        self.stats.iter()
    }

    /// Returns `true` if `stat` lies strictly inside `ancestor`.
    #[must_use]
    pub fn contains_strict(&self, ancestor: StatId, stat: StatId) -> bool {
        let mut current = self.get(stat).and_then(Statement::parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.get(id).and_then(Statement::parent);
        }
        false
    }

    /// Finds the innermost construct whose *protected* region contains `stat`.
    ///
    /// A protected region is the body of a try construct (its first child) or the
    /// body of a synchronized block (its second child). Handlers are not protected
    /// by their own construct.
    #[must_use]
    pub fn first_protected_range(&self, stat: StatId) -> Option<StatId> {
        let mut current = stat;
        while let Some(parent_id) = self.get(current).and_then(Statement::parent) {
            let parent = self.get(parent_id)?;
            let protected = match parent.kind {
                StatementKind::TryCatch { .. } | StatementKind::CatchAll { .. } => {
                    parent.children.first() == Some(&current)
                }
                StatementKind::Synchronized { .. } => parent.children.get(1) == Some(&current),
                _ => false,
            };
            if protected {
                return Some(parent_id);
            }
            current = parent_id;
        }
        None
    }

    /// Statements in pre-order starting at the root, children left to right.
    #[must_use]
    pub fn preorder(&self) -> Vec<StatId> {
        let mut result = Vec::with_capacity(self.stats.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let Some(stat) = self.get(id) else {
                continue;
            };
            result.push(id);
            stack.extend(stat.children.iter().rev().copied());
        }
        result
    }
}
