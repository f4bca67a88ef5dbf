//! Construction and validation of [`StatementTree`]s.

use log::trace;

use crate::{
    ir::{
        EdgeKind, ExprId, IfKind, LoopKind, StatEdge, StatId, Statement, StatementKind,
        StatementTree,
    },
    Result,
};

/// Incremental builder for a [`StatementTree`].
///
/// Statements are created bottom-up: children first, then the compound statement
/// that owns them. Successor edges can be added at any time. [`TreeBuilder::finish`]
/// wraps the body in a root, links parents and checks the shape of every statement.
///
/// # Examples
///
/// ```rust
/// use jdssa::ir::{EdgeKind, ExprArena, TreeBuilder};
///
/// let mut exprs = ExprArena::new();
/// let one = exprs.int(1);
/// let assign = exprs.assign_var(0, one);
///
/// let mut builder = TreeBuilder::new();
/// let block = builder.block(vec![assign]);
/// let exit = builder.dummy_exit();
/// builder.edge(block, EdgeKind::Break, exit);
/// let tree = builder.finish(block).unwrap();
/// assert_eq!(tree.len(), 3);
/// ```
#[derive(Debug)]
pub struct TreeBuilder {
    stats: Vec<Statement>,
    dummy_exit: StatId,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    /// Creates a builder holding only the dummy exit statement.
    #[must_use]
    pub fn new() -> Self {
        let mut builder = TreeBuilder {
            stats: Vec::new(),
            dummy_exit: StatId(0),
        };
        builder.dummy_exit = builder.add(StatementKind::DummyExit, Vec::new());
        builder
    }

    /// The dummy exit that returns and uncaught throws target.
    #[must_use]
    pub fn dummy_exit(&self) -> StatId {
        self.dummy_exit
    }

    /// Adds a statement of any kind.
    pub fn add(&mut self, kind: StatementKind, children: Vec<StatId>) -> StatId {
        #[allow(clippy::cast_possible_truncation)]
        let id = StatId(self.stats.len() as u32);
        self.stats.push(Statement {
            id,
            kind,
            children,
            successors: Vec::new(),
            parent: None,
        });
        id
    }

    /// Adds a basic block.
    pub fn block(&mut self, exprs: Vec<ExprId>) -> StatId {
        self.add(
            StatementKind::BasicBlock {
                exprs,
                ends_in_if: false,
            },
            Vec::new(),
        )
    }

    /// Adds the header block of an `if`; its first successor edge must be the
    /// positive branch.
    pub fn if_header(&mut self, exprs: Vec<ExprId>) -> StatId {
        self.add(
            StatementKind::BasicBlock {
                exprs,
                ends_in_if: true,
            },
            Vec::new(),
        )
    }

    /// Adds a sequence executing `children` in order. Fall-through between
    /// them still needs explicit edges.
    pub fn sequence(&mut self, children: Vec<StatId>) -> StatId {
        self.add(StatementKind::Sequence, children)
    }

    /// Adds `if (head) then`; the false path is the if's own successor edge.
    pub fn if_then(&mut self, header: StatId, then: StatId, head: Option<ExprId>) -> StatId {
        self.add(
            StatementKind::If {
                kind: IfKind::If,
                head,
            },
            vec![header, then],
        )
    }

    /// Adds `if (head) then else otherwise`.
    pub fn if_else(
        &mut self,
        header: StatId,
        then: StatId,
        otherwise: StatId,
        head: Option<ExprId>,
    ) -> StatId {
        self.add(
            StatementKind::If {
                kind: IfKind::IfElse,
                head,
            },
            vec![header, then, otherwise],
        )
    }

    /// Adds a loop around `body`.
    pub fn looped(
        &mut self,
        kind: LoopKind,
        body: StatId,
        init: Option<ExprId>,
        condition: Option<ExprId>,
        increment: Option<ExprId>,
    ) -> StatId {
        self.add(
            StatementKind::Loop {
                kind,
                init,
                condition,
                increment,
            },
            vec![body],
        )
    }

    /// Adds a try with one catch handler per `(handler, exception variable)` pair.
    pub fn try_catch(&mut self, body: StatId, handlers: Vec<(StatId, ExprId)>) -> StatId {
        let mut children = vec![body];
        let mut vars = Vec::with_capacity(handlers.len());
        for (handler, var) in handlers {
            children.push(handler);
            vars.push(var);
        }
        self.add(StatementKind::TryCatch { vars }, children)
    }

    /// Adds `try { body } finally { handler }`.
    pub fn try_finally(&mut self, body: StatId, handler: StatId, var: ExprId) -> StatId {
        self.add(
            StatementKind::CatchAll {
                vars: vec![var],
                is_finally: true,
                monitor: None,
            },
            vec![body, handler],
        )
    }

    /// Adds the lowering of `synchronized (monitor) { body }`: a finally whose
    /// handler releases the monitor.
    pub fn monitor_finally(
        &mut self,
        body: StatId,
        handler: StatId,
        var: ExprId,
        monitor: ExprId,
    ) -> StatId {
        self.add(
            StatementKind::CatchAll {
                vars: vec![var],
                is_finally: true,
                monitor: Some(monitor),
            },
            vec![body, handler],
        )
    }

    /// Adds a `synchronized` statement with its header block, body and
    /// exception cleanup.
    pub fn synchronized(
        &mut self,
        header: StatId,
        body: StatId,
        cleanup: StatId,
        head: Option<ExprId>,
    ) -> StatId {
        self.add(
            StatementKind::Synchronized { head },
            vec![header, body, cleanup],
        )
    }

    /// Appends a successor edge to `from`. Unknown ids are reported by [`TreeBuilder::finish`].
    pub fn edge(&mut self, from: StatId, kind: EdgeKind, to: StatId) -> &mut Self {
        if let Some(stat) = self.stats.get_mut(from.index()) {
            stat.successors.push(StatEdge {
                kind,
                destination: to,
            });
        }
        self
    }

    /// Wraps `body` in the root statement and freezes the tree.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if a child or edge references an unknown
    /// statement, a statement has two parents, the parent chain contains a cycle or
    /// a statement has the wrong number of children for its kind.
    pub fn finish(mut self, body: StatId) -> Result<StatementTree> {
        let dummy_exit = self.dummy_exit;
        let root = self.add(StatementKind::Root { dummy_exit }, vec![body]);
        let count = self.stats.len();

        for index in 0..count {
            let id = self.stats[index].id;
            let children = self.stats[index].children.clone();
            for child in children {
                if child.index() >= count {
                    return Err(malformed_error!(
                        "Statement {} has unknown child {}",
                        id,
                        child
                    ));
                }
                if child == dummy_exit || child == root {
                    return Err(malformed_error!(
                        "Statement {} cannot be a child of {}",
                        child,
                        id
                    ));
                }
                let slot = &mut self.stats[child.index()].parent;
                if let Some(existing) = slot {
                    return Err(malformed_error!(
                        "Statement {} has two parents: {} and {}",
                        child,
                        existing,
                        id
                    ));
                }
                *slot = Some(id);
            }

            for edge in &self.stats[index].successors {
                if edge.destination.index() >= count {
                    return Err(malformed_error!(
                        "Statement {} has an edge to unknown statement {}",
                        id,
                        edge.destination
                    ));
                }
            }
        }

        for stat in &self.stats {
            let mut depth = 0;
            let mut current = stat.parent;
            while let Some(parent) = current {
                depth += 1;
                if depth > count {
                    return Err(malformed_error!(
                        "Parent chain of statement {} contains a cycle",
                        stat.id
                    ));
                }
                current = self.stats[parent.index()].parent;
            }
            check_shape(stat)?;
        }

        trace!("statement tree frozen with {} statements", count);
        Ok(StatementTree {
            stats: self.stats,
            root,
            dummy_exit,
        })
    }
}

fn check_shape(stat: &Statement) -> Result<()> {
    let children = stat.children.len();
    let valid = match &stat.kind {
        StatementKind::BasicBlock { .. } | StatementKind::DummyExit => children == 0,
        StatementKind::Sequence | StatementKind::Switch { .. } => children >= 1,
        StatementKind::If { kind, .. } => match kind {
            IfKind::If => children == 2,
            IfKind::IfElse => children == 3,
        },
        StatementKind::Loop { .. } | StatementKind::Root { .. } => children == 1,
        StatementKind::Synchronized { .. } => children >= 2,
        StatementKind::TryCatch { vars } => children >= 2 && children == vars.len() + 1,
        StatementKind::CatchAll { vars, .. } => children == 2 && vars.len() == 1,
    };
    if valid {
        Ok(())
    } else {
        Err(malformed_error!(
            "Statement {} ({}) has {} children",
            stat.id,
            stat.kind.name(),
            children
        ))
    }
}
