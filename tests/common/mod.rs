//! Methods shared by the integration tests, built through the public API.
#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};

use jdssa::{
    analysis::DirectGraph,
    analyze_method,
    ir::{
        EdgeKind, Expr, ExprArena, ExprId, FunctionOp, LoopKind, MethodDescriptor, StatId,
        StatementTree, TreeBuilder, VarExpr,
    },
    MethodAnalysis, Result, SsaConfig,
};

/// A method ready for analysis, with named variable expressions.
pub struct Method {
    pub tree: StatementTree,
    pub exprs: ExprArena,
    pub descriptor: MethodDescriptor,
    names: HashMap<&'static str, ExprId>,
}

impl Method {
    pub fn expr(&self, name: &str) -> ExprId {
        *self.names.get(name).expect("unknown expression name")
    }

    pub fn slot(&self, name: &str) -> i32 {
        self.exprs.var(self.expr(name)).expect("not a variable").slot
    }

    pub fn version(&self, name: &str) -> u32 {
        self.exprs.var(self.expr(name)).expect("not a variable").version
    }

    pub fn analyze(&mut self, config: &SsaConfig) -> Result<MethodAnalysis> {
        analyze_method(&self.tree, &mut self.exprs, &self.descriptor, config)
    }

    /// Every variable expression reachable through the graph's nodes.
    pub fn var_exprs(&self, graph: &DirectGraph) -> Vec<(ExprId, VarExpr)> {
        let mut ids = BTreeSet::new();
        for node in graph.nodes() {
            for expr in node.exprs() {
                ids.extend(self.exprs.descendants(*expr));
            }
        }
        ids.into_iter()
            .filter_map(|id| self.exprs.var(id).map(|var| (id, var)))
            .collect()
    }

    /// Variable expressions that are the target of a plain assignment.
    pub fn write_targets(&self, graph: &DirectGraph) -> BTreeSet<ExprId> {
        let mut targets = BTreeSet::new();
        for node in graph.nodes() {
            for expr in node.exprs() {
                for id in self.exprs.descendants(*expr) {
                    if let Some(Expr::Assign {
                        left,
                        compound: None,
                        ..
                    }) = self.exprs.get(id)
                    {
                        if self.exprs.var(*left).is_some() {
                            targets.insert(*left);
                        }
                    }
                }
            }
        }
        targets
    }

    /// Exception variables of every catch and finally handler.
    pub fn catch_vars(&self) -> Vec<VarExpr> {
        self.tree
            .iter()
            .flat_map(|stat| stat.kind().handler_vars().to_vec())
            .filter_map(|id| self.exprs.var(id))
            .collect()
    }
}

struct MethodBuilder {
    tree: TreeBuilder,
    exprs: ExprArena,
    names: HashMap<&'static str, ExprId>,
}

impl MethodBuilder {
    fn new() -> Self {
        MethodBuilder {
            tree: TreeBuilder::new(),
            exprs: ExprArena::new(),
            names: HashMap::new(),
        }
    }

    fn read(&mut self, name: &'static str, slot: i32) -> ExprId {
        let var = self.exprs.var_ref(slot);
        self.names.insert(name, var);
        var
    }

    fn assign(&mut self, name: &'static str, slot: i32, value: ExprId) -> ExprId {
        let assign = self.exprs.assign_var(slot, value);
        if let Some(Expr::Assign { left, .. }) = self.exprs.get(assign).cloned() {
            self.names.insert(name, left);
        }
        assign
    }

    fn assign_int(&mut self, name: &'static str, slot: i32, value: i64) -> ExprId {
        let constant = self.exprs.int(value);
        self.assign(name, slot, constant)
    }

    fn call_with(&mut self, function: &str, arg: &'static str, slot: i32) -> ExprId {
        let var = self.read(arg, slot);
        self.exprs.call(function, vec![var])
    }

    fn call(&mut self, function: &str) -> ExprId {
        self.exprs.call(function, vec![])
    }

    fn finish(self, body: StatId, descriptor: MethodDescriptor) -> Method {
        Method {
            tree: self.tree.finish(body).expect("tree is well formed"),
            exprs: self.exprs,
            descriptor,
            names: self.names,
        }
    }
}

/// `static void m(boolean c) { x = 1; if (c) { x = 2; } print(x); }`
pub fn if_merge() -> Method {
    let mut m = MethodBuilder::new();
    let x_one = m.assign_int("x_one", 1, 1);
    let entry = m.tree.block(vec![x_one]);
    let header = m.tree.if_header(vec![]);
    let cond = m.read("c", 0);
    let x_two = m.assign_int("x_two", 1, 2);
    let then = m.tree.block(vec![x_two]);
    let branch = m.tree.if_then(header, then, Some(cond));
    let print = m.call_with("print", "x_use", 1);
    let merge = m.tree.block(vec![print]);
    let body = m.tree.sequence(vec![entry, branch, merge]);
    let exit = m.tree.dummy_exit();
    m.tree
        .edge(entry, EdgeKind::Regular, branch)
        .edge(header, EdgeKind::Regular, then)
        .edge(branch, EdgeKind::Regular, merge)
        .edge(then, EdgeKind::Regular, merge)
        .edge(merge, EdgeKind::Break, exit);
    m.finish(body, MethodDescriptor::new(true, vec![1]))
}

/// `static int m(int n) { s = 0; for (i = 0; i < n; i = i + 1) { s = s + i; } return s; }`
pub fn for_loop() -> Method {
    let mut m = MethodBuilder::new();
    let s_zero = m.assign_int("s_zero", 1, 0);
    let entry = m.tree.block(vec![s_zero]);

    let s_read = m.read("s_body", 1);
    let i_read = m.read("i_body", 2);
    let sum = m.exprs.function(FunctionOp::Add, vec![s_read, i_read]);
    let s_sum = m.assign("s_sum", 1, sum);
    let body = m.tree.block(vec![s_sum]);

    let init = m.assign_int("i_init", 2, 0);
    let i_cond = m.read("i_cond", 2);
    let n_cond = m.read("n_cond", 0);
    let cond = m.exprs.function(FunctionOp::Lt, vec![i_cond, n_cond]);
    let i_inc = m.read("i_inc", 2);
    let one = m.exprs.int(1);
    let next = m.exprs.function(FunctionOp::Add, vec![i_inc, one]);
    let increment = m.assign("i_next", 2, next);
    let looped = m
        .tree
        .looped(LoopKind::For, body, Some(init), Some(cond), Some(increment));

    let s_ret = m.read("s_ret", 1);
    let ret = m.exprs.ret(Some(s_ret));
    let tail = m.tree.block(vec![ret]);
    let method = m.tree.sequence(vec![entry, looped, tail]);
    let exit = m.tree.dummy_exit();
    m.tree
        .edge(entry, EdgeKind::Regular, looped)
        .edge(body, EdgeKind::Continue, looped)
        .edge(looped, EdgeKind::Regular, tail)
        .edge(tail, EdgeKind::Break, exit);
    m.finish(method, MethodDescriptor::new(true, vec![1]))
}

/// `static void m() { x = 0; try { x = f(); } finally { release(); } use(x); }`
pub fn try_finally() -> Method {
    let mut m = MethodBuilder::new();
    let x_zero = m.assign_int("x_zero", 0, 0);
    let entry = m.tree.block(vec![x_zero]);
    let call = m.call("f");
    let x_try = m.assign("x_try", 0, call);
    let body = m.tree.block(vec![x_try]);
    let release = m.call("release");
    let handler = m.tree.block(vec![release]);
    let exc = m.read("exc", 1);
    let construct = m.tree.try_finally(body, handler, exc);
    let use_x = m.call_with("use", "x_after", 0);
    let after = m.tree.block(vec![use_x]);
    let method = m.tree.sequence(vec![entry, construct, after]);
    let exit = m.tree.dummy_exit();
    m.tree
        .edge(entry, EdgeKind::Regular, construct)
        .edge(body, EdgeKind::Regular, after)
        .edge(handler, EdgeKind::FinallyExit, after)
        .edge(after, EdgeKind::Break, exit);
    m.finish(method, MethodDescriptor::new(true, vec![]))
}

/// ```java
/// static void m(boolean c) {
///     x = 0;
///     try {
///         if (c) { [x = 1;] return; }
///     } finally {
///         x = 9;
///     }
///     use(x);
/// }
/// ```
///
/// The handler is left towards `use(x)` and towards the method exit.
pub fn return_in_finally(write_before_return: bool) -> Method {
    let mut m = MethodBuilder::new();
    let x_zero = m.assign_int("x_zero", 1, 0);
    let entry = m.tree.block(vec![x_zero]);

    let header = m.tree.if_header(vec![]);
    let cond = m.read("c", 0);
    let mut then_exprs = Vec::new();
    if write_before_return {
        then_exprs.push(m.assign_int("x_return", 1, 1));
    }
    then_exprs.push(m.exprs.ret(None));
    let then = m.tree.block(then_exprs);
    let branch = m.tree.if_then(header, then, Some(cond));

    let x_nine = m.assign_int("x_handler", 1, 9);
    let handler = m.tree.block(vec![x_nine]);
    let exc = m.read("exc", 2);
    let construct = m.tree.try_finally(branch, handler, exc);

    let use_x = m.call_with("use", "x_after", 1);
    let after = m.tree.block(vec![use_x]);
    let method = m.tree.sequence(vec![entry, construct, after]);
    let exit = m.tree.dummy_exit();
    m.tree
        .edge(entry, EdgeKind::Regular, construct)
        .edge(header, EdgeKind::Regular, then)
        .edge(then, EdgeKind::Break, exit)
        .edge(branch, EdgeKind::Regular, after)
        .edge(handler, EdgeKind::FinallyExit, after)
        .edge(after, EdgeKind::Break, exit);
    m.finish(method, MethodDescriptor::new(true, vec![1]))
}

/// ```java
/// static void m() {
///     x = 0;
///     try { try { try { x = 1; } finally { a(); } } finally { b(); } } finally { c(); }
///     use(x);
/// }
/// ```
pub fn triple_finally() -> Method {
    let mut m = MethodBuilder::new();
    let x_zero = m.assign_int("x_zero", 0, 0);
    let entry = m.tree.block(vec![x_zero]);

    let x_one = m.assign_int("x_inner", 0, 1);
    let body = m.tree.block(vec![x_one]);

    let mut protected = body;
    let mut handlers = Vec::new();
    for (index, (function, exc)) in [("a", "exc_a"), ("b", "exc_b"), ("c", "exc_c")]
        .into_iter()
        .enumerate()
    {
        let call = m.call(function);
        let handler = m.tree.block(vec![call]);
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let var = m.read(exc, index as i32 + 1);
        protected = m.tree.try_finally(protected, handler, var);
        handlers.push(handler);
    }

    let use_x = m.call_with("use", "x_after", 0);
    let after = m.tree.block(vec![use_x]);
    let method = m.tree.sequence(vec![entry, protected, after]);
    let exit = m.tree.dummy_exit();
    m.tree
        .edge(entry, EdgeKind::Regular, protected)
        .edge(body, EdgeKind::Regular, after)
        .edge(after, EdgeKind::Break, exit);
    for handler in handlers {
        m.tree.edge(handler, EdgeKind::FinallyExit, after);
    }
    m.finish(method, MethodDescriptor::new(true, vec![]))
}

/// A `while` loop whose condition short-circuits and whose body holds a
/// finally and a nested `if`/`else`.
///
/// ```java
/// static void m(boolean a, Object o) {
///     x = 0; y = 0;
///     while (a && x < 10) {
///         try { x = x + 1; } finally { y = y + x; }
///         if (y > 5) { o.f = y; } else { x++; }
///     }
///     use(x, y, o.f);
/// }
/// ```
pub fn mixed() -> Method {
    let mut m = MethodBuilder::new();
    let x_zero = m.assign_int("x_zero", 2, 0);
    let y_zero = m.assign_int("y_zero", 3, 0);
    let entry = m.tree.block(vec![x_zero, y_zero]);

    // try { x = x + 1; } finally { y = y + x; }
    let x_read = m.read("x_try_read", 2);
    let one = m.exprs.int(1);
    let x_plus = m.exprs.function(FunctionOp::Add, vec![x_read, one]);
    let x_try = m.assign("x_try", 2, x_plus);
    let try_body = m.tree.block(vec![x_try]);
    let y_read = m.read("y_handler_read", 3);
    let x_handler = m.read("x_handler_read", 2);
    let y_plus = m.exprs.function(FunctionOp::Add, vec![y_read, x_handler]);
    let y_handler = m.assign("y_handler", 3, y_plus);
    let handler = m.tree.block(vec![y_handler]);
    let exc = m.read("exc", 4);
    let construct = m.tree.try_finally(try_body, handler, exc);

    // if (y > 5) { o.f = y; } else { x++; }
    let header = m.tree.if_header(vec![]);
    let y_cond = m.read("y_cond", 3);
    let five = m.exprs.int(5);
    let if_cond = m.exprs.function(FunctionOp::Gt, vec![y_cond, five]);
    let o_store = m.read("o_store", 1);
    let field = m.exprs.alloc(Expr::Field {
        instance: Some(o_store),
        name: "f".to_string(),
    });
    let y_store = m.read("y_store", 3);
    let store = m.exprs.alloc(Expr::Assign {
        left: field,
        right: y_store,
        compound: None,
    });
    let then = m.tree.block(vec![store]);
    let x_inc = m.read("x_inc", 2);
    let inc = m.exprs.function(FunctionOp::PostInc, vec![x_inc]);
    let otherwise = m.tree.block(vec![inc]);
    let branch = m.tree.if_else(header, then, otherwise, Some(if_cond));

    let loop_body = m.tree.sequence(vec![construct, branch]);

    // while (a && x < 10)
    let a = m.read("a_cond", 0);
    let x_cond = m.read("x_cond", 2);
    let ten = m.exprs.int(10);
    let less = m.exprs.function(FunctionOp::Lt, vec![x_cond, ten]);
    let cond = m.exprs.function(FunctionOp::CondAnd, vec![a, less]);
    let looped = m
        .tree
        .looped(LoopKind::While, loop_body, None, Some(cond), None);

    let x_use = m.read("x_after", 2);
    let y_use = m.read("y_after", 3);
    let o_load = m.read("o_after", 1);
    let field_load = m.exprs.alloc(Expr::Field {
        instance: Some(o_load),
        name: "f".to_string(),
    });
    let use_all = m.exprs.call("use", vec![x_use, y_use, field_load]);
    let after = m.tree.block(vec![use_all]);
    let method = m.tree.sequence(vec![entry, looped, after]);
    let exit = m.tree.dummy_exit();

    m.tree
        .edge(entry, EdgeKind::Regular, looped)
        .edge(try_body, EdgeKind::Regular, branch)
        .edge(handler, EdgeKind::FinallyExit, branch)
        .edge(header, EdgeKind::Regular, then)
        .edge(header, EdgeKind::Regular, otherwise)
        .edge(then, EdgeKind::Continue, looped)
        .edge(otherwise, EdgeKind::Continue, looped)
        .edge(looped, EdgeKind::Regular, after)
        .edge(after, EdgeKind::Break, exit);
    m.finish(method, MethodDescriptor::new(true, vec![1, 1]))
}

/// Every method above, by name.
pub fn all() -> Vec<(&'static str, fn() -> Method)> {
    vec![
        ("if_merge", if_merge as fn() -> Method),
        ("for_loop", for_loop),
        ("try_finally", try_finally),
        ("return_in_finally", || return_in_finally(false)),
        ("return_in_finally_write", || return_in_finally(true)),
        ("triple_finally", triple_finally),
        ("mixed", mixed),
    ]
}
