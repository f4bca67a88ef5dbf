//! Flattening of a [`StatementTree`] into a [`DirectGraph`].
//!
//! The tree is walked with an explicit work stack. Every work item carries the
//! stack of finally constructs enclosing its statement. When a successor edge
//! leaves the protected body of a `try { } finally { }`, the walk is suspended:
//! the edge is redirected into the handler, the handler is flattened again with
//! a frame remembering where the edge was really going, and the suspended
//! statement resumes with its next edge afterwards. When the handler's own
//! `FinallyExit` edge is routed, the remembered destination is restored and a
//! finally path is recorded on the handler's exit node.
//!
//! Edges are staged symbolically (by target statement) and resolved to nodes
//! only after the whole tree has been walked, so forward and backward edges are
//! handled alike.

use std::collections::{BTreeMap, HashMap};

use log::{debug, trace};

use crate::{
    analysis::flatten::{DirectGraph, DirectNode, DirectNodeKind, FinallyPath},
    ir::{EdgeKind, ExprId, IfKind, LoopKind, StatEdge, StatId, Statement, StatementKind, StatementTree},
    utils::graph::{algorithms::reverse_postorder, NodeId},
    Error, Result,
};

/// Flattens `tree` into a graph of [`DirectNode`]s sorted in reverse postorder.
///
/// # Errors
///
/// Returns [`Error::Malformed`] if a statement lacks a mandatory child or
/// successor edge, or a continue edge targets a statement without a
/// continuation point, and [`Error::UnresolvedEdge`] if an edge targets a
/// statement that never received a node.
///
/// # Examples
///
/// ```rust
/// use jdssa::analysis::flatten;
/// use jdssa::ir::{EdgeKind, ExprArena, TreeBuilder};
///
/// let mut exprs = ExprArena::new();
/// let one = exprs.int(1);
/// let assign = exprs.assign_var(0, one);
/// let mut builder = TreeBuilder::new();
/// let block = builder.block(vec![assign]);
/// let exit = builder.dummy_exit();
/// builder.edge(block, EdgeKind::Break, exit);
/// let tree = builder.finish(block)?;
///
/// let graph = flatten(&tree)?;
/// assert_eq!(graph.len(), 2);
/// # Ok::<(), jdssa::Error>(())
/// ```
pub fn flatten(tree: &StatementTree) -> Result<DirectGraph> {
    Flattener::new(tree).run()
}

/// Symbolic edge target. `Auxiliary` addresses the tail node of a header block
/// or the condition node of a `for` loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Target {
    Entry(StatId),
    Auxiliary(StatId),
}

impl Target {
    fn statement(self) -> StatId {
        match self {
            Target::Entry(stat) | Target::Auxiliary(stat) => stat,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Destination {
    entry: NodeId,
    continuation: Option<NodeId>,
}

#[derive(Debug)]
struct PendingEdge {
    source: NodeId,
    target: Target,
    kind: EdgeKind,
}

#[derive(Debug, Clone, Copy)]
struct PendingPath {
    source: NodeId,
    destination: StatId,
    entry: StatId,
    is_continue: bool,
    monitor_exception: bool,
}

/// Where an edge that entered a finally handler continues once the handler exits.
#[derive(Debug, Clone, Copy)]
struct Resumption {
    kind: EdgeKind,
    destination: StatId,
    short_entry: StatId,
    long_entry: StatId,
    short_source: NodeId,
    long_source: NodeId,
    exception_path: bool,
}

#[derive(Debug, Clone, Copy)]
enum FinallyFrame {
    /// Inside the protected body of the construct
    Protected { construct: StatId },
    /// Inside the handler, entered along `resume`
    Handler { construct: StatId, resume: Resumption },
}

/// Finally path being recorded while an edge is routed out of a handler.
#[derive(Debug, Clone, Copy)]
struct Crossing {
    short_source: NodeId,
    short_entry: StatId,
    long_source: NodeId,
    long_entry: StatId,
    monitor_exception: bool,
}

#[derive(Debug)]
struct SuspendedEdges {
    source: NodeId,
    edges: Vec<StatEdge>,
    next_edge: usize,
}

#[derive(Debug)]
struct WorkItem {
    stat: StatId,
    frames: Vec<FinallyFrame>,
    tail: Option<ExprId>,
    next_child: usize,
    suspended: Option<SuspendedEdges>,
}

impl WorkItem {
    fn new(stat: StatId, frames: Vec<FinallyFrame>, tail: Option<ExprId>) -> Self {
        WorkItem {
            stat,
            frames,
            tail,
            next_child: 0,
            suspended: None,
        }
    }
}

struct Flattener<'t> {
    tree: &'t StatementTree,
    nodes: Vec<DirectNode>,
    keys: HashMap<(StatId, DirectNodeKind), NodeId>,
    destinations: HashMap<Target, Destination>,
    pending: Vec<PendingEdge>,
    short_range: BTreeMap<NodeId, Vec<PendingPath>>,
    long_range: BTreeMap<NodeId, Vec<PendingPath>>,
    positive_branches: HashMap<NodeId, StatId>,
    work: Vec<WorkItem>,
}

impl<'t> Flattener<'t> {
    fn new(tree: &'t StatementTree) -> Self {
        Flattener {
            tree,
            nodes: Vec::new(),
            keys: HashMap::new(),
            destinations: HashMap::new(),
            pending: Vec::new(),
            short_range: BTreeMap::new(),
            long_range: BTreeMap::new(),
            positive_branches: HashMap::new(),
            work: Vec::new(),
        }
    }

    fn run(mut self) -> Result<DirectGraph> {
        self.work
            .push(WorkItem::new(self.tree.root(), Vec::new(), None));
        while let Some(item) = self.work.pop() {
            self.process(item)?;
        }

        let dummy_exit = self.tree.dummy_exit();
        let exit_node = self.node(dummy_exit, DirectNodeKind::Direct, Vec::new());
        self.set_destination(Target::Entry(dummy_exit), exit_node, None);

        self.resolve()
    }

    fn process(&mut self, mut item: WorkItem) -> Result<()> {
        let tree = self.tree;
        let stat = tree.statement(item.stat)?;

        let (source, edges, start) = if let Some(suspended) = item.suspended.take() {
            (
                Some(suspended.source),
                suspended.edges,
                suspended.next_edge,
            )
        } else {
            match &stat.kind {
                StatementKind::BasicBlock { exprs, ends_in_if } => {
                    let node = self.node(stat.id, DirectNodeKind::Direct, exprs.clone());
                    self.set_destination(Target::Entry(stat.id), node, None);

                    let mut source = node;
                    if let Some(tail) = item.tail {
                        let tail_node = self.node(stat.id, DirectNodeKind::Tail, vec![tail]);
                        self.set_destination(Target::Auxiliary(stat.id), tail_node, None);
                        self.pending.push(PendingEdge {
                            source: node,
                            target: Target::Auxiliary(stat.id),
                            kind: EdgeKind::Regular,
                        });
                        source = tail_node;
                    }

                    if *ends_in_if {
                        let positive = stat.successors.first().ok_or_else(|| {
                            malformed_error!("If header block {} has no positive branch", stat.id)
                        })?;
                        self.positive_branches.insert(source, positive.destination);
                    }

                    (Some(source), stat.successors.clone(), 0)
                }
                StatementKind::TryCatch { .. } | StatementKind::CatchAll { .. } => {
                    self.flatten_try(stat, &item.frames);
                    (None, Vec::new(), 0)
                }
                StatementKind::Loop {
                    kind,
                    init,
                    condition,
                    increment,
                } => {
                    let body = stat
                        .first()
                        .ok_or_else(|| malformed_error!("Loop {} has no body", stat.id))?;
                    if item.next_child == 0 {
                        let frames = item.frames.clone();
                        item.next_child = 1;
                        self.work.push(item);
                        self.work.push(WorkItem::new(body, frames, None));
                        return Ok(());
                    }
                    let exprs = LoopExprs {
                        init: *init,
                        condition: *condition,
                        increment: *increment,
                    };
                    self.flatten_loop(stat, *kind, body, exprs)?
                }
                StatementKind::If { head, .. }
                | StatementKind::Switch { head }
                | StatementKind::Synchronized { head } => {
                    let count = if matches!(stat.kind, StatementKind::Synchronized { .. }) {
                        stat.children.len().min(2)
                    } else {
                        stat.children.len()
                    };
                    if item.next_child < count {
                        self.defer_child(item, stat, *head);
                        return Ok(());
                    }
                    self.finish_compound(stat)?
                }
                StatementKind::Sequence | StatementKind::Root { .. } => {
                    if item.next_child < stat.children.len() {
                        self.defer_child(item, stat, None);
                        return Ok(());
                    }
                    self.finish_compound(stat)?
                }
                StatementKind::DummyExit => {
                    return Err(malformed_error!(
                        "Dummy exit {} is part of the statement body",
                        stat.id
                    ))
                }
            }
        };

        let Some(source) = source else {
            return Ok(());
        };
        for index in start..edges.len() {
            if self.route_edge(&item, source, &edges, index)? {
                break;
            }
        }
        Ok(())
    }

    /// Re-queues `item` behind its next child. The header expression travels
    /// with the first child and becomes its tail node.
    fn defer_child(&mut self, mut item: WorkItem, stat: &Statement, head: Option<ExprId>) {
        let index = item.next_child;
        let child = stat.children[index];
        let tail = if index == 0 { head } else { None };
        let frames = item.frames.clone();
        item.next_child += 1;
        self.work.push(item);
        self.work.push(WorkItem::new(child, frames, tail));
    }

    fn finish_compound(&mut self, stat: &Statement) -> Result<(Option<NodeId>, Vec<StatEdge>, usize)> {
        let first = stat
            .first()
            .ok_or_else(|| malformed_error!("Statement {} has no children", stat.id))?;
        let entry = self.destination(Target::Entry(first))?.entry;
        self.set_destination(Target::Entry(stat.id), entry, None);

        if let StatementKind::If {
            kind: IfKind::If,
            head,
        } = stat.kind
        {
            if let Some(exit) = stat.successors.first() {
                let source = if head.is_some() {
                    self.keys
                        .get(&(first, DirectNodeKind::Tail))
                        .copied()
                        .ok_or_else(|| {
                            malformed_error!("If {} has a condition but no tail node", stat.id)
                        })?
                } else {
                    entry
                };
                return Ok((Some(source), vec![*exit], 0));
            }
        }
        Ok((None, Vec::new(), 0))
    }

    fn flatten_try(&mut self, stat: &Statement, frames: &[FinallyFrame]) {
        let try_node = self.node(stat.id, DirectNodeKind::Try, Vec::new());
        self.set_destination(Target::Entry(stat.id), try_node, None);

        let is_finally = matches!(stat.kind, StatementKind::CatchAll { is_finally: true, .. });
        let mut children = Vec::with_capacity(stat.children.len());
        for (index, child) in stat.children.iter().enumerate() {
            self.pending.push(PendingEdge {
                source: try_node,
                target: Target::Entry(*child),
                kind: EdgeKind::Regular,
            });

            let mut child_frames = frames.to_vec();
            if is_finally {
                if index == 0 {
                    child_frames.push(FinallyFrame::Protected { construct: stat.id });
                } else {
                    // exception path: the handler rethrows to the method exit
                    child_frames.push(FinallyFrame::Handler {
                        construct: stat.id,
                        resume: Resumption {
                            kind: EdgeKind::Break,
                            destination: self.tree.dummy_exit(),
                            short_entry: *child,
                            long_entry: *child,
                            short_source: try_node,
                            long_source: try_node,
                            exception_path: true,
                        },
                    });
                }
            }
            children.push(WorkItem::new(*child, child_frames, None));
        }
        self.work.extend(children.into_iter().rev());
    }

    fn flatten_loop(
        &mut self,
        stat: &Statement,
        kind: LoopKind,
        body: StatId,
        exprs: LoopExprs,
    ) -> Result<(Option<NodeId>, Vec<StatEdge>, usize)> {
        let body_entry = self.destination(Target::Entry(body))?.entry;

        match kind {
            LoopKind::Do => {
                self.set_destination(Target::Entry(stat.id), body_entry, Some(body_entry));
                Ok((None, Vec::new(), 0))
            }
            LoopKind::While | LoopKind::DoWhile => {
                let exit = loop_exit(stat)?;
                let cond = self.node(
                    stat.id,
                    DirectNodeKind::Condition,
                    exprs.condition.into_iter().collect(),
                );
                self.pending.push(PendingEdge {
                    source: cond,
                    target: Target::Entry(body),
                    kind: EdgeKind::Regular,
                });

                if kind == LoopKind::While {
                    self.set_destination(Target::Entry(stat.id), cond, Some(cond));
                } else {
                    self.set_destination(Target::Entry(stat.id), body_entry, Some(cond));
                    self.ensure_continue_edge(stat.id, body_entry);
                }
                Ok((Some(cond), vec![exit], 0))
            }
            LoopKind::For => {
                let exit = loop_exit(stat)?;
                let init = self.node(stat.id, DirectNodeKind::Init, exprs.init.into_iter().collect());
                let cond = self.node(
                    stat.id,
                    DirectNodeKind::Condition,
                    exprs.condition.into_iter().collect(),
                );
                let increment = self.node(
                    stat.id,
                    DirectNodeKind::Increment,
                    exprs.increment.into_iter().collect(),
                );

                self.set_destination(Target::Entry(stat.id), init, Some(increment));
                self.set_destination(Target::Auxiliary(stat.id), cond, None);

                self.pending.push(PendingEdge {
                    source: cond,
                    target: Target::Entry(body),
                    kind: EdgeKind::Regular,
                });
                self.pending.push(PendingEdge {
                    source: init,
                    target: Target::Auxiliary(stat.id),
                    kind: EdgeKind::Regular,
                });
                self.pending.push(PendingEdge {
                    source: increment,
                    target: Target::Auxiliary(stat.id),
                    kind: EdgeKind::Regular,
                });
                self.ensure_continue_edge(stat.id, body_entry);

                Ok((Some(cond), vec![exit], 0))
            }
        }
    }

    /// Adds a continue edge from the body entry if the body never continues the loop.
    fn ensure_continue_edge(&mut self, loop_stat: StatId, body_entry: NodeId) {
        let found = self
            .pending
            .iter()
            .any(|e| e.target == Target::Entry(loop_stat) && e.kind == EdgeKind::Continue);
        if !found {
            trace!("synthesizing continue edge for loop {}", loop_stat);
            self.pending.push(PendingEdge {
                source: body_entry,
                target: Target::Entry(loop_stat),
                kind: EdgeKind::Continue,
            });
        }
    }

    /// Routes the edge at `index` through the enclosing finally frames.
    ///
    /// Returns `true` if the walk of `item` was suspended because the edge
    /// entered a finally handler.
    fn route_edge(
        &mut self,
        item: &WorkItem,
        source: NodeId,
        edges: &[StatEdge],
        index: usize,
    ) -> Result<bool> {
        let edge = edges[index];
        let mut frames = item.frames.clone();
        let mut kind = edge.kind;
        let mut destination = edge.destination;
        let mut crossing: Option<Crossing> = None;

        loop {
            let Some(frame) = frames.last().copied() else {
                self.save_edge(source, destination, kind, crossing);
                return Ok(false);
            };

            match frame {
                FinallyFrame::Handler { construct, resume } => {
                    if kind == EdgeKind::FinallyExit {
                        frames.pop();
                        destination = resume.destination;
                        kind = resume.kind;
                        let has_monitor = matches!(
                            self.tree.statement(construct)?.kind,
                            StatementKind::CatchAll {
                                monitor: Some(_),
                                ..
                            }
                        );
                        crossing = Some(Crossing {
                            short_source: resume.short_source,
                            short_entry: resume.short_entry,
                            long_source: resume.long_source,
                            long_entry: resume.long_entry,
                            monitor_exception: has_monitor && resume.exception_path,
                        });
                    } else if self.tree.contains_strict(construct, destination) {
                        self.save_edge(source, destination, kind, crossing);
                        return Ok(false);
                    } else {
                        frames.pop();
                    }
                }
                FinallyFrame::Protected { construct } => {
                    if self.tree.contains_strict(construct, destination) {
                        self.save_edge(source, destination, kind, crossing);
                        return Ok(false);
                    }

                    let handler = self
                        .tree
                        .statement(construct)?
                        .children
                        .get(1)
                        .copied()
                        .ok_or_else(|| malformed_error!("Finally {} has no handler", construct))?;
                    self.save_edge(source, handler, EdgeKind::Regular, crossing);

                    frames.pop();
                    frames.push(FinallyFrame::Handler {
                        construct,
                        resume: Resumption {
                            kind,
                            destination,
                            short_entry: handler,
                            long_entry: crossing.map_or(handler, |c| c.long_entry),
                            short_source: source,
                            long_source: crossing.map_or(source, |c| c.long_source),
                            exception_path: false,
                        },
                    });

                    self.work.push(WorkItem {
                        stat: item.stat,
                        frames: item.frames.clone(),
                        tail: None,
                        next_child: item.next_child,
                        suspended: Some(SuspendedEdges {
                            source,
                            edges: edges.to_vec(),
                            next_edge: index + 1,
                        }),
                    });
                    self.work.push(WorkItem::new(handler, frames, None));
                    return Ok(true);
                }
            }
        }
    }

    fn save_edge(
        &mut self,
        source: NodeId,
        destination: StatId,
        kind: EdgeKind,
        crossing: Option<Crossing>,
    ) {
        if kind != EdgeKind::FinallyExit {
            self.pending.push(PendingEdge {
                source,
                target: Target::Entry(destination),
                kind,
            });
        }

        if let Some(crossing) = crossing {
            let is_continue = kind == EdgeKind::Continue;
            self.short_range.entry(source).or_default().push(PendingPath {
                source: crossing.short_source,
                destination,
                entry: crossing.short_entry,
                is_continue,
                monitor_exception: crossing.monitor_exception,
            });
            self.long_range.entry(source).or_default().push(PendingPath {
                source: crossing.long_source,
                destination,
                entry: crossing.long_entry,
                is_continue,
                monitor_exception: false,
            });
        }
    }

    fn node(&mut self, statement: StatId, kind: DirectNodeKind, exprs: Vec<ExprId>) -> NodeId {
        if let Some(existing) = self.keys.get(&(statement, kind)) {
            return *existing;
        }
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(DirectNode {
            id,
            kind,
            statement,
            exprs,
            preds: Vec::new(),
            succs: Vec::new(),
        });
        self.keys.insert((statement, kind), id);
        id
    }

    fn set_destination(&mut self, target: Target, entry: NodeId, continuation: Option<NodeId>) {
        self.destinations.insert(
            target,
            Destination {
                entry,
                continuation,
            },
        );
    }

    fn destination(&self, target: Target) -> Result<Destination> {
        self.destinations
            .get(&target)
            .copied()
            .ok_or(Error::UnresolvedEdge(target.statement()))
    }

    fn resolve_target(&self, target: Target, is_continue: bool) -> Result<NodeId> {
        let destination = self.destination(target)?;
        if is_continue {
            destination.continuation.ok_or_else(|| {
                malformed_error!(
                    "Continue edge to statement {} which has no continuation point",
                    target.statement()
                )
            })
        } else {
            Ok(destination.entry)
        }
    }

    fn resolve_paths(
        &self,
        table: &BTreeMap<NodeId, Vec<PendingPath>>,
        monitor_exits: &mut BTreeMap<NodeId, NodeId>,
    ) -> Result<BTreeMap<NodeId, Vec<FinallyPath>>> {
        let mut resolved = BTreeMap::new();
        for (exit, paths) in table {
            let mut list: Vec<FinallyPath> = Vec::with_capacity(paths.len());
            for path in paths {
                let destination =
                    self.resolve_target(Target::Entry(path.destination), path.is_continue)?;
                let entry = self.destination(Target::Entry(path.entry))?.entry;
                let finally_path = FinallyPath {
                    source: path.source,
                    destination,
                    entry,
                };
                if !list.contains(&finally_path) {
                    list.push(finally_path);
                }
                if path.monitor_exception {
                    monitor_exits.insert(*exit, destination);
                }
            }
            resolved.insert(*exit, list);
        }
        Ok(resolved)
    }

    fn resolve(mut self) -> Result<DirectGraph> {
        let mut negative_branches = HashMap::new();
        let mut links = Vec::with_capacity(self.pending.len());
        for edge in &self.pending {
            let to = self.resolve_target(edge.target, edge.kind == EdgeKind::Continue)?;
            links.push((edge.source, to));
            if let Some(positive) = self.positive_branches.get(&edge.source) {
                if edge.target != Target::Entry(*positive) {
                    negative_branches.insert(edge.source, to);
                }
            }
        }
        for (from, to) in links {
            if !self.nodes[from.index()].succs.contains(&to) {
                self.nodes[from.index()].succs.push(to);
                self.nodes[to.index()].preds.push(from);
            }
        }

        let mut monitor_exits = BTreeMap::new();
        let short_range = self.resolve_paths(&self.short_range, &mut monitor_exits)?;
        let mut unused = BTreeMap::new();
        let long_range = self.resolve_paths(&self.long_range, &mut unused)?;

        let first = self.destination(Target::Entry(self.tree.root()))?.entry;
        let statement_entries = self
            .destinations
            .iter()
            .filter_map(|(target, dest)| match target {
                Target::Entry(stat) => Some((*stat, dest.entry)),
                Target::Auxiliary(_) => None,
            })
            .collect();

        let mut graph = DirectGraph {
            nodes: self.nodes,
            order: Vec::new(),
            keys: self.keys,
            statement_entries,
            first,
            negative_branches,
            short_range,
            long_range,
            monitor_exits,
        };
        graph.order = reverse_postorder(&graph, first);

        debug!(
            "flattened {} statements into {} nodes ({} reachable, {} finally exits)",
            self.tree.len(),
            graph.nodes.len(),
            graph.order.len(),
            graph.short_range.len()
        );
        Ok(graph)
    }
}

#[derive(Debug, Clone, Copy)]
struct LoopExprs {
    init: Option<ExprId>,
    condition: Option<ExprId>,
    increment: Option<ExprId>,
}

fn loop_exit(stat: &Statement) -> Result<StatEdge> {
    stat.successors
        .first()
        .copied()
        .ok_or_else(|| malformed_error!("Loop {} has no exit edge", stat.id))
}
