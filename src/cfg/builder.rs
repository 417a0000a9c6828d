//! The state-threading walk that constructs control-flow graphs.
//!
//! The builder carries, for each AST sub-statement, the current set of
//! "open" predecessor nodes and returns the new open set after visiting
//! it. The open set travels by value through the recursion; edges
//! accumulate in the mutably borrowed graph under construction.
//!
//! Jumps that cannot be wired where they occur (break, continue, throw
//! without a textual catch match) are recorded in a pending registry and
//! drained by the construct that owns them: a loop takes its continues
//! and unlabeled breaks, a switch its unlabeled breaks, a labelled
//! statement its labelled breaks. Whatever is still pending when the
//! whole method has been visited is wired to the method exit.

use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use crate::ast::{AstArena, AstKind, NodeId};
use crate::errors::{Error, Result};
use crate::graph::PgNode;

use super::ControlFlowGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JumpKind {
    Break,
    Continue,
    Throw,
}

#[derive(Debug, Clone)]
struct PendingJump {
    node: PgNode,
    kind: JumpKind,
    label: Option<String>,
}

/// Builder for constructing a control-flow graph from a method AST.
pub struct CfgBuilder<'a> {
    arena: &'a AstArena,
    graph: ControlFlowGraph,
    pending: Vec<PendingJump>,
    labels: HashMap<String, PgNode>,
    /// One frame per enclosing try statement: (declared type names,
    /// catch clause node) for each clause.
    catch_frames: Vec<Vec<(Vec<String>, PgNode)>>,
}

impl<'a> CfgBuilder<'a> {
    pub fn new(arena: &'a AstArena) -> Self {
        Self {
            arena,
            graph: ControlFlowGraph::new(),
            pending: Vec::new(),
            labels: HashMap::new(),
            catch_frames: Vec::new(),
        }
    }

    /// Build the CFG for one method declaration.
    pub fn build(mut self, method: NodeId) -> Result<ControlFlowGraph> {
        let body = match self.arena.node(method) {
            AstKind::Method { body, .. } => *body,
            _ => return Err(Error::malformed_ast("expected a method declaration")),
        };

        let mut open = vec![self.graph.entry()];
        if let Some(body) = body {
            open = self.visit_stmt(body, open)?;
        }
        let exit = self.graph.exit();
        for node in open {
            self.graph.add_edge(node, exit);
        }

        // Sweep the registry: anything still pending has no enclosing
        // construct left to claim it.
        if !self.pending.is_empty() {
            debug!("wiring {} unresolved jumps to exit", self.pending.len());
        }
        for jump in std::mem::take(&mut self.pending) {
            self.graph.add_edge(jump.node, exit);
        }

        debug!(
            "built CFG: {} nodes, {} edges",
            self.graph.node_count(),
            self.graph.edge_count()
        );
        Ok(self.graph)
    }

    /// Visit one statement, connecting it behind `open` and returning
    /// the open set that survives it.
    fn visit_stmt(&mut self, id: NodeId, open: Vec<PgNode>) -> Result<Vec<PgNode>> {
        match self.arena.node(id) {
            AstKind::Block { stmts } => {
                let mut open = open;
                for &stmt in stmts {
                    open = self.visit_stmt(stmt, open)?;
                }
                Ok(open)
            }

            AstKind::Return { .. } => {
                let node = self.statement_node(id, &open);
                let exit = self.graph.exit();
                self.graph.add_edge(node, exit);
                Ok(Vec::new())
            }

            // Models both the assertion-failure escape and the ordinary
            // fall-through continuation.
            AstKind::Assert { .. } => {
                let node = self.statement_node(id, &open);
                let exit = self.graph.exit();
                self.graph.add_edge(node, exit);
                Ok(vec![node])
            }

            AstKind::Throw { expr } => {
                let node = self.statement_node(id, &open);
                let targets = match self.thrown_class(*expr) {
                    Some(class) => self.matching_catches(class),
                    None => Vec::new(),
                };
                if targets.is_empty() {
                    self.pending.push(PendingJump {
                        node,
                        kind: JumpKind::Throw,
                        label: None,
                    });
                } else {
                    for target in targets {
                        self.graph.add_edge(node, target);
                    }
                }
                Ok(Vec::new())
            }

            AstKind::Break { label } => {
                let label = label.clone();
                let node = self.statement_node(id, &open);
                self.pending.push(PendingJump {
                    node,
                    kind: JumpKind::Break,
                    label,
                });
                Ok(Vec::new())
            }

            AstKind::Continue { label } => {
                let label = label.clone();
                let node = self.statement_node(id, &open);
                if let Some(target) = label.as_ref().and_then(|l| self.labels.get(l).copied()) {
                    self.graph.add_edge(node, target);
                } else {
                    self.pending.push(PendingJump {
                        node,
                        kind: JumpKind::Continue,
                        label,
                    });
                }
                Ok(Vec::new())
            }

            AstKind::Labeled { label, stmt } => {
                let label = label.clone();
                let stmt = *stmt;
                let target = self.loop_head_of(stmt);
                let shadowed = self.labels.insert(label.clone(), target);
                let mark = self.pending.len();
                let mut trailing = self.visit_stmt(stmt, open)?;
                match shadowed {
                    Some(prev) => {
                        self.labels.insert(label.clone(), prev);
                    }
                    None => {
                        self.labels.remove(&label);
                    }
                }
                let tail = self.pending.split_off(mark);
                for jump in tail {
                    if jump.kind == JumpKind::Break && jump.label.as_deref() == Some(label.as_str()) {
                        trailing.push(jump.node);
                    } else {
                        self.pending.push(jump);
                    }
                }
                Ok(dedup(trailing))
            }

            AstKind::If {
                then_branch,
                else_branch,
                ..
            } => {
                let (then_branch, else_branch) = (*then_branch, *else_branch);
                let node = self.statement_node(id, &open);
                let mut trailing = self.visit_stmt(then_branch, vec![node])?;
                match else_branch {
                    Some(els) => trailing.extend(self.visit_stmt(els, vec![node])?),
                    // No else: control may skip the then-branch entirely.
                    None => trailing.push(node),
                }
                Ok(dedup(trailing))
            }

            AstKind::While { body, .. } | AstKind::For { body, .. } => {
                let body = *body;
                let head = self.statement_node(id, &open);
                let mark = self.pending.len();
                let body_open = self.visit_stmt(body, vec![head])?;
                for node in &body_open {
                    self.graph.add_edge(*node, head);
                }
                let mut trailing = vec![head];
                self.finalize_loop(mark, head, &mut trailing);
                Ok(dedup(trailing))
            }

            AstKind::ForEach { body, .. } => {
                let body = *body;
                let head = self.statement_node(id, &open);
                let mark = self.pending.len();
                let body_open = self.visit_stmt(body, vec![head])?;
                for node in &body_open {
                    self.graph.add_edge(*node, head);
                }
                let mut trailing = vec![head];
                self.finalize_loop(mark, head, &mut trailing);
                Ok(dedup(trailing))
            }

            AstKind::DoWhile { body, .. } => {
                let body = *body;
                let head = self
                    .first_statement_node(body)
                    .unwrap_or(PgNode::Stmt(id));
                let mark = self.pending.len();
                let body_open = self.visit_stmt(body, open)?;
                let cond = self.statement_node(id, &body_open);
                self.graph.add_edge(cond, head);
                let mut trailing = vec![cond];
                self.finalize_loop(mark, head, &mut trailing);
                Ok(dedup(trailing))
            }

            AstKind::Switch { cases, .. } => {
                let cases = cases.clone();
                let head = self.statement_node(id, &open);
                let mark = self.pending.len();
                let mut prev_case: Option<PgNode> = None;
                let mut carry: Vec<PgNode> = Vec::new();
                let mut has_default = false;
                for case_id in cases {
                    let (stmts, is_default) = match self.arena.node(case_id) {
                        AstKind::Case { stmts, default, .. } => (stmts.clone(), *default),
                        _ => {
                            return Err(Error::malformed_ast(
                                "switch statement with a non-case entry",
                            ))
                        }
                    };
                    has_default |= is_default;
                    let case_node = PgNode::Stmt(case_id);
                    // Multi-way dispatch approximation: the head may
                    // transfer to any entry.
                    self.graph.add_edge(head, case_node);
                    if let Some(prev) = prev_case {
                        // Label adjacency.
                        self.graph.add_edge(prev, case_node);
                    }
                    prev_case = Some(case_node);
                    let mut body_open = carry;
                    body_open.push(case_node);
                    for stmt in stmts {
                        body_open = self.visit_stmt(stmt, body_open)?;
                    }
                    carry = body_open;
                }
                let mut trailing = carry;
                let tail = self.pending.split_off(mark);
                for jump in tail {
                    if jump.kind == JumpKind::Break && jump.label.is_none() {
                        trailing.push(jump.node);
                    } else {
                        self.pending.push(jump);
                    }
                }
                if trailing.is_empty() && !has_default {
                    // Every entry returned and nothing guarantees one of
                    // them runs; non-enum switches are not
                    // exhaustiveness-checked.
                    trailing.push(head);
                }
                Ok(dedup(trailing))
            }

            AstKind::Try {
                resources,
                body,
                catches,
                finally,
            } => {
                let (resources, body, catches, finally) =
                    (resources.clone(), *body, catches.clone(), *finally);
                let mut open = open;
                for resource in resources {
                    open = vec![self.statement_node(resource, &open)];
                }

                let mut clauses = Vec::with_capacity(catches.len());
                for catch_id in &catches {
                    match self.arena.node(*catch_id) {
                        AstKind::Catch { types, body, .. } => {
                            clauses.push((types.clone(), PgNode::Stmt(*catch_id), *body));
                        }
                        _ => {
                            return Err(Error::malformed_ast(
                                "try statement with a non-catch clause",
                            ))
                        }
                    }
                }

                self.catch_frames.push(
                    clauses
                        .iter()
                        .map(|(types, node, _)| (types.clone(), *node))
                        .collect(),
                );
                let try_open = self.visit_stmt(body, open);
                self.catch_frames.pop();
                let try_open = try_open?;

                // Statement-granularity approximation: only the end of
                // the try block reaches the handlers.
                let mut merged = try_open.clone();
                for (_, catch_node, catch_body) in clauses {
                    self.graph.add_node(catch_node);
                    for node in &try_open {
                        self.graph.add_edge(*node, catch_node);
                    }
                    let catch_open = self.visit_stmt(catch_body, vec![catch_node])?;
                    merged.extend(catch_open);
                }

                let trailing = match finally {
                    Some(finally) => self.visit_stmt(finally, merged)?,
                    None => merged,
                };
                Ok(dedup(trailing))
            }

            AstKind::Case { .. } => Err(Error::malformed_ast("case entry outside a switch")),
            AstKind::Catch { .. } => Err(Error::malformed_ast("catch clause outside a try")),
            AstKind::Declarator { .. } => Err(Error::malformed_ast(
                "declarator outside a declaration statement",
            )),
            AstKind::Param { .. } => Err(Error::malformed_ast("parameter in statement position")),

            // Everything else occupies exactly one node: declarations,
            // expression statements, and constructs the analyses do not
            // dispatch on.
            _ => Ok(vec![self.statement_node(id, &open)]),
        }
    }

    /// Create the node for a statement and connect every open
    /// predecessor to it.
    fn statement_node(&mut self, id: NodeId, open: &[PgNode]) -> PgNode {
        let node = PgNode::Stmt(id);
        self.graph.add_node(node);
        for pred in open {
            self.graph.add_edge(*pred, node);
        }
        trace!("placed {} behind {} open nodes", node, open.len());
        node
    }

    /// Drain jumps recorded since `mark`: continues wire back to the
    /// loop head, unlabeled breaks join the post-loop trailing set, and
    /// everything else stays pending for an outer construct.
    fn finalize_loop(&mut self, mark: usize, head: PgNode, trailing: &mut Vec<PgNode>) {
        let tail = self.pending.split_off(mark);
        for jump in tail {
            match jump.kind {
                JumpKind::Continue => self.graph.add_edge(jump.node, head),
                JumpKind::Break if jump.label.is_none() => trailing.push(jump.node),
                _ => self.pending.push(jump),
            }
        }
    }

    /// Node a `continue label` should target: for a do-while, iteration
    /// re-enters at the first body statement rather than the condition.
    fn loop_head_of(&self, stmt: NodeId) -> PgNode {
        match self.arena.node(stmt) {
            AstKind::DoWhile { body, .. } => self
                .first_statement_node(*body)
                .unwrap_or(PgNode::Stmt(stmt)),
            AstKind::Labeled { stmt: inner, .. } => self.loop_head_of(*inner),
            _ => PgNode::Stmt(stmt),
        }
    }

    /// The node the first statement of `body` will occupy, skipping
    /// through nested blocks and labels. `None` for an empty body.
    fn first_statement_node(&self, body: NodeId) -> Option<PgNode> {
        match self.arena.node(body) {
            AstKind::Block { stmts } => stmts
                .first()
                .and_then(|first| self.first_statement_node(*first)),
            AstKind::Labeled { stmt, .. } => self.first_statement_node(*stmt),
            _ => Some(PgNode::Stmt(body)),
        }
    }

    /// Textual class name of a `throw new X(...)` operand, if that is
    /// what is being thrown.
    fn thrown_class(&self, expr: NodeId) -> Option<&'a str> {
        match self.arena.node(expr) {
            AstKind::New { class, .. } => Some(class),
            AstKind::Paren { expr } => self.thrown_class(*expr),
            _ => None,
        }
    }

    /// Catch clauses matching a thrown class name, searching enclosing
    /// tries innermost-first and stopping at the first try with any
    /// match. Matching is by exact textual name; no subtype reasoning.
    fn matching_catches(&self, class: &str) -> Vec<PgNode> {
        for frame in self.catch_frames.iter().rev() {
            let hits: Vec<PgNode> = frame
                .iter()
                .filter(|(types, _)| types.iter().any(|t| t == class))
                .map(|(_, node)| *node)
                .collect();
            if !hits.is_empty() {
                return hits;
            }
        }
        Vec::new()
    }
}

fn dedup(mut nodes: Vec<PgNode>) -> Vec<PgNode> {
    let mut seen = HashSet::new();
    nodes.retain(|node| seen.insert(*node));
    nodes
}
