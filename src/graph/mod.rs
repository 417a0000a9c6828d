//! Program graph abstraction underlying the control-flow graph.
//!
//! A [`ProgramGraph`] is a directed graph of [`PgNode`] values with two
//! designated sentinels: entry (rendered "⊤") and exit (rendered "⊥").
//! Adjacency is stored twice, once per direction, which is what makes
//! [`ProgramGraph::reversed_edges_only`] nearly free: the two maps swap
//! roles and the sentinels keep their labels, so entry and exit simply
//! swap *meaning* for whoever reads the result. The heavier
//! [`ProgramGraph::reversed`] rebuilds the graph around fresh sentinels
//! instead.
//!
//! Node lookups that the analyses expect to succeed return a typed
//! [`Error::GraphInvariant`](crate::errors::Error) when they do not;
//! such a failure is a builder defect, never user input.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::ast::NodeId;
use crate::errors::{Error, Result};

/// One vertex of a program graph: a sentinel or a single AST node.
///
/// Compared and hashed by AST node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PgNode {
    Entry,
    Exit,
    Stmt(NodeId),
}

impl PgNode {
    pub fn is_sentinel(self) -> bool {
        matches!(self, PgNode::Entry | PgNode::Exit)
    }

    /// The wrapped AST node, if this is not a sentinel.
    pub fn ast(self) -> Option<NodeId> {
        match self {
            PgNode::Stmt(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for PgNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PgNode::Entry => write!(f, "⊤"),
            PgNode::Exit => write!(f, "⊥"),
            PgNode::Stmt(id) => write!(f, "{id}"),
        }
    }
}

/// Directed graph over [`PgNode`] with entry/exit sentinels.
///
/// Insertion order of nodes and of each node's edges is preserved, so
/// iteration over a built graph is deterministic.
#[derive(Debug, Clone)]
pub struct ProgramGraph {
    nodes: Vec<PgNode>,
    succ: HashMap<PgNode, Vec<PgNode>>,
    pred: HashMap<PgNode, Vec<PgNode>>,
}

impl Default for ProgramGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramGraph {
    /// An empty graph containing only the two sentinels.
    pub fn new() -> Self {
        let mut graph = Self {
            nodes: Vec::new(),
            succ: HashMap::new(),
            pred: HashMap::new(),
        };
        graph.add_node(PgNode::Entry);
        graph.add_node(PgNode::Exit);
        graph
    }

    pub fn entry(&self) -> PgNode {
        PgNode::Entry
    }

    pub fn exit(&self) -> PgNode {
        PgNode::Exit
    }

    /// Insert a node if not already present.
    pub fn add_node(&mut self, node: PgNode) {
        if !self.succ.contains_key(&node) {
            self.nodes.push(node);
            self.succ.insert(node, Vec::new());
            self.pred.insert(node, Vec::new());
        }
    }

    /// Insert a directed edge, adding endpoints as needed. Duplicate
    /// edges collapse: a second control transfer between the same pair
    /// carries no information for the analyses.
    pub fn add_edge(&mut self, from: PgNode, to: PgNode) {
        self.add_node(from);
        self.add_node(to);
        let out = self.succ.get_mut(&from).expect("endpoint just inserted");
        if !out.contains(&to) {
            out.push(to);
            self.pred
                .get_mut(&to)
                .expect("endpoint just inserted")
                .push(from);
        }
    }

    pub fn contains(&self, node: PgNode) -> bool {
        self.succ.contains_key(&node)
    }

    /// Nodes in insertion order (sentinels first).
    pub fn nodes(&self) -> impl Iterator<Item = PgNode> + '_ {
        self.nodes.iter().copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.succ.values().map(Vec::len).sum()
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> Vec<(PgNode, PgNode)> {
        self.nodes
            .iter()
            .flat_map(|n| self.succ[n].iter().map(move |t| (*n, *t)))
            .collect()
    }

    pub fn immediate_successors(&self, node: PgNode) -> Result<&[PgNode]> {
        self.succ
            .get(&node)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::graph_invariant(format!("node {node} not present in graph")))
    }

    pub fn immediate_predecessors(&self, node: PgNode) -> Result<&[PgNode]> {
        self.pred
            .get(&node)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::graph_invariant(format!("node {node} not present in graph")))
    }

    /// Every node reachable from `node` through at least one edge, in
    /// depth-first discovery order. Uses an explicit work stack; the
    /// recursive walks in this crate are all over source nesting depth,
    /// but graph traversals can be as deep as the method is long.
    pub fn transitive_successors(&self, node: PgNode) -> Result<Vec<PgNode>> {
        let mut seen: HashSet<PgNode> = HashSet::new();
        let mut order = Vec::new();
        let mut stack: Vec<PgNode> = self.immediate_successors(node)?.to_vec();
        stack.reverse();
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            order.push(next);
            let succs = self.immediate_successors(next)?;
            for s in succs.iter().rev() {
                if !seen.contains(s) {
                    stack.push(*s);
                }
            }
        }
        Ok(order)
    }

    /// Whether `to` is reachable from `from` (a node reaches itself).
    pub fn is_reachable(&self, from: PgNode, to: PgNode) -> Result<bool> {
        if from == to {
            return Ok(self.contains(from));
        }
        let mut seen: HashSet<PgNode> = HashSet::new();
        let mut stack = vec![from];
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            for s in self.immediate_successors(next)? {
                if *s == to {
                    return Ok(true);
                }
                stack.push(*s);
            }
        }
        Ok(false)
    }

    /// Reinterpret every edge backwards without touching which node is
    /// labelled entry or exit. The stored adjacency maps swap roles, so
    /// this costs one clone; entry and exit swap *roles* for whoever
    /// reads the result.
    pub fn reversed_edges_only(&self) -> ProgramGraph {
        ProgramGraph {
            nodes: self.nodes.clone(),
            succ: self.pred.clone(),
            pred: self.succ.clone(),
        }
    }

    /// Rebuild the graph around fresh entry/exit sentinels: for every
    /// edge (s, t), an edge out of the old entry becomes an edge into
    /// the new exit, an edge into the old exit becomes an edge out of
    /// the new entry, and any other edge is flipped in place. Reversing
    /// twice reproduces the original edge set.
    pub fn reversed(&self) -> ProgramGraph {
        let mut out = ProgramGraph::new();
        for node in self.nodes() {
            out.add_node(node);
        }
        for (s, t) in self.edges() {
            match (s, t) {
                (PgNode::Entry, PgNode::Exit) => out.add_edge(PgNode::Entry, PgNode::Exit),
                (PgNode::Entry, _) => out.add_edge(t, PgNode::Exit),
                (_, PgNode::Exit) => out.add_edge(PgNode::Entry, s),
                _ => out.add_edge(t, s),
            }
        }
        out
    }
}

impl Serialize for ProgramGraph {
    /// Serialized as an explicit edge list; adjacency maps keyed by node
    /// are awkward for downstream consumers.
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("ProgramGraph", 3)?;
        st.serialize_field("entry", &self.entry())?;
        st.serialize_field("exit", &self.exit())?;
        st.serialize_field("edges", &self.edges())?;
        st.end()
    }
}
