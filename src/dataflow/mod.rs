//! Generic worklist dataflow engine.
//!
//! The solver is agnostic to what a fact is: it is parameterized by a
//! flow [`Direction`], a [`Join`] operator, and a [`TransferFunction`].
//! It repeatedly pops a node from the worklist, joins the out-facts of
//! the node's in-neighbors, applies the transfer function, and
//! re-enqueues the out-neighbors whenever the stored out-facts changed,
//! until the worklist drains.
//!
//! Under a `May` join every node's working set is initialized to the
//! *full* fact universe rather than the empty set, so a node the
//! worklist never refines reports the conservative "everything may
//! hold" value instead of an optimistic empty one. `Must` starts from
//! empty, mirrored.
//!
//! # Example
//!
//! ```ignore
//! let solver = DataFlowSolver::new(Direction::Forward, Join::May);
//! let result = solver.solve(&cfg, &universe, &ReachingDefinitions::new(&arena, &defs))?;
//! let live_in = &result.in_facts[&node];
//! ```

pub mod transfer;

pub use transfer::{ReachingDefinitions, ReachingUses};

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

use log::debug;

use crate::errors::Result;
use crate::graph::{PgNode, ProgramGraph};

/// Flow direction of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// In-facts come from predecessors; the seed is the entry sentinel.
    Forward,
    /// In-facts come from successors; the seed is the exit sentinel.
    Backward,
}

/// How facts arriving over several in-edges combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    /// Set union: a fact holds if it holds on some path.
    May,
    /// Set intersection: a fact holds only if it holds on all paths.
    Must,
}

/// A node-local transformation from incoming facts to outgoing facts.
pub trait TransferFunction<F> {
    fn transfer(&self, node: PgNode, incoming: &HashSet<F>) -> HashSet<F>;
}

/// Fixed-point result: fact sets on both sides of every CFG vertex.
#[derive(Debug, Clone)]
pub struct DataFlowResult<F> {
    pub in_facts: HashMap<PgNode, HashSet<F>>,
    pub out_facts: HashMap<PgNode, HashSet<F>>,
}

/// Worklist fixed-point solver over a program graph.
#[derive(Debug, Clone, Copy)]
pub struct DataFlowSolver {
    direction: Direction,
    join: Join,
}

impl DataFlowSolver {
    pub fn new(direction: Direction, join: Join) -> Self {
        Self { direction, join }
    }

    /// Run the analysis to its fixed point.
    pub fn solve<F, T>(
        &self,
        graph: &ProgramGraph,
        universe: &HashSet<F>,
        transfer: &T,
    ) -> Result<DataFlowResult<F>>
    where
        F: Clone + Eq + Hash,
        T: TransferFunction<F>,
    {
        let mut out_facts: HashMap<PgNode, HashSet<F>> = HashMap::new();
        for node in graph.nodes() {
            let initial = match self.join {
                Join::May => universe.clone(),
                Join::Must => HashSet::new(),
            };
            out_facts.insert(node, initial);
        }

        let seed = match self.direction {
            Direction::Forward => graph.entry(),
            Direction::Backward => graph.exit(),
        };
        let mut worklist: VecDeque<PgNode> = VecDeque::new();
        let mut queued: HashSet<PgNode> = HashSet::new();
        worklist.push_back(seed);
        queued.insert(seed);

        let mut iterations = 0usize;
        while let Some(node) = worklist.pop_front() {
            queued.remove(&node);
            iterations += 1;

            let incoming = self.join_neighbors(graph, &out_facts, node)?;
            let outgoing = transfer.transfer(node, &incoming);

            let stored = out_facts.get(&node).expect("all nodes initialized");
            if *stored != outgoing {
                out_facts.insert(node, outgoing);
                for &next in self.out_neighbors(graph, node)? {
                    if queued.insert(next) {
                        worklist.push_back(next);
                    }
                }
            }
        }
        debug!("dataflow converged after {iterations} iterations");

        // In-facts are derived from the converged out-facts, so a node
        // the worklist never refined still sees the join of its
        // neighbors' final values rather than a stale intermediate.
        let mut in_facts: HashMap<PgNode, HashSet<F>> = HashMap::new();
        for node in graph.nodes() {
            let incoming = self.join_neighbors(graph, &out_facts, node)?;
            in_facts.insert(node, incoming);
        }

        Ok(DataFlowResult {
            in_facts,
            out_facts,
        })
    }

    fn in_neighbors<'g>(&self, graph: &'g ProgramGraph, node: PgNode) -> Result<&'g [PgNode]> {
        match self.direction {
            Direction::Forward => graph.immediate_predecessors(node),
            Direction::Backward => graph.immediate_successors(node),
        }
    }

    fn out_neighbors<'g>(&self, graph: &'g ProgramGraph, node: PgNode) -> Result<&'g [PgNode]> {
        match self.direction {
            Direction::Forward => graph.immediate_successors(node),
            Direction::Backward => graph.immediate_predecessors(node),
        }
    }

    /// Join the out-facts of a node's in-neighbors. With no in-neighbors
    /// the join is empty for both operators, so seed nodes start from
    /// their own generated facts.
    fn join_neighbors<F>(
        &self,
        graph: &ProgramGraph,
        out_facts: &HashMap<PgNode, HashSet<F>>,
        node: PgNode,
    ) -> Result<HashSet<F>>
    where
        F: Clone + Eq + Hash,
    {
        let mut joined: Option<HashSet<F>> = None;
        for neighbor in self.in_neighbors(graph, node)? {
            let facts = out_facts.get(neighbor).expect("all nodes initialized");
            joined = Some(match joined {
                None => facts.clone(),
                Some(acc) => match self.join {
                    Join::May => acc.union(facts).cloned().collect(),
                    Join::Must => acc.intersection(facts).cloned().collect(),
                },
            });
        }
        Ok(joined.unwrap_or_default())
    }
}
