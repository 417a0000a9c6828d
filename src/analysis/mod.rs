//! Per-method orchestration of CFG construction, fact collection, and
//! chain derivation.
//!
//! [`MethodFacts::analyze`] builds the control-flow graph once, collects
//! definitions and uses once, and derives the two chain lists on demand:
//!
//! 1. **Last-write chains** (`last_writes`): reaching definitions paired
//!    with the uses they feed.
//! 2. **Last-read chains** (`last_reads`): reaching uses paired with the
//!    later uses of the same variable.
//!
//! Both lists are computed at most once and cached; everything in a
//! [`MethodFacts`] is immutable after construction. Analysis is
//! single-threaded and synchronous, and one method's results share
//! nothing with another's, so batching callers are free to fan methods
//! out across threads themselves.
//!
//! The walks recurse over the AST, so extremely deep statement nesting
//! costs call stack proportionally; method bodies found in practice are
//! nowhere near the limit.
//!
//! # Example
//!
//! ```ignore
//! use defuse::MethodFacts;
//!
//! let facts = MethodFacts::analyze(&arena, method)?;
//! for (def, use_) in facts.last_writes()? {
//!     println!("{} written at {} feeds {}", def.name, def.cfg_node, use_.cfg_node);
//! }
//! ```

use std::collections::{HashMap, HashSet};

use log::debug;
use once_cell::unsync::OnceCell;

use crate::ast::{AstArena, NodeId};
use crate::cfg::{self, ControlFlowGraph};
use crate::dataflow::{DataFlowSolver, Direction, Join, ReachingDefinitions, ReachingUses};
use crate::errors::Result;
use crate::facts::{self, same_variable, Definition, Use};
use crate::graph::PgNode;

/// Complete analysis of one method: the CFG, the fact tables, and the
/// memoized chain lists.
pub struct MethodFacts<'a> {
    arena: &'a AstArena,
    method: NodeId,
    cfg: ControlFlowGraph,
    definitions: HashMap<PgNode, Vec<Definition>>,
    uses: HashMap<PgNode, Vec<Use>>,
    last_writes: OnceCell<Vec<(Definition, Use)>>,
    last_reads: OnceCell<Vec<(Use, Use)>>,
}

impl<'a> MethodFacts<'a> {
    /// Build the CFG and fact tables for one method declaration.
    pub fn analyze(arena: &'a AstArena, method: NodeId) -> Result<Self> {
        let cfg = cfg::build(arena, method)?;
        let definitions = facts::collect_definitions(arena, method, &cfg)?;
        let uses = facts::collect_uses(arena, method, &cfg)?;
        debug!(
            "collected {} definitions and {} uses over {} CFG nodes",
            definitions.values().map(Vec::len).sum::<usize>(),
            uses.values().map(Vec::len).sum::<usize>(),
            cfg.node_count()
        );
        Ok(Self {
            arena,
            method,
            cfg,
            definitions,
            uses,
            last_writes: OnceCell::new(),
            last_reads: OnceCell::new(),
        })
    }

    pub fn method(&self) -> NodeId {
        self.method
    }

    pub fn cfg(&self) -> &ControlFlowGraph {
        &self.cfg
    }

    pub fn definitions(&self) -> &HashMap<PgNode, Vec<Definition>> {
        &self.definitions
    }

    pub fn uses(&self) -> &HashMap<PgNode, Vec<Use>> {
        &self.uses
    }

    pub fn definitions_at(&self, node: PgNode) -> &[Definition] {
        self.definitions.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn uses_at(&self, node: PgNode) -> &[Use] {
        self.uses.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Last-write chains: every definition that may still be live when a
    /// use of the same variable executes, paired with that use.
    ///
    /// Runs forward/May reaching definitions, then pairs each use at a
    /// node with the definitions reaching the node (the joined out-facts
    /// of its predecessors). Computed once, cached.
    pub fn last_writes(&self) -> Result<&[(Definition, Use)]> {
        let pairs = self
            .last_writes
            .get_or_try_init(|| self.compute_last_writes())?;
        Ok(pairs.as_slice())
    }

    /// Last-read chains: every earlier use that may still be the latest
    /// read of a variable when another use of it executes, paired with
    /// that later use.
    ///
    /// Runs forward/May reaching uses, then pairs each use at a node
    /// with the uses reaching the node. Computed once, cached.
    pub fn last_reads(&self) -> Result<&[(Use, Use)]> {
        let pairs = self
            .last_reads
            .get_or_try_init(|| self.compute_last_reads())?;
        Ok(pairs.as_slice())
    }

    fn compute_last_writes(&self) -> Result<Vec<(Definition, Use)>> {
        let universe: HashSet<Definition> =
            self.definitions.values().flatten().cloned().collect();
        let solver = DataFlowSolver::new(Direction::Forward, Join::May);
        let transfer = ReachingDefinitions::new(self.arena, &self.definitions);
        let result = solver.solve(&self.cfg, &universe, &transfer)?;

        let mut pairs = Vec::new();
        for node in self.cfg.nodes() {
            let Some(node_uses) = self.uses.get(&node) else {
                continue;
            };
            let reaching = &result.in_facts[&node];
            for use_ in node_uses {
                let mut matched: Vec<&Definition> = reaching
                    .iter()
                    .filter(|def| same_variable(self.arena, *def, use_))
                    .collect();
                matched.sort_by_key(|def| (def.written_node, def.cfg_node));
                for def in matched {
                    pairs.push((def.clone(), use_.clone()));
                }
            }
        }
        debug!("derived {} last-write chains", pairs.len());
        Ok(pairs)
    }

    fn compute_last_reads(&self) -> Result<Vec<(Use, Use)>> {
        let universe: HashSet<Use> = self.uses.values().flatten().cloned().collect();
        let solver = DataFlowSolver::new(Direction::Forward, Join::May);
        let transfer = ReachingUses::new(&self.uses);
        let result = solver.solve(&self.cfg, &universe, &transfer)?;

        let mut pairs = Vec::new();
        for node in self.cfg.nodes() {
            let Some(node_uses) = self.uses.get(&node) else {
                continue;
            };
            let reaching = &result.in_facts[&node];
            for use_ in node_uses {
                let mut matched: Vec<&Use> = reaching
                    .iter()
                    .filter(|prior| same_variable(self.arena, *prior, use_))
                    .collect();
                matched.sort_by_key(|prior| (prior.read_node, prior.cfg_node));
                for prior in matched {
                    pairs.push((prior.clone(), use_.clone()));
                }
            }
        }
        debug!("derived {} last-read chains", pairs.len());
        Ok(pairs)
    }
}

/// Analyze a batch of methods, skipping any that fail.
///
/// Per-method failures are isolated: the failing method is logged and
/// dropped, the rest of the batch proceeds.
pub fn analyze_methods<'a>(arena: &'a AstArena, methods: &[NodeId]) -> Vec<MethodFacts<'a>> {
    methods
        .iter()
        .filter_map(|&method| match MethodFacts::analyze(arena, method) {
            Ok(facts) => Some(facts),
            Err(err) => {
                debug!("skipping method {method}: {err}");
                None
            }
        })
        .collect()
}
