//! Control flow graph construction and def-use chain analysis for
//! parsed method ASTs.
//!
//! # Architecture Overview
//!
//! The analysis pipeline consists of three main phases:
//!
//! 1. **CFG Construction**: walk the method AST once, threading a set of
//!    open predecessor nodes through statements ([`cfg`]).
//! 2. **Fact Collection**: walk the AST a second time, CFG-aware, to tag
//!    every variable write and read with the CFG node it belongs to
//!    ([`facts`]).
//! 3. **Chain Derivation**: run reaching-definitions and reaching-uses
//!    over the graph with a generic worklist solver ([`dataflow`]) and
//!    pair the facts into last-write and last-read chains ([`analysis`]).
//!
//! The input AST arrives through the [`ast`] arena; a parser layer
//! (outside this crate) populates it. The output — the graph, the fact
//! tables, and the chain lists — is consumed by a graph-export layer,
//! also outside this crate. Everything in between is intra-procedural,
//! single-threaded, and stateless across methods.
//!
//! # Design Decisions
//!
//! ## Intra-procedural Only
//!
//! The analysis is intentionally **intra-procedural** (within a single
//! method). There is no points-to or alias analysis, no type hierarchy
//! reasoning (exception matching in the CFG builder is by textual name),
//! and no state shared between methods — analyzing a batch in parallel
//! is the caller's prerogative.
//!
//! ## Statement-granularity CFG
//!
//! One graph node per statement, with compound statements represented by
//! their header node. Mid-block throws are not individually modeled;
//! only the end of a try block reaches its handlers, except for `throw
//! new X(...)` sites whose textual type matches a local catch clause.
//!
//! # Example
//!
//! ```ignore
//! use defuse::{AstArena, MethodFacts};
//!
//! let mut arena = AstArena::new();
//! let method = parse_into(&mut arena, source); // external parser layer
//!
//! let facts = MethodFacts::analyze(&arena, method)?;
//! for (def, use_) in facts.last_writes()? {
//!     println!("{}@{} -> {}", def.name, def.cfg_node, use_.cfg_node);
//! }
//! ```

pub mod analysis;
pub mod ast;
pub mod cfg;
pub mod dataflow;
pub mod errors;
pub mod facts;
pub mod graph;

// Re-export commonly used types
pub use crate::analysis::{analyze_methods, MethodFacts};
pub use crate::ast::{AstArena, AstKind, BinOp, NodeId, UnaryOp};
pub use crate::cfg::{CfgBuilder, ControlFlowGraph};
pub use crate::dataflow::{
    DataFlowResult, DataFlowSolver, Direction, Join, ReachingDefinitions, ReachingUses,
    TransferFunction,
};
pub use crate::errors::{Error, Result};
pub use crate::facts::{same_variable, Definition, Use, VariableFact};
pub use crate::graph::{PgNode, ProgramGraph};
