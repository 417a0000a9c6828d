//! Control flow graph construction from method ASTs.
//!
//! This module transforms a parsed method declaration into a control
//! flow graph suitable for data flow analysis. One graph node is created
//! per statement; compound statements (if, loops, switch, try) are
//! represented by the node of their header and wired according to the
//! statement's control behavior.
//!
//! # Example
//!
//! ```ignore
//! let cfg = defuse::cfg::build(&arena, method)?;
//! assert!(cfg.immediate_successors(cfg.entry())?.len() >= 1);
//! ```

mod builder;

pub use builder::CfgBuilder;

use crate::ast::{AstArena, NodeId};
use crate::errors::Result;
use crate::graph::ProgramGraph;

/// A program graph specialized as a control-flow graph: exactly one
/// entry and one exit sentinel, edges modeling possible control
/// transfer. Built once per method, then read-only.
pub type ControlFlowGraph = ProgramGraph;

/// Build the control-flow graph of one method declaration.
pub fn build(arena: &AstArena, method: NodeId) -> Result<ControlFlowGraph> {
    CfgBuilder::new(arena).build(method)
}
