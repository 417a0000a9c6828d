//! Variable write/read facts and their identity rules.
//!
//! A [`Definition`] records one write of a named variable, a [`Use`] one
//! read. Both remember the AST node that performed the access, the CFG
//! node the access belongs to, and optionally a *scope*: the nearest
//! enclosing qualifying expression (the receiver of `obj.field`). The
//! scope keeps unrelated same-named variables apart — `a.count` and
//! `b.count` are different variables even though both facts are named
//! `count`.
//!
//! Facts are identity-significant: two reads of `x` at different tree
//! positions are distinct facts, which is why equality and hashing
//! include the access node id.

mod collect;

pub use collect::{collect_definitions, collect_uses};

use serde::Serialize;

use crate::ast::{AstArena, NodeId};
use crate::graph::PgNode;

/// One write of a variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Definition {
    /// Bare variable name.
    pub name: String,
    /// The AST node performing the write.
    pub written_node: NodeId,
    /// The CFG node the write is attributed to.
    pub cfg_node: PgNode,
    /// Nearest enclosing qualifying expression, when the target is
    /// qualified.
    pub scope: Option<NodeId>,
}

/// One read of a variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Use {
    /// Bare variable name.
    pub name: String,
    /// The AST node performing the read.
    pub read_node: NodeId,
    /// The CFG node the read is attributed to.
    pub cfg_node: PgNode,
    /// Nearest enclosing qualifying expression, when the read is
    /// qualified.
    pub scope: Option<NodeId>,
}

/// Common view over [`Definition`] and [`Use`] for variable identity
/// comparisons.
pub trait VariableFact {
    fn name(&self) -> &str;
    fn scope(&self) -> Option<NodeId>;
}

impl VariableFact for Definition {
    fn name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> Option<NodeId> {
        self.scope
    }
}

impl VariableFact for Use {
    fn name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> Option<NodeId> {
        self.scope
    }
}

/// Structural equality of two optional scopes.
pub(crate) fn scopes_equal(arena: &AstArena, a: Option<NodeId>, b: Option<NodeId>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => arena.structurally_equal(a, b),
        _ => false,
    }
}

/// Whether two facts denote the same variable: their names match under
/// structurally equal scopes, or one fact's rendered scope path equals
/// the other's bare name (writing `obj` then reading `obj.field` relates
/// the read back to the write of `obj`).
pub fn same_variable<A: VariableFact, B: VariableFact>(arena: &AstArena, a: &A, b: &B) -> bool {
    if a.name() == b.name() && scopes_equal(arena, a.scope(), b.scope()) {
        return true;
    }
    if let Some(path) = a.scope().and_then(|s| arena.render_path(s)) {
        if path == b.name() {
            return true;
        }
    }
    if let Some(path) = b.scope().and_then(|s| arena.render_path(s)) {
        if path == a.name() {
            return true;
        }
    }
    false
}
