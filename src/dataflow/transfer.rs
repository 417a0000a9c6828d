//! Transfer functions for the two analyses this crate ships.
//!
//! Reaching definitions kills by (name, scope); reaching uses kills by
//! name alone, ignoring scope. A scoped read therefore shadows earlier
//! reads of any same-named variable, where a scoped write only shadows
//! writes of the same scoped variable.

use std::collections::{HashMap, HashSet};

use crate::ast::AstArena;
use crate::facts::{scopes_equal, Definition, Use};
use crate::graph::PgNode;

use super::TransferFunction;

/// Forward reaching-definitions transfer: a node kills every incoming
/// definition that shares (name, scope) with one of its own definitions,
/// then generates its own.
pub struct ReachingDefinitions<'a> {
    arena: &'a AstArena,
    defs: &'a HashMap<PgNode, Vec<Definition>>,
}

impl<'a> ReachingDefinitions<'a> {
    pub fn new(arena: &'a AstArena, defs: &'a HashMap<PgNode, Vec<Definition>>) -> Self {
        Self { arena, defs }
    }
}

impl TransferFunction<Definition> for ReachingDefinitions<'_> {
    fn transfer(&self, node: PgNode, incoming: &HashSet<Definition>) -> HashSet<Definition> {
        let Some(local) = self.defs.get(&node) else {
            return incoming.clone();
        };
        let mut out: HashSet<Definition> = incoming
            .iter()
            .filter(|d| {
                !local
                    .iter()
                    .any(|l| l.name == d.name && scopes_equal(self.arena, l.scope, d.scope))
            })
            .cloned()
            .collect();
        out.extend(local.iter().cloned());
        out
    }
}

/// Forward reaching-uses transfer: a node kills every incoming use whose
/// name matches one of its own uses, then generates its own.
pub struct ReachingUses<'a> {
    uses: &'a HashMap<PgNode, Vec<Use>>,
}

impl<'a> ReachingUses<'a> {
    pub fn new(uses: &'a HashMap<PgNode, Vec<Use>>) -> Self {
        Self { uses }
    }
}

impl TransferFunction<Use> for ReachingUses<'_> {
    fn transfer(&self, node: PgNode, incoming: &HashSet<Use>) -> HashSet<Use> {
        let Some(local) = self.uses.get(&node) else {
            return incoming.clone();
        };
        let mut out: HashSet<Use> = incoming
            .iter()
            .filter(|u| !local.iter().any(|l| l.name == u.name))
            .cloned()
            .collect();
        out.extend(local.iter().cloned());
        out
    }
}
