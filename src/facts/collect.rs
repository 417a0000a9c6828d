//! CFG-aware collection of definition and use facts.
//!
//! Two structurally symmetric walks over the method AST, keyed on the
//! CFG built beforehand: every fact is attributed to the nearest
//! enclosing statement that owns a CFG node. Formal parameters belong to
//! the entry sentinel.
//!
//! Write positions are consumed by the definition walk and skipped by
//! the use walk; everything else that reads a variable becomes a use.
//! Call argument lists are scope-resetting — an argument's facts never
//! inherit the call's receiver qualifier — which falls out of deriving
//! scopes purely from field-access chains. Lambda bodies are opaque to
//! both walks.

use std::collections::HashMap;

use crate::ast::{AstArena, AstKind, NodeId};
use crate::cfg::ControlFlowGraph;
use crate::errors::{Error, Result};
use crate::graph::PgNode;

use super::{Definition, Use};

/// Collect every variable write in the method, grouped by CFG node.
pub fn collect_definitions(
    arena: &AstArena,
    method: NodeId,
    cfg: &ControlFlowGraph,
) -> Result<HashMap<PgNode, Vec<Definition>>> {
    let mut collector = DefinitionCollector {
        arena,
        cfg,
        defs: HashMap::new(),
    };
    collector.collect(method)?;
    Ok(collector.defs)
}

/// Collect every variable read in the method, grouped by CFG node.
pub fn collect_uses(
    arena: &AstArena,
    method: NodeId,
    cfg: &ControlFlowGraph,
) -> Result<HashMap<PgNode, Vec<Use>>> {
    let mut collector = UseCollector {
        arena,
        cfg,
        uses: HashMap::new(),
    };
    collector.collect(method)?;
    Ok(collector.uses)
}

/// Resolve the CFG node a fact inside `id` belongs to: the statement's
/// own node when it has one, otherwise the nearest enclosing one.
fn attribution(cfg: &ControlFlowGraph, id: NodeId, enclosing: PgNode) -> PgNode {
    let own = PgNode::Stmt(id);
    if cfg.contains(own) {
        own
    } else {
        enclosing
    }
}

struct DefinitionCollector<'a> {
    arena: &'a AstArena,
    cfg: &'a ControlFlowGraph,
    defs: HashMap<PgNode, Vec<Definition>>,
}

impl<'a> DefinitionCollector<'a> {
    fn collect(&mut self, method: NodeId) -> Result<()> {
        let (params, body) = match self.arena.node(method) {
            AstKind::Method { params, body, .. } => (params.clone(), *body),
            _ => return Err(Error::malformed_ast("expected a method declaration")),
        };
        for param in params {
            let name = match self.arena.node(param) {
                AstKind::Param { name } => name.clone(),
                _ => return Err(Error::malformed_ast("parameter list with a non-parameter")),
            };
            self.define(name, param, PgNode::Entry, None);
        }
        if let Some(body) = body {
            self.visit(body, PgNode::Entry);
        }
        Ok(())
    }

    fn define(&mut self, name: String, written_node: NodeId, cfg_node: PgNode, scope: Option<NodeId>) {
        self.defs.entry(cfg_node).or_default().push(Definition {
            name,
            written_node,
            cfg_node,
            scope,
        });
    }

    fn visit(&mut self, id: NodeId, enclosing: PgNode) {
        let cur = attribution(self.cfg, id, enclosing);
        match self.arena.node(id) {
            AstKind::Block { stmts } => {
                for &stmt in stmts {
                    self.visit(stmt, cur);
                }
            }
            AstKind::LocalDecl { declarators } => {
                for &decl in declarators {
                    self.visit(decl, cur);
                }
            }
            AstKind::Declarator { name, init } => {
                self.define(name.clone(), id, cur, None);
                if let Some(init) = init {
                    self.visit(*init, cur);
                }
            }
            AstKind::ExprStmt { expr } => self.visit(*expr, cur),
            AstKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.visit(*cond, cur);
                self.visit(*then_branch, cur);
                if let Some(els) = else_branch {
                    self.visit(*els, cur);
                }
            }
            AstKind::While { cond, body } => {
                self.visit(*cond, cur);
                self.visit(*body, cur);
            }
            AstKind::DoWhile { body, cond } => {
                self.visit(*body, cur);
                self.visit(*cond, cur);
            }
            AstKind::For {
                init,
                cond,
                update,
                body,
            } => {
                for &i in init {
                    self.visit(i, cur);
                }
                if let Some(cond) = cond {
                    self.visit(*cond, cur);
                }
                for &u in update {
                    self.visit(u, cur);
                }
                self.visit(*body, cur);
            }
            AstKind::ForEach {
                var,
                iterable,
                body,
            } => {
                self.visit(*var, cur);
                self.visit(*iterable, cur);
                self.visit(*body, cur);
            }
            AstKind::Switch { selector, cases } => {
                self.visit(*selector, cur);
                for &case in cases {
                    self.visit(case, cur);
                }
            }
            AstKind::Case { labels, stmts, .. } => {
                for &label in labels {
                    self.visit(label, cur);
                }
                for &stmt in stmts {
                    self.visit(stmt, cur);
                }
            }
            AstKind::Return { value } => {
                if let Some(value) = value {
                    self.visit(*value, cur);
                }
            }
            AstKind::Throw { expr } => self.visit(*expr, cur),
            AstKind::Assert { cond, detail } => {
                self.visit(*cond, cur);
                if let Some(detail) = detail {
                    self.visit(*detail, cur);
                }
            }
            AstKind::Labeled { stmt, .. } => self.visit(*stmt, cur),
            AstKind::Try {
                resources,
                body,
                catches,
                finally,
            } => {
                for &resource in resources {
                    self.visit(resource, cur);
                }
                self.visit(*body, cur);
                for &catch in catches {
                    self.visit(catch, cur);
                }
                if let Some(finally) = finally {
                    self.visit(*finally, cur);
                }
            }
            AstKind::Catch { param, body, .. } => {
                self.define(param.clone(), id, cur, None);
                self.visit(*body, cur);
            }

            AstKind::Assign { target, value } => {
                self.define_target(*target, cur);
                self.visit_target_rest(*target, cur);
                self.visit(*value, cur);
            }
            AstKind::Unary { op, operand } if op.is_update() => {
                self.define_target(*operand, cur);
                self.visit_target_rest(*operand, cur);
            }
            AstKind::Unary { operand, .. } => self.visit(*operand, cur),
            AstKind::Binary { lhs, rhs, .. } => {
                self.visit(*lhs, cur);
                self.visit(*rhs, cur);
            }
            AstKind::MethodCall { receiver, args, .. } => {
                if let Some(receiver) = receiver {
                    self.visit(*receiver, cur);
                }
                for &arg in args {
                    self.visit(arg, cur);
                }
            }
            AstKind::New { args, .. } => {
                for &arg in args {
                    self.visit(arg, cur);
                }
            }
            AstKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                self.visit(*cond, cur);
                self.visit(*then_expr, cur);
                self.visit(*else_expr, cur);
            }
            AstKind::InstanceOf { expr, binding, .. } => {
                self.visit(*expr, cur);
                if let Some(binding) = binding {
                    self.define(binding.clone(), id, cur, None);
                }
            }
            AstKind::FieldAccess { receiver, .. } => self.visit(*receiver, cur),
            AstKind::ArrayAccess { array, index } => {
                self.visit(*array, cur);
                self.visit(*index, cur);
            }
            AstKind::Paren { expr } => self.visit(*expr, cur),

            // Opaque by decision, not oversight: captured-variable
            // writes inside lambdas are not tracked.
            AstKind::Lambda { .. } => {}

            AstKind::Method { .. }
            | AstKind::Param { .. }
            | AstKind::Name { .. }
            | AstKind::Literal { .. }
            | AstKind::Break { .. }
            | AstKind::Continue { .. }
            | AstKind::Opaque => {}
        }
    }

    /// Emit the definition for a write target: the outermost addressable
    /// identifier. Array accesses strip to their base (`a[i] = v`
    /// redefines `a`); a qualified target defines the field name under
    /// its receiver scope; parentheses unwrap.
    fn define_target(&mut self, target: NodeId, cur: PgNode) {
        match self.arena.node(target) {
            AstKind::Name { name } => self.define(name.clone(), target, cur, None),
            AstKind::Paren { expr } => self.define_target(*expr, cur),
            AstKind::ArrayAccess { array, .. } => self.define_target(*array, cur),
            AstKind::FieldAccess { receiver, name } => {
                let scope = Some(*receiver);
                self.define(name.clone(), target, cur, scope);
            }
            // No addressable identifier (e.g. a call result); nothing to
            // define.
            _ => {}
        }
    }

    /// Walk the parts of a write target that are still evaluated:
    /// indices and receivers may contain nested writes of their own.
    fn visit_target_rest(&mut self, target: NodeId, cur: PgNode) {
        match self.arena.node(target) {
            AstKind::Name { .. } => {}
            AstKind::Paren { expr } => self.visit_target_rest(*expr, cur),
            AstKind::ArrayAccess { array, index } => {
                self.visit(*index, cur);
                self.visit_target_rest(*array, cur);
            }
            AstKind::FieldAccess { receiver, .. } => self.visit(*receiver, cur),
            _ => self.visit(target, cur),
        }
    }
}

struct UseCollector<'a> {
    arena: &'a AstArena,
    cfg: &'a ControlFlowGraph,
    uses: HashMap<PgNode, Vec<Use>>,
}

impl<'a> UseCollector<'a> {
    fn collect(&mut self, method: NodeId) -> Result<()> {
        let body = match self.arena.node(method) {
            AstKind::Method { body, .. } => *body,
            _ => return Err(Error::malformed_ast("expected a method declaration")),
        };
        if let Some(body) = body {
            self.visit(body, PgNode::Entry);
        }
        Ok(())
    }

    fn record(&mut self, name: String, read_node: NodeId, cfg_node: PgNode, scope: Option<NodeId>) {
        self.uses.entry(cfg_node).or_default().push(Use {
            name,
            read_node,
            cfg_node,
            scope,
        });
    }

    fn visit(&mut self, id: NodeId, enclosing: PgNode) {
        let cur = attribution(self.cfg, id, enclosing);
        match self.arena.node(id) {
            AstKind::Name { name } => self.record(name.clone(), id, cur, None),
            AstKind::FieldAccess { receiver, name } => {
                self.record(name.clone(), id, cur, Some(*receiver));
                self.visit(*receiver, cur);
            }
            AstKind::ArrayAccess { array, index } => {
                self.visit(*array, cur);
                self.visit(*index, cur);
            }

            AstKind::Assign { target, value } => {
                self.visit_write_target(*target, cur);
                self.visit(*value, cur);
            }
            AstKind::Unary { op, operand } if op.is_update() => {
                self.visit_write_target(*operand, cur);
            }
            AstKind::Unary { operand, .. } => self.visit(*operand, cur),
            AstKind::Binary { lhs, rhs, .. } => {
                self.visit(*lhs, cur);
                self.visit(*rhs, cur);
            }
            AstKind::MethodCall { receiver, args, .. } => {
                if let Some(receiver) = receiver {
                    self.visit(*receiver, cur);
                }
                // Arguments start a fresh qualifier context.
                for &arg in args {
                    self.visit(arg, cur);
                }
            }
            AstKind::New { args, .. } => {
                for &arg in args {
                    self.visit(arg, cur);
                }
            }
            AstKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                self.visit(*cond, cur);
                self.visit(*then_expr, cur);
                self.visit(*else_expr, cur);
            }
            AstKind::InstanceOf { expr, .. } => self.visit(*expr, cur),
            AstKind::Paren { expr } => self.visit(*expr, cur),
            AstKind::Lambda { .. } => {}

            AstKind::Block { stmts } => {
                for &stmt in stmts {
                    self.visit(stmt, cur);
                }
            }
            AstKind::LocalDecl { declarators } => {
                for &decl in declarators {
                    self.visit(decl, cur);
                }
            }
            AstKind::Declarator { init, .. } => {
                if let Some(init) = init {
                    self.visit(*init, cur);
                }
            }
            AstKind::ExprStmt { expr } => self.visit(*expr, cur),
            AstKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.visit(*cond, cur);
                self.visit(*then_branch, cur);
                if let Some(els) = else_branch {
                    self.visit(*els, cur);
                }
            }
            AstKind::While { cond, body } => {
                self.visit(*cond, cur);
                self.visit(*body, cur);
            }
            AstKind::DoWhile { body, cond } => {
                self.visit(*body, cur);
                self.visit(*cond, cur);
            }
            AstKind::For {
                init,
                cond,
                update,
                body,
            } => {
                for &i in init {
                    self.visit(i, cur);
                }
                if let Some(cond) = cond {
                    self.visit(*cond, cur);
                }
                for &u in update {
                    self.visit(u, cur);
                }
                self.visit(*body, cur);
            }
            AstKind::ForEach {
                var,
                iterable,
                body,
            } => {
                self.visit(*var, cur);
                self.visit(*iterable, cur);
                self.visit(*body, cur);
            }
            AstKind::Switch { selector, cases } => {
                self.visit(*selector, cur);
                for &case in cases {
                    self.visit(case, cur);
                }
            }
            AstKind::Case { labels, stmts, .. } => {
                for &label in labels {
                    self.visit(label, cur);
                }
                for &stmt in stmts {
                    self.visit(stmt, cur);
                }
            }
            AstKind::Return { value } => {
                if let Some(value) = value {
                    self.visit(*value, cur);
                }
            }
            AstKind::Throw { expr } => self.visit(*expr, cur),
            AstKind::Assert { cond, detail } => {
                self.visit(*cond, cur);
                if let Some(detail) = detail {
                    self.visit(*detail, cur);
                }
            }
            AstKind::Labeled { stmt, .. } => self.visit(*stmt, cur),
            AstKind::Try {
                resources,
                body,
                catches,
                finally,
            } => {
                for &resource in resources {
                    self.visit(resource, cur);
                }
                self.visit(*body, cur);
                for &catch in catches {
                    self.visit(catch, cur);
                }
                if let Some(finally) = finally {
                    self.visit(*finally, cur);
                }
            }
            AstKind::Catch { body, .. } => self.visit(*body, cur),

            AstKind::Method { .. }
            | AstKind::Param { .. }
            | AstKind::Literal { .. }
            | AstKind::Break { .. }
            | AstKind::Continue { .. }
            | AstKind::Opaque => {}
        }
    }

    /// Walk a write target, skipping the identifier the definition
    /// consumed but reading everything the target still evaluates:
    /// array indices and field receivers.
    fn visit_write_target(&mut self, target: NodeId, cur: PgNode) {
        match self.arena.node(target) {
            AstKind::Name { .. } => {}
            AstKind::Paren { expr } => self.visit_write_target(*expr, cur),
            AstKind::ArrayAccess { array, index } => {
                self.visit(*index, cur);
                self.visit_write_target(*array, cur);
            }
            AstKind::FieldAccess { receiver, .. } => self.visit(*receiver, cur),
            _ => self.visit(target, cur),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::test_support::*;
    use crate::ast::{AstArena, UnaryOp};
    use crate::cfg;

    fn facts_for(
        arena: &AstArena,
        method: NodeId,
    ) -> (
        ControlFlowGraph,
        HashMap<PgNode, Vec<Definition>>,
        HashMap<PgNode, Vec<Use>>,
    ) {
        let cfg = cfg::build(arena, method).unwrap();
        let defs = collect_definitions(arena, method, &cfg).unwrap();
        let uses = collect_uses(arena, method, &cfg).unwrap();
        (cfg, defs, uses)
    }

    #[test]
    fn parameters_are_defined_at_entry() {
        let mut arena = AstArena::new();
        let a = name(&mut arena, "a");
        let r = ret(&mut arena, Some(a));
        let m = method(&mut arena, "m", &["a", "b"], vec![r]);

        let (_, defs, uses) = facts_for(&arena, m);
        let entry_defs = &defs[&PgNode::Entry];
        assert_eq!(entry_defs.len(), 2);
        assert_eq!(entry_defs[0].name, "a");
        assert_eq!(entry_defs[1].name, "b");
        // The return's read of `a` lands on the return node.
        assert_eq!(uses[&PgNode::Stmt(r)][0].name, "a");
    }

    #[test]
    fn declaration_and_assignment_attribute_to_their_statements() {
        let mut arena = AstArena::new();
        let one = lit(&mut arena, "1");
        let s1 = decl_stmt(&mut arena, "x", Some(one));
        let x_read = name(&mut arena, "x");
        let x_write = name(&mut arena, "x");
        let s2 = assign_stmt(&mut arena, x_write, x_read);
        let m = method(&mut arena, "m", &[], vec![s1, s2]);

        let (_, defs, uses) = facts_for(&arena, m);
        assert_eq!(defs[&PgNode::Stmt(s1)][0].name, "x");
        assert_eq!(defs[&PgNode::Stmt(s2)][0].name, "x");
        assert_eq!(defs[&PgNode::Stmt(s2)][0].written_node, x_write);
        let s2_uses = &uses[&PgNode::Stmt(s2)];
        assert_eq!(s2_uses.len(), 1);
        assert_eq!(s2_uses[0].read_node, x_read);
    }

    #[test]
    fn array_element_write_redefines_the_array() {
        // a[i] = v
        let mut arena = AstArena::new();
        let a = name(&mut arena, "a");
        let i = name(&mut arena, "i");
        let elem = arena.push(AstKind::ArrayAccess { array: a, index: i });
        let v = name(&mut arena, "v");
        let s = assign_stmt(&mut arena, elem, v);
        let m = method(&mut arena, "m", &[], vec![s]);

        let (_, defs, uses) = facts_for(&arena, m);
        let node_defs = &defs[&PgNode::Stmt(s)];
        assert_eq!(node_defs.len(), 1);
        assert_eq!(node_defs[0].name, "a");
        // The index and the value are still read; the array base is not.
        let names: Vec<&str> = uses[&PgNode::Stmt(s)]
            .iter()
            .map(|u| u.name.as_str())
            .collect();
        assert_eq!(names, vec!["i", "v"]);
    }

    #[test]
    fn qualified_write_defines_the_field_under_its_receiver() {
        // obj.count = v
        let mut arena = AstArena::new();
        let obj = name(&mut arena, "obj");
        let target = field(&mut arena, obj, "count");
        let v = name(&mut arena, "v");
        let s = assign_stmt(&mut arena, target, v);
        let m = method(&mut arena, "m", &[], vec![s]);

        let (_, defs, uses) = facts_for(&arena, m);
        let node_defs = &defs[&PgNode::Stmt(s)];
        assert_eq!(node_defs[0].name, "count");
        assert_eq!(node_defs[0].scope, Some(obj));
        // The receiver is still evaluated.
        let names: Vec<&str> = uses[&PgNode::Stmt(s)]
            .iter()
            .map(|u| u.name.as_str())
            .collect();
        assert!(names.contains(&"obj"));
    }

    #[test]
    fn increment_defines_without_reading() {
        let mut arena = AstArena::new();
        let x = name(&mut arena, "x");
        let inc = arena.push(AstKind::Unary {
            op: UnaryOp::PostInc,
            operand: x,
        });
        let s = arena.push(AstKind::ExprStmt { expr: inc });
        let m = method(&mut arena, "m", &[], vec![s]);

        let (_, defs, uses) = facts_for(&arena, m);
        assert_eq!(defs[&PgNode::Stmt(s)][0].name, "x");
        assert!(uses.get(&PgNode::Stmt(s)).is_none());
    }

    #[test]
    fn qualified_reads_carry_their_receiver_scope() {
        // return obj.count;
        let mut arena = AstArena::new();
        let obj = name(&mut arena, "obj");
        let read = field(&mut arena, obj, "count");
        let r = ret(&mut arena, Some(read));
        let m = method(&mut arena, "m", &[], vec![r]);

        let (_, _, uses) = facts_for(&arena, m);
        let node_uses = &uses[&PgNode::Stmt(r)];
        assert_eq!(node_uses.len(), 2);
        assert_eq!(node_uses[0].name, "count");
        assert_eq!(node_uses[0].scope, Some(obj));
        assert_eq!(node_uses[1].name, "obj");
        assert_eq!(node_uses[1].scope, None);
    }

    #[test]
    fn call_arguments_reset_the_qualifier_scope() {
        // sink.accept(x)
        let mut arena = AstArena::new();
        let sink = name(&mut arena, "sink");
        let x = name(&mut arena, "x");
        let call = arena.push(AstKind::MethodCall {
            receiver: Some(sink),
            name: "accept".to_string(),
            args: vec![x],
        });
        let s = arena.push(AstKind::ExprStmt { expr: call });
        let m = method(&mut arena, "m", &[], vec![s]);

        let (_, _, uses) = facts_for(&arena, m);
        let arg_use = uses[&PgNode::Stmt(s)]
            .iter()
            .find(|u| u.name == "x")
            .unwrap();
        assert_eq!(arg_use.scope, None);
    }

    #[test]
    fn loop_variable_and_catch_binding_define() {
        let mut arena = AstArena::new();
        let var = arena.push(AstKind::Declarator {
            name: "item".to_string(),
            init: None,
        });
        let items = name(&mut arena, "items");
        let body = block(&mut arena, vec![]);
        let each = arena.push(AstKind::ForEach {
            var,
            iterable: items,
            body,
        });
        let catch_body = block(&mut arena, vec![]);
        let catch = arena.push(AstKind::Catch {
            param: "e".to_string(),
            types: vec!["Exception".to_string()],
            body: catch_body,
        });
        let work = call_stmt(&mut arena, "work", vec![]);
        let try_body = block(&mut arena, vec![work]);
        let try_id = arena.push(AstKind::Try {
            resources: vec![],
            body: try_body,
            catches: vec![catch],
            finally: None,
        });
        let m = method(&mut arena, "m", &[], vec![each, try_id]);

        let (_, defs, uses) = facts_for(&arena, m);
        assert_eq!(defs[&PgNode::Stmt(each)][0].name, "item");
        assert_eq!(defs[&PgNode::Stmt(catch)][0].name, "e");
        // The iterable is read at the loop head.
        assert_eq!(uses[&PgNode::Stmt(each)][0].name, "items");
    }

    #[test]
    fn pattern_binding_defines_at_the_test_site() {
        let mut arena = AstArena::new();
        let o = name(&mut arena, "o");
        let test = arena.push(AstKind::InstanceOf {
            expr: o,
            class: "String".to_string(),
            binding: Some("s".to_string()),
        });
        let use_s = name(&mut arena, "s");
        let then = ret(&mut arena, Some(use_s));
        let if_id = arena.push(AstKind::If {
            cond: test,
            then_branch: then,
            else_branch: None,
        });
        let m = method(&mut arena, "m", &[], vec![if_id]);

        let (_, defs, uses) = facts_for(&arena, m);
        assert_eq!(defs[&PgNode::Stmt(if_id)][0].name, "s");
        assert_eq!(uses[&PgNode::Stmt(if_id)][0].name, "o");
    }

    #[test]
    fn lambda_bodies_are_opaque() {
        let mut arena = AstArena::new();
        let captured_write = name(&mut arena, "total");
        let amount = name(&mut arena, "amount");
        let assign = arena.push(AstKind::Assign {
            target: captured_write,
            value: amount,
        });
        let lambda = arena.push(AstKind::Lambda {
            params: vec!["amount".to_string()],
            body: assign,
        });
        let s = call_stmt(&mut arena, "forEach", vec![lambda]);
        let m = method(&mut arena, "m", &[], vec![s]);

        let (_, defs, uses) = facts_for(&arena, m);
        assert!(defs.get(&PgNode::Stmt(s)).is_none());
        assert!(uses.get(&PgNode::Stmt(s)).is_none());
    }

    #[test]
    fn facts_inside_branches_attribute_to_the_nearest_statement_node() {
        let mut arena = AstArena::new();
        let c = name(&mut arena, "c");
        let y = name(&mut arena, "y");
        let s_then = decl_stmt(&mut arena, "x", Some(y));
        let if_id = arena.push(AstKind::If {
            cond: c,
            then_branch: s_then,
            else_branch: None,
        });
        let m = method(&mut arena, "m", &[], vec![if_id]);

        let (_, defs, uses) = facts_for(&arena, m);
        // The condition read belongs to the if node, the declaration to
        // its own statement node.
        assert_eq!(uses[&PgNode::Stmt(if_id)][0].name, "c");
        assert_eq!(defs[&PgNode::Stmt(s_then)][0].name, "x");
        assert_eq!(uses[&PgNode::Stmt(s_then)][0].name, "y");
    }
}
