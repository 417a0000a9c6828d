//! AST construction helpers shared by the integration tests. These play
//! the role of the external parser layer: they populate an arena the
//! same way a real front end would.

#![allow(dead_code)]

use defuse::{AstArena, AstKind, NodeId};

pub fn name(arena: &mut AstArena, n: &str) -> NodeId {
    arena.push(AstKind::Name {
        name: n.to_string(),
    })
}

pub fn lit(arena: &mut AstArena, text: &str) -> NodeId {
    arena.push(AstKind::Literal {
        text: text.to_string(),
    })
}

pub fn field(arena: &mut AstArena, receiver: NodeId, n: &str) -> NodeId {
    arena.push(AstKind::FieldAccess {
        receiver,
        name: n.to_string(),
    })
}

pub fn decl_stmt(arena: &mut AstArena, n: &str, init: Option<NodeId>) -> NodeId {
    let d = arena.push(AstKind::Declarator {
        name: n.to_string(),
        init,
    });
    arena.push(AstKind::LocalDecl {
        declarators: vec![d],
    })
}

pub fn assign_stmt(arena: &mut AstArena, target: NodeId, value: NodeId) -> NodeId {
    let a = arena.push(AstKind::Assign { target, value });
    arena.push(AstKind::ExprStmt { expr: a })
}

pub fn call_stmt(arena: &mut AstArena, n: &str, args: Vec<NodeId>) -> NodeId {
    let c = arena.push(AstKind::MethodCall {
        receiver: None,
        name: n.to_string(),
        args,
    });
    arena.push(AstKind::ExprStmt { expr: c })
}

pub fn ret(arena: &mut AstArena, value: Option<NodeId>) -> NodeId {
    arena.push(AstKind::Return { value })
}

pub fn block(arena: &mut AstArena, stmts: Vec<NodeId>) -> NodeId {
    arena.push(AstKind::Block { stmts })
}

pub fn method(arena: &mut AstArena, n: &str, params: &[&str], stmts: Vec<NodeId>) -> NodeId {
    let params = params
        .iter()
        .map(|p| {
            arena.push(AstKind::Param {
                name: p.to_string(),
            })
        })
        .collect();
    let body = block(arena, stmts);
    arena.push(AstKind::Method {
        name: n.to_string(),
        params,
        body: Some(body),
    })
}
