//! Arena representation of parsed method ASTs.
//!
//! The parser that produces these trees lives outside this crate; what
//! arrives here is an already-validated method declaration. Nodes are
//! stored in a flat, append-only arena and addressed by [`NodeId`], so
//! node *identity* is the id: two structurally identical sub-expressions
//! at different tree positions are distinct, and every map or set over
//! AST nodes in the analyses is keyed by id, never by structural hashing.
//!
//! [`AstKind`] is a closed enum of the statement and expression forms the
//! analyses dispatch on. Anything else a real parser encounters is
//! represented as [`AstKind::Opaque`] and treated as a simple statement
//! or inert expression.

use serde::Serialize;

/// Stable opaque identifier of one AST node within its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    /// Position of this node in the arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Binary operators. The analyses never interpret them; they are carried
/// so the exporter can label edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

/// Unary operators. The increment/decrement forms are the ones the
/// definition collector dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Neg,
    Not,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnaryOp {
    /// Whether this operator writes its operand.
    pub fn is_update(self) -> bool {
        matches!(
            self,
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec
        )
    }
}

/// One AST node. Child links are arena ids.
#[derive(Debug, Clone, Serialize)]
pub enum AstKind {
    // --- declarations ---
    Method {
        name: String,
        params: Vec<NodeId>,
        body: Option<NodeId>,
    },
    Param {
        name: String,
    },

    // --- statements ---
    Block {
        stmts: Vec<NodeId>,
    },
    LocalDecl {
        declarators: Vec<NodeId>,
    },
    Declarator {
        name: String,
        init: Option<NodeId>,
    },
    ExprStmt {
        expr: NodeId,
    },
    If {
        cond: NodeId,
        then_branch: NodeId,
        else_branch: Option<NodeId>,
    },
    While {
        cond: NodeId,
        body: NodeId,
    },
    DoWhile {
        body: NodeId,
        cond: NodeId,
    },
    For {
        init: Vec<NodeId>,
        cond: Option<NodeId>,
        update: Vec<NodeId>,
        body: NodeId,
    },
    /// Enhanced-for; `var` is a [`AstKind::Declarator`] without initializer.
    ForEach {
        var: NodeId,
        iterable: NodeId,
        body: NodeId,
    },
    Switch {
        selector: NodeId,
        cases: Vec<NodeId>,
    },
    /// One switch entry. Multi-label grouping (`case 1: case 2: body`)
    /// is a single `Case` with several labels.
    Case {
        labels: Vec<NodeId>,
        stmts: Vec<NodeId>,
        default: bool,
    },
    Break {
        label: Option<String>,
    },
    Continue {
        label: Option<String>,
    },
    Return {
        value: Option<NodeId>,
    },
    Throw {
        expr: NodeId,
    },
    Assert {
        cond: NodeId,
        detail: Option<NodeId>,
    },
    Labeled {
        label: String,
        stmt: NodeId,
    },
    Try {
        /// Try-with-resources declarators, in source order.
        resources: Vec<NodeId>,
        body: NodeId,
        catches: Vec<NodeId>,
        finally: Option<NodeId>,
    },
    Catch {
        param: String,
        /// Declared exception type names; more than one for multi-catch.
        types: Vec<String>,
        body: NodeId,
    },

    // --- expressions ---
    Name {
        name: String,
    },
    FieldAccess {
        receiver: NodeId,
        name: String,
    },
    ArrayAccess {
        array: NodeId,
        index: NodeId,
    },
    Assign {
        target: NodeId,
        value: NodeId,
    },
    Binary {
        op: BinOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Unary {
        op: UnaryOp,
        operand: NodeId,
    },
    MethodCall {
        receiver: Option<NodeId>,
        name: String,
        args: Vec<NodeId>,
    },
    /// Object creation; `class` is the textual type name, which is all
    /// the exception matching in the CFG builder looks at.
    New {
        class: String,
        args: Vec<NodeId>,
    },
    Conditional {
        cond: NodeId,
        then_expr: NodeId,
        else_expr: NodeId,
    },
    InstanceOf {
        expr: NodeId,
        class: String,
        /// Pattern binding (`x instanceof Foo f`), when present.
        binding: Option<String>,
    },
    /// Lambda bodies are opaque to every analysis in this crate.
    Lambda {
        params: Vec<String>,
        body: NodeId,
    },
    Literal {
        text: String,
    },
    Paren {
        expr: NodeId,
    },
    /// Catch-all for constructs the analyses do not dispatch on.
    Opaque,
}

/// Append-only arena owning every node of one or more parsed methods.
#[derive(Debug, Default, Clone, Serialize)]
pub struct AstArena {
    nodes: Vec<AstKind>,
}

impl AstArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node and return its id.
    pub fn push(&mut self, kind: AstKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(kind);
        id
    }

    /// Look up a node. Ids are only handed out by [`push`](Self::push),
    /// so an id is always valid for the arena it came from.
    pub fn node(&self, id: NodeId) -> &AstKind {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Structural equality of two subtrees, ignoring node identity.
    ///
    /// Only the qualifier shapes that can appear as fact scopes compare
    /// structurally (names, field accesses, array accesses, calls,
    /// literals, parentheses); any other pair is equal only when it is
    /// the same node.
    pub fn structurally_equal(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }
        match (self.node(a), self.node(b)) {
            (AstKind::Name { name: na }, AstKind::Name { name: nb }) => na == nb,
            (AstKind::Literal { text: ta }, AstKind::Literal { text: tb }) => ta == tb,
            (
                AstKind::FieldAccess {
                    receiver: ra,
                    name: na,
                },
                AstKind::FieldAccess {
                    receiver: rb,
                    name: nb,
                },
            ) => na == nb && self.structurally_equal(*ra, *rb),
            (
                AstKind::ArrayAccess {
                    array: aa,
                    index: ia,
                },
                AstKind::ArrayAccess {
                    array: ab,
                    index: ib,
                },
            ) => self.structurally_equal(*aa, *ab) && self.structurally_equal(*ia, *ib),
            (
                AstKind::MethodCall {
                    receiver: ra,
                    name: na,
                    args: aa,
                },
                AstKind::MethodCall {
                    receiver: rb,
                    name: nb,
                    args: ab,
                },
            ) => {
                na == nb
                    && aa.len() == ab.len()
                    && match (ra, rb) {
                        (None, None) => true,
                        (Some(x), Some(y)) => self.structurally_equal(*x, *y),
                        _ => false,
                    }
                    && aa
                        .iter()
                        .zip(ab.iter())
                        .all(|(x, y)| self.structurally_equal(*x, *y))
            }
            (AstKind::Paren { expr: ea }, _) => self.structurally_equal(*ea, b),
            (_, AstKind::Paren { expr: eb }) => self.structurally_equal(a, *eb),
            _ => false,
        }
    }

    /// Dotted path of a qualifier chain (`obj`, `this.inner`, `a`), or
    /// `None` when the expression is not a simple addressable path.
    /// Array indices are dropped: `a[i]` renders as `a`.
    pub fn render_path(&self, id: NodeId) -> Option<String> {
        match self.node(id) {
            AstKind::Name { name } => Some(name.clone()),
            AstKind::FieldAccess { receiver, name } => {
                let base = self.render_path(*receiver)?;
                Some(format!("{base}.{name}"))
            }
            AstKind::ArrayAccess { array, .. } => self.render_path(*array),
            AstKind::Paren { expr } => self.render_path(*expr),
            _ => None,
        }
    }
}
