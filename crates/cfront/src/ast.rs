//! The arena AST. Nodes live in a flat `Vec`, are addressed by [`NodeId`],
//! and carry a source location. A parent side-table is derived once after
//! parsing, so upward walks are O(depth) and allocate nothing.

/// Index of a node within its [`Ast`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A 1-based source position. `Loc::default()` (0:0) marks a synthesized
/// node with no real location.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Loc {
    pub line: u32,
    pub column: u32,
}

/// Unary operators, prefix and postfix.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnaryOp {
    Deref,
    AddressOf,
    Negate,
    Plus,
    LogicalNot,
    BitNot,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

/// Binary operators, including the assignment family and the comma operator.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinaryOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
    LogicalOr,
    LogicalAnd,
    BitOr,
    BitXor,
    BitAnd,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Comma,
}

impl BinaryOp {
    /// Any operator that stores into its left-hand side.
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            Self::Assign
                | Self::AddAssign
                | Self::SubAssign
                | Self::MulAssign
                | Self::DivAssign
                | Self::ModAssign
                | Self::AndAssign
                | Self::OrAssign
                | Self::XorAssign
                | Self::ShlAssign
                | Self::ShrAssign
        )
    }

    /// A plain `=`, which overwrites without reading the left-hand side.
    pub fn is_plain_assignment(self) -> bool {
        self == Self::Assign
    }
}

/// The written type of a cast or declaration. Just enough structure for the
/// two questions the classifier asks: is this `void`, and how many `*`s.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Type {
    /// Canonical specifier text, e.g. `unsigned long` or `struct stat`.
    pub name: String,

    /// Pointer depth of the declarator.
    pub pointers: u8,
}

impl Type {
    /// True for a non-pointer `void`.
    pub fn is_void(&self) -> bool {
        self.pointers == 0 && self.name == "void"
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        for _ in 0..self.pointers {
            write!(f, "*")?;
        }
        Ok(())
    }
}

/// Every node kind the parser produces.
///
/// Expressions in statement position are direct children of their
/// [`NodeKind::Compound`]; there is no expression-statement wrapper.
#[derive(Clone, PartialEq, Debug)]
pub enum NodeKind {
    // Expressions.
    Ident(String),
    IntLit(i64),
    FloatLit(f64),
    StrLit(String),
    CharLit(i64),
    Call {
        callee: NodeId,
        args: Vec<NodeId>,
    },
    Unary {
        op: UnaryOp,
        operand: NodeId,
    },
    Binary {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    Paren(NodeId),
    Cast {
        ty: Type,
        operand: NodeId,
    },
    Member {
        base: NodeId,
        field: String,
        arrow: bool,
    },
    Index {
        base: NodeId,
        index: NodeId,
    },
    Conditional {
        cond: NodeId,
        then_expr: NodeId,
        else_expr: NodeId,
    },
    SizeOfExpr(NodeId),
    SizeOfType(Type),
    InitList(Vec<NodeId>),

    // Statements.
    Compound(Vec<NodeId>),
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
        step: Option<NodeId>,
        body: NodeId,
    },
    Switch {
        cond: NodeId,
        body: NodeId,
    },
    Case {
        value: NodeId,
        body: NodeId,
    },
    Default {
        body: NodeId,
    },
    Label {
        name: String,
        body: NodeId,
    },
    Goto(String),
    Return(Option<NodeId>),
    Break,
    Continue,
    Empty,

    // Declarations.
    VarDecl {
        name: String,
        ty: Type,
        init: Option<NodeId>,
        is_local: bool,
    },
    Function {
        name: String,
        params: Vec<NodeId>,
        body: Option<NodeId>,
    },
}

impl NodeKind {
    /// True for the expression kinds.
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            Self::Ident(_)
                | Self::IntLit(_)
                | Self::FloatLit(_)
                | Self::StrLit(_)
                | Self::CharLit(_)
                | Self::Call { .. }
                | Self::Unary { .. }
                | Self::Binary { .. }
                | Self::Paren(_)
                | Self::Cast { .. }
                | Self::Member { .. }
                | Self::Index { .. }
                | Self::Conditional { .. }
                | Self::SizeOfExpr(_)
                | Self::SizeOfType(_)
                | Self::InitList(_)
        )
    }

    /// Collect this node's children, in syntactic order.
    pub fn children(&self, out: &mut Vec<NodeId>) {
        match self {
            Self::Ident(_)
            | Self::IntLit(_)
            | Self::FloatLit(_)
            | Self::StrLit(_)
            | Self::CharLit(_)
            | Self::SizeOfType(_)
            | Self::Goto(_)
            | Self::Break
            | Self::Continue
            | Self::Empty => {}
            Self::Call { callee, args } => {
                out.push(*callee);
                out.extend(args);
            }
            Self::Unary { operand, .. }
            | Self::Paren(operand)
            | Self::Cast { operand, .. }
            | Self::SizeOfExpr(operand) => out.push(*operand),
            Self::Binary { lhs, rhs, .. } => out.extend([*lhs, *rhs]),
            Self::Member { base, .. } => out.push(*base),
            Self::Index { base, index } => out.extend([*base, *index]),
            Self::Conditional {
                cond,
                then_expr,
                else_expr,
            } => out.extend([*cond, *then_expr, *else_expr]),
            Self::InitList(items) | Self::Compound(items) => out.extend(items),
            Self::If {
                cond,
                then_branch,
                else_branch,
            } => {
                out.extend([*cond, *then_branch]);
                out.extend(else_branch);
            }
            Self::While { cond, body } => out.extend([*cond, *body]),
            Self::DoWhile { body, cond } => out.extend([*body, *cond]),
            Self::For {
                init,
                cond,
                step,
                body,
            } => {
                out.extend(init);
                out.extend(cond);
                out.extend(step);
                out.push(*body);
            }
            Self::Switch { cond, body } => out.extend([*cond, *body]),
            Self::Case { value, body } => out.extend([*value, *body]),
            Self::Default { body } | Self::Label { body, .. } => out.push(*body),
            Self::Return(value) => out.extend(value),
            Self::VarDecl { init, .. } => out.extend(init),
            Self::Function { params, body, .. } => {
                out.extend(params);
                out.extend(body);
            }
        }
    }
}

/// One AST node: a kind plus its source location.
#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub loc: Loc,
}

/// A parsed translation unit.
pub struct Ast {
    file: String,
    nodes: Vec<Node>,
    parents: Vec<Option<NodeId>>,
    roots: Vec<NodeId>,
}

impl Ast {
    /// Assemble the tree and derive the parent side-table.
    pub(crate) fn new(file: String, nodes: Vec<Node>, roots: Vec<NodeId>) -> Self {
        let mut parents = vec![None; nodes.len()];
        let mut children = Vec::new();
        for (index, node) in nodes.iter().enumerate() {
            children.clear();
            node.kind.children(&mut children);
            for child in &children {
                parents[child.index()] = Some(NodeId(index as u32));
            }
        }
        Self {
            file,
            nodes,
            parents,
            roots,
        }
    }

    /// The file name every location in this unit refers to.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// The top-level declarations, in source order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn loc(&self, id: NodeId) -> Loc {
        self.nodes[id.index()].loc
    }

    /// The syntactic parent, or `None` for a root.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents[id.index()]
    }

    /// Children of `id`, in syntactic order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.kind(id).children(&mut out);
        out
    }

    /// Whether `target` lies within the subtree rooted at `root`,
    /// including `target == root`. Walks parent links only.
    pub fn contains(&self, root: NodeId, target: NodeId) -> bool {
        let mut cursor = Some(target);
        while let Some(id) = cursor {
            if id == root {
                return true;
            }
            cursor = self.parent(id);
        }
        false
    }

    /// Visit the subtree rooted at `root` in pre-order.
    pub fn walk(&self, root: NodeId, visit: &mut impl FnMut(NodeId)) {
        visit(root);
        for child in self.children(root) {
            self.walk(child, visit);
        }
    }
}
