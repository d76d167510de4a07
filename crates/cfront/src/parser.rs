//! Recursive-descent parser with precedence climbing for expressions.
//!
//! Constructs the frontend does not model (typedef bodies, struct/union/enum
//! member lists) are skipped over balanced delimiters rather than parsed, so
//! ordinary C files remain analyzable without a full type system.

use crate::{
    Error,
    ast::{Ast, BinaryOp, Loc, Node, NodeId, NodeKind, Type, UnaryOp},
    lexer::{Keyword, Punct, Token, TokenKind},
};

/// Accumulated declaration specifiers.
struct DeclSpec {
    /// Joined type words, e.g. `unsigned long` or `struct stat`.
    ty: String,
    is_static: bool,
    is_extern: bool,
    is_typedef: bool,
}

/// One declarator: pointers plus a name.
struct Declarator {
    pointers: u8,
    name: String,
    loc: Loc,
}

pub(crate) struct Parser {
    file: String,
    tokens: Vec<Token>,
    pos: usize,
    nodes: Vec<Node>,
}

impl Parser {
    pub(crate) fn new(file: String, tokens: Vec<Token>) -> Self {
        Self {
            file,
            tokens,
            pos: 0,
            nodes: Vec::new(),
        }
    }

    pub(crate) fn parse(mut self) -> Result<Ast, Error> {
        let mut roots = Vec::new();
        while self.pos < self.tokens.len() {
            if self.eat_punct(Punct::Semi) {
                continue;
            }
            roots.append(&mut self.parse_external()?);
        }
        Ok(Ast::new(self.file, self.nodes, roots))
    }

    // Token plumbing.

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn here(&self) -> Loc {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.loc)
            .unwrap_or_default()
    }

    fn at_punct(&self, punct: Punct) -> bool {
        matches!(self.peek(), Some(TokenKind::Punct(p)) if *p == punct)
    }

    fn eat_punct(&mut self, punct: Punct) -> bool {
        if self.at_punct(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: Punct, context: &str) -> Result<Loc, Error> {
        let loc = self.here();
        if self.eat_punct(punct) {
            Ok(loc)
        } else {
            Err(self.error(format!("expected `{punct:?}` {context}")))
        }
    }

    fn at_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.peek(), Some(TokenKind::Keyword(k)) if *k == keyword)
    }

    fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self, context: &str) -> Result<(String, Loc), Error> {
        let loc = self.here();
        match self.peek() {
            Some(TokenKind::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok((name, loc))
            }
            _ => Err(self.error(format!("expected identifier {context}"))),
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        let loc = self.here();
        Error::Parse {
            line: loc.line,
            column: loc.column,
            message: message.into(),
        }
    }

    fn add(&mut self, kind: NodeKind, loc: Loc) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, loc });
        id
    }

    fn node_loc(&self, id: NodeId) -> Loc {
        self.nodes[id.index()].loc
    }

    // Declarations.

    fn is_type_specifier(keyword: Keyword) -> bool {
        matches!(
            keyword,
            Keyword::Void
                | Keyword::Char
                | Keyword::Short
                | Keyword::Int
                | Keyword::Long
                | Keyword::Float
                | Keyword::Double
                | Keyword::Signed
                | Keyword::Unsigned
        )
    }

    fn is_decl_start(&self) -> bool {
        match self.peek() {
            Some(TokenKind::Keyword(k)) => {
                Self::is_type_specifier(*k)
                    || matches!(
                        k,
                        Keyword::Const
                            | Keyword::Volatile
                            | Keyword::Restrict
                            | Keyword::Static
                            | Keyword::Extern
                            | Keyword::Register
                            | Keyword::Inline
                            | Keyword::Typedef
                            | Keyword::Struct
                            | Keyword::Union
                            | Keyword::Enum
                    )
            }
            _ => false,
        }
    }

    fn parse_decl_spec(&mut self) -> Result<DeclSpec, Error> {
        let mut words: Vec<String> = Vec::new();
        let mut spec = DeclSpec {
            ty: String::new(),
            is_static: false,
            is_extern: false,
            is_typedef: false,
        };
        loop {
            match self.peek() {
                Some(TokenKind::Keyword(k)) if Self::is_type_specifier(*k) => {
                    words.push(k.spelling().to_string());
                    self.pos += 1;
                }
                Some(TokenKind::Keyword(
                    Keyword::Const | Keyword::Volatile | Keyword::Restrict | Keyword::Register
                    | Keyword::Inline,
                )) => self.pos += 1,
                Some(TokenKind::Keyword(Keyword::Static)) => {
                    spec.is_static = true;
                    self.pos += 1;
                }
                Some(TokenKind::Keyword(Keyword::Extern)) => {
                    spec.is_extern = true;
                    self.pos += 1;
                }
                Some(TokenKind::Keyword(Keyword::Typedef)) => {
                    spec.is_typedef = true;
                    self.pos += 1;
                }
                Some(TokenKind::Keyword(tag @ (Keyword::Struct | Keyword::Union | Keyword::Enum))) => {
                    let mut word = tag.spelling().to_string();
                    self.pos += 1;
                    if let Some(TokenKind::Ident(name)) = self.peek() {
                        word.push(' ');
                        word.push_str(name);
                        self.pos += 1;
                    }
                    // Member/enumerator lists are not modeled; skip the body.
                    if self.at_punct(Punct::LBrace) {
                        self.skip_balanced(Punct::LBrace, Punct::RBrace)?;
                    }
                    words.push(word);
                }
                Some(TokenKind::Ident(name))
                    if words.is_empty()
                        && looks_like_typedef_name(name)
                        && matches!(
                            self.peek_at(1),
                            Some(TokenKind::Ident(_)) | Some(TokenKind::Punct(Punct::Star))
                        ) =>
                {
                    words.push(name.clone());
                    self.pos += 1;
                }
                _ => break,
            }
        }
        if words.is_empty() {
            return Err(self.error("expected a type"));
        }
        spec.ty = words.join(" ");
        Ok(spec)
    }

    fn parse_declarator(&mut self) -> Result<Declarator, Error> {
        let mut pointers: u8 = 0;
        loop {
            if self.eat_punct(Punct::Star) {
                pointers = pointers.saturating_add(1);
            } else if self.eat_keyword(Keyword::Const)
                || self.eat_keyword(Keyword::Volatile)
                || self.eat_keyword(Keyword::Restrict)
            {
            } else {
                break;
            }
        }
        let (name, loc) = self.expect_ident("in declarator")?;
        self.skip_array_suffixes()?;
        Ok(Declarator {
            pointers,
            name,
            loc,
        })
    }

    /// Array extents do not participate in classification; consume them.
    fn skip_array_suffixes(&mut self) -> Result<(), Error> {
        while self.eat_punct(Punct::LBracket) {
            if !self.at_punct(Punct::RBracket) {
                let _ = self.parse_assign()?;
            }
            let _ = self.expect_punct(Punct::RBracket, "after array extent")?;
        }
        Ok(())
    }

    fn skip_balanced(&mut self, open: Punct, close: Punct) -> Result<(), Error> {
        let _ = self.expect_punct(open, "to open")?;
        let mut depth = 1usize;
        loop {
            match self.peek() {
                None => return Err(self.error("unexpected end of input in skipped construct")),
                Some(TokenKind::Punct(p)) if *p == open => depth += 1,
                Some(TokenKind::Punct(p)) if *p == close => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return Ok(());
                    }
                }
                Some(_) => {}
            }
            self.pos += 1;
        }
    }

    fn skip_to_semi(&mut self) -> Result<(), Error> {
        loop {
            match self.peek() {
                None => return Err(self.error("unexpected end of input before `;`")),
                Some(TokenKind::Punct(Punct::Semi)) => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(TokenKind::Punct(Punct::LBrace)) => {
                    self.skip_balanced(Punct::LBrace, Punct::RBrace)?;
                }
                Some(TokenKind::Punct(Punct::LParen)) => {
                    self.skip_balanced(Punct::LParen, Punct::RParen)?;
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn parse_external(&mut self) -> Result<Vec<NodeId>, Error> {
        if !self.is_decl_start() && !matches!(self.peek(), Some(TokenKind::Ident(_))) {
            return Err(self.error("expected a declaration"));
        }
        let spec = self.parse_decl_spec()?;
        if spec.is_typedef {
            self.skip_to_semi()?;
            return Ok(Vec::new());
        }
        // A bare `struct foo { ... };` declares a type, not an object.
        if self.eat_punct(Punct::Semi) {
            return Ok(Vec::new());
        }
        let declarator = self.parse_declarator()?;
        if self.at_punct(Punct::LParen) {
            return Ok(vec![self.parse_function(declarator)?]);
        }
        let decls = self.parse_init_declarators(&spec, declarator, false)?;
        let _ = self.expect_punct(Punct::Semi, "after declaration")?;
        Ok(decls)
    }

    fn parse_init_declarators(
        &mut self,
        spec: &DeclSpec,
        first: Declarator,
        is_local: bool,
    ) -> Result<Vec<NodeId>, Error> {
        let local = is_local && !spec.is_static && !spec.is_extern;
        let mut decls = Vec::new();
        let mut declarator = first;
        loop {
            let init = if self.eat_punct(Punct::Assign) {
                Some(self.parse_initializer()?)
            } else {
                None
            };
            let kind = NodeKind::VarDecl {
                name: declarator.name,
                ty: Type {
                    name: spec.ty.clone(),
                    pointers: declarator.pointers,
                },
                init,
                is_local: local,
            };
            decls.push(self.add(kind, declarator.loc));
            if !self.eat_punct(Punct::Comma) {
                break;
            }
            declarator = self.parse_declarator()?;
        }
        Ok(decls)
    }

    fn parse_initializer(&mut self) -> Result<NodeId, Error> {
        if self.at_punct(Punct::LBrace) {
            let loc = self.here();
            self.pos += 1;
            let mut items = Vec::new();
            if !self.at_punct(Punct::RBrace) {
                loop {
                    items.push(self.parse_initializer()?);
                    if !self.eat_punct(Punct::Comma) || self.at_punct(Punct::RBrace) {
                        break;
                    }
                }
            }
            let _ = self.expect_punct(Punct::RBrace, "after initializer list")?;
            Ok(self.add(NodeKind::InitList(items), loc))
        } else {
            self.parse_assign()
        }
    }

    fn parse_function(&mut self, declarator: Declarator) -> Result<NodeId, Error> {
        let _ = self.expect_punct(Punct::LParen, "after function name")?;
        let params = self.parse_params()?;
        let _ = self.expect_punct(Punct::RParen, "after parameters")?;
        let body = if self.eat_punct(Punct::Semi) {
            None
        } else {
            Some(self.parse_compound()?)
        };
        Ok(self.add(
            NodeKind::Function {
                name: declarator.name,
                params,
                body,
            },
            declarator.loc,
        ))
    }

    fn parse_params(&mut self) -> Result<Vec<NodeId>, Error> {
        let mut params = Vec::new();
        if self.at_punct(Punct::RParen) {
            return Ok(params);
        }
        if self.at_keyword(Keyword::Void)
            && matches!(self.peek_at(1), Some(TokenKind::Punct(Punct::RParen)))
        {
            self.pos += 1;
            return Ok(params);
        }
        loop {
            if self.eat_punct(Punct::Ellipsis) {
                break;
            }
            let spec = self.parse_decl_spec()?;
            let mut pointers: u8 = 0;
            loop {
                if self.eat_punct(Punct::Star) {
                    pointers = pointers.saturating_add(1);
                } else if self.eat_keyword(Keyword::Const)
                    || self.eat_keyword(Keyword::Volatile)
                    || self.eat_keyword(Keyword::Restrict)
                {
                } else {
                    break;
                }
            }
            let (name, loc) = match self.peek() {
                Some(TokenKind::Ident(_)) => {
                    let (name, loc) = self.expect_ident("in parameter")?;
                    (name, loc)
                }
                _ => (String::new(), self.here()),
            };
            self.skip_array_suffixes()?;
            params.push(self.add(
                NodeKind::VarDecl {
                    name,
                    ty: Type {
                        name: spec.ty,
                        pointers,
                    },
                    init: None,
                    is_local: true,
                },
                loc,
            ));
            if !self.eat_punct(Punct::Comma) {
                break;
            }
        }
        Ok(params)
    }

    // Statements.

    fn parse_compound(&mut self) -> Result<NodeId, Error> {
        let loc = self.expect_punct(Punct::LBrace, "to open block")?;
        let mut stmts = Vec::new();
        while !self.eat_punct(Punct::RBrace) {
            if self.peek().is_none() {
                return Err(self.error("unexpected end of input in block"));
            }
            stmts.append(&mut self.parse_block_item()?);
        }
        Ok(self.add(NodeKind::Compound(stmts), loc))
    }

    /// One block item: a declaration (one node per declarator, so the
    /// tracker sees each as its own sibling statement) or a statement.
    fn parse_block_item(&mut self) -> Result<Vec<NodeId>, Error> {
        if self.is_decl_start() {
            let spec = self.parse_decl_spec()?;
            if spec.is_typedef {
                self.skip_to_semi()?;
                return Ok(Vec::new());
            }
            if self.eat_punct(Punct::Semi) {
                return Ok(Vec::new());
            }
            let declarator = self.parse_declarator()?;
            let decls = self.parse_init_declarators(&spec, declarator, true)?;
            let _ = self.expect_punct(Punct::Semi, "after declaration")?;
            Ok(decls)
        } else {
            Ok(vec![self.parse_statement()?])
        }
    }

    fn parse_statement(&mut self) -> Result<NodeId, Error> {
        let loc = self.here();
        match self.peek() {
            Some(TokenKind::Punct(Punct::LBrace)) => self.parse_compound(),
            Some(TokenKind::Punct(Punct::Semi)) => {
                self.pos += 1;
                Ok(self.add(NodeKind::Empty, loc))
            }
            Some(TokenKind::Keyword(Keyword::If)) => {
                self.pos += 1;
                let _ = self.expect_punct(Punct::LParen, "after `if`")?;
                let cond = self.parse_expr()?;
                let _ = self.expect_punct(Punct::RParen, "after condition")?;
                let then_branch = self.parse_statement()?;
                let else_branch = if self.eat_keyword(Keyword::Else) {
                    Some(self.parse_statement()?)
                } else {
                    None
                };
                Ok(self.add(
                    NodeKind::If {
                        cond,
                        then_branch,
                        else_branch,
                    },
                    loc,
                ))
            }
            Some(TokenKind::Keyword(Keyword::While)) => {
                self.pos += 1;
                let _ = self.expect_punct(Punct::LParen, "after `while`")?;
                let cond = self.parse_expr()?;
                let _ = self.expect_punct(Punct::RParen, "after condition")?;
                let body = self.parse_statement()?;
                Ok(self.add(NodeKind::While { cond, body }, loc))
            }
            Some(TokenKind::Keyword(Keyword::Do)) => {
                self.pos += 1;
                let body = self.parse_statement()?;
                if !self.eat_keyword(Keyword::While) {
                    return Err(self.error("expected `while` after `do` body"));
                }
                let _ = self.expect_punct(Punct::LParen, "after `while`")?;
                let cond = self.parse_expr()?;
                let _ = self.expect_punct(Punct::RParen, "after condition")?;
                let _ = self.expect_punct(Punct::Semi, "after `do`/`while`")?;
                Ok(self.add(NodeKind::DoWhile { body, cond }, loc))
            }
            Some(TokenKind::Keyword(Keyword::For)) => {
                self.pos += 1;
                let _ = self.expect_punct(Punct::LParen, "after `for`")?;
                let init = if self.eat_punct(Punct::Semi) {
                    Vec::new()
                } else if self.is_decl_start() {
                    let spec = self.parse_decl_spec()?;
                    let declarator = self.parse_declarator()?;
                    let decls = self.parse_init_declarators(&spec, declarator, true)?;
                    let _ = self.expect_punct(Punct::Semi, "after `for` initializer")?;
                    decls
                } else {
                    let expr = self.parse_expr()?;
                    let _ = self.expect_punct(Punct::Semi, "after `for` initializer")?;
                    vec![expr]
                };
                let cond = if self.at_punct(Punct::Semi) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                let _ = self.expect_punct(Punct::Semi, "after `for` condition")?;
                let step = if self.at_punct(Punct::RParen) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                let _ = self.expect_punct(Punct::RParen, "after `for` header")?;
                let body = self.parse_statement()?;
                Ok(self.add(
                    NodeKind::For {
                        init,
                        cond,
                        step,
                        body,
                    },
                    loc,
                ))
            }
            Some(TokenKind::Keyword(Keyword::Switch)) => {
                self.pos += 1;
                let _ = self.expect_punct(Punct::LParen, "after `switch`")?;
                let cond = self.parse_expr()?;
                let _ = self.expect_punct(Punct::RParen, "after condition")?;
                let body = self.parse_statement()?;
                Ok(self.add(NodeKind::Switch { cond, body }, loc))
            }
            Some(TokenKind::Keyword(Keyword::Case)) => {
                self.pos += 1;
                let value = self.parse_conditional()?;
                let _ = self.expect_punct(Punct::Colon, "after `case` value")?;
                let body = self.parse_substatement()?;
                Ok(self.add(NodeKind::Case { value, body }, loc))
            }
            Some(TokenKind::Keyword(Keyword::Default)) => {
                self.pos += 1;
                let _ = self.expect_punct(Punct::Colon, "after `default`")?;
                let body = self.parse_substatement()?;
                Ok(self.add(NodeKind::Default { body }, loc))
            }
            Some(TokenKind::Keyword(Keyword::Return)) => {
                self.pos += 1;
                let value = if self.at_punct(Punct::Semi) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                let _ = self.expect_punct(Punct::Semi, "after `return`")?;
                Ok(self.add(NodeKind::Return(value), loc))
            }
            Some(TokenKind::Keyword(Keyword::Break)) => {
                self.pos += 1;
                let _ = self.expect_punct(Punct::Semi, "after `break`")?;
                Ok(self.add(NodeKind::Break, loc))
            }
            Some(TokenKind::Keyword(Keyword::Continue)) => {
                self.pos += 1;
                let _ = self.expect_punct(Punct::Semi, "after `continue`")?;
                Ok(self.add(NodeKind::Continue, loc))
            }
            Some(TokenKind::Keyword(Keyword::Goto)) => {
                self.pos += 1;
                let (name, _) = self.expect_ident("after `goto`")?;
                let _ = self.expect_punct(Punct::Semi, "after `goto` label")?;
                Ok(self.add(NodeKind::Goto(name), loc))
            }
            Some(TokenKind::Ident(_))
                if matches!(self.peek_at(1), Some(TokenKind::Punct(Punct::Colon))) =>
            {
                let (name, _) = self.expect_ident("as label")?;
                self.pos += 1;
                let body = self.parse_substatement()?;
                Ok(self.add(NodeKind::Label { name, body }, loc))
            }
            Some(_) => {
                let expr = self.parse_expr()?;
                let _ = self.expect_punct(Punct::Semi, "after expression")?;
                Ok(expr)
            }
            None => Err(self.error("expected a statement")),
        }
    }

    /// The substatement of a `case`/`default`/label. A label hanging at the
    /// end of a block gets an empty statement.
    fn parse_substatement(&mut self) -> Result<NodeId, Error> {
        if self.at_punct(Punct::RBrace) {
            let loc = self.here();
            Ok(self.add(NodeKind::Empty, loc))
        } else {
            self.parse_statement()
        }
    }

    // Expressions, precedence climbing.

    fn parse_expr(&mut self) -> Result<NodeId, Error> {
        let mut lhs = self.parse_assign()?;
        while self.eat_punct(Punct::Comma) {
            let rhs = self.parse_assign()?;
            let loc = self.node_loc(lhs);
            lhs = self.add(
                NodeKind::Binary {
                    op: BinaryOp::Comma,
                    lhs,
                    rhs,
                },
                loc,
            );
        }
        Ok(lhs)
    }

    fn parse_assign(&mut self) -> Result<NodeId, Error> {
        let lhs = self.parse_conditional()?;
        let op = match self.peek() {
            Some(TokenKind::Punct(Punct::Assign)) => BinaryOp::Assign,
            Some(TokenKind::Punct(Punct::PlusAssign)) => BinaryOp::AddAssign,
            Some(TokenKind::Punct(Punct::MinusAssign)) => BinaryOp::SubAssign,
            Some(TokenKind::Punct(Punct::StarAssign)) => BinaryOp::MulAssign,
            Some(TokenKind::Punct(Punct::SlashAssign)) => BinaryOp::DivAssign,
            Some(TokenKind::Punct(Punct::PercentAssign)) => BinaryOp::ModAssign,
            Some(TokenKind::Punct(Punct::AmpAssign)) => BinaryOp::AndAssign,
            Some(TokenKind::Punct(Punct::PipeAssign)) => BinaryOp::OrAssign,
            Some(TokenKind::Punct(Punct::CaretAssign)) => BinaryOp::XorAssign,
            Some(TokenKind::Punct(Punct::ShlAssign)) => BinaryOp::ShlAssign,
            Some(TokenKind::Punct(Punct::ShrAssign)) => BinaryOp::ShrAssign,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_assign()?;
        let loc = self.node_loc(lhs);
        Ok(self.add(NodeKind::Binary { op, lhs, rhs }, loc))
    }

    fn parse_conditional(&mut self) -> Result<NodeId, Error> {
        let cond = self.parse_binary(1)?;
        if !self.eat_punct(Punct::Question) {
            return Ok(cond);
        }
        let then_expr = self.parse_expr()?;
        let _ = self.expect_punct(Punct::Colon, "in conditional expression")?;
        let else_expr = self.parse_conditional()?;
        let loc = self.node_loc(cond);
        Ok(self.add(
            NodeKind::Conditional {
                cond,
                then_expr,
                else_expr,
            },
            loc,
        ))
    }

    fn binary_op(&self) -> Option<(BinaryOp, u8)> {
        let punct = match self.peek() {
            Some(TokenKind::Punct(p)) => *p,
            _ => return None,
        };
        Some(match punct {
            Punct::OrOr => (BinaryOp::LogicalOr, 1),
            Punct::AndAnd => (BinaryOp::LogicalAnd, 2),
            Punct::Pipe => (BinaryOp::BitOr, 3),
            Punct::Caret => (BinaryOp::BitXor, 4),
            Punct::Amp => (BinaryOp::BitAnd, 5),
            Punct::EqEq => (BinaryOp::Equal, 6),
            Punct::NotEq => (BinaryOp::NotEqual, 6),
            Punct::Lt => (BinaryOp::Less, 7),
            Punct::Gt => (BinaryOp::Greater, 7),
            Punct::Le => (BinaryOp::LessEqual, 7),
            Punct::Ge => (BinaryOp::GreaterEqual, 7),
            Punct::Shl => (BinaryOp::Shl, 8),
            Punct::Shr => (BinaryOp::Shr, 8),
            Punct::Plus => (BinaryOp::Add, 9),
            Punct::Minus => (BinaryOp::Sub, 9),
            Punct::Star => (BinaryOp::Mul, 10),
            Punct::Slash => (BinaryOp::Div, 10),
            Punct::Percent => (BinaryOp::Mod, 10),
            _ => return None,
        })
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<NodeId, Error> {
        let mut lhs = self.parse_unary()?;
        while let Some((op, prec)) = self.binary_op() {
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let rhs = self.parse_binary(prec + 1)?;
            let loc = self.node_loc(lhs);
            lhs = self.add(NodeKind::Binary { op, lhs, rhs }, loc);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<NodeId, Error> {
        let loc = self.here();
        let op = match self.peek() {
            Some(TokenKind::Punct(Punct::Star)) => Some(UnaryOp::Deref),
            Some(TokenKind::Punct(Punct::Amp)) => Some(UnaryOp::AddressOf),
            Some(TokenKind::Punct(Punct::Minus)) => Some(UnaryOp::Negate),
            Some(TokenKind::Punct(Punct::Plus)) => Some(UnaryOp::Plus),
            Some(TokenKind::Punct(Punct::Not)) => Some(UnaryOp::LogicalNot),
            Some(TokenKind::Punct(Punct::Tilde)) => Some(UnaryOp::BitNot),
            Some(TokenKind::Punct(Punct::Increment)) => Some(UnaryOp::PreIncrement),
            Some(TokenKind::Punct(Punct::Decrement)) => Some(UnaryOp::PreDecrement),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let operand = self.parse_unary()?;
            return Ok(self.add(NodeKind::Unary { op, operand }, loc));
        }
        if self.eat_keyword(Keyword::SizeOf) {
            if self.at_punct(Punct::LParen) && self.peek_type_in_parens() {
                self.pos += 1;
                let ty = self.parse_type_name()?;
                let _ = self.expect_punct(Punct::RParen, "after `sizeof` type")?;
                return Ok(self.add(NodeKind::SizeOfType(ty), loc));
            }
            let operand = self.parse_unary()?;
            return Ok(self.add(NodeKind::SizeOfExpr(operand), loc));
        }
        if self.at_punct(Punct::LParen) && self.peek_type_in_parens() {
            self.pos += 1;
            let ty = self.parse_type_name()?;
            let _ = self.expect_punct(Punct::RParen, "after cast type")?;
            let operand = self.parse_unary()?;
            return Ok(self.add(NodeKind::Cast { ty, operand }, loc));
        }
        self.parse_postfix()
    }

    /// Lookahead for `( type-name )`. Builtin type words always win; a lone
    /// identifier is accepted only under the `_t`-suffix typedef heuristic.
    fn peek_type_in_parens(&self) -> bool {
        let mut index = self.pos + 1;
        let mut saw_type = false;
        loop {
            match self.tokens.get(index).map(|t| &t.kind) {
                Some(TokenKind::Keyword(k)) if Self::is_type_specifier(*k) => {
                    saw_type = true;
                    index += 1;
                }
                Some(TokenKind::Keyword(
                    Keyword::Const | Keyword::Volatile | Keyword::Restrict,
                )) => index += 1,
                Some(TokenKind::Keyword(Keyword::Struct | Keyword::Union | Keyword::Enum)) => {
                    index += 1;
                    if let Some(TokenKind::Ident(_)) = self.tokens.get(index).map(|t| &t.kind) {
                        index += 1;
                    }
                    saw_type = true;
                }
                Some(TokenKind::Ident(name)) if !saw_type && looks_like_typedef_name(name) => {
                    saw_type = true;
                    index += 1;
                }
                Some(TokenKind::Punct(Punct::Star)) if saw_type => index += 1,
                Some(TokenKind::Punct(Punct::RParen)) => return saw_type,
                _ => return false,
            }
        }
    }

    fn parse_type_name(&mut self) -> Result<Type, Error> {
        let mut words: Vec<String> = Vec::new();
        loop {
            match self.peek() {
                Some(TokenKind::Keyword(k)) if Self::is_type_specifier(*k) => {
                    words.push(k.spelling().to_string());
                    self.pos += 1;
                }
                Some(TokenKind::Keyword(
                    Keyword::Const | Keyword::Volatile | Keyword::Restrict,
                )) => self.pos += 1,
                Some(TokenKind::Keyword(tag @ (Keyword::Struct | Keyword::Union | Keyword::Enum))) => {
                    let mut word = tag.spelling().to_string();
                    self.pos += 1;
                    if let Some(TokenKind::Ident(name)) = self.peek() {
                        word.push(' ');
                        word.push_str(name);
                        self.pos += 1;
                    }
                    words.push(word);
                }
                Some(TokenKind::Ident(name))
                    if words.is_empty() && looks_like_typedef_name(name) =>
                {
                    words.push(name.clone());
                    self.pos += 1;
                }
                _ => break,
            }
        }
        if words.is_empty() {
            return Err(self.error("expected a type name"));
        }
        let mut pointers: u8 = 0;
        loop {
            if self.eat_punct(Punct::Star) {
                pointers = pointers.saturating_add(1);
            } else if self.eat_keyword(Keyword::Const)
                || self.eat_keyword(Keyword::Volatile)
                || self.eat_keyword(Keyword::Restrict)
            {
            } else {
                break;
            }
        }
        Ok(Type {
            name: words.join(" "),
            pointers,
        })
    }

    fn parse_postfix(&mut self) -> Result<NodeId, Error> {
        let mut expr = self.parse_primary()?;
        loop {
            let loc = self.node_loc(expr);
            if self.eat_punct(Punct::LParen) {
                let mut args = Vec::new();
                if !self.at_punct(Punct::RParen) {
                    loop {
                        args.push(self.parse_assign()?);
                        if !self.eat_punct(Punct::Comma) {
                            break;
                        }
                    }
                }
                let _ = self.expect_punct(Punct::RParen, "after call arguments")?;
                expr = self.add(NodeKind::Call { callee: expr, args }, loc);
            } else if self.eat_punct(Punct::LBracket) {
                let index = self.parse_expr()?;
                let _ = self.expect_punct(Punct::RBracket, "after index")?;
                expr = self.add(NodeKind::Index { base: expr, index }, loc);
            } else if self.eat_punct(Punct::Dot) {
                let (field, _) = self.expect_ident("after `.`")?;
                expr = self.add(
                    NodeKind::Member {
                        base: expr,
                        field,
                        arrow: false,
                    },
                    loc,
                );
            } else if self.eat_punct(Punct::Arrow) {
                let (field, _) = self.expect_ident("after `->`")?;
                expr = self.add(
                    NodeKind::Member {
                        base: expr,
                        field,
                        arrow: true,
                    },
                    loc,
                );
            } else if self.eat_punct(Punct::Increment) {
                expr = self.add(
                    NodeKind::Unary {
                        op: UnaryOp::PostIncrement,
                        operand: expr,
                    },
                    loc,
                );
            } else if self.eat_punct(Punct::Decrement) {
                expr = self.add(
                    NodeKind::Unary {
                        op: UnaryOp::PostDecrement,
                        operand: expr,
                    },
                    loc,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<NodeId, Error> {
        let loc = self.here();
        let kind = match self.peek() {
            Some(TokenKind::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                NodeKind::Ident(name)
            }
            Some(TokenKind::Int(value)) => {
                let value = *value;
                self.pos += 1;
                NodeKind::IntLit(value)
            }
            Some(TokenKind::Float(value)) => {
                let value = *value;
                self.pos += 1;
                NodeKind::FloatLit(value)
            }
            Some(TokenKind::Char(value)) => {
                let value = *value;
                self.pos += 1;
                NodeKind::CharLit(value)
            }
            Some(TokenKind::Str(value)) => {
                // Adjacent string literals concatenate.
                let mut value = value.clone();
                self.pos += 1;
                while let Some(TokenKind::Str(next)) = self.peek() {
                    value.push_str(next);
                    self.pos += 1;
                }
                NodeKind::StrLit(value)
            }
            Some(TokenKind::Punct(Punct::LParen)) => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                let _ = self.expect_punct(Punct::RParen, "to close parenthesized expression")?;
                NodeKind::Paren(inner)
            }
            _ => return Err(self.error("expected an expression")),
        };
        Ok(self.add(kind, loc))
    }
}

/// Typedef names are not tracked; this heuristic catches the ubiquitous
/// `*_t` spellings (`size_t`, `uint32_t`, ...) in cast position.
fn looks_like_typedef_name(name: &str) -> bool {
    name.ends_with("_t")
}

#[cfg(test)]
mod tests {
    use crate::ast::{Ast, BinaryOp, NodeId, NodeKind};

    fn parse(source: &str) -> Ast {
        crate::parse("test.c", source).expect("parse failed")
    }

    fn first_function_body(ast: &Ast) -> Vec<NodeId> {
        for root in ast.roots() {
            if let NodeKind::Function {
                body: Some(body), ..
            } = ast.kind(*root)
            {
                if let NodeKind::Compound(stmts) = ast.kind(*body) {
                    return stmts.clone();
                }
            }
        }
        panic!("no function body");
    }

    #[test]
    fn statement_expressions_are_compound_children() {
        let ast = parse("int main() { f(); g(); }");
        let stmts = first_function_body(&ast);
        assert_eq!(stmts.len(), 2);
        for stmt in stmts {
            assert!(matches!(ast.kind(stmt), NodeKind::Call { .. }));
        }
    }

    #[test]
    fn declarations_flatten_per_declarator() {
        let ast = parse("int main() { int a = 1, b; a = b; }");
        let stmts = first_function_body(&ast);
        assert_eq!(stmts.len(), 3);
        assert!(matches!(
            ast.kind(stmts[0]),
            NodeKind::VarDecl { name, is_local: true, .. } if name == "a"
        ));
        assert!(matches!(
            ast.kind(stmts[1]),
            NodeKind::VarDecl { name, init: None, .. } if name == "b"
        ));
        assert!(matches!(
            ast.kind(stmts[2]),
            NodeKind::Binary {
                op: BinaryOp::Assign,
                ..
            }
        ));
    }

    #[test]
    fn cast_to_void_parses_as_cast() {
        let ast = parse("int main() { int v = 0; (void)v; }");
        let stmts = first_function_body(&ast);
        match ast.kind(stmts[1]) {
            NodeKind::Cast { ty, .. } => assert!(ty.is_void()),
            other => panic!("expected cast, got {other:?}"),
        }
    }

    #[test]
    fn typedef_heuristic_casts() {
        let ast = parse("int main() { int x = 0; long y = (size_t)x; (void)y; }");
        let stmts = first_function_body(&ast);
        match ast.kind(stmts[1]) {
            NodeKind::VarDecl {
                init: Some(init), ..
            } => assert!(matches!(ast.kind(*init), NodeKind::Cast { .. })),
            other => panic!("expected declaration, got {other:?}"),
        }
    }

    #[test]
    fn parenthesized_identifier_is_not_a_cast() {
        let ast = parse("int main() { int a = 1, b = 2; int c = (a) - b; (void)c; }");
        let stmts = first_function_body(&ast);
        match ast.kind(stmts[2]) {
            NodeKind::VarDecl {
                init: Some(init), ..
            } => assert!(matches!(
                ast.kind(*init),
                NodeKind::Binary {
                    op: BinaryOp::Sub,
                    ..
                }
            )),
            other => panic!("expected declaration, got {other:?}"),
        }
    }

    #[test]
    fn if_else_chain_shape() {
        let ast = parse("int main() { int f = 0; if (f) f = 1; else if (f) f = 2; else f = 3; }");
        let stmts = first_function_body(&ast);
        let NodeKind::If { else_branch, .. } = ast.kind(stmts[1]) else {
            panic!("expected if");
        };
        let inner = else_branch.expect("missing else");
        let NodeKind::If { else_branch, .. } = ast.kind(inner) else {
            panic!("expected chained if");
        };
        assert!(else_branch.is_some());
    }

    #[test]
    fn parent_links_reach_the_root() {
        let ast = parse("int main() { if (f()) return 1; return 0; }");
        let mut call = None;
        for root in ast.roots() {
            ast.walk(*root, &mut |id| {
                if matches!(ast.kind(id), NodeKind::Call { .. }) {
                    call = Some(id);
                }
            });
        }
        let call = call.expect("no call found");
        let mut cursor = Some(call);
        let mut saw_if = false;
        while let Some(id) = cursor {
            if matches!(ast.kind(id), NodeKind::If { .. }) {
                saw_if = true;
            }
            cursor = ast.parent(id);
        }
        assert!(saw_if);
        assert!(ast.contains(ast.roots()[0], call));
        assert!(!ast.contains(call, ast.roots()[0]));
    }

    #[test]
    fn preprocessor_and_struct_bodies_are_skipped() {
        let ast = parse(
            "#include <stdio.h>\nstruct point { int x; int y; };\ntypedef unsigned long word;\nint main() { return 0; }",
        );
        assert_eq!(ast.roots().len(), 1);
    }

    #[test]
    fn sizeof_in_argument_position() {
        let ast = parse("int main() { void *p = malloc(10 * sizeof(int)); (void)p; return 0; }");
        let stmts = first_function_body(&ast);
        assert!(matches!(ast.kind(stmts[0]), NodeKind::VarDecl { .. }));
    }

    #[test]
    fn switch_with_cases() {
        let ast = parse(
            "int main() { int v = 0; switch (v) { case 0: v = 1; break; default: v = 2; } return v; }",
        );
        let stmts = first_function_body(&ast);
        let NodeKind::Switch { body, .. } = ast.kind(stmts[1]) else {
            panic!("expected switch");
        };
        let NodeKind::Compound(items) = ast.kind(*body) else {
            panic!("expected compound switch body");
        };
        assert!(matches!(ast.kind(items[0]), NodeKind::Case { .. }));
        assert!(
            items
                .iter()
                .any(|id| matches!(ast.kind(*id), NodeKind::Default { .. }))
        );
    }

    #[test]
    fn locations_point_at_the_callee() {
        let ast = parse("int main() {\n    f();\n}");
        let stmts = first_function_body(&ast);
        let loc = ast.loc(stmts[0]);
        assert_eq!((loc.line, loc.column), (2, 5));
    }
}
