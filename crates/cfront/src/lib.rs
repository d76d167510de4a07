#![doc = include_str!("../README.md")]

pub mod ast;
mod lexer;
mod parser;

pub use ast::{Ast, BinaryOp, Loc, Node, NodeId, NodeKind, Type, UnaryOp};

/// Errors produced while turning source text into an AST.
#[derive(Debug)]
pub enum Error {
    /// The lexer hit a character sequence it could not tokenize.
    Lex {
        line: u32,
        column: u32,
        message: String,
    },

    /// The parser hit a construct outside the supported subset.
    Parse {
        line: u32,
        column: u32,
        message: String,
    },
}
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lex {
                line,
                column,
                message,
            } => write!(f, "lex error at {line}:{column}: {message}"),
            Self::Parse {
                line,
                column,
                message,
            } => write!(f, "parse error at {line}:{column}: {message}"),
        }
    }
}
impl std::error::Error for Error {}

/// Parse one translation unit into an [`Ast`].
///
/// `file` is the name recorded in every source location; `source` is the
/// text of the unit.
pub fn parse(file: impl Into<String>, source: &str) -> Result<Ast, Error> {
    let tokens = lexer::tokenize(source)?;
    parser::Parser::new(file.into(), tokens).parse()
}
