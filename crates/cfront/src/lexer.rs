//! The token stream. Comments and preprocessor lines are consumed here, so
//! the parser sees only real C tokens.

use crate::{Error, ast::Loc};

/// C keywords the parser cares about. Anything else lexes as an identifier.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Keyword {
    Break,
    Case,
    Char,
    Const,
    Continue,
    Default,
    Do,
    Double,
    Else,
    Enum,
    Extern,
    Float,
    For,
    Goto,
    If,
    Inline,
    Int,
    Long,
    Register,
    Restrict,
    Return,
    Short,
    Signed,
    SizeOf,
    Static,
    Struct,
    Switch,
    Typedef,
    Union,
    Unsigned,
    Void,
    Volatile,
    While,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "break" => Self::Break,
            "case" => Self::Case,
            "char" => Self::Char,
            "const" => Self::Const,
            "continue" => Self::Continue,
            "default" => Self::Default,
            "do" => Self::Do,
            "double" => Self::Double,
            "else" => Self::Else,
            "enum" => Self::Enum,
            "extern" => Self::Extern,
            "float" => Self::Float,
            "for" => Self::For,
            "goto" => Self::Goto,
            "if" => Self::If,
            "inline" => Self::Inline,
            "int" => Self::Int,
            "long" => Self::Long,
            "register" => Self::Register,
            "restrict" | "__restrict" | "__restrict__" => Self::Restrict,
            "return" => Self::Return,
            "short" => Self::Short,
            "signed" => Self::Signed,
            "sizeof" => Self::SizeOf,
            "static" => Self::Static,
            "struct" => Self::Struct,
            "switch" => Self::Switch,
            "typedef" => Self::Typedef,
            "union" => Self::Union,
            "unsigned" => Self::Unsigned,
            "void" => Self::Void,
            "volatile" => Self::Volatile,
            "while" => Self::While,
            _ => return None,
        })
    }

    /// The spelling, used when reassembling multi-word type names.
    pub(crate) fn spelling(self) -> &'static str {
        match self {
            Self::Break => "break",
            Self::Case => "case",
            Self::Char => "char",
            Self::Const => "const",
            Self::Continue => "continue",
            Self::Default => "default",
            Self::Do => "do",
            Self::Double => "double",
            Self::Else => "else",
            Self::Enum => "enum",
            Self::Extern => "extern",
            Self::Float => "float",
            Self::For => "for",
            Self::Goto => "goto",
            Self::If => "if",
            Self::Inline => "inline",
            Self::Int => "int",
            Self::Long => "long",
            Self::Register => "register",
            Self::Restrict => "restrict",
            Self::Return => "return",
            Self::Short => "short",
            Self::Signed => "signed",
            Self::SizeOf => "sizeof",
            Self::Static => "static",
            Self::Struct => "struct",
            Self::Switch => "switch",
            Self::Typedef => "typedef",
            Self::Union => "union",
            Self::Unsigned => "unsigned",
            Self::Void => "void",
            Self::Volatile => "volatile",
            Self::While => "while",
        }
    }
}

/// Punctuation and operators, longest-match.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Punct {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Colon,
    Question,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ShlAssign,
    ShrAssign,
    OrOr,
    AndAnd,
    Pipe,
    Caret,
    Amp,
    EqEq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Not,
    Tilde,
    Increment,
    Decrement,
    Dot,
    Arrow,
    Ellipsis,
}

#[derive(Clone, Debug)]
pub(crate) enum TokenKind {
    Ident(String),
    Keyword(Keyword),
    Int(i64),
    Float(f64),
    Str(String),
    Char(i64),
    Punct(Punct),
}

#[derive(Clone, Debug)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub loc: Loc,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
}

impl Lexer {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn loc(&self) -> Loc {
        Loc {
            line: self.line,
            column: self.column,
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Lex {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    /// Consume whitespace, comments, and preprocessor lines. A `#` only
    /// introduces a directive when nothing but whitespace precedes it on
    /// its line; directives honor `\` continuations.
    fn skip_trivia(&mut self) -> Result<(), Error> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    let _ = self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        let _ = self.bump();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let _ = self.bump();
                    let _ = self.bump();
                    loop {
                        match self.peek() {
                            None => return Err(self.error("unterminated block comment")),
                            Some('*') if self.peek_at(1) == Some('/') => {
                                let _ = self.bump();
                                let _ = self.bump();
                                break;
                            }
                            Some(_) => {
                                let _ = self.bump();
                            }
                        }
                    }
                }
                Some('#') if self.column == 1 || self.only_whitespace_before() => {
                    while let Some(c) = self.peek() {
                        if c == '\\' && self.peek_at(1) == Some('\n') {
                            let _ = self.bump();
                            let _ = self.bump();
                        } else if c == '\n' {
                            break;
                        } else {
                            let _ = self.bump();
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn only_whitespace_before(&self) -> bool {
        let mut index = self.pos;
        while index > 0 {
            index -= 1;
            match self.chars[index] {
                '\n' => return true,
                c if c.is_whitespace() => {}
                _ => return false,
            }
        }
        true
    }

    fn lex_word(&mut self) -> TokenKind {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                word.push(c);
                let _ = self.bump();
            } else {
                break;
            }
        }
        match Keyword::from_word(&word) {
            Some(keyword) => TokenKind::Keyword(keyword),
            None => TokenKind::Ident(word),
        }
    }

    fn lex_number(&mut self) -> Result<TokenKind, Error> {
        let mut text = String::new();
        let mut is_float = false;
        let hex = self.peek() == Some('0')
            && matches!(self.peek_at(1), Some('x') | Some('X'));
        if hex {
            text.push(self.bump().unwrap_or_default());
            text.push(self.bump().unwrap_or_default());
        }
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {
                    text.push(c);
                    let _ = self.bump();
                }
                'a'..='f' | 'A'..='F' if hex => {
                    text.push(c);
                    let _ = self.bump();
                }
                '.' if !hex && !is_float => {
                    is_float = true;
                    text.push(c);
                    let _ = self.bump();
                }
                'e' | 'E' if !hex => {
                    is_float = true;
                    text.push(c);
                    let _ = self.bump();
                    if let Some(sign @ ('+' | '-')) = self.peek() {
                        text.push(sign);
                        let _ = self.bump();
                    }
                }
                _ => break,
            }
        }
        // Integer/float suffixes carry no syntactic weight; drop them.
        while let Some('u' | 'U' | 'l' | 'L' | 'f' | 'F') = self.peek() {
            let _ = self.bump();
        }
        if is_float {
            let value = text
                .parse::<f64>()
                .map_err(|_| self.error(format!("bad float literal `{text}`")))?;
            Ok(TokenKind::Float(value))
        } else {
            let digits = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"));
            let value = match digits {
                Some(digits) => i64::from_str_radix(digits, 16),
                None if text.len() > 1 && text.starts_with('0') => {
                    i64::from_str_radix(&text[1..], 8)
                }
                None => text.parse::<i64>(),
            }
            .map_err(|_| self.error(format!("bad integer literal `{text}`")))?;
            Ok(TokenKind::Int(value))
        }
    }

    fn lex_escape(&mut self) -> Result<char, Error> {
        match self.bump() {
            None => Err(self.error("unterminated escape sequence")),
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('0') => Ok('\0'),
            Some('x') => {
                let mut value = 0u32;
                while let Some(c) = self.peek() {
                    match c.to_digit(16) {
                        Some(digit) => {
                            value = value.wrapping_mul(16).wrapping_add(digit);
                            let _ = self.bump();
                        }
                        None => break,
                    }
                }
                Ok(char::from_u32(value).unwrap_or('\u{fffd}'))
            }
            Some(other) => Ok(other),
        }
    }

    fn lex_string(&mut self) -> Result<TokenKind, Error> {
        let _ = self.bump();
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => return Err(self.error("unterminated string literal")),
                Some('"') => {
                    let _ = self.bump();
                    return Ok(TokenKind::Str(value));
                }
                Some('\\') => {
                    let _ = self.bump();
                    value.push(self.lex_escape()?);
                }
                Some(c) => {
                    value.push(c);
                    let _ = self.bump();
                }
            }
        }
    }

    fn lex_char(&mut self) -> Result<TokenKind, Error> {
        let _ = self.bump();
        let value = match self.peek() {
            None | Some('\n') => return Err(self.error("unterminated character literal")),
            Some('\\') => {
                let _ = self.bump();
                self.lex_escape()? as i64
            }
            Some(c) => {
                let _ = self.bump();
                c as i64
            }
        };
        match self.bump() {
            Some('\'') => Ok(TokenKind::Char(value)),
            _ => Err(self.error("unterminated character literal")),
        }
    }

    fn lex_punct(&mut self) -> Result<TokenKind, Error> {
        use Punct::*;
        let two = |lexer: &mut Self, punct| {
            let _ = lexer.bump();
            let _ = lexer.bump();
            punct
        };
        let one = |lexer: &mut Self, punct| {
            let _ = lexer.bump();
            punct
        };
        let next = self.peek_at(1);
        let punct = match self.peek() {
            Some('(') => one(self, LParen),
            Some(')') => one(self, RParen),
            Some('{') => one(self, LBrace),
            Some('}') => one(self, RBrace),
            Some('[') => one(self, LBracket),
            Some(']') => one(self, RBracket),
            Some(';') => one(self, Semi),
            Some(',') => one(self, Comma),
            Some(':') => one(self, Colon),
            Some('?') => one(self, Question),
            Some('~') => one(self, Tilde),
            Some('.') if next == Some('.') && self.peek_at(2) == Some('.') => {
                let _ = self.bump();
                let _ = self.bump();
                let _ = self.bump();
                Ellipsis
            }
            Some('.') => one(self, Dot),
            Some('+') => match next {
                Some('+') => two(self, Increment),
                Some('=') => two(self, PlusAssign),
                _ => one(self, Plus),
            },
            Some('-') => match next {
                Some('-') => two(self, Decrement),
                Some('=') => two(self, MinusAssign),
                Some('>') => two(self, Arrow),
                _ => one(self, Minus),
            },
            Some('*') => match next {
                Some('=') => two(self, StarAssign),
                _ => one(self, Star),
            },
            Some('/') => match next {
                Some('=') => two(self, SlashAssign),
                _ => one(self, Slash),
            },
            Some('%') => match next {
                Some('=') => two(self, PercentAssign),
                _ => one(self, Percent),
            },
            Some('&') => match next {
                Some('&') => two(self, AndAnd),
                Some('=') => two(self, AmpAssign),
                _ => one(self, Amp),
            },
            Some('|') => match next {
                Some('|') => two(self, OrOr),
                Some('=') => two(self, PipeAssign),
                _ => one(self, Pipe),
            },
            Some('^') => match next {
                Some('=') => two(self, CaretAssign),
                _ => one(self, Caret),
            },
            Some('=') => match next {
                Some('=') => two(self, EqEq),
                _ => one(self, Assign),
            },
            Some('!') => match next {
                Some('=') => two(self, NotEq),
                _ => one(self, Not),
            },
            Some('<') => match next {
                Some('<') if self.peek_at(2) == Some('=') => {
                    let _ = self.bump();
                    two(self, ShlAssign)
                }
                Some('<') => two(self, Shl),
                Some('=') => two(self, Le),
                _ => one(self, Lt),
            },
            Some('>') => match next {
                Some('>') if self.peek_at(2) == Some('=') => {
                    let _ = self.bump();
                    two(self, ShrAssign)
                }
                Some('>') => two(self, Shr),
                Some('=') => two(self, Ge),
                _ => one(self, Gt),
            },
            Some(c) => return Err(self.error(format!("unexpected character `{c}`"))),
            None => return Err(self.error("unexpected end of input")),
        };
        Ok(TokenKind::Punct(punct))
    }
}

/// Tokenize a whole translation unit.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, Error> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        column: 1,
    };
    let mut tokens = Vec::new();
    loop {
        lexer.skip_trivia()?;
        let Some(c) = lexer.peek() else {
            return Ok(tokens);
        };
        let loc = lexer.loc();
        let kind = if c.is_ascii_alphabetic() || c == '_' {
            lexer.lex_word()
        } else if c.is_ascii_digit() {
            lexer.lex_number()?
        } else if c == '"' {
            lexer.lex_string()?
        } else if c == '\'' {
            lexer.lex_char()?
        } else {
            lexer.lex_punct()?
        };
        tokens.push(Token { kind, loc });
    }
}
