use std::fmt::{self, Display, Formatter};

use smol_str::SmolStr;

use crate::{number::Number, range::Range};

#[derive(PartialEq, Debug, Clone)]
pub struct Token {
    pub range: Range,
    pub kind: TokenKind,
}

impl Token {
    pub fn new(kind: TokenKind, range: Range) -> Self {
        Token { range, kind }
    }

    #[inline(always)]
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum TokenKind {
    And,
    Arrow,
    Asterisk,
    BoolLiteral(bool),
    Break,
    Colon,
    Comma,
    Continue,
    Dot,
    Eof,
    EqEq,
    Equal,
    ForEach,
    Gt,
    Gte,
    Ident(SmolStr),
    LBrace,
    LBracket,
    LParen,
    Loop,
    Lt,
    Lte,
    Minus,
    NeEq,
    Not,
    NullCoalesce,
    NumberLiteral(Number),
    Or,
    Percent,
    Plus,
    Question,
    RBrace,
    RBracket,
    Return,
    RParen,
    SemiColon,
    Slash,
    StringLiteral(SmolStr),
    This,
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.kind)
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match &self {
            TokenKind::And => write!(f, "&&"),
            TokenKind::Arrow => write!(f, "->"),
            TokenKind::Asterisk => write!(f, "*"),
            TokenKind::BoolLiteral(b) => write!(f, "{}", b),
            TokenKind::Break => write!(f, "break"),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Continue => write!(f, "continue"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Eof => write!(f, ""),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::Equal => write!(f, "="),
            TokenKind::ForEach => write!(f, "for_each"),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::Gte => write!(f, ">="),
            TokenKind::Ident(ident) => write!(f, "{}", ident),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::LParen => write!(f, "("),
            TokenKind::Loop => write!(f, "loop"),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Lte => write!(f, "<="),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::NeEq => write!(f, "!="),
            TokenKind::Not => write!(f, "!"),
            TokenKind::NullCoalesce => write!(f, "??"),
            TokenKind::NumberLiteral(n) => write!(f, "{}", n),
            TokenKind::Or => write!(f, "||"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Question => write!(f, "?"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::Return => write!(f, "return"),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::SemiColon => write!(f, ";"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::StringLiteral(s) => write!(f, "'{}'", s),
            TokenKind::This => write!(f, "this"),
        }
    }
}
