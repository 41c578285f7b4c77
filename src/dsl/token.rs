//! Token types for the Akkado lexer.

use super::error::SourceLocation;

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: SourceLocation,
}

/// The kind of token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Fn,
    True,
    False,

    // Literals
    Ident(String),
    Number(f64),
    Str(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Eq,
    Pipe,  // |>
    Arrow, // ->
    Hole,  // %

    // Delimiters
    LParen,
    RParen,
    Comma,
    Colon,

    // Special
    Newline,
    Semicolon,
    Eof,
}

impl TokenKind {
    /// Short human-readable description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Fn => "'fn'".into(),
            TokenKind::True => "'true'".into(),
            TokenKind::False => "'false'".into(),
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Number(v) => format!("number {v}"),
            TokenKind::Str(_) => "string literal".into(),
            TokenKind::Plus => "'+'".into(),
            TokenKind::Minus => "'-'".into(),
            TokenKind::Star => "'*'".into(),
            TokenKind::Slash => "'/'".into(),
            TokenKind::Caret => "'^'".into(),
            TokenKind::Eq => "'='".into(),
            TokenKind::Pipe => "'|>'".into(),
            TokenKind::Arrow => "'->'".into(),
            TokenKind::Hole => "'%'".into(),
            TokenKind::LParen => "'('".into(),
            TokenKind::RParen => "')'".into(),
            TokenKind::Comma => "','".into(),
            TokenKind::Colon => "':'".into(),
            TokenKind::Newline => "end of line".into(),
            TokenKind::Semicolon => "';'".into(),
            TokenKind::Eof => "end of input".into(),
        }
    }
}
