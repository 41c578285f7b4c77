//! Lexer for the Akkado language.
//!
//! Converts source text into a stream of [`Token`]s. Lexical errors are
//! collected as diagnostics and the offending character is skipped, so one
//! pass reports every problem in the file.

use super::error::{codes, Diagnostic, SourceLocation};
use super::token::{Token, TokenKind};

/// Tokenize `source`, returning the tokens (always terminated by `Eof`) and any
/// lexical diagnostics.
pub fn lex(source: &str, filename: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    Lexer::new(source, filename).tokenize()
}

pub struct Lexer<'a> {
    chars: Vec<char>,
    filename: &'a str,
    pos: usize,
    offset: u32,
    line: u32,
    col: u32,
    diagnostics: Vec<Diagnostic>,
}

/// Start of the token currently being lexed.
#[derive(Clone, Copy)]
struct Mark {
    line: u32,
    col: u32,
    offset: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &str, filename: &'a str) -> Self {
        Self {
            chars: source.chars().collect(),
            filename,
            pos: 0,
            offset: 0,
            line: 1,
            col: 1,
            diagnostics: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments();

            let mark = self.mark();
            if self.is_at_end() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    loc: self.span(mark),
                });
                break;
            }

            let ch = self.advance();
            let kind = match ch {
                '\n' => Some(TokenKind::Newline),
                ';' => Some(TokenKind::Semicolon),
                '(' => Some(TokenKind::LParen),
                ')' => Some(TokenKind::RParen),
                ',' => Some(TokenKind::Comma),
                ':' => Some(TokenKind::Colon),
                '+' => Some(TokenKind::Plus),
                '*' => Some(TokenKind::Star),
                '/' => Some(TokenKind::Slash),
                '^' => Some(TokenKind::Caret),
                '=' => Some(TokenKind::Eq),
                '%' => Some(TokenKind::Hole),
                '-' => {
                    if self.peek() == Some('>') {
                        self.advance();
                        Some(TokenKind::Arrow)
                    } else {
                        Some(TokenKind::Minus)
                    }
                }
                '|' => {
                    if self.peek() == Some('>') {
                        self.advance();
                        Some(TokenKind::Pipe)
                    } else {
                        self.error(codes::UNEXPECTED_CHAR, "expected '>' after '|'", mark);
                        None
                    }
                }
                '"' => self.lex_string(mark),
                '0'..='9' => self.lex_number(mark),
                '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.lex_number(mark),
                'a'..='z' | 'A'..='Z' | '_' => Some(self.lex_ident_or_keyword(ch)),
                _ => {
                    self.error(
                        codes::UNEXPECTED_CHAR,
                        format!("unexpected character: '{ch}'"),
                        mark,
                    );
                    None
                }
            };

            if let Some(kind) = kind {
                tokens.push(Token {
                    kind,
                    loc: self.span(mark),
                });
            }
        }

        (tokens, self.diagnostics)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.chars[self.pos];
        self.pos += 1;
        self.offset += ch.len_utf8() as u32;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        ch
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn mark(&self) -> Mark {
        Mark {
            line: self.line,
            col: self.col,
            offset: self.offset,
        }
    }

    fn span(&self, mark: Mark) -> SourceLocation {
        SourceLocation::new(mark.line, mark.col, mark.offset, self.offset - mark.offset)
    }

    fn error(&mut self, code: &str, message: impl Into<String>, mark: Mark) {
        let loc = self.span(mark);
        self.diagnostics
            .push(Diagnostic::error(code, message, self.filename, loc));
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.peek() {
            match ch {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '/' if self.peek_next() == Some('/') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_string(&mut self, mark: Mark) -> Option<TokenKind> {
        let mut s = String::new();
        while let Some(ch) = self.peek() {
            if ch == '"' || ch == '\n' {
                break;
            }
            s.push(self.advance());
        }
        if self.peek() != Some('"') {
            self.error(codes::UNTERMINATED_STRING, "unterminated string literal", mark);
            return None;
        }
        self.advance(); // closing '"'
        Some(TokenKind::Str(s))
    }

    fn lex_number(&mut self, mark: Mark) -> Option<TokenKind> {
        // The first character has already been consumed.
        let mut s: String = self.chars[self.pos - 1].to_string();

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            s.push(self.advance());
        }

        if !s.starts_with('.')
            && self.peek() == Some('.')
            && self.peek_next().is_some_and(|c| c.is_ascii_digit())
        {
            s.push(self.advance());
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                s.push(self.advance());
            }
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            let exp_follows = match self.peek_next() {
                Some(c) if c.is_ascii_digit() => true,
                Some('+' | '-') => self
                    .chars
                    .get(self.pos + 2)
                    .is_some_and(|c| c.is_ascii_digit()),
                _ => false,
            };
            if exp_follows {
                s.push(self.advance());
                if matches!(self.peek(), Some('+' | '-')) {
                    s.push(self.advance());
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    s.push(self.advance());
                }
            }
        }

        // A number glued to an identifier ("440hz") is malformed.
        if self
            .peek()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        {
            while self
                .peek()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                s.push(self.advance());
            }
            self.error(codes::INVALID_NUMBER, format!("invalid number: {s}"), mark);
            return None;
        }

        match s.parse::<f64>() {
            Ok(v) => Some(TokenKind::Number(v)),
            Err(_) => {
                self.error(codes::INVALID_NUMBER, format!("invalid number: {s}"), mark);
                None
            }
        }
    }

    fn lex_ident_or_keyword(&mut self, first: char) -> TokenKind {
        let mut s = first.to_string();
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            s.push(self.advance());
        }

        match s.as_str() {
            "fn" => TokenKind::Fn,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => TokenKind::Ident(s),
        }
    }
}
