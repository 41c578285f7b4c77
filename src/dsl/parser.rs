//! Parser for the Akkado language.
//!
//! Recursive descent over the token stream, producing an arena [`Ast`].
//! Syntax errors are recorded and the parser resynchronizes at the next
//! statement separator, so a single pass reports one error per bad statement.
//!
//! ```text
//! program    := (statement (NEWLINE | ';'))*
//! statement  := 'fn' IDENT '(' [fparam (',' fparam)*] ')' '->' expr
//!             | IDENT '=' expr
//!             | expr
//! expr       := additive (NEWLINE* '|>' additive)*
//! additive   := term (('+' | '-') term)*
//! term       := power (('*' | '/') power)*
//! power      := unary ['^' power]
//! unary      := '-' unary | primary
//! primary    := NUMBER | STRING | 'true' | 'false' | '%'
//!             | IDENT ['(' [arg (',' arg)*] ')'] | '(' expr ')'
//! arg        := [IDENT ':'] expr
//! ```

use super::ast::*;
use super::error::{codes, Diagnostic, SourceLocation};
use super::token::{Token, TokenKind};

/// Parse a token stream produced by [`super::lexer::lex`].
pub fn parse(tokens: Vec<Token>, filename: &str) -> (Ast, Vec<Diagnostic>) {
    Parser::new(tokens, filename).parse()
}

type PResult<T> = Result<T, Diagnostic>;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    filename: &'a str,
    ast: Ast,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    pub fn new(mut tokens: Vec<Token>, filename: &'a str) -> Self {
        if !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)) {
            let loc = tokens.last().map(|t| t.loc).unwrap_or_default();
            tokens.push(Token {
                kind: TokenKind::Eof,
                loc,
            });
        }
        Self {
            tokens,
            pos: 0,
            filename,
            ast: Ast::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn parse(mut self) -> (Ast, Vec<Diagnostic>) {
        loop {
            self.skip_separators();
            if self.is_at_end() {
                break;
            }

            match self.parse_statement() {
                Ok(id) => {
                    self.ast.statements.push(id);
                    if !self.at_separator() {
                        let t = self.peek().clone();
                        self.diagnostics.push(Diagnostic::error(
                            codes::UNEXPECTED_TOKEN,
                            format!("unexpected {} after statement", t.kind.describe()),
                            self.filename,
                            t.loc,
                        ));
                        self.synchronize();
                    }
                }
                Err(diag) => {
                    self.diagnostics.push(diag);
                    self.synchronize();
                }
            }
        }

        (self.ast, self.diagnostics)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statement(&mut self) -> PResult<NodeId> {
        if self.check(&TokenKind::Fn) {
            return self.parse_fn_def();
        }
        let is_assign = matches!(self.peek().kind, TokenKind::Ident(_))
            && self.peek_at(1) == &TokenKind::Eq;
        if is_assign {
            self.parse_assign()
        } else {
            self.parse_expr()
        }
    }

    fn parse_assign(&mut self) -> PResult<NodeId> {
        let start = self.peek().loc;
        let name = self.expect_ident("variable name")?;
        self.expect(TokenKind::Eq, "'='")?;
        self.skip_newlines();
        let value = self.parse_expr()?;
        let loc = start.to(self.ast.loc(value));
        Ok(self.ast.push(NodeKind::Assign { name, value }, loc))
    }

    fn parse_fn_def(&mut self) -> PResult<NodeId> {
        let start = self.advance().loc; // 'fn'
        let name = self.expect_ident("function name")?;
        self.expect(TokenKind::LParen, "'(' after function name")?;

        let mut params = Vec::new();
        self.skip_newlines();
        if !self.check(&TokenKind::RParen) {
            loop {
                self.skip_newlines();
                params.push(self.parse_fn_param()?);
                self.skip_newlines();
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.skip_newlines();
        self.expect(TokenKind::RParen, "')' after parameters")?;
        self.expect(TokenKind::Arrow, "'->' before function body")?;
        self.skip_newlines();

        let body = self.parse_expr()?;
        let loc = start.to(self.ast.loc(body));
        Ok(self.ast.push(NodeKind::FnDef { name, params, body }, loc))
    }

    fn parse_fn_param(&mut self) -> PResult<FnParam> {
        let loc = self.peek().loc;
        let name = self.expect_ident("parameter name")?;
        let default = if self.match_token(&TokenKind::Eq) {
            let negative = self.match_token(&TokenKind::Minus);
            let t = self.advance().clone();
            match t.kind {
                TokenKind::Number(v) => Some(if negative { -v } else { v }),
                other => {
                    return Err(self.error_at(
                        codes::EXPECTED_TOKEN,
                        format!("expected number as default value, found {}", other.describe()),
                        t.loc,
                    ))
                }
            }
        } else {
            None
        };
        Ok(FnParam {
            name,
            default,
            loc: loc.to(self.prev_loc()),
        })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_expr(&mut self) -> PResult<NodeId> {
        let mut lhs = self.parse_additive()?;

        while self.pipe_follows() {
            self.skip_newlines();
            self.advance(); // '|>'
            self.skip_newlines();
            let rhs = self.parse_additive()?;
            let loc = self.ast.loc(lhs).to(self.ast.loc(rhs));
            lhs = self.ast.push(NodeKind::Pipe { lhs, rhs }, loc);
        }

        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<NodeId> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            self.skip_newlines();
            let rhs = self.parse_term()?;
            lhs = self.binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> PResult<NodeId> {
        let mut lhs = self.parse_power()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            self.skip_newlines();
            let rhs = self.parse_power()?;
            lhs = self.binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_power(&mut self) -> PResult<NodeId> {
        let base = self.parse_unary()?;
        if self.match_token(&TokenKind::Caret) {
            self.skip_newlines();
            // Right-associative: 2^3^2 == 2^(3^2)
            let exp = self.parse_power()?;
            return Ok(self.binary(BinOp::Pow, base, exp));
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> PResult<NodeId> {
        if !self.check(&TokenKind::Minus) {
            return self.parse_primary();
        }

        let start = self.advance().loc;
        if let TokenKind::Number(v) = self.peek().kind {
            let loc = start.to(self.advance().loc);
            return Ok(self.ast.push(NodeKind::Number(-v), loc));
        }

        let operand = self.parse_unary()?;
        let loc = start.to(self.ast.loc(operand));
        let arg = Arg {
            name: None,
            value: operand,
            loc: self.ast.loc(operand),
        };
        Ok(self.ast.push(
            NodeKind::Call {
                name: "neg".to_string(),
                args: vec![arg],
            },
            loc,
        ))
    }

    fn parse_primary(&mut self) -> PResult<NodeId> {
        let t = self.peek().clone();
        match t.kind {
            TokenKind::Number(v) => {
                self.advance();
                Ok(self.ast.push(NodeKind::Number(v), t.loc))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(self.ast.push(NodeKind::Str(s), t.loc))
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                let value = t.kind == TokenKind::True;
                Ok(self.ast.push(NodeKind::Bool(value), t.loc))
            }
            TokenKind::Hole => {
                self.advance();
                Ok(self.ast.push(NodeKind::Hole, t.loc))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    self.parse_call(name, t.loc)
                } else {
                    Ok(self.ast.push(NodeKind::Ident(name), t.loc))
                }
            }
            TokenKind::LParen => {
                self.advance();
                self.skip_newlines();
                let inner = self.parse_expr()?;
                self.skip_newlines();
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Fn => Err(self.error_at(
                codes::MISPLACED_STATEMENT,
                "function definitions are only allowed at the top level",
                t.loc,
            )),
            other => Err(self.error_at(
                codes::UNEXPECTED_TOKEN,
                format!("unexpected {}", other.describe()),
                t.loc,
            )),
        }
    }

    fn parse_call(&mut self, name: String, start: SourceLocation) -> PResult<NodeId> {
        self.advance(); // '('
        let mut args = Vec::new();

        self.skip_newlines();
        if !self.check(&TokenKind::RParen) {
            loop {
                self.skip_newlines();
                args.push(self.parse_arg()?);
                self.skip_newlines();
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.skip_newlines();
        let end = self.expect(TokenKind::RParen, "')' after arguments")?.loc;

        Ok(self.ast.push(NodeKind::Call { name, args }, start.to(end)))
    }

    fn parse_arg(&mut self) -> PResult<Arg> {
        let start = self.peek().loc;
        let name = match &self.peek().kind {
            TokenKind::Ident(n) if self.peek_at(1) == &TokenKind::Colon => {
                let n = n.clone();
                self.advance();
                self.advance();
                self.skip_newlines();
                Some(n)
            }
            _ => None,
        };
        let value = self.parse_expr()?;
        Ok(Arg {
            name,
            value,
            loc: start.to(self.ast.loc(value)),
        })
    }

    fn binary(&mut self, op: BinOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        let loc = self.ast.loc(lhs).to(self.ast.loc(rhs));
        self.ast.push(NodeKind::Binary { op, lhs, rhs }, loc)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, ahead: usize) -> &TokenKind {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn advance(&mut self) -> &Token {
        let idx = self.pos.min(self.tokens.len() - 1);
        if !self.is_at_end() {
            self.pos += 1;
        }
        &self.tokens[idx]
    }

    fn prev_loc(&self) -> SourceLocation {
        self.tokens[self.pos.saturating_sub(1)].loc
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> PResult<Token> {
        if self.check(&kind) {
            Ok(self.advance().clone())
        } else {
            let t = self.peek().clone();
            Err(self.error_at(
                codes::EXPECTED_TOKEN,
                format!("expected {what}, found {}", t.kind.describe()),
                t.loc,
            ))
        }
    }

    fn expect_ident(&mut self, what: &str) -> PResult<String> {
        let t = self.peek().clone();
        match t.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error_at(
                codes::EXPECTED_TOKEN,
                format!("expected {what}, found {}", other.describe()),
                t.loc,
            )),
        }
    }

    fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek().kind, TokenKind::Newline | TokenKind::Semicolon) {
            self.advance();
        }
    }

    fn at_separator(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof
        )
    }

    /// Whether a `|>` comes next, possibly on a following line.
    fn pipe_follows(&self) -> bool {
        let mut i = self.pos;
        while i < self.tokens.len() {
            match self.tokens[i].kind {
                TokenKind::Newline => i += 1,
                TokenKind::Pipe => return true,
                _ => return false,
            }
        }
        false
    }

    fn synchronize(&mut self) {
        while !self.at_separator() {
            self.advance();
        }
    }

    fn error_at(&self, code: &str, message: impl Into<String>, loc: SourceLocation) -> Diagnostic {
        Diagnostic::error(code, message, self.filename, loc)
    }
}
