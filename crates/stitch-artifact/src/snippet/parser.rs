//! Recursive-descent parser over snippet tokens

use super::lexer::Token;
use super::SnippetError;
use crate::body::{BinOp, Expr, Stmt, Value};
use crate::name::ClassName;
use std::ops::Range;

/// Token stream with lookahead and byte offsets
pub(crate) struct Parser<'src> {
    tokens: &'src [(Token, Range<usize>)],
    pos: usize,
    end: usize,
}

impl<'src> Parser<'src> {
    pub(crate) fn new(tokens: &'src [(Token, Range<usize>)], source_len: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            end: source_len,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(tok, _)| tok)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(tok, _)| tok)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(tok, _)| tok.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.end, |(_, span)| span.start)
    }

    fn error(&self, message: impl Into<String>) -> SnippetError {
        SnippetError {
            message: message.into(),
            offset: self.offset(),
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), SnippetError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{expected}'")))
        }
    }

    fn unexpected(&self, wanted: &str) -> SnippetError {
        match self.peek() {
            Some(found) => self.error(format!("expected {wanted}, found '{found}'")),
            None => self.error(format!("expected {wanted}, found end of input")),
        }
    }

    fn ident(&mut self) -> Result<String, SnippetError> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// Error for input left over after the last statement
    pub(crate) fn trailing(&self) -> SnippetError {
        self.error("unbalanced '}'")
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Statements until end of input or a closing brace
    pub(crate) fn statements(&mut self) -> Result<Vec<Stmt>, SnippetError> {
        let mut stmts = Vec::new();
        while !self.at_end() && !self.check(&Token::RBrace) {
            self.statement(&mut stmts)?;
        }
        Ok(stmts)
    }

    fn block(&mut self) -> Result<Vec<Stmt>, SnippetError> {
        if self.eat(&Token::LBrace) {
            let stmts = self.statements()?;
            self.expect(&Token::RBrace)?;
            Ok(stmts)
        } else {
            let mut stmts = Vec::new();
            self.statement(&mut stmts)?;
            Ok(stmts)
        }
    }

    fn statement(&mut self, out: &mut Vec<Stmt>) -> Result<(), SnippetError> {
        match self.peek() {
            Some(Token::LBrace) => {
                self.pos += 1;
                out.extend(self.statements()?);
                self.expect(&Token::RBrace)?;
            }
            Some(Token::Return) => {
                self.pos += 1;
                let value = if self.check(&Token::Semi) {
                    None
                } else {
                    Some(self.expr()?)
                };
                self.expect(&Token::Semi)?;
                out.push(Stmt::Return { value });
            }
            Some(Token::Throw) => {
                self.pos += 1;
                let message = self.expr()?;
                self.expect(&Token::Semi)?;
                out.push(Stmt::Throw { message });
            }
            Some(Token::Log) => {
                self.pos += 1;
                self.expect(&Token::LParen)?;
                let message = self.expr()?;
                self.expect(&Token::RParen)?;
                self.expect(&Token::Semi)?;
                out.push(Stmt::Log { message });
            }
            Some(Token::Let) => {
                self.pos += 1;
                let name = self.ident()?;
                self.expect(&Token::Assign)?;
                let value = self.expr()?;
                self.expect(&Token::Semi)?;
                out.push(Stmt::Let { name, value });
            }
            Some(Token::If) => {
                self.pos += 1;
                self.expect(&Token::LParen)?;
                let cond = self.expr()?;
                self.expect(&Token::RParen)?;
                let then = self.block()?;
                let otherwise = if self.eat(&Token::Else) {
                    self.block()?
                } else {
                    Vec::new()
                };
                out.push(Stmt::If {
                    cond,
                    then,
                    otherwise,
                });
            }
            _ => {
                let start = self.offset();
                let expr = self.expr()?;
                if self.eat(&Token::Assign) {
                    let value = self.expr()?;
                    out.push(assignment(expr, value).ok_or(SnippetError {
                        message: "left side of '=' is not assignable".into(),
                        offset: start,
                    })?);
                } else {
                    out.push(Stmt::Eval { expr });
                }
                self.expect(&Token::Semi)?;
            }
        }
        Ok(())
    }

    pub(crate) fn expr(&mut self) -> Result<Expr, SnippetError> {
        self.equality()
    }

    fn equality(&mut self) -> Result<Expr, SnippetError> {
        let mut lhs = self.comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::Ne,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            lhs = binary(op, lhs, self.comparison()?);
        }
    }

    fn comparison(&mut self) -> Result<Expr, SnippetError> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::Gt) => BinOp::Gt,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            lhs = binary(op, lhs, self.additive()?);
        }
    }

    fn additive(&mut self) -> Result<Expr, SnippetError> {
        let mut lhs = self.primary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            lhs = binary(op, lhs, self.primary()?);
        }
    }

    fn primary(&mut self) -> Result<Expr, SnippetError> {
        let offset = self.offset();
        let Some(token) = self.advance() else {
            return Err(self.unexpected("expression"));
        };
        match token {
            Token::Int(n) => Ok(Expr::constant(Value::Int(n))),
            Token::Minus => match self.advance() {
                Some(Token::Int(n)) => Ok(Expr::constant(Value::Int(-n))),
                _ => Err(SnippetError {
                    message: "expected integer after '-'".into(),
                    offset,
                }),
            },
            Token::Str(s) => Ok(Expr::str(s)),
            Token::True => Ok(Expr::constant(Value::Bool(true))),
            Token::False => Ok(Expr::constant(Value::Bool(false))),
            Token::Null => Ok(Expr::constant(Value::Null)),
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::Positional(0) => self.receiver_member(),
            Token::Positional(n) => Ok(Expr::Param { index: n - 1 }),
            Token::Placeholder(name) => Ok(Expr::Local { name }),
            Token::This => self.receiver_member(),
            Token::Ident(first) => self.path(first, offset),
            other => Err(SnippetError {
                message: format!("unexpected '{other}'"),
                offset,
            }),
        }
    }

    /// `this`, `this.field` or `this.method(..)`
    fn receiver_member(&mut self) -> Result<Expr, SnippetError> {
        if !self.eat(&Token::Dot) {
            return Ok(Expr::This);
        }
        let name = self.ident()?;
        if self.check(&Token::LParen) {
            let args = self.arguments()?;
            Ok(Expr::InvokeVirtual { method: name, args })
        } else {
            Ok(Expr::InstanceField { name })
        }
    }

    /// Dotted path: local, static field, static call or receiver call
    fn path(&mut self, first: String, offset: usize) -> Result<Expr, SnippetError> {
        let mut segments = vec![first];
        while self.check(&Token::Dot) && matches!(self.peek_nth(1), Some(Token::Ident(_))) {
            self.pos += 1;
            segments.push(self.ident()?);
        }
        let is_call = self.check(&Token::LParen);
        let Some(last) = segments.pop() else {
            return Err(self.unexpected("identifier"));
        };
        if segments.is_empty() {
            return if is_call {
                let args = self.arguments()?;
                Ok(Expr::InvokeVirtual { method: last, args })
            } else {
                Ok(Expr::Local { name: last })
            };
        }
        let owner = ClassName::new(segments.join(".")).map_err(|e| SnippetError {
            message: e.to_string(),
            offset,
        })?;
        if is_call {
            let args = self.arguments()?;
            Ok(Expr::InvokeStatic {
                owner,
                method: last,
                args,
            })
        } else {
            Ok(Expr::StaticField { owner, name: last })
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, SnippetError> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(&Token::Comma)?;
        }
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn assignment(target: Expr, value: Expr) -> Option<Stmt> {
    match target {
        Expr::InstanceField { name } => Some(Stmt::SetInstance { name, value }),
        Expr::StaticField { owner, name } => Some(Stmt::SetStatic { owner, name, value }),
        Expr::Local { name } => Some(Stmt::Let { name, value }),
        _ => None,
    }
}
