//! Recursive descent parser


use crate::ast::{
    AssignTarget, BinOp, Block, CatchClause, ClassDecl, Expr, FuncDecl, Program, Span, Spanned,
    Stmt, UnOp,
};
use crate::error::{CompileError, Result};
use crate::lexer::Token;
use std::rc::Rc;

/// Parse a token stream into a program
pub fn parse(tokens: Vec<(Token, Span)>) -> Result<Program> {
    let mut parser = Parser::new(tokens);
    let mut stmts = Vec::new();
    while !parser.at_end() {
        stmts.push(parser.parse_stmt()?);
    }
    Ok(Program { stmts })
}

struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    /// Byte offset just past the last token, for end-of-input spans
    eof: usize,
}

impl Parser {
    fn new(tokens: Vec<(Token, Span)>) -> Self {
        let eof = tokens.last().map(|(_, s)| s.end).unwrap_or(0);
        Parser {
            tokens,
            pos: 0,
            eof,
        }
    }

    // ============================================
    // Token navigation
    // ============================================

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| *s)
            .unwrap_or(Span::point(self.eof))
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    /// Consume the token if it matches
    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume a required token, returning its span
    fn expect(&mut self, token: &Token) -> Result<Span> {
        if self.check(token) {
            let span = self.current_span();
            self.pos += 1;
            Ok(span)
        } else {
            Err(self.unexpected(&format!("`{token}`")))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Span)> {
        match self.tokens.get(self.pos) {
            Some((Token::Ident(name), span)) => {
                let out = (name.clone(), *span);
                self.pos += 1;
                Ok(out)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn expect_string(&mut self, what: &str) -> Result<(String, Span)> {
        match self.tokens.get(self.pos) {
            Some((Token::StringLit(text), span)) => {
                let out = (text.clone(), *span);
                self.pos += 1;
                Ok(out)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn unexpected(&self, expected: &str) -> CompileError {
        match self.tokens.get(self.pos) {
            Some((token, span)) => {
                CompileError::parser(format!("expected {expected}, found `{token}`"), *span)
            }
            None => CompileError::parser(
                format!("expected {expected}, found end of input"),
                Span::point(self.eof),
            ),
        }
    }

    // ============================================
    // Statements
    // ============================================

    fn parse_stmt(&mut self) -> Result<Spanned<Stmt>> {
        match self.peek() {
            Some(Token::Let) => self.parse_let(),
            Some(Token::Fn) => self.parse_fn(),
            Some(Token::Class) => self.parse_class(),
            Some(Token::If) => self.parse_if(),
            Some(Token::While) => self.parse_while(),
            Some(Token::For) => self.parse_for(),
            Some(Token::Break) => {
                let start = self.current_span();
                self.pos += 1;
                let end = self.expect(&Token::Semi)?;
                Ok(Spanned::new(Stmt::Break, start.merge(end)))
            }
            Some(Token::Continue) => {
                let start = self.current_span();
                self.pos += 1;
                let end = self.expect(&Token::Semi)?;
                Ok(Spanned::new(Stmt::Continue, start.merge(end)))
            }
            Some(Token::Return) => self.parse_return(),
            Some(Token::Try) => self.parse_try(),
            Some(Token::Import) => self.parse_import(),
            Some(Token::LBrace) => {
                let (block, span) = self.parse_block()?;
                Ok(Spanned::new(Stmt::Block(block), span))
            }
            _ => self.parse_expr_or_assign(),
        }
    }

    fn parse_let(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.expect(&Token::Let)?;
        let (name, _) = self.expect_ident("a variable name")?;
        self.expect(&Token::Eq)?;
        let init = self.parse_expr()?;
        let end = self.expect(&Token::Semi)?;
        Ok(Spanned::new(Stmt::Let { name, init }, start.merge(end)))
    }

    fn parse_fn(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.expect(&Token::Fn)?;
        let (decl, decl_span) = self.parse_func_decl()?;
        Ok(Spanned::new(Stmt::Fn(Rc::new(decl)), start.merge(decl_span)))
    }

    /// Parse `name(params) { body }`; the `fn` keyword is already consumed
    fn parse_func_decl(&mut self) -> Result<(FuncDecl, Span)> {
        let (name, name_span) = self.expect_ident("a function name")?;
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                let (param, _) = self.expect_ident("a parameter name")?;
                params.push(param);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen)?;
        let (body, body_span) = self.parse_block()?;
        Ok((FuncDecl { name, params, body }, name_span.merge(body_span)))
    }

    fn parse_class(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.expect(&Token::Class)?;
        let (name, _) = self.expect_ident("a class name")?;
        self.expect(&Token::LBrace)?;
        let mut members = Vec::new();
        while !self.check(&Token::RBrace) {
            self.expect(&Token::Fn)?;
            let (decl, _) = self.parse_func_decl()?;
            members.push(Rc::new(decl));
        }
        let end = self.expect(&Token::RBrace)?;
        Ok(Spanned::new(
            Stmt::Class(ClassDecl { name, members }),
            start.merge(end),
        ))
    }

    fn parse_if(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.expect(&Token::If)?;
        self.expect(&Token::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        let (then_block, then_span) = self.parse_block()?;
        let mut span = start.merge(then_span);
        let else_branch = if self.eat(&Token::Else) {
            // either a chained `if` or a plain block
            let stmt = if self.check(&Token::If) {
                self.parse_if()?
            } else {
                let (block, block_span) = self.parse_block()?;
                Spanned::new(Stmt::Block(block), block_span)
            };
            span = span.merge(stmt.span);
            Some(Box::new(stmt))
        } else {
            None
        };
        Ok(Spanned::new(
            Stmt::If {
                cond,
                then_block,
                else_branch,
            },
            span,
        ))
    }

    fn parse_while(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.expect(&Token::While)?;
        self.expect(&Token::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        let (body, body_span) = self.parse_block()?;
        Ok(Spanned::new(
            Stmt::While { cond, body },
            start.merge(body_span),
        ))
    }

    fn parse_for(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.expect(&Token::For)?;
        self.expect(&Token::LParen)?;
        let (var, _) = self.expect_ident("a loop variable")?;
        if self.eat(&Token::Eq) {
            let from = self.parse_expr()?;
            self.expect(&Token::To)?;
            let to = self.parse_expr()?;
            self.expect(&Token::RParen)?;
            let (body, body_span) = self.parse_block()?;
            Ok(Spanned::new(
                Stmt::ForRange {
                    var,
                    start: from,
                    end: to,
                    body,
                },
                start.merge(body_span),
            ))
        } else if self.eat(&Token::In) {
            let iter = self.parse_expr()?;
            self.expect(&Token::RParen)?;
            let (body, body_span) = self.parse_block()?;
            Ok(Spanned::new(
                Stmt::ForEach { var, iter, body },
                start.merge(body_span),
            ))
        } else {
            Err(self.unexpected("`=` or `in`"))
        }
    }

    fn parse_return(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.expect(&Token::Return)?;
        // `return;` returns null
        let value = if self.check(&Token::Semi) {
            Spanned::new(Expr::NullLit, start)
        } else {
            self.parse_expr()?
        };
        let end = self.expect(&Token::Semi)?;
        Ok(Spanned::new(Stmt::Return(value), start.merge(end)))
    }

    fn parse_try(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.expect(&Token::Try)?;
        let (body, body_span) = self.parse_block()?;
        let mut span = start.merge(body_span);
        let catch = if self.eat(&Token::Catch) {
            let var = if self.eat(&Token::LParen) {
                let (name, _) = self.expect_ident("a catch variable")?;
                self.expect(&Token::RParen)?;
                Some(name)
            } else {
                None
            };
            let (catch_body, catch_span) = self.parse_block()?;
            span = span.merge(catch_span);
            Some(CatchClause {
                var,
                body: catch_body,
            })
        } else {
            None
        };
        let finally = if self.eat(&Token::Finally) {
            let (fin, fin_span) = self.parse_block()?;
            span = span.merge(fin_span);
            Some(fin)
        } else {
            None
        };
        Ok(Spanned::new(
            Stmt::Try {
                body,
                catch,
                finally,
            },
            span,
        ))
    }

    fn parse_import(&mut self) -> Result<Spanned<Stmt>> {
        let start = self.expect(&Token::Import)?;
        let (path, _) = self.expect_string("a module path string")?;
        let end = self.expect(&Token::Semi)?;
        Ok(Spanned::new(Stmt::Import(path), start.merge(end)))
    }

    fn parse_expr_or_assign(&mut self) -> Result<Spanned<Stmt>> {
        let expr = self.parse_expr()?;
        if self.eat(&Token::Eq) {
            let value = self.parse_expr()?;
            let end = self.expect(&Token::Semi)?;
            let span = expr.span.merge(end);
            let target = match expr.node {
                Expr::Var(name) => AssignTarget::Var(name),
                Expr::FieldAccess { obj, field } => AssignTarget::Field { obj, field },
                Expr::Index { obj, index } => AssignTarget::Index { obj, index },
                _ => {
                    return Err(CompileError::parser("invalid assignment target", expr.span));
                }
            };
            Ok(Spanned::new(Stmt::Assign { target, value }, span))
        } else {
            let end = self.expect(&Token::Semi)?;
            let span = expr.span.merge(end);
            Ok(Spanned::new(Stmt::Expr(expr), span))
        }
    }

    fn parse_block(&mut self) -> Result<(Block, Span)> {
        let start = self.expect(&Token::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&Token::RBrace) && !self.at_end() {
            stmts.push(self.parse_stmt()?);
        }
        let end = self.expect(&Token::RBrace)?;
        Ok((stmts, start.merge(end)))
    }

    // ============================================
    // Expressions, lowest precedence first
    // ============================================

    fn parse_expr(&mut self) -> Result<Spanned<Expr>> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Spanned<Expr>> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = binary(BinOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Spanned<Expr>> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_equality()?;
            lhs = binary(BinOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Spanned<Expr>> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::NotEq,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_comparison()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Spanned<Expr>> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::LtEq) => BinOp::LtEq,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::GtEq) => BinOp::GtEq,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_term()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Spanned<Expr>> {
        let mut lhs = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_factor()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<Spanned<Expr>> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Spanned<Expr>> {
        let op = match self.peek() {
            Some(Token::Minus) => Some(UnOp::Neg),
            Some(Token::Not) => Some(UnOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.current_span();
            self.pos += 1;
            let operand = self.parse_unary()?;
            let span = start.merge(operand.span);
            return Ok(Spanned::new(
                Expr::Unary {
                    op,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Spanned<Expr>> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::LParen) => {
                    self.pos += 1;
                    let args = self.parse_args()?;
                    let end = self.expect(&Token::RParen)?;
                    let callee_span = expr.span;
                    let span = callee_span.merge(end);
                    // a call directly on a property read is a method call,
                    // so the receiver is evaluated once
                    expr = match expr.node {
                        Expr::FieldAccess { obj, field } => Spanned::new(
                            Expr::MethodCall {
                                recv: obj,
                                method: field,
                                args,
                            },
                            span,
                        ),
                        node => Spanned::new(
                            Expr::Call {
                                callee: Box::new(Spanned::new(node, callee_span)),
                                args,
                            },
                            span,
                        ),
                    };
                }
                Some(Token::Dot) => {
                    self.pos += 1;
                    let (field, field_span) = self.expect_ident("a property name")?;
                    let span = expr.span.merge(field_span);
                    expr = Spanned::new(
                        Expr::FieldAccess {
                            obj: Box::new(expr),
                            field,
                        },
                        span,
                    );
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_expr()?;
                    let end = self.expect(&Token::RBracket)?;
                    let span = expr.span.merge(end);
                    expr = Spanned::new(
                        Expr::Index {
                            obj: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Parse a comma-separated argument list; the closing paren is left
    fn parse_args(&mut self) -> Result<Vec<Spanned<Expr>>> {
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Spanned<Expr>> {
        let span = self.current_span();
        match self.peek() {
            Some(Token::Null) => {
                self.pos += 1;
                Ok(Spanned::new(Expr::NullLit, span))
            }
            Some(Token::True) => {
                self.pos += 1;
                Ok(Spanned::new(Expr::BoolLit(true), span))
            }
            Some(Token::False) => {
                self.pos += 1;
                Ok(Spanned::new(Expr::BoolLit(false), span))
            }
            Some(Token::IntLit(n)) => {
                let n = *n;
                self.pos += 1;
                Ok(Spanned::new(Expr::IntLit(n), span))
            }
            Some(Token::FloatLit(n)) => {
                let n = *n;
                self.pos += 1;
                Ok(Spanned::new(Expr::FloatLit(n), span))
            }
            Some(Token::StringLit(s)) => {
                let s = s.clone();
                self.pos += 1;
                Ok(Spanned::new(Expr::StringLit(s), span))
            }
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(Spanned::new(Expr::Var(name), span))
            }
            Some(Token::This) => {
                self.pos += 1;
                Ok(Spanned::new(Expr::This, span))
            }
            Some(Token::New) => self.parse_new(),
            Some(Token::LParen) => {
                self.pos += 1;
                let expr = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::LBracket) => self.parse_list_literal(),
            Some(Token::LBrace) => self.parse_dict_literal(),
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_new(&mut self) -> Result<Spanned<Expr>> {
        let start = self.expect(&Token::New)?;
        let (class, _) = self.expect_ident("a class name")?;
        self.expect(&Token::LParen)?;
        let args = self.parse_args()?;
        let end = self.expect(&Token::RParen)?;
        Ok(Spanned::new(Expr::New { class, args }, start.merge(end)))
    }

    fn parse_list_literal(&mut self) -> Result<Spanned<Expr>> {
        let start = self.expect(&Token::LBracket)?;
        let mut elems = Vec::new();
        if !self.check(&Token::RBracket) {
            loop {
                elems.push(self.parse_expr()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(&Token::RBracket)?;
        Ok(Spanned::new(Expr::ListLit(elems), start.merge(end)))
    }

    fn parse_dict_literal(&mut self) -> Result<Spanned<Expr>> {
        let start = self.expect(&Token::LBrace)?;
        let mut entries = Vec::new();
        if !self.check(&Token::RBrace) {
            loop {
                let (key, _) = self.expect_string("a string key")?;
                self.expect(&Token::Colon)?;
                let value = self.parse_expr()?;
                entries.push((key, value));
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(&Token::RBrace)?;
        Ok(Spanned::new(Expr::DictLit(entries), start.merge(end)))
    }
}

fn binary(op: BinOp, lhs: Spanned<Expr>, rhs: Spanned<Expr>) -> Spanned<Expr> {
    let span = lhs.span.merge(rhs.span);
    Spanned::new(
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}
