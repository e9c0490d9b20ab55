//! Converts [tokens](crate::compiler::scanner) into the [AST arena](crate::compiler::ast)

use crate::compiler::ast::*;
use crate::compiler::common::{error::*, token::*};
use crate::compiler::common::types::Ty;
use std::mem::discriminant;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    ast: Ast,
    errors: Vec<Error>,
    last_span: Span,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            current: 0,
            ast: Ast::new(),
            errors: Vec::new(),
            last_span: Span::default(),
        }
    }

    pub fn parse(mut self) -> Result<Ast, Vec<Error>> {
        while self.peek().is_some() {
            match self.declaration() {
                Ok(decl) => self.ast.program.push(decl),
                Err(e) => {
                    self.errors.push(e);
                    let before = self.current;
                    self.synchronize();
                    if self.current == before {
                        // the sync point is the very token that failed
                        self.advance();
                    }
                }
            }
        }
        if self.errors.is_empty() {
            Ok(self.ast)
        } else {
            Err(self.errors)
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }
    fn peek_n(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.current + n)
    }
    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.current).cloned()?;
        self.current += 1;
        self.last_span = token.span;
        Some(token)
    }
    fn check(&self, kind: &TokenKind) -> bool {
        matches!(self.peek(), Some(t) if discriminant(&t.kind) == discriminant(kind))
    }
    fn matches(&mut self, kinds: &[TokenKind]) -> Option<Token> {
        let found = self.peek()?;
        if kinds.iter().any(|k| discriminant(k) == discriminant(&found.kind)) {
            self.advance()
        } else {
            None
        }
    }
    fn consume(&mut self, kind: TokenKind, expected: &'static str) -> Result<Token, Error> {
        match self.peek() {
            Some(t) if discriminant(&t.kind) == discriminant(&kind) => {
                Ok(self.advance().expect("just peeked"))
            }
            Some(t) => Err(Error::new(
                t.span,
                ErrorKind::Expected(expected, t.kind.to_string()),
            )),
            None => Err(Error::new(self.last_span, ErrorKind::Eof(expected))),
        }
    }
    fn ident(&mut self) -> Result<Identifier, Error> {
        let token = self.consume(TokenKind::Ident(String::new()), "identifier")?;
        Ok(Identifier::new(token.unwrap_string(), token.span))
    }

    // Skips to the next plausible declaration/statement boundary so one
    // syntax error doesn't hide the rest.
    fn synchronize(&mut self) {
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::Class
                | TokenKind::Interface
                | TokenKind::If
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Return
                | TokenKind::Break
                | TokenKind::Switch
                | TokenKind::Print
                | TokenKind::LeftBrace
                | TokenKind::RightBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ---------------------------------------------------------------- decls

    fn declaration(&mut self) -> Result<DeclId, Error> {
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Class) => self.class_decl(),
            Some(TokenKind::Interface) => self.interface_decl(),
            _ => {
                let return_type = self.return_type()?;
                let id = self.ident()?;
                if self.check(&TokenKind::LeftParen) {
                    self.function_decl(return_type, id, true)
                } else {
                    self.variable_rest(return_type, id)
                }
            }
        }
    }

    fn variable_rest(&mut self, ty: TypeId, id: Identifier) -> Result<DeclId, Error> {
        self.consume(TokenKind::Semicolon, "';' after variable declaration")?;
        let span = Span::join(self.ast.type_node(ty).span, id.span);
        Ok(self.ast.add_decl(id, DeclKind::Var(VarDecl { ty }), span))
    }

    fn function_decl(
        &mut self,
        return_type: TypeId,
        id: Identifier,
        with_body: bool,
    ) -> Result<DeclId, Error> {
        let formals = self.formals()?;
        let body = if with_body {
            Some(self.stmt_block()?)
        } else {
            self.consume(TokenKind::Semicolon, "';' after method prototype")?;
            None
        };
        let span = id.span;
        Ok(self.ast.add_decl(
            id,
            DeclKind::Fn(FnDecl {
                return_type,
                formals,
                body,
                vtable_offset: None,
                label: None,
            }),
            span,
        ))
    }

    fn formals(&mut self) -> Result<Vec<DeclId>, Error> {
        self.consume(TokenKind::LeftParen, "'('")?;
        let mut formals = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                let ty = self.type_expr()?;
                let id = self.ident()?;
                let span = Span::join(self.ast.type_node(ty).span, id.span);
                formals.push(self.ast.add_decl(id, DeclKind::Var(VarDecl { ty }), span));
                if self.matches(&[TokenKind::Comma]).is_none() {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "')' after formals")?;
        Ok(formals)
    }

    fn class_decl(&mut self) -> Result<DeclId, Error> {
        let class_token = self.advance().expect("checked 'class'");
        let id = self.ident()?;

        let extends = if self.matches(&[TokenKind::Extends]).is_some() {
            Some(self.named_type()?)
        } else {
            None
        };
        let mut implements = Vec::new();
        if self.matches(&[TokenKind::Implements]).is_some() {
            loop {
                implements.push(self.named_type()?);
                if self.matches(&[TokenKind::Comma]).is_none() {
                    break;
                }
            }
        }

        self.consume(TokenKind::LeftBrace, "'{' before class body")?;
        let mut members = Vec::new();
        while !self.check(&TokenKind::RightBrace) && self.peek().is_some() {
            let return_type = self.return_type()?;
            let member_id = self.ident()?;
            let member = if self.check(&TokenKind::LeftParen) {
                self.function_decl(return_type, member_id, true)?
            } else {
                self.variable_rest(return_type, member_id)?
            };
            members.push(member);
        }
        self.consume(TokenKind::RightBrace, "'}' after class body")?;

        let span = Span::join(class_token.span, id.span);
        Ok(self.ast.add_decl(
            id,
            DeclKind::Class(ClassDecl {
                extends,
                implements,
                members,
                var_members: Vec::new(),
                methods: Vec::new(),
                instance_size: 0,
                vtable_size: 0,
            }),
            span,
        ))
    }

    fn interface_decl(&mut self) -> Result<DeclId, Error> {
        let interface_token = self.advance().expect("checked 'interface'");
        let id = self.ident()?;
        self.consume(TokenKind::LeftBrace, "'{' before interface body")?;
        let mut members = Vec::new();
        while !self.check(&TokenKind::RightBrace) && self.peek().is_some() {
            let return_type = self.return_type()?;
            let member_id = self.ident()?;
            members.push(self.function_decl(return_type, member_id, false)?);
        }
        self.consume(TokenKind::RightBrace, "'}' after interface body")?;

        let span = Span::join(interface_token.span, id.span);
        Ok(self
            .ast
            .add_decl(id, DeclKind::Interface(InterfaceDecl { members }), span))
    }

    // ---------------------------------------------------------------- types

    fn return_type(&mut self) -> Result<TypeId, Error> {
        if let Some(token) = self.matches(&[TokenKind::Void]) {
            return Ok(self
                .ast
                .add_type(TypeKind::Primitive(Ty::Void), token.span));
        }
        self.type_expr()
    }

    fn named_type(&mut self) -> Result<TypeId, Error> {
        let id = self.ident()?;
        let span = id.span;
        Ok(self.ast.add_type(TypeKind::Named(id), span))
    }

    fn type_expr(&mut self) -> Result<TypeId, Error> {
        let mut ty = match self.peek().map(|t| t.kind.clone()) {
            Some(TokenKind::Int) => {
                let token = self.advance().expect("peeked");
                self.ast.add_type(TypeKind::Primitive(Ty::Int), token.span)
            }
            Some(TokenKind::Double) => {
                let token = self.advance().expect("peeked");
                self.ast.add_type(TypeKind::Primitive(Ty::Double), token.span)
            }
            Some(TokenKind::Bool) => {
                let token = self.advance().expect("peeked");
                self.ast.add_type(TypeKind::Primitive(Ty::Bool), token.span)
            }
            Some(TokenKind::String) => {
                let token = self.advance().expect("peeked");
                self.ast.add_type(TypeKind::Primitive(Ty::String), token.span)
            }
            Some(TokenKind::Ident(_)) => self.named_type()?,
            Some(kind) => {
                let span = self.peek().expect("peeked").span;
                return Err(Error::new(span, ErrorKind::Expected("type", kind.to_string())));
            }
            None => return Err(Error::new(self.last_span, ErrorKind::Eof("type"))),
        };
        while self.check(&TokenKind::LeftBracket)
            && matches!(self.peek_n(1).map(|t| &t.kind), Some(TokenKind::RightBracket))
        {
            let open = self.advance().expect("checked '['");
            self.advance().expect("checked ']'");
            let span = Span::join(self.ast.type_node(ty).span, open.span);
            ty = self.ast.add_type(TypeKind::Array(ty), span);
        }
        Ok(ty)
    }

    // ----------------------------------------------------------------- stmts

    fn is_decl_start(&self) -> bool {
        match self.peek().map(|t| &t.kind) {
            Some(
                TokenKind::Void
                | TokenKind::Int
                | TokenKind::Double
                | TokenKind::Bool
                | TokenKind::String,
            ) => true,
            Some(TokenKind::Ident(_)) => match self.peek_n(1).map(|t| &t.kind) {
                Some(TokenKind::Ident(_)) => true,
                Some(TokenKind::LeftBracket) => {
                    matches!(self.peek_n(2).map(|t| &t.kind), Some(TokenKind::RightBracket))
                }
                _ => false,
            },
            _ => false,
        }
    }

    fn stmt_block(&mut self) -> Result<StmtId, Error> {
        let open = self.consume(TokenKind::LeftBrace, "'{'")?;
        let mut decls = Vec::new();
        while self.is_decl_start() {
            let ty = self.type_expr()?;
            let id = self.ident()?;
            decls.push(self.variable_rest(ty, id)?);
        }
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RightBrace) && self.peek().is_some() {
            match self.statement() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    let before = self.current;
                    self.synchronize();
                    if self.current == before {
                        self.advance();
                    }
                }
            }
        }
        self.consume(TokenKind::RightBrace, "'}' after statement block")?;
        Ok(self.ast.add_stmt(StmtKind::Block { decls, stmts }, open.span))
    }

    fn statement(&mut self) -> Result<StmtId, Error> {
        match self.peek().map(|t| &t.kind) {
            Some(TokenKind::If) => self.if_stmt(),
            Some(TokenKind::While) => self.while_stmt(),
            Some(TokenKind::For) => self.for_stmt(),
            Some(TokenKind::Switch) => self.switch_stmt(),
            Some(TokenKind::Return) => self.return_stmt(),
            Some(TokenKind::Break) => {
                let token = self.advance().expect("peeked");
                self.consume(TokenKind::Semicolon, "';' after break")?;
                Ok(self.ast.add_stmt(StmtKind::Break, token.span))
            }
            Some(TokenKind::Print) => self.print_stmt(),
            Some(TokenKind::LeftBrace) => self.stmt_block(),
            Some(_) => {
                let expr = self.expression()?;
                self.consume(TokenKind::Semicolon, "';' after expression")?;
                let span = self.ast.expr(expr).span;
                Ok(self.ast.add_stmt(StmtKind::Expr(expr), span))
            }
            None => Err(Error::new(self.last_span, ErrorKind::Eof("statement"))),
        }
    }

    fn if_stmt(&mut self) -> Result<StmtId, Error> {
        let token = self.advance().expect("checked 'if'");
        self.consume(TokenKind::LeftParen, "'(' after if")?;
        let test = self.expression()?;
        self.consume(TokenKind::RightParen, "')' after test expression")?;
        let then_body = self.statement()?;
        let else_body = if self.matches(&[TokenKind::Else]).is_some() {
            Some(self.statement()?)
        } else {
            None
        };
        Ok(self
            .ast
            .add_stmt(StmtKind::If { test, then_body, else_body }, token.span))
    }

    fn while_stmt(&mut self) -> Result<StmtId, Error> {
        let token = self.advance().expect("checked 'while'");
        self.consume(TokenKind::LeftParen, "'(' after while")?;
        let test = self.expression()?;
        self.consume(TokenKind::RightParen, "')' after test expression")?;
        let body = self.statement()?;
        Ok(self.ast.add_stmt(StmtKind::While { test, body }, token.span))
    }

    fn for_stmt(&mut self) -> Result<StmtId, Error> {
        let token = self.advance().expect("checked 'for'");
        self.consume(TokenKind::LeftParen, "'(' after for")?;
        let init = if self.check(&TokenKind::Semicolon) {
            self.ast.add_expr(ExprKind::Empty, token.span)
        } else {
            self.expression()?
        };
        self.consume(TokenKind::Semicolon, "';' after for init")?;
        let test = self.expression()?;
        self.consume(TokenKind::Semicolon, "';' after for test")?;
        let step = if self.check(&TokenKind::RightParen) {
            self.ast.add_expr(ExprKind::Empty, token.span)
        } else {
            self.expression()?
        };
        self.consume(TokenKind::RightParen, "')' after for step")?;
        let body = self.statement()?;
        Ok(self
            .ast
            .add_stmt(StmtKind::For { init, test, step, body }, token.span))
    }

    fn switch_stmt(&mut self) -> Result<StmtId, Error> {
        let token = self.advance().expect("checked 'switch'");
        self.consume(TokenKind::LeftParen, "'(' after switch")?;
        let expr = self.expression()?;
        self.consume(TokenKind::RightParen, "')' after switch expression")?;
        self.consume(TokenKind::LeftBrace, "'{' before switch body")?;

        let mut cases = Vec::new();
        loop {
            let value = if self.matches(&[TokenKind::Case]).is_some() {
                let constant = self.consume(TokenKind::IntConstant(0), "integer case value")?;
                let TokenKind::IntConstant(value) = constant.kind else {
                    unreachable!("consume checked the constant kind");
                };
                Some(value)
            } else if self.matches(&[TokenKind::Default]).is_some() {
                None
            } else {
                break;
            };
            let colon = self.consume(TokenKind::Colon, "':' after case label")?;
            let mut stmts = Vec::new();
            while !matches!(
                self.peek().map(|t| &t.kind),
                Some(TokenKind::Case | TokenKind::Default | TokenKind::RightBrace) | None
            ) {
                stmts.push(self.statement()?);
            }
            cases.push(self.ast.add_stmt(StmtKind::Case { value, stmts }, colon.span));
        }
        self.consume(TokenKind::RightBrace, "'}' after switch body")?;
        Ok(self.ast.add_stmt(StmtKind::Switch { expr, cases }, token.span))
    }

    fn return_stmt(&mut self) -> Result<StmtId, Error> {
        let token = self.advance().expect("checked 'return'");
        let expr = if self.check(&TokenKind::Semicolon) {
            self.ast.add_expr(ExprKind::Empty, token.span)
        } else {
            self.expression()?
        };
        self.consume(TokenKind::Semicolon, "';' after return")?;
        Ok(self.ast.add_stmt(StmtKind::Return { expr }, token.span))
    }

    fn print_stmt(&mut self) -> Result<StmtId, Error> {
        let token = self.advance().expect("checked 'Print'");
        self.consume(TokenKind::LeftParen, "'(' after Print")?;
        let mut args = vec![self.expression()?];
        while self.matches(&[TokenKind::Comma]).is_some() {
            args.push(self.expression()?);
        }
        self.consume(TokenKind::RightParen, "')' after Print arguments")?;
        self.consume(TokenKind::Semicolon, "';' after Print")?;
        Ok(self.ast.add_stmt(StmtKind::Print { args }, token.span))
    }

    // ----------------------------------------------------------------- exprs

    fn expression(&mut self) -> Result<ExprId, Error> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<ExprId, Error> {
        let left = self.logical_or()?;
        if self.matches(&[TokenKind::Assign]).is_some() {
            let right = self.assignment()?;
            let span = Span::join(self.ast.expr(left).span, self.ast.expr(right).span);
            return Ok(self.ast.add_expr(ExprKind::Assign { left, right }, span));
        }
        Ok(left)
    }

    fn logical_or(&mut self) -> Result<ExprId, Error> {
        let mut expr = self.logical_and()?;
        while let Some(op) = self.matches(&[TokenKind::PipePipe]) {
            let right = self.logical_and()?;
            let span = Span::join(self.ast.expr(expr).span, self.ast.expr(right).span);
            expr = self
                .ast
                .add_expr(ExprKind::Logical { left: Some(expr), op, right }, span);
        }
        Ok(expr)
    }

    fn logical_and(&mut self) -> Result<ExprId, Error> {
        let mut expr = self.equality()?;
        while let Some(op) = self.matches(&[TokenKind::AmpAmp]) {
            let right = self.equality()?;
            let span = Span::join(self.ast.expr(expr).span, self.ast.expr(right).span);
            expr = self
                .ast
                .add_expr(ExprKind::Logical { left: Some(expr), op, right }, span);
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<ExprId, Error> {
        let mut expr = self.relational()?;
        while let Some(op) = self.matches(&[TokenKind::Equal, TokenKind::NotEqual]) {
            let right = self.relational()?;
            let span = Span::join(self.ast.expr(expr).span, self.ast.expr(right).span);
            expr = self
                .ast
                .add_expr(ExprKind::Equality { left: expr, op, right }, span);
        }
        Ok(expr)
    }

    // relational operators don't associate
    fn relational(&mut self) -> Result<ExprId, Error> {
        let expr = self.additive()?;
        if let Some(op) = self.matches(&[
            TokenKind::Less,
            TokenKind::LessEqual,
            TokenKind::Greater,
            TokenKind::GreaterEqual,
        ]) {
            let right = self.additive()?;
            let span = Span::join(self.ast.expr(expr).span, self.ast.expr(right).span);
            return Ok(self
                .ast
                .add_expr(ExprKind::Relational { left: expr, op, right }, span));
        }
        Ok(expr)
    }

    fn additive(&mut self) -> Result<ExprId, Error> {
        let mut expr = self.multiplicative()?;
        while let Some(op) = self.matches(&[TokenKind::Plus, TokenKind::Minus]) {
            let right = self.multiplicative()?;
            let span = Span::join(self.ast.expr(expr).span, self.ast.expr(right).span);
            expr = self
                .ast
                .add_expr(ExprKind::Arithmetic { left: Some(expr), op, right }, span);
        }
        Ok(expr)
    }

    fn multiplicative(&mut self) -> Result<ExprId, Error> {
        let mut expr = self.unary()?;
        while let Some(op) = self.matches(&[TokenKind::Star, TokenKind::Slash, TokenKind::Percent])
        {
            let right = self.unary()?;
            let span = Span::join(self.ast.expr(expr).span, self.ast.expr(right).span);
            expr = self
                .ast
                .add_expr(ExprKind::Arithmetic { left: Some(expr), op, right }, span);
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<ExprId, Error> {
        if let Some(op) = self.matches(&[TokenKind::Bang]) {
            let right = self.unary()?;
            let span = Span::join(op.span, self.ast.expr(right).span);
            return Ok(self
                .ast
                .add_expr(ExprKind::Logical { left: None, op, right }, span));
        }
        if let Some(op) = self.matches(&[TokenKind::Minus]) {
            let right = self.unary()?;
            let span = Span::join(op.span, self.ast.expr(right).span);
            return Ok(self
                .ast
                .add_expr(ExprKind::Arithmetic { left: None, op, right }, span));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<ExprId, Error> {
        let mut expr = self.primary()?;
        loop {
            if self.matches(&[TokenKind::Dot]).is_some() {
                let field = self.ident()?;
                let span = Span::join(self.ast.expr(expr).span, field.span);
                if self.matches(&[TokenKind::LeftParen]).is_some() {
                    let actuals = self.actuals()?;
                    expr = self.ast.add_expr(
                        ExprKind::Call { base: Some(expr), field, actuals },
                        span,
                    );
                } else {
                    expr = self
                        .ast
                        .add_expr(ExprKind::FieldAccess { base: Some(expr), field }, span);
                }
            } else if self.matches(&[TokenKind::LeftBracket]).is_some() {
                let subscript = self.expression()?;
                self.consume(TokenKind::RightBracket, "']' after subscript")?;
                let span = Span::join(self.ast.expr(expr).span, self.ast.expr(subscript).span);
                expr = self
                    .ast
                    .add_expr(ExprKind::ArrayAccess { base: expr, subscript }, span);
            } else if let Some(op) = self.matches(&[TokenKind::PlusPlus, TokenKind::MinusMinus]) {
                if !matches!(
                    self.ast.expr(expr).kind,
                    ExprKind::FieldAccess { .. } | ExprKind::ArrayAccess { .. }
                ) {
                    return Err(Error::new(op.span, ErrorKind::ExpectedLValue));
                }
                let span = Span::join(self.ast.expr(expr).span, op.span);
                expr = self.ast.add_expr(ExprKind::Postfix { lvalue: expr, op }, span);
            } else {
                return Ok(expr);
            }
        }
    }

    fn actuals(&mut self) -> Result<Vec<ExprId>, Error> {
        let mut actuals = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                actuals.push(self.expression()?);
                if self.matches(&[TokenKind::Comma]).is_none() {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "')' after arguments")?;
        Ok(actuals)
    }

    fn primary(&mut self) -> Result<ExprId, Error> {
        let Some(token) = self.peek().cloned() else {
            return Err(Error::new(self.last_span, ErrorKind::Eof("expression")));
        };
        match token.kind {
            TokenKind::IntConstant(v) => {
                self.advance();
                Ok(self.ast.add_expr(ExprKind::IntConstant(v), token.span))
            }
            TokenKind::DoubleConstant(v) => {
                self.advance();
                Ok(self.ast.add_expr(ExprKind::DoubleConstant(v), token.span))
            }
            TokenKind::BoolConstant(v) => {
                self.advance();
                Ok(self.ast.add_expr(ExprKind::BoolConstant(v), token.span))
            }
            TokenKind::StringConstant(s) => {
                self.advance();
                Ok(self.ast.add_expr(ExprKind::StringConstant(s), token.span))
            }
            TokenKind::Null => {
                self.advance();
                Ok(self.ast.add_expr(ExprKind::NullConstant, token.span))
            }
            TokenKind::This => {
                self.advance();
                Ok(self.ast.add_expr(ExprKind::This, token.span))
            }
            TokenKind::ReadInteger => {
                self.advance();
                self.consume(TokenKind::LeftParen, "'(' after ReadInteger")?;
                self.consume(TokenKind::RightParen, "')' after ReadInteger")?;
                Ok(self.ast.add_expr(ExprKind::ReadInteger, token.span))
            }
            TokenKind::ReadLine => {
                self.advance();
                self.consume(TokenKind::LeftParen, "'(' after ReadLine")?;
                self.consume(TokenKind::RightParen, "')' after ReadLine")?;
                Ok(self.ast.add_expr(ExprKind::ReadLine, token.span))
            }
            TokenKind::New => {
                self.advance();
                let class = self.named_type()?;
                // constructor-style parentheses are accepted and carry nothing
                if self.matches(&[TokenKind::LeftParen]).is_some() {
                    self.consume(TokenKind::RightParen, "')' after new")?;
                }
                let span = Span::join(token.span, self.ast.type_node(class).span);
                Ok(self.ast.add_expr(ExprKind::New { class }, span))
            }
            TokenKind::NewArray => {
                self.advance();
                self.consume(TokenKind::LeftParen, "'(' after NewArray")?;
                let size = self.expression()?;
                self.consume(TokenKind::Comma, "',' after NewArray size")?;
                let elem_type = self.type_expr()?;
                let close = self.consume(TokenKind::RightParen, "')' after NewArray")?;
                let span = Span::join(token.span, close.span);
                Ok(self.ast.add_expr(ExprKind::NewArray { size, elem_type }, span))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenKind::RightParen, "')' after expression")?;
                Ok(expr)
            }
            TokenKind::Ident(_) => {
                let field = self.ident()?;
                if self.matches(&[TokenKind::LeftParen]).is_some() {
                    let actuals = self.actuals()?;
                    let span = field.span;
                    Ok(self
                        .ast
                        .add_expr(ExprKind::Call { base: None, field, actuals }, span))
                } else {
                    let span = field.span;
                    Ok(self
                        .ast
                        .add_expr(ExprKind::FieldAccess { base: None, field }, span))
                }
            }
            kind => Err(Error::new(
                token.span,
                ErrorKind::ExpectedExpression(kind.to_string()),
            )),
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::compiler::scanner::Scanner;

    pub fn setup(input: &str) -> Ast {
        let tokens = Scanner::new(input).scan().unwrap();
        let mut ast = Parser::new(tokens).parse().unwrap();
        ast.link_parents();
        ast
    }
    fn setup_err(input: &str) -> Vec<Error> {
        let tokens = Scanner::new(input).scan().unwrap();
        Parser::new(tokens).parse().unwrap_err()
    }

    #[test]
    fn parses_global_declarations() {
        let ast = setup("int a; void main() { } class A { } interface I { }");
        assert_eq!(ast.program.len(), 4);
        assert!(matches!(ast.decl(ast.program[0]).kind, DeclKind::Var(_)));
        assert!(matches!(ast.decl(ast.program[1]).kind, DeclKind::Fn(_)));
        assert!(matches!(ast.decl(ast.program[2]).kind, DeclKind::Class(_)));
        assert!(matches!(ast.decl(ast.program[3]).kind, DeclKind::Interface(_)));
    }

    #[test]
    fn parses_array_types() {
        let ast = setup("int[][] grid;");
        let DeclKind::Var(var) = &ast.decl(ast.program[0]).kind else {
            panic!("expected variable");
        };
        let TypeKind::Array(inner) = &ast.type_node(var.ty).kind else {
            panic!("expected array type");
        };
        assert!(matches!(ast.type_node(*inner).kind, TypeKind::Array(_)));
    }

    #[test]
    fn precedence_of_arithmetic() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let ast = setup("void main() { x = 1 + 2 * 3; }");
        let assign = ast
            .exprs
            .iter()
            .find(|e| matches!(e.kind, ExprKind::Assign { .. }))
            .unwrap();
        let ExprKind::Assign { right, .. } = assign.kind else { unreachable!() };
        let ExprKind::Arithmetic { left, op, right } = &ast.expr(right).kind else {
            panic!("expected addition at the top");
        };
        assert_eq!(op.kind, TokenKind::Plus);
        assert!(matches!(
            ast.expr(left.unwrap()).kind,
            ExprKind::IntConstant(1)
        ));
        assert!(matches!(
            ast.expr(*right).kind,
            ExprKind::Arithmetic { .. }
        ));
    }

    #[test]
    fn parses_class_with_inheritance() {
        let ast = setup("class B extends A implements I, J { int x; void m() { } }");
        let DeclKind::Class(class) = &ast.decl(ast.program[0]).kind else {
            panic!("expected class");
        };
        assert!(class.extends.is_some());
        assert_eq!(class.implements.len(), 2);
        assert_eq!(class.members.len(), 2);
    }

    #[test]
    fn parses_method_call_chain() {
        let ast = setup("void main() { a.b(1, 2).c; }");
        let call = ast
            .exprs
            .iter()
            .find(|e| matches!(e.kind, ExprKind::Call { .. }))
            .unwrap();
        let ExprKind::Call { base, field, actuals } = &call.kind else { unreachable!() };
        assert!(base.is_some());
        assert_eq!(field.name, "b");
        assert_eq!(actuals.len(), 2);
    }

    #[test]
    fn parses_switch_with_default() {
        let ast = setup(
            "void main() { switch (x) { case 1: Print(1); break; case 2: default: Print(3); } }",
        );
        let switch = ast
            .stmts
            .iter()
            .find(|s| matches!(s.kind, StmtKind::Switch { .. }))
            .unwrap();
        let StmtKind::Switch { cases, .. } = &switch.kind else { unreachable!() };
        assert_eq!(cases.len(), 3);
        assert!(matches!(
            ast.stmt(cases[2]).kind,
            StmtKind::Case { value: None, .. }
        ));
    }

    #[test]
    fn postfix_requires_lvalue() {
        let errors = setup_err("void main() { 5++; }");
        assert!(errors.iter().any(|e| e.kind == ErrorKind::ExpectedLValue));
    }

    #[test]
    fn recovers_after_syntax_error() {
        // both the bad statement and the bad declaration are reported
        let errors = setup_err("void main() { x = ; } int 5;");
        assert!(errors.len() >= 2);
    }

    #[test]
    fn links_parents() {
        let ast = setup("class A { void m() { return; } }");
        let ret = ast
            .stmts
            .iter()
            .position(|s| matches!(s.kind, StmtKind::Return { .. }))
            .unwrap();
        let method = ast.enclosing_fn(StmtId(ret)).unwrap();
        assert_eq!(ast.decl_name(method), "m");
        assert!(ast.is_class_member(method));
    }
}
