//! Recursive-descent parser producing the IR tree directly.
//!
//! The grammar is C-family: function definitions with optional `public`,
//! `if`/`else`, `while`, `for`, `return`, `continue`, `break`, declarations
//! with optional initialisers, closures introduced by `lambda`, tuple types,
//! and `->` for map (function) types.
//!
//! Name resolution happens here: block scopes nest, closure bodies see
//! enclosing locals (the closure pass later lifts such uses into arguments),
//! and the module table resolves function names. A name used in call
//! position may stay unresolved, since it can name a runtime helper linked
//! in later; an unresolved plain variable is a user error.
//!
//! `for` loops are desugared into an initialiser plus a `while` before the
//! middle-end ever sees them.

mod lexer;

#[cfg(test)]
mod parser_tests;

use enoki_core::interner::Symbol;
use enoki_ir::node::{DeclFlags, Kind, Node, NodeId, Payload};
use indexmap::IndexMap;

use crate::ast::Cx;
use crate::diagnostics::Diagnostics;

use lexer::{Lexeme, LineMap, Token};

/// Parse `source` into the context's module. Returns the diagnostics; any
/// error among them means the module must not be compiled further.
pub fn parse(cx: &mut Cx, source: &str) -> Diagnostics {
    let (tokens, bad_spans) = lexer::lex(source);
    let lines = LineMap::new(source);

    let mut diags = Diagnostics::new();
    for span in &bad_spans {
        diags.error(
            lines.line_of(span.start),
            format!("unexpected character '{}'", &source[span.clone()]),
        );
    }

    let mut parser = Parser {
        cx,
        source,
        tokens,
        pos: 0,
        lines,
        diags,
        scopes: Vec::new(),
    };
    parser.run();
    parser.diags
}

struct Parser<'a> {
    cx: &'a mut Cx,
    source: &'a str,
    tokens: Vec<Lexeme>,
    pos: usize,
    lines: LineMap,
    diags: Diagnostics,
    /// Innermost-last stack of open block nodes for name resolution.
    scopes: Vec<NodeId>,
}

impl<'a> Parser<'a> {
    fn run(&mut self) {
        while !self.at_eof() {
            let before = self.pos;
            self.parse_function();
            if self.pos == before {
                // Recovery must always make progress at the top level.
                self.pos += 1;
            }
        }
    }

    // ---- token plumbing ----

    fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).map(|l| l.token)
    }

    fn at(&self, token: Token) -> bool {
        self.peek() == Some(token)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: Token) -> bool {
        if self.at(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn slice(&self, offset_back: usize) -> &'a str {
        let lexeme = &self.tokens[self.pos - offset_back];
        &self.source[lexeme.span.clone()]
    }

    fn cur_line(&self) -> u32 {
        match self.tokens.get(self.pos) {
            Some(l) => self.lines.line_of(l.span.start),
            None => self.lines.line_of(self.source.len()),
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> bool {
        if self.eat(token) {
            return true;
        }
        let line = self.cur_line();
        self.diags.error(line, format!("expected {what}"));
        false
    }

    /// Panic-mode recovery: skip to just past the next `;`, or stop before
    /// a `}` / end of input.
    fn recover(&mut self) {
        while let Some(token) = self.peek() {
            match token {
                Token::Semi => {
                    self.pos += 1;
                    return;
                }
                Token::RBrace => return,
                _ => self.pos += 1,
            }
        }
    }

    // ---- scopes ----

    fn resolve(&self, name: Symbol) -> Option<NodeId> {
        for &block in self.scopes.iter().rev() {
            if let Some(&decl) = self.cx.arena[block].block_table().get(&name) {
                return Some(decl);
            }
        }
        self.cx.arena[self.cx.module].module().table.get(&name).copied()
    }

    /// Bind a variable reference to a declaration and count the use.
    fn bind(&mut self, var: NodeId, decl: NodeId) {
        self.cx.arena[var].var_mut().decl = Some(decl);
        self.cx.arena[var].ty = self.cx.arena[decl].decl().ty;
        self.cx.arena[decl].decl_mut().use_count += 1;
    }

    // ---- declarations ----

    fn parse_function(&mut self) {
        let line = self.cur_line();
        let public = self.eat(Token::Public);

        let Some(return_ty) = self.parse_type() else {
            self.diags.error(line, "expected a function definition");
            self.recover();
            return;
        };

        if !self.at(Token::Ident) {
            self.expect(Token::Ident, "a function name");
            self.recover();
            return;
        }
        self.bump();
        let name = self.cx.interner.intern(self.slice(1));

        if !self.expect(Token::LParen, "'('") {
            self.recover();
            return;
        }
        let params = self.parse_params();
        self.expect(Token::RParen, "')'");

        let args = self.cx.make_args(&params, line);
        let func = self.cx.make_function(return_ty, name, args, line);
        if public {
            self.cx.arena[func].decl_mut().flags |= DeclFlags::PUBLIC;
        }
        self.cx.arena.add_child(self.cx.module, Some(func));
        self.cx.arena[self.cx.module]
            .module_mut()
            .table
            .insert(name, func);

        if self.eat(Token::Semi) {
            // Declaration only: the body is provided elsewhere at link time.
            return;
        }

        if let Some(body) = self.parse_block(&params) {
            self.cx.arena.set_child(func, 0, Some(body));
        } else {
            self.recover();
        }
    }

    fn parse_params(&mut self) -> Vec<NodeId> {
        let mut params = Vec::new();
        if self.at(Token::RParen) {
            return params;
        }
        loop {
            let line = self.cur_line();
            let Some(ty) = self.parse_type() else {
                self.diags.error(line, "expected a parameter type");
                return params;
            };
            if !self.expect(Token::Ident, "a parameter name") {
                return params;
            }
            let name = self.cx.interner.intern(self.slice(1));
            let decl = self.cx.make_declaration(ty, name, line);
            self.cx.arena[decl].decl_mut().flags |= DeclFlags::ARGUMENT;
            params.push(decl);
            if !self.eat(Token::Comma) {
                return params;
            }
        }
    }

    /// `type := base ["->" type]` where `base` is `int`, `void`, or a
    /// parenthesised tuple of types. Returns `None` without consuming when
    /// no type starts here.
    fn parse_type(&mut self) -> Option<NodeId> {
        let line = self.cur_line();
        let base = match self.peek() {
            Some(Token::Int) => {
                self.bump();
                self.cx.int_type(line)
            }
            Some(Token::Void) => {
                self.bump();
                self.cx.void_type(line)
            }
            Some(Token::LParen) => {
                self.bump();
                let mut ty = self.parse_type()?;
                while self.eat(Token::Comma) {
                    let next = self.parse_type()?;
                    ty = self.cx.make_tuple_type(ty, next, line);
                }
                self.expect(Token::RParen, "')'");
                ty
            }
            _ => return None,
        };

        if self.eat(Token::Arrow) {
            let codomain = self.parse_type()?;
            return Some(self.cx.make_map_type(base, codomain, line));
        }
        Some(base)
    }

    // ---- statements ----

    /// Parse `{ ... }`, seeding the block's table with `seeds` (function or
    /// lambda parameters).
    fn parse_block(&mut self, seeds: &[NodeId]) -> Option<NodeId> {
        let line = self.cur_line();
        if !self.expect(Token::LBrace, "'{'") {
            return None;
        }

        let block = self.cx.arena.alloc(Node::with_payload(
            Kind::Block,
            line,
            Payload::Block {
                table: IndexMap::new(),
            },
        ));
        for &decl in seeds {
            let name = self.cx.arena[decl].decl().name;
            self.cx.arena[block].block_table_mut().insert(name, decl);
        }

        self.scopes.push(block);
        while !self.at(Token::RBrace) && !self.at_eof() {
            if let Some(stmt) = self.parse_statement() {
                self.cx.arena.add_child(block, Some(stmt));
            }
        }
        self.scopes.pop();
        self.expect(Token::RBrace, "'}'");
        Some(block)
    }

    fn parse_statement(&mut self) -> Option<NodeId> {
        let line = self.cur_line();
        match self.peek() {
            Some(Token::LBrace) => self.parse_block(&[]),
            Some(Token::If) => {
                self.bump();
                self.expect(Token::LParen, "'('");
                let cond = self.parse_expr()?;
                self.expect(Token::RParen, "')'");
                let then_stmt = self.parse_statement();
                let else_stmt = if self.eat(Token::Else) {
                    self.parse_statement()
                } else {
                    None
                };
                Some(self.cx.make_if(cond, then_stmt, else_stmt, line))
            }
            Some(Token::While) => {
                self.bump();
                self.expect(Token::LParen, "'('");
                let cond = self.parse_expr()?;
                self.expect(Token::RParen, "')'");
                let body = self.parse_statement();
                Some(self.cx.make_while(cond, body, line))
            }
            Some(Token::For) => self.parse_for(line),
            Some(Token::Return) => {
                self.bump();
                let expr = self.parse_expr()?;
                self.expect(Token::Semi, "';'");
                Some(self.cx.make_return(expr, line))
            }
            Some(Token::Continue) => {
                self.bump();
                self.expect(Token::Semi, "';'");
                Some(self.cx.arena.alloc_simple(Kind::Continue, line))
            }
            Some(Token::Break) => {
                self.bump();
                self.expect(Token::Semi, "';'");
                Some(self.cx.arena.alloc_simple(Kind::Break, line))
            }
            Some(Token::Int) | Some(Token::Void) => {
                let stmt = self.parse_declaration(line);
                self.expect(Token::Semi, "';'");
                stmt
            }
            Some(Token::Semi) => {
                self.bump();
                None
            }
            Some(_) => {
                let stmt = self.parse_simple_statement();
                self.expect(Token::Semi, "';'");
                stmt
            }
            None => None,
        }
    }

    /// `for (init; cond; step) body` desugars to
    /// `{ init; while (cond) { body; step } }`.
    fn parse_for(&mut self, line: u32) -> Option<NodeId> {
        self.bump();
        self.expect(Token::LParen, "'('");
        let init = if self.at(Token::Semi) {
            None
        } else if matches!(self.peek(), Some(Token::Int) | Some(Token::Void)) {
            self.parse_declaration(line)
        } else {
            self.parse_simple_statement()
        };
        self.expect(Token::Semi, "';'");
        let cond = self.parse_expr()?;
        self.expect(Token::Semi, "';'");
        let step = if self.at(Token::RParen) {
            None
        } else {
            self.parse_simple_statement()
        };
        self.expect(Token::RParen, "')'");

        let body_stmt = self.parse_statement();
        let body = self.cx.make_block(None, body_stmt, line);
        if let Some(step) = step {
            self.cx.arena.add_child(body, Some(step));
        }
        let while_stmt = self.cx.make_while(cond, Some(body), line);

        match init {
            Some(init) => {
                let seq = self.cx.make_statements(init, while_stmt, line);
                Some(self.cx.make_block(None, Some(seq), line))
            }
            None => Some(while_stmt),
        }
    }

    /// `type name [= expr]`: the declaration goes into the innermost block
    /// table; only the optional initialiser produces a statement.
    fn parse_declaration(&mut self, line: u32) -> Option<NodeId> {
        let ty = self.parse_type()?;
        if !self.expect(Token::Ident, "a variable name") {
            self.recover();
            return None;
        }
        let name = self.cx.interner.intern(self.slice(1));

        let decl = self.cx.make_declaration(ty, name, line);
        let block = *self.scopes.last()?;
        if self.cx.arena[block].block_table().contains_key(&name) {
            self.diags.error(
                line,
                format!("duplicate declaration of '{}'", self.cx.interner.resolve(name)),
            );
        }
        self.cx.arena[block].block_table_mut().insert(name, decl);

        if self.eat(Token::Eq) {
            let value = self.parse_expr()?;
            let var = self.cx.make_variable(name, line);
            self.bind(var, decl);
            return Some(self.cx.make_assignment(Some(var), value, line));
        }
        None
    }

    /// Assignment or bare expression statement (no trailing `;`).
    fn parse_simple_statement(&mut self) -> Option<NodeId> {
        let line = self.cur_line();
        let expr = self.parse_expr()?;
        if self.eat(Token::Eq) {
            if !self.is_lvalue(expr) {
                self.diags
                    .error(line, "left side of assignment is not assignable");
            }
            let value = self.parse_expr()?;
            return Some(self.cx.make_assignment(Some(expr), value, line));
        }
        Some(self.cx.make_assignment(None, expr, line))
    }

    fn is_lvalue(&self, expr: NodeId) -> bool {
        match self.cx.arena[expr].kind() {
            Kind::Variable => true,
            Kind::Tuple => (0..self.cx.arena.num_children(expr))
                .all(|i| self.cx.arena.node_is(self.cx.arena.child(expr, i), Kind::Variable)),
            _ => false,
        }
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> Option<NodeId> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Option<NodeId> {
        let mut lhs = self.parse_and()?;
        while self.at(Token::PipePipe) {
            let line = self.cur_line();
            self.bump();
            let rhs = self.parse_and()?;
            lhs = self.cx.make_binary_expression(Kind::Or, lhs, rhs, line);
        }
        Some(lhs)
    }

    fn parse_and(&mut self) -> Option<NodeId> {
        let mut lhs = self.parse_comparison()?;
        while self.at(Token::AmpAmp) {
            let line = self.cur_line();
            self.bump();
            let rhs = self.parse_comparison()?;
            lhs = self.cx.make_binary_expression(Kind::And, lhs, rhs, line);
        }
        Some(lhs)
    }

    fn parse_comparison(&mut self) -> Option<NodeId> {
        let lhs = self.parse_additive()?;
        let kind = match self.peek() {
            Some(Token::EqEq) => Kind::Eq,
            Some(Token::BangEq) => Kind::Neq,
            Some(Token::LtEq) => Kind::Leq,
            Some(Token::GtEq) => Kind::Geq,
            Some(Token::Lt) => Kind::Lt,
            Some(Token::Gt) => Kind::Gt,
            _ => return Some(lhs),
        };
        let line = self.cur_line();
        self.bump();
        let rhs = self.parse_additive()?;
        Some(self.cx.make_binary_expression(kind, lhs, rhs, line))
    }

    fn parse_additive(&mut self) -> Option<NodeId> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let kind = match self.peek() {
                Some(Token::Plus) => Kind::Sum,
                Some(Token::Minus) => Kind::Difference,
                _ => return Some(lhs),
            };
            let line = self.cur_line();
            self.bump();
            let rhs = self.parse_multiplicative()?;
            lhs = self.cx.make_binary_expression(kind, lhs, rhs, line);
        }
    }

    fn parse_multiplicative(&mut self) -> Option<NodeId> {
        let mut lhs = self.parse_unary()?;
        loop {
            let kind = match self.peek() {
                Some(Token::Star) => Kind::Product,
                Some(Token::Slash) => Kind::Ratio,
                _ => return Some(lhs),
            };
            let line = self.cur_line();
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = self.cx.make_binary_expression(kind, lhs, rhs, line);
        }
    }

    fn parse_unary(&mut self) -> Option<NodeId> {
        let line = self.cur_line();
        match self.peek() {
            Some(Token::Minus) => {
                self.bump();
                let operand = self.parse_unary()?;
                Some(self.cx.make_unary_expression(Kind::Negation, operand, line))
            }
            Some(Token::Bang) => {
                self.bump();
                let operand = self.parse_unary()?;
                Some(self.cx.make_unary_expression(Kind::Not, operand, line))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Option<NodeId> {
        let line = self.cur_line();
        match self.peek() {
            Some(Token::Number) => {
                self.bump();
                let text = self.slice(1);
                let value: i32 = match text.parse() {
                    Ok(v) => v,
                    Err(_) => {
                        self.diags
                            .error(line, format!("integer literal '{text}' out of range"));
                        0
                    }
                };
                Some(self.cx.make_integer_direct(value, line))
            }
            Some(Token::Str) => {
                self.bump();
                let text = self.slice(1);
                let sym = self.cx.interner.intern(&text[1..text.len() - 1]);
                Some(self.cx.make_string(sym, line))
            }
            Some(Token::Ident) => {
                self.bump();
                let name = self.cx.interner.intern(self.slice(1));
                let var = self.cx.make_variable(name, line);

                if self.at(Token::LParen) {
                    // Call position: an unresolved name may be a runtime
                    // helper or a function defined later; leave it unbound.
                    if let Some(decl) = self.resolve(name) {
                        self.bind(var, decl);
                    }
                    self.bump();
                    let args = self.parse_call_args(line)?;
                    return Some(self.cx.make_call(var, args, line));
                }

                match self.resolve(name) {
                    Some(decl) => self.bind(var, decl),
                    None => self.diags.error(
                        line,
                        format!("undefined variable '{}'", self.cx.interner.resolve(name)),
                    ),
                }
                Some(var)
            }
            Some(Token::Lambda) => self.parse_lambda(line),
            Some(Token::LParen) => {
                self.bump();
                let mut expr = self.parse_expr()?;
                while self.eat(Token::Comma) {
                    let next = self.parse_expr()?;
                    expr = self.cx.make_tuple(expr, next, line);
                }
                self.expect(Token::RParen, "')'");
                Some(expr)
            }
            _ => {
                self.diags.error(line, "expected an expression");
                self.recover();
                None
            }
        }
    }

    /// Argument list after the opening parenthesis: zero arguments make an
    /// empty tuple, one stays bare, several become a tuple.
    fn parse_call_args(&mut self, line: u32) -> Option<NodeId> {
        if self.eat(Token::RParen) {
            return Some(self.cx.make_empty_tuple(line));
        }
        let mut args = self.parse_expr()?;
        while self.eat(Token::Comma) {
            let next = self.parse_expr()?;
            args = self.cx.make_tuple(args, next, line);
        }
        self.expect(Token::RParen, "')'");
        Some(args)
    }

    /// `lambda [type] (params) { ... }`: the return type defaults to int.
    fn parse_lambda(&mut self, line: u32) -> Option<NodeId> {
        self.bump();
        let return_ty = if self.at(Token::LParen) {
            self.cx.int_type(line)
        } else {
            match self.parse_type() {
                Some(ty) => ty,
                None => self.cx.int_type(line),
            }
        };
        self.expect(Token::LParen, "'('");
        let params = self.parse_params();
        self.expect(Token::RParen, "')'");

        let body = self.parse_block(&params)?;
        let args = self.cx.make_args(&params, line);
        Some(self.cx.make_closure(return_ty, args, body, line))
    }
}
