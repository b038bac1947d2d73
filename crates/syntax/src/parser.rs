//! Recursive-descent / Pratt parser.
//!
//! The whole token stream is lexed up front; the parser walks it with an
//! index, which makes the lookahead for `for ... in` headers and
//! assignment targets straightforward. Statement separators (`;`) are
//! optional. Postfix call/index chains and infix `-` do not continue
//! across a newline, so consecutive expression statements don't merge.

use crate::ast::*;
use crate::lexer::Lexer;
use crate::token::{RawTemplatePart, Token, TokenKind};
use quill_core::{Error, Location, Position, Result};
use std::sync::Arc;

const LOWEST: u8 = 0;
const TERNARY: u8 = 1;
const PIPE: u8 = 2;
const OR: u8 = 3;
const AND: u8 = 4;
const EQUALITY: u8 = 5;
const COMPARISON: u8 = 6;
const RANGE: u8 = 7;
const BIT_OR: u8 = 8;
const BIT_XOR: u8 = 9;
const BIT_AND: u8 = 10;
const SHIFT: u8 = 11;
const SUM: u8 = 12;
const PRODUCT: u8 = 13;
const POWER: u8 = 14;
const PREFIX: u8 = 15;
const POSTFIX: u8 = 16;

fn precedence(kind: &TokenKind) -> u8 {
    match kind {
        TokenKind::Question => TERNARY,
        TokenKind::PipeGt => PIPE,
        TokenKind::OrOr => OR,
        TokenKind::AndAnd => AND,
        TokenKind::EqEq | TokenKind::NotEq => EQUALITY,
        TokenKind::Lt | TokenKind::LtEq | TokenKind::Gt | TokenKind::GtEq | TokenKind::In => {
            COMPARISON
        }
        TokenKind::DotDot => RANGE,
        TokenKind::Pipe => BIT_OR,
        TokenKind::Caret => BIT_XOR,
        TokenKind::Amp => BIT_AND,
        TokenKind::Shl | TokenKind::Shr => SHIFT,
        TokenKind::Plus | TokenKind::Minus => SUM,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => PRODUCT,
        TokenKind::StarStar => POWER,
        TokenKind::LParen | TokenKind::LBracket | TokenKind::Dot | TokenKind::QuestionDot => {
            POSTFIX
        }
        _ => 0,
    }
}

/// Parses a complete program.
pub fn parse(source: &str) -> Result<Program> {
    Parser::new(source)?.parse_program()
}

/// Parses a complete program from a named file; the name is carried on
/// every node position.
pub fn parse_with_file(source: &str, file: Option<Arc<str>>) -> Result<Program> {
    Parser::with_file(source, file)?.parse_program()
}

/// The parser state: a token vector and a cursor.
pub struct Parser {
    tokens: Vec<Token>,
    lines: Vec<String>,
    pos: usize,
}

impl Parser {
    /// Lexes anonymous `source` and prepares a parser over it.
    pub fn new(source: &str) -> Result<Self> {
        Self::with_file(source, None)
    }

    /// Lexes `source` from a named file and prepares a parser over it.
    pub fn with_file(source: &str, file: Option<Arc<str>>) -> Result<Self> {
        let tokens = Lexer::with_file(source, file).tokenize()?;
        Ok(Self {
            tokens,
            lines: source.lines().map(str::to_string).collect(),
            pos: 0,
        })
    }

    fn error(&self, message: String, position: Position) -> Error {
        let snippet = self
            .lines
            .get(position.line as usize - 1)
            .cloned()
            .unwrap_or_default();
        Error::syntax(message)
            .with_location(Location::from_position(position).with_snippet(snippet))
    }

    fn current(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .unwrap_or_else(|| self.tokens.last().expect("token stream ends with Eof"))
    }

    fn peek_kind(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.at(&kind) {
            Ok(self.advance())
        } else {
            let current = self.current();
            Err(self.error(
                format!("expected {kind}, got {}", current.kind.describe()),
                current.position.clone(),
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Position)> {
        let current = self.current().clone();
        match current.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok((name, current.position))
            }
            other => Err(self.error(
                format!("expected identifier, got {}", other.describe()),
                current.position,
            )),
        }
    }

    /// Parses statements until end of input.
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut statements = Vec::new();
        while !self.at(&TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        let stmt = self.parse_statement_inner()?;
        while self.eat(&TokenKind::Semicolon) {}
        Ok(stmt)
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt> {
        match &self.current().kind {
            TokenKind::Let | TokenKind::Const => self.parse_let(),
            TokenKind::Func if self.is_func_declaration() => self.parse_func_statement(),
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Throw => {
                let position = self.advance().position;
                let value = self.parse_expression(LOWEST)?;
                Ok(Stmt::Throw { value, position })
            }
            TokenKind::Break => {
                let position = self.advance().position;
                Ok(Stmt::Break { position })
            }
            TokenKind::Continue => {
                let position = self.advance().position;
                Ok(Stmt::Continue { position })
            }
            TokenKind::Return => {
                let position = self.advance().position;
                let current = self.current();
                let value = if current.newline_before
                    || matches!(
                        current.kind,
                        TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
                    ) {
                    None
                } else {
                    Some(self.parse_expression(LOWEST)?)
                };
                Ok(Stmt::Return { value, position })
            }
            _ => self.parse_expr_or_assign(),
        }
    }

    /// `func name(...)` at statement level declares a binding; a bare
    /// `func(...)` is a function-literal expression.
    fn is_func_declaration(&self) -> bool {
        matches!(self.peek_kind(1), Some(TokenKind::Ident(_)))
            && matches!(self.peek_kind(2), Some(TokenKind::LParen))
    }

    fn parse_let(&mut self) -> Result<Stmt> {
        let keyword = self.advance();
        let constant = keyword.kind == TokenKind::Const;
        let mut names = vec![self.expect_ident()?.0];
        while self.eat(&TokenKind::Comma) {
            names.push(self.expect_ident()?.0);
        }
        self.expect(TokenKind::Assign)?;
        let value = self.parse_expression(LOWEST)?;
        Ok(Stmt::Let {
            names,
            value,
            constant,
            position: keyword.position,
        })
    }

    fn parse_func_statement(&mut self) -> Result<Stmt> {
        let position = self.advance().position; // func
        let (name, _) = self.expect_ident()?;
        let function = self.parse_function_rest(name.clone())?;
        Ok(Stmt::Func {
            name,
            function,
            position,
        })
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        let position = self.advance().position; // if
        let cond = self.parse_expression(LOWEST)?;
        let then_block = self.parse_block()?;
        let else_block = if self.eat(&TokenKind::Else) {
            if self.at(&TokenKind::If) {
                let nested = self.parse_if()?;
                Some(Block {
                    statements: vec![nested],
                })
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_block,
            else_block,
            position,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        let position = self.advance().position; // for

        if self.at(&TokenKind::LBrace) {
            let body = self.parse_block()?;
            return Ok(Stmt::ForCond {
                init: None,
                cond: None,
                post: None,
                body,
                position,
            });
        }

        if let Some(vars) = self.try_for_in_header() {
            self.expect(TokenKind::In)?;
            let iterable = self.parse_expression(LOWEST)?;
            let body = self.parse_block()?;
            return Ok(Stmt::ForIn {
                vars,
                iterable,
                body,
                position,
            });
        }

        let first = self.parse_for_clause()?;
        if self.eat(&TokenKind::Semicolon) {
            let cond = if self.at(&TokenKind::Semicolon) {
                None
            } else {
                Some(self.parse_expression(LOWEST)?)
            };
            self.expect(TokenKind::Semicolon)?;
            let post = if self.at(&TokenKind::LBrace) {
                None
            } else {
                Some(Box::new(self.parse_for_clause()?))
            };
            let body = self.parse_block()?;
            return Ok(Stmt::ForCond {
                init: Some(Box::new(first)),
                cond,
                post,
                body,
                position,
            });
        }

        match first {
            Stmt::Expr { expr } => {
                let body = self.parse_block()?;
                Ok(Stmt::ForCond {
                    init: None,
                    cond: Some(expr),
                    post: None,
                    body,
                    position,
                })
            }
            other => Err(self.error(
                "expected ';' after for-loop initializer".to_string(),
                other.position(),
            )),
        }
    }

    /// Matches `ident (, ident)* in` without consuming on failure.
    fn try_for_in_header(&mut self) -> Option<Vec<String>> {
        let start = self.pos;
        let mut vars = Vec::new();
        loop {
            match &self.current().kind {
                TokenKind::Ident(name) => {
                    vars.push(name.clone());
                    self.advance();
                }
                _ => break,
            }
            match &self.current().kind {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::In => return Some(vars),
                _ => break,
            }
        }
        self.pos = start;
        None
    }

    /// A statement allowed in a `for` init/post clause.
    fn parse_for_clause(&mut self) -> Result<Stmt> {
        match &self.current().kind {
            TokenKind::Let | TokenKind::Const => self.parse_let(),
            _ => self.parse_expr_or_assign(),
        }
    }

    fn parse_try(&mut self) -> Result<Stmt> {
        let position = self.advance().position; // try
        let body = self.parse_block()?;

        let catch = if self.at(&TokenKind::Catch) {
            let catch_position = self.advance().position;
            let name = match &self.current().kind {
                TokenKind::Ident(name) => {
                    let name = name.clone();
                    self.advance();
                    Some(name)
                }
                _ => None,
            };
            let body = self.parse_block()?;
            Some(CatchClause {
                name,
                body,
                position: catch_position,
            })
        } else {
            None
        };

        let finally = if self.eat(&TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };

        if catch.is_none() && finally.is_none() {
            return Err(self.error(
                "try statement requires a catch or finally block".to_string(),
                position,
            ));
        }
        Ok(Stmt::Try {
            body,
            catch,
            finally,
            position,
        })
    }

    fn parse_expr_or_assign(&mut self) -> Result<Stmt> {
        let expr = self.parse_expression(LOWEST)?;
        let op = match self.current().kind {
            TokenKind::Assign => Some(AssignOp::Set),
            TokenKind::PlusAssign => Some(AssignOp::Add),
            TokenKind::MinusAssign => Some(AssignOp::Sub),
            TokenKind::StarAssign => Some(AssignOp::Mul),
            TokenKind::SlashAssign => Some(AssignOp::Div),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(Stmt::Expr { expr });
        };
        let position = self.advance().position;
        let target = self.assign_target(expr)?;
        let value = self.parse_expression(LOWEST)?;
        Ok(Stmt::Assign {
            target,
            op,
            value,
            position,
        })
    }

    fn assign_target(&self, expr: Expr) -> Result<AssignTarget> {
        match expr {
            Expr::Ident { name, position } => Ok(AssignTarget::Ident { name, position }),
            Expr::Index {
                object,
                index,
                position,
            } => Ok(AssignTarget::Index {
                object: *object,
                index: *index,
                position,
            }),
            Expr::Attr {
                object,
                name,
                position,
            } => Ok(AssignTarget::Attr {
                object: *object,
                name,
                position,
            }),
            other => Err(self.error("invalid assignment target".to_string(), other.position())),
        }
    }

    fn parse_block(&mut self) -> Result<Block> {
        self.expect(TokenKind::LBrace)?;
        let mut statements = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            if self.at(&TokenKind::Eof) {
                let position = self.current().position.clone();
                return Err(self.error("unterminated block".to_string(), position));
            }
            statements.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Block { statements })
    }

    fn parse_expression(&mut self, min_prec: u8) -> Result<Expr> {
        let mut left = self.parse_prefix()?;
        loop {
            let token = self.current();
            // A postfix chain or infix minus never continues onto a new
            // line; this is what terminates expression statements.
            if token.newline_before
                && matches!(
                    token.kind,
                    TokenKind::LParen | TokenKind::LBracket | TokenKind::Minus
                )
            {
                break;
            }
            let prec = precedence(&token.kind);
            if prec == 0 || prec <= min_prec {
                break;
            }
            left = self.parse_infix(left)?;
        }
        Ok(left)
    }

    fn parse_infix(&mut self, lhs: Expr) -> Result<Expr> {
        let token = self.advance();
        let position = token.position;
        let prec = precedence(&token.kind);
        match token.kind {
            TokenKind::Question => {
                let then_expr = self.parse_expression(LOWEST)?;
                self.expect(TokenKind::Colon)?;
                let else_expr = self.parse_expression(TERNARY - 1)?;
                Ok(Expr::Ternary {
                    cond: Box::new(lhs),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                    position,
                })
            }
            TokenKind::PipeGt => {
                let rhs = self.parse_expression(PIPE)?;
                Ok(Expr::Pipe {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    position,
                })
            }
            TokenKind::OrOr => {
                let rhs = self.parse_expression(prec)?;
                Ok(Expr::Logical {
                    op: LogicalOp::Or,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    position,
                })
            }
            TokenKind::AndAnd => {
                let rhs = self.parse_expression(prec)?;
                Ok(Expr::Logical {
                    op: LogicalOp::And,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    position,
                })
            }
            TokenKind::DotDot => {
                let rhs = self.parse_expression(RANGE)?;
                Ok(Expr::Range {
                    start: Box::new(lhs),
                    stop: Box::new(rhs),
                    position,
                })
            }
            TokenKind::LParen => {
                let args = self.parse_call_args()?;
                Ok(Expr::Call {
                    callee: Box::new(lhs),
                    args,
                    position,
                })
            }
            TokenKind::LBracket => self.parse_index_or_slice(lhs, position),
            TokenKind::Dot => {
                let (name, _) = self.expect_ident()?;
                Ok(Expr::Attr {
                    object: Box::new(lhs),
                    name,
                    position,
                })
            }
            TokenKind::QuestionDot => {
                let (name, _) = self.expect_ident()?;
                Ok(Expr::OptAttr {
                    object: Box::new(lhs),
                    name,
                    position,
                })
            }
            TokenKind::StarStar => {
                // Right-associative.
                let rhs = self.parse_expression(POWER - 1)?;
                Ok(Expr::Infix {
                    op: InfixOp::Pow,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    position,
                })
            }
            kind => {
                let op = match kind {
                    TokenKind::Plus => InfixOp::Add,
                    TokenKind::Minus => InfixOp::Sub,
                    TokenKind::Star => InfixOp::Mul,
                    TokenKind::Slash => InfixOp::Div,
                    TokenKind::Percent => InfixOp::Mod,
                    TokenKind::Amp => InfixOp::BitAnd,
                    TokenKind::Pipe => InfixOp::BitOr,
                    TokenKind::Caret => InfixOp::BitXor,
                    TokenKind::Shl => InfixOp::Shl,
                    TokenKind::Shr => InfixOp::Shr,
                    TokenKind::Lt => InfixOp::Lt,
                    TokenKind::LtEq => InfixOp::LtEq,
                    TokenKind::Gt => InfixOp::Gt,
                    TokenKind::GtEq => InfixOp::GtEq,
                    TokenKind::EqEq => InfixOp::Eq,
                    TokenKind::NotEq => InfixOp::NotEq,
                    TokenKind::In => InfixOp::In,
                    other => {
                        return Err(self.error(
                            format!("unexpected token {other} in expression"),
                            position,
                        ))
                    }
                };
                let rhs = self.parse_expression(prec)?;
                Ok(Expr::Infix {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    position,
                })
            }
        }
    }

    fn parse_index_or_slice(&mut self, object: Expr, position: Position) -> Result<Expr> {
        let start = if self.at(&TokenKind::Colon) {
            None
        } else {
            Some(Box::new(self.parse_expression(LOWEST)?))
        };
        if self.eat(&TokenKind::Colon) {
            let stop = if self.at(&TokenKind::RBracket) {
                None
            } else {
                Some(Box::new(self.parse_expression(LOWEST)?))
            };
            self.expect(TokenKind::RBracket)?;
            return Ok(Expr::Slice {
                object: Box::new(object),
                start,
                stop,
                position,
            });
        }
        self.expect(TokenKind::RBracket)?;
        match start {
            Some(index) => Ok(Expr::Index {
                object: Box::new(object),
                index,
                position,
            }),
            None => Err(self.error("missing index expression".to_string(), position)),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<CallArg>> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            if self.eat(&TokenKind::Ellipsis) {
                args.push(CallArg::Spread(self.parse_expression(LOWEST)?));
            } else {
                args.push(CallArg::Positional(self.parse_expression(LOWEST)?));
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            if self.at(&TokenKind::RParen) {
                break; // trailing comma
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_prefix(&mut self) -> Result<Expr> {
        let token = self.current().clone();
        let position = token.position;
        match token.kind {
            TokenKind::Int(value) => {
                self.advance();
                Ok(Expr::Int { value, position })
            }
            TokenKind::Float(value) => {
                self.advance();
                Ok(Expr::Float { value, position })
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(Expr::Str { value, position })
            }
            TokenKind::Template(parts) => {
                self.advance();
                self.parse_template(parts, position)
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Ident { name, position })
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Expr::Nil { position })
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool {
                    value: true,
                    position,
                })
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool {
                    value: false,
                    position,
                })
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_expression(PREFIX)?;
                Ok(Expr::Prefix {
                    op: PrefixOp::Neg,
                    operand: Box::new(operand),
                    position,
                })
            }
            TokenKind::Bang => {
                self.advance();
                let operand = self.parse_expression(PREFIX)?;
                Ok(Expr::Prefix {
                    op: PrefixOp::Not,
                    operand: Box::new(operand),
                    position,
                })
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression(LOWEST)?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_list_literal(),
            TokenKind::LBrace => self.parse_map_literal(),
            TokenKind::Func => self.parse_function_literal(),
            other => Err(self.error(
                format!("unexpected {} in expression", other.describe()),
                position,
            )),
        }
    }

    fn parse_template(&mut self, parts: Vec<RawTemplatePart>, position: Position) -> Result<Expr> {
        let mut parsed = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                RawTemplatePart::Literal(text) => parsed.push(TemplatePart::Literal(text)),
                RawTemplatePart::Expr {
                    source,
                    position: part_position,
                } => {
                    let expr = parse_template_expr(&source).map_err(|err| {
                        self.error(
                            format!("in template expression: {}", err.message()),
                            part_position,
                        )
                    })?;
                    parsed.push(TemplatePart::Expr(Box::new(expr)));
                }
            }
        }
        Ok(Expr::Template {
            parts: parsed,
            position,
        })
    }

    fn parse_list_literal(&mut self) -> Result<Expr> {
        let position = self.advance().position; // [
        let mut items = Vec::new();
        if self.eat(&TokenKind::RBracket) {
            return Ok(Expr::List { items, position });
        }
        loop {
            if self.eat(&TokenKind::Ellipsis) {
                items.push(ListItem::Spread(self.parse_expression(LOWEST)?));
            } else {
                items.push(ListItem::Item(self.parse_expression(LOWEST)?));
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            if self.at(&TokenKind::RBracket) {
                break; // trailing comma
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(Expr::List { items, position })
    }

    fn parse_map_literal(&mut self) -> Result<Expr> {
        let position = self.advance().position; // {
        let mut entries = Vec::new();
        if self.eat(&TokenKind::RBrace) {
            return Ok(Expr::MapLit { entries, position });
        }
        loop {
            if self.eat(&TokenKind::Ellipsis) {
                entries.push(MapEntry::Spread(self.parse_expression(LOWEST)?));
            } else {
                let current = self.current().clone();
                let key = match current.kind {
                    TokenKind::Str(name) => {
                        self.advance();
                        MapKey {
                            name,
                            position: current.position,
                        }
                    }
                    TokenKind::Ident(name) => {
                        self.advance();
                        MapKey {
                            name,
                            position: current.position,
                        }
                    }
                    other => {
                        return Err(self.error(
                            format!("expected map key, got {}", other.describe()),
                            current.position,
                        ))
                    }
                };
                self.expect(TokenKind::Colon)?;
                let value = self.parse_expression(LOWEST)?;
                entries.push(MapEntry::Pair { key, value });
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            if self.at(&TokenKind::RBrace) {
                break; // trailing comma
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Expr::MapLit { entries, position })
    }

    fn parse_function_literal(&mut self) -> Result<Expr> {
        let position = self.advance().position; // func
        let name = match &self.current().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                name
            }
            _ => String::new(),
        };
        let function = self.parse_function_rest(name)?;
        Ok(Expr::Func { function, position })
    }

    /// Parses `(params) { body }` after the name.
    fn parse_function_rest(&mut self, name: String) -> Result<FunctionLit> {
        self.expect(TokenKind::LParen)?;
        let mut params: Vec<Param> = Vec::new();
        let mut rest = None;
        while !self.at(&TokenKind::RParen) {
            if self.eat(&TokenKind::Star) {
                let (rest_name, rest_position) = self.expect_ident()?;
                if rest.is_some() {
                    return Err(self.error(
                        "only one rest parameter is allowed".to_string(),
                        rest_position,
                    ));
                }
                rest = Some(rest_name);
                if !self.at(&TokenKind::RParen) {
                    return Err(self.error(
                        "rest parameter must be last".to_string(),
                        rest_position,
                    ));
                }
                break;
            }
            let (param_name, param_position) = self.expect_ident()?;
            let default = if self.eat(&TokenKind::Assign) {
                let value = self.parse_expression(LOWEST)?;
                if !value.is_literal() {
                    return Err(self.error(
                        "default parameter value must be a literal".to_string(),
                        value.position(),
                    ));
                }
                Some(value)
            } else {
                None
            };
            if default.is_none() && params.iter().any(|p| p.default.is_some()) {
                return Err(self.error(
                    format!("parameter {param_name:?} without default follows one with a default"),
                    param_position,
                ));
            }
            params.push(Param {
                name: param_name,
                default,
                position: param_position,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(FunctionLit {
            name,
            params,
            rest,
            body,
        })
    }
}

fn parse_template_expr(source: &str) -> Result<Expr> {
    let mut parser = Parser::new(source)?;
    let expr = parser.parse_expression(LOWEST)?;
    if !parser.at(&TokenKind::Eof) {
        let current = parser.current();
        return Err(Error::syntax(format!(
            "unexpected {} after template expression",
            current.kind.describe()
        )));
    }
    Ok(expr)
}
