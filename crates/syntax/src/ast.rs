//! Abstract syntax tree.
//!
//! Every node carries the source [`Position`] of its first token. The
//! compiler walks this tree; it never sees source text.

use quill_core::Position;

/// A parsed program: a sequence of statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// A sequence of statements sharing a block scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

/// Compound-assignment selector. `Set` is plain `=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

/// The left-hand side of an assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Ident { name: String, position: Position },
    Index { object: Expr, index: Expr, position: Position },
    Attr { object: Expr, name: String, position: Position },
}

/// A `catch` clause: optional binding name plus the handler body.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub name: Option<String>,
    pub body: Block,
    pub position: Position,
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr {
        expr: Expr,
    },
    Let {
        names: Vec<String>,
        value: Expr,
        constant: bool,
        position: Position,
    },
    Assign {
        target: AssignTarget,
        op: AssignOp,
        value: Expr,
        position: Position,
    },
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
        position: Position,
    },
    ForIn {
        vars: Vec<String>,
        iterable: Expr,
        body: Block,
        position: Position,
    },
    ForCond {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
        position: Position,
    },
    Break {
        position: Position,
    },
    Continue {
        position: Position,
    },
    Return {
        value: Option<Expr>,
        position: Position,
    },
    Try {
        body: Block,
        catch: Option<CatchClause>,
        finally: Option<Block>,
        position: Position,
    },
    Throw {
        value: Expr,
        position: Position,
    },
    Func {
        name: String,
        function: FunctionLit,
        position: Position,
    },
}

impl Stmt {
    /// The source position of the statement's first token.
    pub fn position(&self) -> Position {
        match self {
            Stmt::Expr { expr } => expr.position(),
            Stmt::Let { position, .. }
            | Stmt::Assign { position, .. }
            | Stmt::If { position, .. }
            | Stmt::ForIn { position, .. }
            | Stmt::ForCond { position, .. }
            | Stmt::Break { position }
            | Stmt::Continue { position }
            | Stmt::Return { position, .. }
            | Stmt::Try { position, .. }
            | Stmt::Throw { position, .. }
            | Stmt::Func { position, .. } => position.clone(),
        }
    }
}

/// One parameter of a function literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
    pub position: Position,
}

/// A function literal: parameters, optional rest parameter, body.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLit {
    /// Function name; empty for anonymous literals.
    pub name: String,
    pub params: Vec<Param>,
    pub rest: Option<String>,
    pub body: Block,
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Neg,
    Not,
}

/// Infix operators, including comparisons and membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
    In,
}

/// Short-circuit logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// One element of a list literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ListItem {
    Item(Expr),
    Spread(Expr),
}

/// A map literal key: literal string or bare identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct MapKey {
    pub name: String,
    pub position: Position,
}

/// One entry of a map literal.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEntry {
    Pair { key: MapKey, value: Expr },
    Spread(Expr),
}

/// One argument in a call expression.
#[derive(Debug, Clone, PartialEq)]
pub enum CallArg {
    Positional(Expr),
    Spread(Expr),
}

/// One part of a template string.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    Expr(Box<Expr>),
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Nil {
        position: Position,
    },
    Bool {
        value: bool,
        position: Position,
    },
    Int {
        value: i64,
        position: Position,
    },
    Float {
        value: f64,
        position: Position,
    },
    Str {
        value: String,
        position: Position,
    },
    Template {
        parts: Vec<TemplatePart>,
        position: Position,
    },
    Ident {
        name: String,
        position: Position,
    },
    List {
        items: Vec<ListItem>,
        position: Position,
    },
    MapLit {
        entries: Vec<MapEntry>,
        position: Position,
    },
    Func {
        function: FunctionLit,
        position: Position,
    },
    Prefix {
        op: PrefixOp,
        operand: Box<Expr>,
        position: Position,
    },
    Infix {
        op: InfixOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        position: Position,
    },
    Logical {
        op: LogicalOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        position: Position,
    },
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        position: Position,
    },
    Range {
        start: Box<Expr>,
        stop: Box<Expr>,
        position: Position,
    },
    Pipe {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        position: Position,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<CallArg>,
        position: Position,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        position: Position,
    },
    Slice {
        object: Box<Expr>,
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
        position: Position,
    },
    Attr {
        object: Box<Expr>,
        name: String,
        position: Position,
    },
    OptAttr {
        object: Box<Expr>,
        name: String,
        position: Position,
    },
}

impl Expr {
    /// The source position of the expression's first token.
    pub fn position(&self) -> Position {
        match self {
            Expr::Nil { position }
            | Expr::Bool { position, .. }
            | Expr::Int { position, .. }
            | Expr::Float { position, .. }
            | Expr::Str { position, .. }
            | Expr::Template { position, .. }
            | Expr::Ident { position, .. }
            | Expr::List { position, .. }
            | Expr::MapLit { position, .. }
            | Expr::Func { position, .. }
            | Expr::Prefix { position, .. }
            | Expr::Infix { position, .. }
            | Expr::Logical { position, .. }
            | Expr::Ternary { position, .. }
            | Expr::Range { position, .. }
            | Expr::Pipe { position, .. }
            | Expr::Call { position, .. }
            | Expr::Index { position, .. }
            | Expr::Slice { position, .. }
            | Expr::Attr { position, .. }
            | Expr::OptAttr { position, .. } => position.clone(),
        }
    }

    /// True for the literal forms allowed as parameter defaults.
    pub fn is_literal(&self) -> bool {
        match self {
            Expr::Nil { .. }
            | Expr::Bool { .. }
            | Expr::Int { .. }
            | Expr::Float { .. }
            | Expr::Str { .. } => true,
            Expr::Prefix {
                op: PrefixOp::Neg,
                operand,
                ..
            } => matches!(**operand, Expr::Int { .. } | Expr::Float { .. }),
            _ => false,
        }
    }
}
