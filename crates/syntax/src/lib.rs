//! Language front end for Quill: tokens, lexer, AST, and parser.
//!
//! The parser produces the AST consumed by the compiler. Every token and
//! node carries a source [`quill_core::Position`]; parse failures surface
//! as `syntax`-kind errors with that position attached.

mod ast;
mod lexer;
mod parser;
mod token;

pub use ast::{
    AssignOp, AssignTarget, Block, CallArg, CatchClause, Expr, FunctionLit, InfixOp, ListItem,
    LogicalOp, MapEntry, MapKey, Param, PrefixOp, Program, Stmt, TemplatePart,
};
pub use lexer::Lexer;
pub use parser::{parse, parse_with_file, Parser};
pub use token::{RawTemplatePart, Token, TokenKind};
