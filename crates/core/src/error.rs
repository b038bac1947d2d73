//! Error types for the Quill runtime.
//!
//! A single [`Error`] shape is shared by the lexer, parser, compiler, VM,
//! and host bridge: a kind tag, a message, an optional source location, and
//! an optional stack trace. Errors are also first-class script values; they
//! become active exceptions only when thrown.

use crate::position::Location;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

/// Classifies an error for both hosts and scripts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, ThisError, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Parse failure.
    #[error("syntax")]
    Syntax,

    /// Unresolved identifier, detected at compile time.
    #[error("name")]
    Name,

    /// Illegal operator or attribute for the value at hand.
    #[error("type")]
    Type,

    /// In-type but disallowed value, e.g. division by zero.
    #[error("value")]
    Value,

    /// Out-of-range index or wrong key type.
    #[error("index")]
    Index,

    /// Wrong arity or wrong-typed argument to a callable.
    #[error("args")]
    Args,

    /// Panic, cancellation, or I/O failure at run time.
    #[error("runtime")]
    Runtime,

    /// Missing module.
    #[error("import")]
    Import,
}

/// One frame of a captured stack trace, innermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFrame {
    /// The function name, or `"<main>"` for the root frame.
    pub function: String,

    /// Where execution stood in that frame when the error was raised.
    pub location: Option<Location>,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{} ({loc})", self.function),
            None => write!(f, "{}", self.function),
        }
    }
}

/// A structured runtime error: `{ kind, message, location?, stack? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    location: Option<Location>,
    stack: Vec<TraceFrame>,
}

impl Error {
    /// Creates an error with the given kind and message.
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
            stack: Vec::new(),
        }
    }

    /// Creates a new syntax error.
    pub fn syntax<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Syntax, message)
    }

    /// Creates a new name error.
    pub fn name<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Name, message)
    }

    /// Creates a new type error.
    pub fn type_error<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    /// Creates a new value error.
    pub fn value<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Value, message)
    }

    /// Creates a new index error.
    pub fn index<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Index, message)
    }

    /// Creates a new args error.
    pub fn args<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Args, message)
    }

    /// Creates a new runtime error.
    pub fn runtime<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    /// Creates a new import error.
    pub fn import<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Import, message)
    }

    /// The error raised when a host context cancels an evaluation.
    pub fn interrupted() -> Self {
        Self::runtime("interrupted")
    }

    /// Attaches a source location, keeping the first one set.
    pub fn with_location(mut self, location: Location) -> Self {
        if self.location.is_none() {
            self.location = Some(location);
        }
        self
    }

    /// Replaces the captured stack trace.
    pub fn with_stack(mut self, stack: Vec<TraceFrame>) -> Self {
        self.stack = stack;
        self
    }

    /// Fills in the file name on a location that lacks one.
    pub fn with_file(mut self, file: &str) -> Self {
        if let Some(location) = &mut self.location {
            if location.file.is_none() {
                location.file = Some(file.to_string());
            }
        }
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message without the kind prefix.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the source location, if one was recorded.
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// Returns the captured stack trace, innermost frame first.
    pub fn stack(&self) -> &[TraceFrame] {
        &self.stack
    }

    /// Returns true if a stack trace has been captured.
    pub fn has_stack(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Renders the error with location, snippet, and stack trace.
    pub fn detail(&self) -> String {
        let mut out = self.to_string();
        if let Some(rendered) = self.location.as_ref().and_then(Location::render_snippet) {
            out.push('\n');
            out.push_str(&rendered);
        }
        for frame in &self.stack {
            out.push_str("\n  in ");
            out.push_str(&frame.to_string());
        }
        out
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " at {location}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::Syntax.to_string(), "syntax");
        assert_eq!(ErrorKind::Value.to_string(), "value");
        assert_eq!(ErrorKind::Runtime.to_string(), "runtime");
    }

    #[test]
    fn test_error_display() {
        let err = Error::value("division by zero");
        assert_eq!(err.to_string(), "value: division by zero");

        let err = err.with_location(Location::new(
            Some("main.qll".to_string()),
            Position::new(4, 9),
        ));
        assert_eq!(err.to_string(), "value: division by zero at main.qll:4:9");
    }

    #[test]
    fn test_first_location_wins() {
        let inner = Location::from_position(Position::new(1, 2));
        let outer = Location::from_position(Position::new(9, 9));
        let err = Error::type_error("bad operand")
            .with_location(inner.clone())
            .with_location(outer);
        assert_eq!(err.location(), Some(&inner));
    }

    #[test]
    fn test_interrupted_shape() {
        let err = Error::interrupted();
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert_eq!(err.to_string(), "runtime: interrupted");
    }

    #[test]
    fn test_detail_includes_stack() {
        let err = Error::runtime("boom").with_stack(vec![TraceFrame {
            function: "inner".to_string(),
            location: Some(Location::from_position(Position::new(3, 1))),
        }]);
        let detail = err.detail();
        assert!(detail.contains("runtime: boom"));
        assert!(detail.contains("in inner (3:1)"));
    }
}
