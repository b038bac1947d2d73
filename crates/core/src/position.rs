//! Source positions and locations.
//!
//! A [`Position`] identifies a point in a source text: the owning file
//! (when the source came from a named file), the byte offset, and the
//! 1-based line/column pair. Tokens and AST nodes all carry one. A
//! [`Location`] is the error-facing view, adding an optional source
//! snippet for rendering.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A point within a source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// The file the position points into, when known. Shared so that the
    /// per-token cost of carrying it is one reference count.
    pub file: Option<Arc<str>>,

    /// Byte offset from the start of the source.
    pub offset: usize,

    /// The 1-based line number.
    pub line: u32,

    /// The 1-based column number, counted in characters.
    pub column: u32,
}

impl Position {
    /// Creates an anonymous position from a line and column.
    pub fn new(line: u32, column: u32) -> Self {
        Self {
            file: None,
            offset: 0,
            line,
            column,
        }
    }

    /// Creates a fully specified position.
    pub fn at(file: Option<Arc<str>>, offset: usize, line: u32, column: u32) -> Self {
        Self {
            file,
            offset,
            line,
            column,
        }
    }

    /// Returns the file name, when one is attached.
    pub fn file_name(&self) -> Option<&str> {
        self.file.as_deref()
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.file_name() {
            Some(file) => write!(f, "{}:{}:{}", file, self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

/// A resolved source location: file name, position, and optionally the
/// offending source line for error rendering.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    /// The file name, when the source came from a named file.
    pub file: Option<String>,

    /// The 1-based line number.
    pub line: u32,

    /// The 1-based column number.
    pub column: u32,

    /// The source line containing the error, when available.
    pub snippet: Option<String>,
}

impl Location {
    /// Creates a location from a position, taking the file name the
    /// position carries.
    pub fn from_position(position: Position) -> Self {
        Self {
            file: position.file_name().map(str::to_string),
            line: position.line,
            column: position.column,
            snippet: None,
        }
    }

    /// Creates a location from an explicit file name and a position. The
    /// position's own file name is used when no explicit one is given.
    pub fn new(file: Option<String>, position: Position) -> Self {
        Self {
            file: file.or_else(|| position.file_name().map(str::to_string)),
            line: position.line,
            column: position.column,
            snippet: None,
        }
    }

    /// Attaches the source line the location points into.
    pub fn with_snippet<S: Into<String>>(mut self, snippet: S) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    /// Renders the snippet with a caret marking the column, when present.
    pub fn render_snippet(&self) -> Option<String> {
        let snippet = self.snippet.as_deref()?;
        let pad = " ".repeat(self.column.saturating_sub(1) as usize);
        Some(format!("{snippet}\n{pad}^"))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}:{}", file, self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_display() {
        assert_eq!(Position::new(3, 14).to_string(), "3:14");
        assert_eq!(Position::default().to_string(), "1:1");
        assert_eq!(
            Position::at(Some(Arc::from("main.qll")), 9, 3, 14).to_string(),
            "main.qll:3:14"
        );
    }

    #[test]
    fn test_position_carries_offset_and_file() {
        let position = Position::at(Some(Arc::from("main.qll")), 42, 2, 7);
        assert_eq!(position.offset, 42);
        assert_eq!(position.file_name(), Some("main.qll"));
    }

    #[test]
    fn test_location_display() {
        let loc = Location::new(Some("main.qll".to_string()), Position::new(2, 5));
        assert_eq!(loc.to_string(), "main.qll:2:5");

        let loc = Location::from_position(Position::new(2, 5));
        assert_eq!(loc.to_string(), "2:5");
    }

    #[test]
    fn test_location_inherits_position_file() {
        let position = Position::at(Some(Arc::from("lib.qll")), 0, 1, 1);
        assert_eq!(
            Location::from_position(position.clone()).file.as_deref(),
            Some("lib.qll")
        );
        // An explicit file name wins over the position's.
        let loc = Location::new(Some("other.qll".to_string()), position);
        assert_eq!(loc.file.as_deref(), Some("other.qll"));
    }

    #[test]
    fn test_snippet_caret() {
        let loc = Location::from_position(Position::new(1, 5)).with_snippet("let x = ;");
        assert_eq!(loc.render_snippet().unwrap(), "let x = ;\n    ^");
    }
}
