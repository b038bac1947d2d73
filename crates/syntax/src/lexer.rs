//! Hand-written lexer.
//!
//! Produces the full token stream up front; the parser indexes into it,
//! which keeps lookahead and backtracking trivial. Every token carries a
//! full source position (file, byte offset, line, column). Template
//! strings are delimited by single quotes and may interpolate `{expr}`
//! segments; the lexer captures the raw expression text and the parser
//! parses it.

use crate::token::{RawTemplatePart, Token, TokenKind, KEYWORDS};
use quill_core::{Error, Location, Position, Result};
use std::sync::Arc;

/// Streaming tokenizer over source text.
pub struct Lexer<'a> {
    chars: Vec<char>,
    source: &'a str,
    file: Option<Arc<str>>,
    pos: usize,
    offset: usize,
    line: u32,
    column: u32,
    pending_newline: bool,
}

impl<'a> Lexer<'a> {
    /// Creates a lexer over anonymous source text.
    pub fn new(source: &'a str) -> Self {
        Self::with_file(source, None)
    }

    /// Creates a lexer over source text from a named file; the name is
    /// attached to every token position.
    pub fn with_file(source: &'a str, file: Option<Arc<str>>) -> Self {
        Self {
            chars: source.chars().collect(),
            source,
            file,
            pos: 0,
            offset: 0,
            line: 1,
            column: 1,
            pending_newline: false,
        }
    }

    /// Tokenizes the entire input.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn error(&self, message: String, position: &Position) -> Error {
        let snippet = self
            .source
            .lines()
            .nth(position.line as usize - 1)
            .unwrap_or("");
        Error::syntax(message)
            .with_location(Location::from_position(position.clone()).with_snippet(snippet))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
            self.pending_newline = true;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn position(&self) -> Position {
        Position::at(self.file.clone(), self.offset, self.line, self.column)
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let start = self.position();
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => {
                                self.advance();
                            }
                            None => {
                                return Err(
                                    self.error("unterminated block comment".to_string(), &start)
                                )
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia()?;
        let newline_before = self.pending_newline;
        self.pending_newline = false;
        let position = self.position();

        let kind = match self.peek() {
            None => TokenKind::Eof,
            Some(c) if c.is_ascii_digit() => self.read_number(&position)?,
            Some(c) if c.is_alphabetic() || c == '_' => self.read_ident(),
            Some('"') => self.read_string(&position)?,
            Some('\'') => self.read_template(&position)?,
            Some(other) => {
                self.advance();
                self.read_punct(other, &position)?
            }
        };
        Ok(Token {
            kind,
            position,
            newline_before,
        })
    }

    /// Reads the punctuation or operator token beginning with `c`, whose
    /// first character has already been consumed.
    fn read_punct(&mut self, c: char, position: &Position) -> Result<TokenKind> {
        let two = |lexer: &mut Self, expected: char, yes: TokenKind, no: TokenKind| {
            if lexer.peek() == Some(expected) {
                lexer.advance();
                yes
            } else {
                no
            }
        };

        let kind = match c {
            '+' => two(self, '=', TokenKind::PlusAssign, TokenKind::Plus),
            '-' => two(self, '=', TokenKind::MinusAssign, TokenKind::Minus),
            '*' => {
                if self.peek() == Some('*') {
                    self.advance();
                    TokenKind::StarStar
                } else {
                    two(self, '=', TokenKind::StarAssign, TokenKind::Star)
                }
            }
            '/' => two(self, '=', TokenKind::SlashAssign, TokenKind::Slash),
            '%' => TokenKind::Percent,
            '&' => two(self, '&', TokenKind::AndAnd, TokenKind::Amp),
            '|' => {
                if self.peek() == Some('|') {
                    self.advance();
                    TokenKind::OrOr
                } else if self.peek() == Some('>') {
                    self.advance();
                    TokenKind::PipeGt
                } else {
                    TokenKind::Pipe
                }
            }
            '^' => TokenKind::Caret,
            '!' => two(self, '=', TokenKind::NotEq, TokenKind::Bang),
            '<' => {
                if self.peek() == Some('<') {
                    self.advance();
                    TokenKind::Shl
                } else {
                    two(self, '=', TokenKind::LtEq, TokenKind::Lt)
                }
            }
            '>' => {
                if self.peek() == Some('>') {
                    self.advance();
                    TokenKind::Shr
                } else {
                    two(self, '=', TokenKind::GtEq, TokenKind::Gt)
                }
            }
            '=' => two(self, '=', TokenKind::EqEq, TokenKind::Assign),
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            '.' => {
                if self.peek() == Some('.') {
                    self.advance();
                    if self.peek() == Some('.') {
                        self.advance();
                        TokenKind::Ellipsis
                    } else {
                        TokenKind::DotDot
                    }
                } else {
                    TokenKind::Dot
                }
            }
            '?' => two(self, '.', TokenKind::QuestionDot, TokenKind::Question),
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            other => {
                return Err(self.error(format!("unexpected character {other:?}"), position));
            }
        };
        Ok(kind)
    }

    fn read_number(&mut self, position: &Position) -> Result<TokenKind> {
        let start = self.pos;
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.advance();
            self.advance();
            let digits_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit() || c == '_') {
                self.advance();
            }
            let digits: String = self.chars[digits_start..self.pos]
                .iter()
                .filter(|&&c| c != '_')
                .collect();
            if digits.is_empty() {
                return Err(self.error("malformed hex literal".to_string(), position));
            }
            return i64::from_str_radix(&digits, 16)
                .map(TokenKind::Int)
                .map_err(|_| self.error("hex literal out of range".to_string(), position));
        }

        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '_') {
            self.advance();
        }
        let mut is_float = false;
        // A '.' begins a fraction only when a digit follows; `1..2` lexes
        // as a range over ints.
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '_') {
                self.advance();
            }
        }
        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|&&c| c != '_')
            .collect();
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| self.error("malformed float literal".to_string(), position))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| self.error("integer literal out of range".to_string(), position))
        }
    }

    fn read_ident(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match KEYWORDS.get(text.as_str()) {
            Some(kind) => kind.clone(),
            None => TokenKind::Ident(text),
        }
    }

    fn read_escape(&mut self, position: &Position) -> Result<char> {
        match self.advance() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('0') => Ok('\0'),
            Some('\\') => Ok('\\'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some('{') => Ok('{'),
            Some('}') => Ok('}'),
            Some(other) => Err(self.error(format!("unknown escape sequence \\{other}"), position)),
            None => Err(self.error("unterminated string".to_string(), position)),
        }
    }

    fn read_string(&mut self, position: &Position) -> Result<TokenKind> {
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.advance() {
                Some('"') => return Ok(TokenKind::Str(text)),
                Some('\\') => text.push(self.read_escape(position)?),
                Some(c) => text.push(c),
                None => return Err(self.error("unterminated string".to_string(), position)),
            }
        }
    }

    fn read_template(&mut self, position: &Position) -> Result<TokenKind> {
        self.advance(); // opening quote
        let mut parts = Vec::new();
        let mut literal = String::new();
        loop {
            match self.advance() {
                Some('\'') => {
                    if !literal.is_empty() {
                        parts.push(RawTemplatePart::Literal(literal));
                    }
                    return Ok(TokenKind::Template(parts));
                }
                Some('\\') => literal.push(self.read_escape(position)?),
                Some('{') => {
                    if !literal.is_empty() {
                        parts.push(RawTemplatePart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(self.read_template_expr(position)?);
                }
                Some(c) => literal.push(c),
                None => {
                    return Err(self.error("unterminated template string".to_string(), position))
                }
            }
        }
    }

    /// Captures the raw source of one `{expr}` segment, tracking brace
    /// nesting and skipping string literals inside the expression.
    fn read_template_expr(&mut self, open: &Position) -> Result<RawTemplatePart> {
        let position = self.position();
        let start = self.pos;
        let mut depth = 1usize;
        loop {
            match self.peek() {
                Some('{') => {
                    depth += 1;
                    self.advance();
                }
                Some('}') => {
                    depth -= 1;
                    if depth == 0 {
                        let source: String = self.chars[start..self.pos].iter().collect();
                        self.advance(); // closing brace
                        if source.trim().is_empty() {
                            return Err(
                                self.error("empty template expression".to_string(), &position)
                            );
                        }
                        return Ok(RawTemplatePart::Expr { source, position });
                    }
                    self.advance();
                }
                Some('"') => {
                    self.advance();
                    loop {
                        match self.advance() {
                            Some('"') => break,
                            Some('\\') => {
                                self.advance();
                            }
                            Some(_) => {}
                            None => {
                                return Err(self
                                    .error("unterminated template string".to_string(), open))
                            }
                        }
                    }
                }
                Some(_) => {
                    self.advance();
                }
                None => {
                    return Err(self.error("unterminated template expression".to_string(), open))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1 2.5 0xff 1_000"),
            vec![
                TokenKind::Int(1),
                TokenKind::Float(2.5),
                TokenKind::Int(255),
                TokenKind::Int(1000),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_range_vs_float() {
        assert_eq!(
            kinds("1..3"),
            vec![
                TokenKind::Int(1),
                TokenKind::DotDot,
                TokenKind::Int(3),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a |> b || c | d ** e"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::PipeGt,
                TokenKind::Ident("b".to_string()),
                TokenKind::OrOr,
                TokenKind::Ident("c".to_string()),
                TokenKind::Pipe,
                TokenKind::Ident("d".to_string()),
                TokenKind::StarStar,
                TokenKind::Ident("e".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_keywords_and_idents() {
        assert_eq!(
            kinds("let x = nil"),
            vec![
                TokenKind::Let,
                TokenKind::Ident("x".to_string()),
                TokenKind::Assign,
                TokenKind::Nil,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\nb""#),
            vec![TokenKind::Str("a\nb".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_positions_carry_byte_offsets() {
        let tokens = Lexer::new("ab +\nhé").tokenize().unwrap();
        assert_eq!(tokens[0].position.offset, 0); // ab
        assert_eq!(tokens[1].position.offset, 3); // +
        assert_eq!(tokens[2].position.offset, 5); // hé, after the newline
        assert_eq!(tokens[2].position.line, 2);
        assert_eq!(tokens[2].position.column, 1);
        // é is two bytes, so Eof lands past them.
        assert_eq!(tokens[3].position.offset, 8);
    }

    #[test]
    fn test_positions_carry_file_name() {
        let tokens = Lexer::with_file("x", Some(Arc::from("demo.qll")))
            .tokenize()
            .unwrap();
        assert_eq!(tokens[0].position.file_name(), Some("demo.qll"));
        assert_eq!(tokens[0].position.to_string(), "demo.qll:1:1");

        let tokens = Lexer::new("x").tokenize().unwrap();
        assert_eq!(tokens[0].position.file_name(), None);
    }

    #[test]
    fn test_comments_and_newline_flag() {
        let tokens = Lexer::new("a // comment\nb /* c */ d").tokenize().unwrap();
        assert_eq!(tokens.len(), 4);
        assert!(!tokens[0].newline_before);
        assert!(tokens[1].newline_before);
        assert!(!tokens[2].newline_before);
    }

    #[test]
    fn test_template_parts() {
        let tokens = Lexer::new("'hi {name}!'").tokenize().unwrap();
        match &tokens[0].kind {
            TokenKind::Template(parts) => {
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[0], RawTemplatePart::Literal("hi ".to_string()));
                assert!(
                    matches!(&parts[1], RawTemplatePart::Expr { source, .. } if source == "name")
                );
                assert_eq!(parts[2], RawTemplatePart::Literal("!".to_string()));
            }
            other => panic!("expected template, got {other:?}"),
        }
    }

    #[test]
    fn test_template_nested_braces() {
        let tokens = Lexer::new(r#"'{ {"a": 1}["a"] }'"#).tokenize().unwrap();
        match &tokens[0].kind {
            TokenKind::Template(parts) => {
                assert_eq!(parts.len(), 1);
                assert!(matches!(
                    &parts[0],
                    RawTemplatePart::Expr { source, .. } if source.contains("{\"a\": 1}")
                ));
            }
            other => panic!("expected template, got {other:?}"),
        }
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::new("let @ = 1").tokenize().unwrap_err();
        assert_eq!(err.kind(), quill_core::ErrorKind::Syntax);
        assert!(err.to_string().contains('@'));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(Lexer::new("\"abc").tokenize().is_err());
        assert!(Lexer::new("'abc {x").tokenize().is_err());
    }
}
