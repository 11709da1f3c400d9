//! Parse Utilities
//!
//! Source positions and parse errors shared by the parser, the
//! transformation engine and the output layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Position of a source node: 1-based line, 0-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourcePos {
    pub line: u32,
    pub col: u32,
}

impl SourcePos {
    pub fn new(line: u32, col: u32) -> Self {
        SourcePos { line, col }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line: {}, column: {}", self.line, self.col)
    }
}

/// A location inside the text being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseLocation {
    /// Byte offset into the text
    pub offset: usize,
    /// 1-based line
    pub line: usize,
    /// 0-based column, in characters
    pub col: usize,
}

impl ParseLocation {
    pub fn new(offset: usize, line: usize, col: usize) -> Self {
        ParseLocation { offset, line, col }
    }

    pub fn pos(&self) -> SourcePos {
        SourcePos::new(self.line as u32, self.col as u32)
    }

    /// Text surrounding this location, at most `max_chars` characters and
    /// `max_lines` lines on each side.
    pub fn get_context(&self, content: &str, max_chars: usize, max_lines: usize) -> (String, String) {
        let mut offset = self.offset.min(content.len());
        while !content.is_char_boundary(offset) {
            offset -= 1;
        }
        let (head, tail) = content.split_at(offset);

        let mut before: Vec<char> = Vec::new();
        let mut lines = 0;
        for ch in head.chars().rev().take(max_chars) {
            if ch == '\n' {
                lines += 1;
                if lines >= max_lines {
                    break;
                }
            }
            before.push(ch);
        }
        before.reverse();

        let mut after = String::new();
        lines = 0;
        for ch in tail.chars().take(max_chars) {
            if ch == '\n' {
                lines += 1;
                if lines >= max_lines {
                    break;
                }
            }
            after.push(ch);
        }

        (before.into_iter().collect(), after)
    }
}

impl fmt::Display for ParseLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{msg} ({location})")]
pub struct ParseError {
    pub msg: String,
    pub location: ParseLocation,
}

impl ParseError {
    pub fn new(msg: impl Into<String>, location: ParseLocation) -> Self {
        ParseError {
            msg: msg.into(),
            location,
        }
    }

    /// The message with a marker pointing at the failing spot in `content`.
    pub fn contextual_message(&self, content: &str) -> String {
        let (before, after) = self.location.get_context(content, 100, 3);
        format!("{} (\"{}[ERROR ->]{}\")", self.msg, before, after)
    }
}
