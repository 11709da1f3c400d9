//! Source Language Parser
//!
//! Turns source text into a `SourceTree`. The transformation engine only
//! depends on the `Parse` trait, so an alternative front end can be
//! plugged in without touching the rules.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{Field, NodeId, NodeKind, SourceNode, SourceTree};
pub use parser::PyParser;

use crate::parse_util::ParseError;

/// A front end producing source trees.
pub trait Parse: Send + Sync {
    fn parse(&self, text: &str) -> Result<SourceTree, ParseError>;
}
