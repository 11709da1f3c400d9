#![deny(clippy::all)]

//! Python to JavaScript source-to-source compiler.
//!
//! A source module is parsed into a `SourceTree`, rewritten by the rules of
//! a `RuleRegistry` into a target tree, rendered to text and mapped back to
//! the source with a standard source map.

// Core modules
pub mod chars;
pub mod config;
pub mod error;
pub mod parse_util;

// Front end
pub mod py_parser;

// Compilation modules
pub mod output;
pub mod transform;

// Drivers
pub mod api;
pub mod bundle;
pub mod importing;

// Re-exports
pub use api::{standard_rules, translates, translates_with, Translation};
pub use bundle::{build_bundle, write_bundle, Bundle};
pub use config::{Features, TransformOptions, TranslateOptions};
pub use error::{CompilerError, Result};
pub use importing::{ordered_modules, SourcePath};
pub use output::source_map::{SourceMap, Token};
pub use transform::{RuleRegistry, Transformer};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
