//! Output Module
//!
//! Target tree, fragment rendering and the source map codec.

pub mod fragment;
pub mod js_ast;
pub mod source_map;
pub mod vlq;
