//! Transformation Module
//!
//! Rule driven rewrite of source trees into target trees.

pub mod context;
pub mod registry;
pub mod rules;
pub mod snippets;
pub mod transformer;
pub mod util;

pub use context::{ContextStack, CtxValue};
pub use registry::{Rule, RuleProvider, RuleRegistry, PROVIDERS};
pub use snippets::Snippet;
pub use transformer::{Transformer, Warning};
