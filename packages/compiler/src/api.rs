//! Translation API
//!
//! Single unit entry point: source text in, JavaScript text and its source
//! map out.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::config::TranslateOptions;
use crate::error::{RegistryError, Result};
use crate::output::fragment::Block;
use crate::output::source_map::SourceMap;
use crate::py_parser::{NodeId, NodeKind, SourceTree};
use crate::transform::util::dedent;
use crate::transform::{RuleRegistry, Transformer, Warning};

static STANDARD_RULES: OnceCell<Arc<RuleRegistry>> = OnceCell::new();

/// The shipped rule registry, built on first use and shared afterwards.
pub fn standard_rules() -> std::result::Result<Arc<RuleRegistry>, RegistryError> {
    STANDARD_RULES
        .get_or_try_init(|| RuleRegistry::standard().map(Arc::new))
        .map(Arc::clone)
}

/// Output of a translation.
#[derive(Debug, Clone)]
pub struct Translation {
    /// Generated code, followed by the inline map pragma when requested
    pub text: String,
    pub source_map: SourceMap,
    pub warnings: Vec<Warning>,
}

/// Translate `src` into JavaScript.
pub fn translates(src: &str, options: &TranslateOptions) -> Result<Translation> {
    translates_with(standard_rules()?, src, options)
}

/// Translate `src` using the rules of `registry`.
pub fn translates_with(registry: Arc<RuleRegistry>, src: &str, options: &TranslateOptions) -> Result<Translation> {
    let (sline, mut scol) = options.src_offset;
    let text = if options.dedent {
        let (dedented, margin) = dedent(src);
        scol += margin as u32;
        dedented
    } else {
        src.to_string()
    };

    let mut t = Transformer::new(registry, options.transform);
    let tree = t.parse(&text)?;
    let body = unit_body(&tree, options.body_only);
    let (mut node, mut declared) = t.transform_body(Arc::new(tree), &body)?;

    // the snippets block goes first and shares the hoisted `var`
    if let Some((mut snippets, snippet_names)) = t.transform_snippets()? {
        snippets.extend(node);
        node = snippets;
        declared = merge_names(snippet_names, declared);
    }
    if let Some(decl) = t.declaration(declared)? {
        node.prepend(decl);
    }

    let block = Block::new(&node.serialize());
    let source = options.complete_src.as_deref().unwrap_or(src);
    let source_map = block.sourcemap(source, &options.src_filename, (sline, scol), options.dst_offset)?;
    for token in source_map.tokens() {
        debug!(
            dst_line = token.dst_line,
            dst_col = token.dst_col,
            src_line = token.src_line.saturating_sub(sline),
            src_col = token.src_col.saturating_sub(scol),
            name = token.name.as_deref().unwrap_or(""),
            "mapped"
        );
    }

    let mut text = block.into_text();
    if options.inline_map {
        text.push_str(&source_map.stringify(true)?);
    }
    Ok(Translation {
        text,
        source_map,
        warnings: t.take_warnings(),
    })
}

/// `first` followed by the names of `second` it does not already hold.
pub(crate) fn merge_names(first: Vec<String>, second: Vec<String>) -> Vec<String> {
    let mut names = first;
    for name in second {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Statements to translate: the module body, or with `body_only` the body
/// of its single top-level statement without a trailing `return`.
fn unit_body(tree: &SourceTree, body_only: bool) -> Vec<NodeId> {
    let top = tree.children(tree.root(), "body");
    if body_only {
        if let [single] = top {
            let inner = tree.children(*single, "body");
            if !inner.is_empty() {
                let mut inner = inner.to_vec();
                if inner.last().map(|&last| tree.is(last, NodeKind::Return)).unwrap_or(false) {
                    inner.pop();
                }
                return inner;
            }
        }
    }
    top.to_vec()
}
