//! Transformation helpers shared by the engine and the rules.

use std::collections::BTreeSet;

use crate::py_parser::{NodeId, NodeKind, SourceTree};

/// Assignment targets that never become local variables.
pub const IGNORED_NAMES: &[&str] = &["__all__", "__default__"];

/// Map a source identifier to its JavaScript spelling: a `d_` prefix
/// becomes `$`, `dd_` becomes `$$`, a trailing `_` on a name that does not
/// start with `_` is dropped.
pub fn normalize_name(name: &str) -> String {
    if let Some(rest) = name.strip_prefix("d_") {
        format!("${}", rest)
    } else if let Some(rest) = name.strip_prefix("dd_") {
        format!("$${}", rest)
    } else if !name.starts_with('_') && name.ends_with('_') {
        name[..name.len() - 1].to_string()
    } else {
        name.to_string()
    }
}

/// Names bound by an assignment statement.
pub fn node_names(tree: &SourceTree, id: NodeId) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    if !tree.is(id, NodeKind::Assign) {
        return names;
    }
    let mut add = |target: NodeId| {
        if let Some(name) = tree.name_id(target) {
            if !IGNORED_NAMES.contains(&name) {
                names.insert(name.to_string());
            }
        }
    };
    for &target in tree.children(id, "targets") {
        if tree.is(target, NodeKind::Tuple) {
            tree.children(target, "elts").iter().copied().for_each(&mut add);
        } else {
            add(target);
        }
    }
    names
}

/// Names assigned anywhere in `body`, without descending into nested
/// functions or classes.
pub fn body_local_names(tree: &SourceTree, body: &[NodeId]) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for id in tree.walk_under_code_boundary(body) {
        if !tree.kind(id).is_code_block() {
            names.extend(node_names(tree, id));
        }
    }
    names
}

/// Remove the common leading whitespace of every non-blank line. Returns
/// the dedented text and the width of the removed prefix.
pub fn dedent(text: &str) -> (String, usize) {
    let margin = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| &line[..line.len() - line.trim_start().len()])
        .fold(None::<&str>, |common, indent| match common {
            None => Some(indent),
            Some(common) => {
                let shared = common
                    .char_indices()
                    .zip(indent.chars())
                    .take_while(|((_, a), b)| a == b)
                    .last()
                    .map(|((ix, ch), _)| ix + ch.len_utf8())
                    .unwrap_or(0);
                Some(&common[..shared])
            }
        })
        .unwrap_or("");
    if margin.is_empty() {
        return (text.to_string(), 0);
    }
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        if line.trim().is_empty() {
            out.push_str(line.trim_start_matches([' ', '\t']));
        } else {
            out.push_str(line.strip_prefix(margin).unwrap_or(line));
        }
    }
    (out, margin.chars().count())
}
