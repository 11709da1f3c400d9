//! Rule Providers
//!
//! Each provider exports the chains it owns through `rules()`. A kind
//! appears in exactly one provider; chains that mix rules from several
//! providers are assembled by the provider owning the kind.

pub mod classes;
pub mod comprehensions;
pub mod exceptions;
pub mod forloops;
pub mod functions;
pub mod obvious;
pub mod special;

use crate::error::TransformError;
use crate::output::js_ast::{Arg, JsKind, JsNode, JsOp};
use crate::py_parser::{NodeId, NodeKind, SourceTree};
use crate::transform::transformer::Transformer;

pub type RuleResult = Result<Option<JsNode>, TransformError>;

/// Build a rule chain out of plain functions.
macro_rules! chain {
    ($($rule:path),+ $(,)?) => {
        vec![$($rule as crate::transform::registry::Rule),+]
    };
}
pub(crate) use chain;

/// True when `id` is a call of the bare name `name`.
pub fn is_call_to(tree: &SourceTree, id: NodeId, name: &str) -> bool {
    tree.is(id, NodeKind::Call)
        && tree
            .child(id, "func")
            .map(|func| tree.is_name(func, name))
            .unwrap_or(false)
}

/// Positional arguments of a call.
pub fn call_args(tree: &SourceTree, id: NodeId) -> Vec<NodeId> {
    tree.children(id, "args").to_vec()
}

/// A statement made of a lone string literal.
pub fn is_docstring(tree: &SourceTree, id: NodeId) -> bool {
    tree.is(id, NodeKind::Expr)
        && tree
            .child(id, "value")
            .map(|value| tree.is(value, NodeKind::Str))
            .unwrap_or(false)
}

/// `_pj.<name>`
pub fn snippet_ref(name: &str) -> JsNode {
    JsNode::attribute(JsNode::name("_pj"), name)
}

/// Object literal keys: strings stay as they are, anything else becomes a
/// computed key, which needs ES6.
pub fn normalize_dict_keys(t: &Transformer, owner: NodeId, keys: Vec<Arg>) -> Result<Vec<Arg>, TransformError> {
    let tree = t.tree();
    keys.into_iter()
        .map(|key| match key {
            Arg::Text(text) => Ok(Arg::from(JsNode::str(text))),
            Arg::Source(id) if tree.is(id, NodeKind::Str) => Ok(Arg::Source(id)),
            Arg::Node(node) if node.kind == JsKind::Str => Ok(Arg::Node(node)),
            other => {
                let at = match &other {
                    Arg::Source(id) => *id,
                    _ => owner,
                };
                t.unsupported(at, !t.es6(), "Dictionary keys other than strings require ES6")?;
                Ok(Arg::from(JsNode::key_subscript(other)))
            }
        })
        .collect()
}

/// `target instanceof cls`, or the disjunction over a tuple/list of
/// classes. `str`, `int` and `float` also accept primitive values.
pub fn build_isinstance(tree: &SourceTree, target: Arg, cls: NodeId) -> JsNode {
    if tree.is(cls, NodeKind::Tuple) || tree.is(cls, NodeKind::List) {
        let pairs = tree
            .children(cls, "elts")
            .iter()
            .map(|&c| (target.clone(), Arg::Source(c)))
            .collect();
        return JsNode::multiple_args_op(JsNode::op(JsOp::Instanceof), JsNode::op(JsOp::Or), pairs);
    }
    let primitive = match tree.name_id(cls) {
        Some("str") => Some(("string", "String")),
        Some("int") | Some("float") => Some(("number", "Number")),
        _ => None,
    };
    match primitive {
        Some((type_name, wrapper)) => JsNode::multiple_args_op(
            vec![Arg::from(JsNode::op(JsOp::StrongEq)), Arg::from(JsNode::op(JsOp::Instanceof))],
            JsNode::op(JsOp::Or),
            vec![
                (
                    Arg::from(JsNode::unary_op(JsNode::op(JsOp::Typeof), target.clone())),
                    Arg::from(JsNode::str(type_name)),
                ),
                (target, Arg::from(JsNode::name(wrapper))),
            ],
        ),
        None => JsNode::bin_op(target, JsNode::op(JsOp::Instanceof), cls),
    }
}
