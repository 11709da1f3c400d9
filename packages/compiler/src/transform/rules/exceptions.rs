//! `try` and `raise`.

use crate::output::js_ast::{Arg, JsNode};
use crate::py_parser::{NodeId, NodeKind};
use crate::transform::context::CtxValue;
use crate::transform::registry::Rule;
use crate::transform::rules::{build_isinstance, chain, call_args, is_call_to, RuleResult};
use crate::transform::transformer::Transformer;

pub fn rules() -> Vec<(NodeKind, Vec<Rule>)> {
    vec![
        (NodeKind::Try, chain![try_]),
        (NodeKind::Raise, chain![raise]),
    ]
}

const KNOWN_EXC_TYPES: &[NodeKind] = &[NodeKind::Name, NodeKind::Attribute, NodeKind::Tuple, NodeKind::List];

/// Handlers collapse into a single `catch` whose body tests the caught
/// value against each handler type in turn. An unmatched value is thrown
/// again unless the last handler catches everything.
fn try_(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    t.unsupported(
        x,
        !tree.children(x, "orelse").is_empty(),
        "'else' block of 'try' statement isn't supported",
    )?;
    let body = Arg::sources(tree.children(x, "body"));
    let finalbody = tree.children(x, "finalbody");
    let handlers = tree.children(x, "handlers");
    if handlers.is_empty() {
        return Ok(Some(JsNode::try_(body, Arg::Absent, Arg::Absent, Arg::sources(finalbody))));
    }

    for &h in handlers {
        if let Some(ty) = tree.child(h, "type") {
            if !KNOWN_EXC_TYPES.contains(&tree.kind(ty)) {
                t.warn(
                    x,
                    "Exception type expression might not evaluate to a valid type or sequence of types.",
                );
            }
        }
    }
    let ename = handlers
        .last()
        .and_then(|&h| tree.str_field(h, "name"))
        .unwrap_or("e")
        .to_string();
    if t.has_child(handlers, &[NodeKind::Raise]) && t.has_child(finalbody, &[NodeKind::Return]) {
        t.warn(x, "The re-raise in 'except' body may be masked by the return in 'final' body.");
    }

    let mut prev: Option<JsNode> = None;
    for (ix, &h) in handlers.iter().rev().enumerate() {
        let mut hbody = Vec::new();
        if let Some(name) = tree.str_field(h, "name").filter(|name| *name != ename) {
            hbody.push(Arg::from(JsNode::var(
                vec![name.to_string()],
                vec![Arg::from(JsNode::name(ename.clone()))],
            )));
        }
        hbody.extend(tree.children(h, "body").iter().copied().map(Arg::Source));

        let ty = tree.child(h, "type");
        let catch_all = (ix == 0 && ty.is_none()) || ty.map(|ty| tree.is_name(ty, "Exception")).unwrap_or(false);
        if catch_all {
            prev = Some(JsNode::statements(hbody));
            continue;
        }
        if ix == 0 {
            prev = Some(JsNode::throw(JsNode::name(ename.clone())));
        }
        let Some(ty) = ty else {
            continue;
        };
        let test = build_isinstance(&tree, Arg::from(JsNode::name(ename.clone())), ty);
        prev = Some(JsNode::if_(test, hbody, prev.take()));
    }

    t.set_ctx("ename", CtxValue::Str(ename.clone()));
    Ok(Some(JsNode::try_(
        body,
        JsNode::name(ename),
        prev,
        Arg::sources(finalbody),
    )))
}

/// A bare `raise` rethrows the exception caught by the enclosing handler.
fn raise(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let Some(exc) = tree.child(x, "exc") else {
        let Some(ename) = t.ctx().get_str("ename").map(str::to_string) else {
            return Err(t.unsupported_error(x, "'raise' has no argument but failed obtaining implicit exception"));
        };
        return Ok(Some(JsNode::throw(JsNode::name(ename))));
    };
    if is_call_to(&tree, exc, "Exception") {
        let args = call_args(&tree, exc);
        if args.len() == 1 {
            return Ok(Some(JsNode::throw(JsNode::new_call(
                JsNode::name("Error"),
                vec![Arg::Source(args[0])],
            ))));
        }
    }
    Ok(Some(JsNode::throw(exc)))
}
