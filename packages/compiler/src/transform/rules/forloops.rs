//! `for` loops: counted loops over `range()`, key loops over `dict()`,
//! `for...of` over `iterable()` and index loops over anything else.

use crate::output::js_ast::{Arg, JsNode, JsOp};
use crate::py_parser::{NodeId, NodeKind, SourceTree};
use crate::transform::registry::Rule;
use crate::transform::rules::{call_args, chain, is_call_to, RuleResult};
use crate::transform::transformer::Transformer;
use crate::transform::util::normalize_name;

pub fn rules() -> Vec<(NodeKind, Vec<Rule>)> {
    vec![(NodeKind::For, chain![for_range, for_dict, for_iterable, for_default])]
}

fn target_name(tree: &SourceTree, x: NodeId) -> Option<String> {
    tree.child(x, "target")
        .and_then(|target| tree.name_id(target))
        .map(normalize_name)
}

fn has_orelse(tree: &SourceTree, x: NodeId) -> bool {
    !tree.children(x, "orelse").is_empty()
}

/// `for i in range(start, stop, step)` becomes
/// `for (var i = start, _pj_a = stop; (i < _pj_a); i += step)`.
fn for_range(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let Some(iter) = tree.child(x, "iter") else {
        return Ok(None);
    };
    let Some(name) = target_name(&tree, x) else {
        return Ok(None);
    };
    if !is_call_to(&tree, iter, "range") || has_orelse(&tree, x) {
        return Ok(None);
    }
    let one = || Arg::from(JsNode::num("1"));
    let (start, bound, step) = match call_args(&tree, iter)[..] {
        [stop] => (Arg::from(JsNode::num("0")), stop, one()),
        [start, stop] => (Arg::Source(start), stop, one()),
        [start, stop, step] => (Arg::Source(start), stop, Arg::Source(step)),
        _ => return Ok(None),
    };
    let bound_name = t.new_name()?;
    Ok(Some(JsNode::for_(
        JsNode::unmovable_var(vec![name.clone(), bound_name.clone()], vec![start, Arg::Source(bound)]),
        JsNode::bin_op(JsNode::name(name.clone()), JsNode::op(JsOp::Lt), JsNode::name(bound_name)),
        JsNode::aug_assign(JsNode::name(name), JsNode::op(JsOp::Add), step),
        Arg::sources(tree.children(x, "body")),
    )))
}

/// `for k in dict(expr)` becomes a `for...in` over a snapshot of `expr`,
/// skipping inherited keys unless written `dict(expr, True)`.
fn for_dict(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let Some(iter) = tree.child(x, "iter") else {
        return Ok(None);
    };
    let args = call_args(&tree, iter);
    if !is_call_to(&tree, iter, "dict") || args.is_empty() || args.len() > 2 || has_orelse(&tree, x) {
        return Ok(None);
    }
    let Some(name) = target_name(&tree, x) else {
        return Err(t.unsupported_error(x, "Target must be a name"));
    };
    let dict = t.new_name()?;
    let inherited = args.get(1).and_then(|&flag| tree.str_field(flag, "value")) == Some("True");
    let mut body = Arg::sources(tree.children(x, "body"));
    if !inherited {
        let own = JsNode::call(
            JsNode::attribute(JsNode::name(dict.clone()), "hasOwnProperty"),
            vec![Arg::from(JsNode::name(name.clone()))],
        );
        body = Arg::List(vec![Arg::from(JsNode::if_(own, body, Arg::Absent))]);
    }
    let snapshot = JsNode::unmovable_var(vec![dict.clone()], vec![Arg::Source(args[0])]);
    let lookup = JsNode::foreach(Arg::text(name), JsNode::name(dict), body).with_origin(t.origin_of(x));
    Ok(Some(JsNode::statements(vec![Arg::from(snapshot), Arg::from(lookup)])))
}

/// `for x in iterable(expr)` becomes `for (var x of expr)`.
fn for_iterable(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let Some(iter) = tree.child(x, "iter") else {
        return Ok(None);
    };
    let args = call_args(&tree, iter);
    if !is_call_to(&tree, iter, "iterable") || args.len() != 1 || has_orelse(&tree, x) {
        return Ok(None);
    }
    t.es6_guard(x, "for...of statement requires ES6")?;
    let Some(name) = target_name(&tree, x) else {
        return Err(t.unsupported_error(x, "Target must be a name"));
    };
    Ok(Some(JsNode::for_of(
        Arg::text(name),
        Arg::Source(args[0]),
        Arg::sources(tree.children(x, "body")),
    )))
}

/// Anything else is iterated by index:
/// `for (var x, _pj_c = 0, _pj_a = expr, _pj_b = _pj_a.length; ...)`.
fn for_default(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    t.unsupported(x, has_orelse(&tree, x), "'else' clause not supported")?;
    let Some(name) = target_name(&tree, x) else {
        return Err(t.unsupported_error(x, "Target must be a name, are you sure is only one?"));
    };
    let iter = tree.child(x, "iter");
    let arr = t.new_name()?;
    let length = t.new_name()?;
    let ix = t.new_name()?;

    let init = JsNode::unmovable_var(
        vec![name.clone(), ix.clone(), arr.clone(), length.clone()],
        vec![
            Arg::Absent,
            Arg::from(JsNode::num("0")),
            Arg::from(iter),
            Arg::from(JsNode::attribute(JsNode::name(arr.clone()), "length")),
        ],
    );
    let mut body = vec![Arg::from(JsNode::expression_statement(JsNode::assignment(
        JsNode::name(name),
        JsNode::subscript(JsNode::name(arr), JsNode::name(ix.clone())),
    )))];
    body.extend(tree.children(x, "body").iter().copied().map(Arg::Source));
    Ok(Some(JsNode::for_(
        init,
        JsNode::bin_op(JsNode::name(ix.clone()), JsNode::op(JsOp::Lt), JsNode::name(length)),
        JsNode::aug_assign(JsNode::name(ix), JsNode::op(JsOp::Add), JsNode::num("1")),
        body,
    )))
}
