//! List comprehensions, evaluated by a function called in place.

use crate::output::js_ast::{Arg, JsKind, JsNode, JsOp};
use crate::py_parser::{NodeId, NodeKind};
use crate::transform::registry::Rule;
use crate::transform::rules::{chain, RuleResult};
use crate::transform::transformer::Transformer;
use crate::transform::util::normalize_name;

pub fn rules() -> Vec<(NodeKind, Vec<Rule>)> {
    vec![(NodeKind::ListComp, chain![list_comp])]
}

/// `[expr for name in seq if cond]` becomes
///
/// ```text
/// (function () {
///     var _pj_a = [], _pj_b = seq;
///     for (var _pj_c = 0, _pj_d = _pj_b.length; (_pj_c < _pj_d); _pj_c += 1) {
///         var name = _pj_b[_pj_c];
///         if (cond) {
///             _pj_a.push(expr);
///         }
///     }
///     return _pj_a;
/// }).call(this)
/// ```
fn list_comp(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let generators = tree.children(x, "generators");
    t.unsupported(x, generators.len() != 1, "Only one 'for' clause is supported in list comprehensions")?;
    let generator = generators[0];
    let ifs = tree.children(generator, "ifs");
    t.unsupported(x, ifs.len() > 1, "Only one 'if' clause is supported in list comprehensions")?;
    let Some(name) = tree
        .child(generator, "target")
        .and_then(|target| tree.name_id(target))
        .map(normalize_name)
    else {
        return Err(t.unsupported_error(x, "Target must be a name"));
    };

    let result = t.new_name()?;
    let source = t.new_name()?;
    let ix = t.new_name()?;
    let bound = t.new_name()?;

    let push = JsNode::expression_statement(JsNode::call(
        JsNode::attribute(JsNode::name(result.clone()), "push"),
        vec![Arg::from(tree.child(x, "elt"))],
    ));
    let push = match ifs.first() {
        Some(&cond) => JsNode::if_(cond, vec![Arg::from(push)], Arg::Absent),
        None => push,
    };
    let item = JsNode::unmovable_var(
        vec![name],
        vec![Arg::from(JsNode::subscript(JsNode::name(source.clone()), JsNode::name(ix.clone())))],
    );
    let walk = JsNode::for_(
        JsNode::unmovable_var(
            vec![ix.clone(), bound.clone()],
            vec![
                Arg::from(JsNode::num("0")),
                Arg::from(JsNode::attribute(JsNode::name(source.clone()), "length")),
            ],
        ),
        JsNode::bin_op(JsNode::name(ix.clone()), JsNode::op(JsOp::Lt), JsNode::name(bound)),
        JsNode::aug_assign(JsNode::name(ix), JsNode::op(JsOp::Add), JsNode::num("1")),
        vec![Arg::from(item), Arg::from(push)],
    );
    let init = JsNode::unmovable_var(
        vec![result.clone(), source],
        vec![
            Arg::from(JsNode::list(Vec::<Arg>::new())),
            Arg::from(tree.child(generator, "iter")),
        ],
    );
    let func = JsNode::function(
        JsKind::Function,
        None,
        Vec::new(),
        vec![Arg::from(init), Arg::from(walk), Arg::from(JsNode::return_(JsNode::name(result)))],
        Arg::Absent,
        Vec::new(),
    );
    Ok(Some(JsNode::call(
        JsNode::attribute(JsNode::expression(func), "call"),
        vec![Arg::from(JsNode::this())],
    )))
}
