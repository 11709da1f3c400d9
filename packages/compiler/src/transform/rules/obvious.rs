//! Direct rewrites: statements, expressions and operators that map one to
//! one onto JavaScript. The `*_default` rules close the chains that
//! `special` assembles.

use crate::error::TransformError;
use crate::output::js_ast::{Arg, JsKind, JsNode, JsOp};
use crate::py_parser::{NodeId, NodeKind};
use crate::transform::registry::Rule;
use crate::transform::rules::functions::function_args;
use crate::transform::rules::{chain, normalize_dict_keys, RuleResult};
use crate::transform::transformer::Transformer;
use crate::transform::util::normalize_name;

pub fn rules() -> Vec<(NodeKind, Vec<Rule>)> {
    let mut rules = vec![
        (NodeKind::AugAssign, chain![aug_assign]),
        (NodeKind::If, chain![if_]),
        (NodeKind::While, chain![while_]),
        (NodeKind::Break, chain![break_]),
        (NodeKind::Continue, chain![continue_]),
        (NodeKind::Pass, chain![pass]),
        (NodeKind::Return, chain![return_]),
        (NodeKind::Delete, chain![delete]),
        (NodeKind::List, chain![list]),
        (NodeKind::Tuple, chain![list]),
        (NodeKind::Dict, chain![dict]),
        (NodeKind::Lambda, chain![lambda]),
        (NodeKind::IfExp, chain![if_exp]),
        (NodeKind::UnaryOp, chain![unary_op]),
        (NodeKind::BoolOp, chain![bool_op]),
        (NodeKind::Num, chain![num]),
        (NodeKind::Str, chain![str_]),
        (NodeKind::JoinedStr, chain![joined_str]),
        (NodeKind::NameConstant, chain![name_constant]),
        (NodeKind::Yield, chain![yield_]),
        (NodeKind::YieldFrom, chain![yield_from]),
        (NodeKind::Await, chain![await_]),
    ];
    rules.extend(OPERATORS.iter().map(|&(kind, _)| (kind, chain![operator])));
    rules
}

const OPERATORS: &[(NodeKind, JsOp)] = &[
    (NodeKind::And, JsOp::And),
    (NodeKind::Or, JsOp::Or),
    (NodeKind::Add, JsOp::Add),
    (NodeKind::Sub, JsOp::Sub),
    (NodeKind::Mult, JsOp::Mult),
    (NodeKind::Div, JsOp::Div),
    (NodeKind::Mod, JsOp::Mod),
    (NodeKind::LShift, JsOp::LShift),
    (NodeKind::RShift, JsOp::RShift),
    (NodeKind::BitOr, JsOp::BitOr),
    (NodeKind::BitXor, JsOp::BitXor),
    (NodeKind::BitAnd, JsOp::BitAnd),
    (NodeKind::Invert, JsOp::Invert),
    (NodeKind::Not, JsOp::Not),
    (NodeKind::UAdd, JsOp::Add),
    (NodeKind::USub, JsOp::USub),
    (NodeKind::In, JsOp::In),
    (NodeKind::Lt, JsOp::Lt),
    (NodeKind::LtE, JsOp::LtE),
    (NodeKind::Gt, JsOp::Gt),
    (NodeKind::GtE, JsOp::GtE),
];

fn operator(t: &mut Transformer, x: NodeId) -> RuleResult {
    let kind = t.tree().kind(x);
    Ok(OPERATORS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|&(_, op)| JsNode::op(op)))
}

// ---- statements ----

/// `a = b = value` becomes `a = b = value;` with the rightmost target
/// assigned first.
pub fn assign_default(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let targets = tree.children(x, "targets");
    let value = tree.child(x, "value");
    let expr = targets
        .iter()
        .rev()
        .fold(Arg::from(value), |acc, &target| Arg::from(JsNode::assignment(target, acc)));
    Ok(Some(JsNode::expression_statement(expr)))
}

/// `__all__ = ['a', 'b']` becomes `export {a, b};`
pub fn assign_all(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let targets = tree.children(x, "targets");
    if targets.len() != 1 || !tree.is_name(targets[0], "__all__") {
        return Ok(None);
    }
    if t.is_bundling() {
        // bundled modules share one scope
        return Ok(Some(JsNode::pass()));
    }
    t.es6_guard(x, "'__all__' assignment requires ES6")?;
    let Some(value) = tree.child(x, "value") else {
        return Ok(None);
    };
    t.unsupported(
        x,
        !matches!(tree.kind(value), NodeKind::Tuple | NodeKind::List),
        "Please define a '__default__' member for default export.",
    )?;
    let mut names = Vec::new();
    for &el in tree.children(value, "elts") {
        match tree.str_value(el) {
            Some(name) => names.push(Arg::text(name)),
            None => {
                t.unsupported(el, true, "Must be a string literal.")?;
            }
        }
    }
    Ok(Some(JsNode::export(names)))
}

fn aug_assign(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    Ok(Some(JsNode::aug_assign(
        tree.child(x, "target"),
        tree.child(x, "op"),
        tree.child(x, "value"),
    )))
}

fn if_(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    Ok(Some(JsNode::if_(
        tree.child(x, "test"),
        Arg::sources(tree.children(x, "body")),
        Arg::sources(tree.children(x, "orelse")),
    )))
}

fn while_(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    t.unsupported(
        x,
        !tree.children(x, "orelse").is_empty(),
        "'else' clause of 'while' statements isn't supported",
    )?;
    Ok(Some(JsNode::while_(
        tree.child(x, "test"),
        Arg::sources(tree.children(x, "body")),
    )))
}

fn break_(_: &mut Transformer, _: NodeId) -> RuleResult {
    Ok(Some(JsNode::break_()))
}

fn continue_(_: &mut Transformer, _: NodeId) -> RuleResult {
    Ok(Some(JsNode::continue_()))
}

fn pass(_: &mut Transformer, _: NodeId) -> RuleResult {
    Ok(Some(JsNode::pass()))
}

fn return_(t: &mut Transformer, x: NodeId) -> RuleResult {
    Ok(Some(JsNode::return_(t.tree().child(x, "value"))))
}

/// One `delete` per target; with several targets each statement maps to
/// its own target.
fn delete(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let targets = tree.children(x, "targets");
    let statements = targets
        .iter()
        .map(|&target| {
            let node = JsNode::delete(target);
            if targets.len() > 1 {
                Arg::from(node.with_origin(t.origin_of(target)))
            } else {
                Arg::from(node)
            }
        })
        .collect();
    Ok(Some(JsNode::statements(statements)))
}

pub fn expr_default(t: &mut Transformer, x: NodeId) -> RuleResult {
    Ok(Some(JsNode::expression_statement(t.tree().child(x, "value"))))
}

// ---- expressions ----

fn list(t: &mut Transformer, x: NodeId) -> RuleResult {
    Ok(Some(JsNode::list(Arg::sources(t.tree().children(x, "elts")))))
}

fn dict(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let keys = tree.children(x, "keys").iter().copied().map(Arg::Source).collect();
    let keys = normalize_dict_keys(t, x, keys)?;
    Ok(Some(JsNode::dict(keys, tree.children(x, "values").iter().copied().map(Arg::Source).collect())))
}

fn lambda(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let Some(arguments) = tree.child(x, "args") else {
        return Ok(None);
    };
    let plain = tree.child(arguments, "vararg").is_none()
        && tree.child(arguments, "kwarg").is_none()
        && tree.children(arguments, "kwonlyargs").is_empty()
        && tree
            .children(arguments, "args")
            .iter()
            .all(|&arg| tree.child(arg, "default").is_none());
    t.unsupported(x, !plain, "Lambda arguments other than plain names are not supported")?;
    let args = function_args(t, x, arguments, false)?;
    let body = vec![Arg::from(JsNode::return_(tree.child(x, "body")))];
    Ok(Some(JsNode::function(JsKind::ArrowFunction, None, args.args, body, args.acc, args.kwargs)))
}

fn if_exp(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    Ok(Some(JsNode::if_exp(
        tree.child(x, "test"),
        tree.child(x, "body"),
        tree.child(x, "orelse"),
    )))
}

/// Calls with keywords get them as a trailing object literal.
pub fn call_default(t: &mut Transformer, x: NodeId) -> RuleResult {
    build_call(t, x, false).map(Some)
}

/// Call `x` as written, optionally with `new`.
pub fn build_call(t: &mut Transformer, x: NodeId, new: bool) -> Result<JsNode, TransformError> {
    let tree = t.tree();
    let mut keys = Vec::new();
    let mut values = Vec::new();
    for &kw in tree.children(x, "keywords") {
        let Some(name) = tree.str_field(kw, "arg") else {
            return Err(t.unsupported_error(x, "'**kwargs' syntax isn't supported"));
        };
        keys.push(Arg::text(name));
        values.push(Arg::from(tree.child(kw, "value")));
    }
    let kwargs = if keys.is_empty() {
        Arg::Absent
    } else {
        Arg::from(JsNode::dict(normalize_dict_keys(t, x, keys)?, values))
    };
    let args = tree.children(x, "args").iter().copied().map(Arg::Source).collect();
    let func = tree.child(x, "func");
    let mut call = JsNode::call_with_kwargs(func, args, kwargs);
    call.kind = JsKind::Call { new };
    Ok(call)
}

pub fn attribute_default(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let attr = tree.str_field(x, "attr").unwrap_or_default();
    Ok(Some(JsNode::attribute(tree.child(x, "value"), normalize_name(attr))))
}

/// `x[-n]` becomes `x.slice(-n)[0]`.
pub fn subscript_default(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let (Some(value), Some(index)) = (tree.child(x, "value"), tree.child(x, "slice")) else {
        return Ok(None);
    };
    if tree.is(index, NodeKind::Slice) {
        return Ok(None);
    }
    let negative = tree.is(index, NodeKind::UnaryOp)
        && tree
            .child(index, "op")
            .map(|op| tree.is(op, NodeKind::USub))
            .unwrap_or(false);
    if negative {
        let sliced = JsNode::call(JsNode::attribute(value, "slice"), vec![Arg::Source(index)]);
        return Ok(Some(JsNode::subscript(sliced, JsNode::num("0"))));
    }
    Ok(Some(JsNode::subscript(value, index)))
}

fn unary_op(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    Ok(Some(JsNode::unary_op(tree.child(x, "op"), tree.child(x, "operand"))))
}

pub fn bin_op_default(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    Ok(Some(JsNode::bin_op(
        tree.child(x, "left"),
        tree.child(x, "op"),
        tree.child(x, "right"),
    )))
}

/// `a and b and c` becomes `((a && b) && c)`.
fn bool_op(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let Some(op) = tree.child(x, "op") else {
        return Ok(None);
    };
    let values = tree.children(x, "values");
    let [first, second, rest @ ..] = values else {
        return Ok(None);
    };
    let expr = rest.iter().fold(JsNode::bin_op(*first, op, *second), |left, &right| {
        JsNode::bin_op(left, op, right)
    });
    Ok(Some(expr))
}

/// `a < b < c` becomes `((a < b) && (b < c))`.
pub fn compare_default(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let Some(left) = tree.child(x, "left") else {
        return Ok(None);
    };
    let mut operands = vec![left];
    operands.extend_from_slice(tree.children(x, "comparators"));
    let ops = tree.children(x, "ops");
    let mut result: Option<JsNode> = None;
    for (ix, &op) in ops.iter().enumerate() {
        let (l, r) = (operands[ix], operands[ix + 1]);
        let test = if tree.is(op, NodeKind::NotIn) {
            JsNode::unary_op(
                JsNode::op(JsOp::Not),
                JsNode::bin_op(l, JsNode::op(JsOp::In), r),
            )
        } else {
            JsNode::bin_op(l, op, r)
        };
        result = Some(match result {
            None => test,
            Some(prev) => JsNode::bin_op(prev, JsNode::op(JsOp::And), test),
        });
    }
    Ok(result)
}

// ---- atoms ----

fn num(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let text = tree.str_field(x, "n").unwrap_or("0").replace('_', "");
    Ok(Some(JsNode::num(text)))
}

fn str_(t: &mut Transformer, x: NodeId) -> RuleResult {
    Ok(Some(JsNode::str(t.tree().str_value(x).unwrap_or_default())))
}

/// f-strings become template literals; fields must be plain expressions.
fn joined_str(t: &mut Transformer, x: NodeId) -> RuleResult {
    t.es6_guard(x, "f-strings require ES6")?;
    let tree = t.tree();
    let mut chunks = Vec::new();
    for &value in tree.children(x, "values") {
        if let Some(text) = tree.str_value(value) {
            chunks.push(Arg::text(text));
            continue;
        }
        t.unsupported(
            x,
            tree.int_field(value, "conversion").unwrap_or(-1) != -1,
            "f-string conversion spec isn't supported",
        )?;
        t.unsupported(
            x,
            tree.child(value, "format_spec").is_some(),
            "f-string format spec isn't supported",
        )?;
        chunks.push(Arg::from(tree.child(value, "value")));
    }
    Ok(Some(JsNode::template_literal(chunks)))
}

fn constant(name: &str) -> Option<JsNode> {
    match name {
        "True" => Some(JsNode::true_()),
        "False" => Some(JsNode::false_()),
        "None" => Some(JsNode::null()),
        _ => None,
    }
}

fn name_constant(t: &mut Transformer, x: NodeId) -> RuleResult {
    Ok(t.tree().str_field(x, "value").and_then(constant))
}

pub fn name_default(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let Some(id) = tree.name_id(x) else {
        return Ok(None);
    };
    Ok(Some(constant(id).unwrap_or_else(|| JsNode::name(normalize_name(id)))))
}

fn yield_(t: &mut Transformer, x: NodeId) -> RuleResult {
    Ok(Some(JsNode::yield_(t.tree().child(x, "value"))))
}

fn yield_from(t: &mut Transformer, x: NodeId) -> RuleResult {
    Ok(Some(JsNode::yield_star(t.tree().child(x, "value"))))
}

fn await_(t: &mut Transformer, x: NodeId) -> RuleResult {
    t.stage3_guard(x, "Async stuff requires 'stage3' to be enabled")?;
    Ok(Some(JsNode::await_(t.tree().child(x, "value"))))
}
