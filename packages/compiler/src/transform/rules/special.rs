//! Rewrites that depend on the shape of the node rather than its kind
//! alone: builtin calls, operator overloads, imports, snippet backed
//! operations. Chains that end in a plain rewrite close with the matching
//! `obvious` default.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::output::js_ast::{Arg, JsNode, JsOp};
use crate::py_parser::{NodeId, NodeKind, SourceTree};
use crate::transform::registry::Rule;
use crate::transform::rules::classes::{attribute_super, call_isinstance, call_issubclass, call_super, subscript_super};
use crate::transform::rules::obvious::{
    assign_all, assign_default, attribute_default, bin_op_default, build_call, call_default, compare_default,
    expr_default, name_default, subscript_default,
};
use crate::transform::rules::{call_args, chain, is_call_to, snippet_ref, RuleResult};
use crate::transform::snippets;
use crate::transform::transformer::Transformer;
use crate::transform::util::normalize_name;

pub fn rules() -> Vec<(NodeKind, Vec<Rule>)> {
    vec![
        (NodeKind::Expr, chain![expr_docstring, expr_default]),
        (NodeKind::BinOp, chain![bin_op_pow, bin_op_floor_div, bin_op_default]),
        (NodeKind::Name, chain![name_self, name_default]),
        (
            NodeKind::Call,
            chain![
                call_typeof,
                call_callable,
                call_isinstance,
                call_print,
                call_len,
                call_js,
                call_new,
                call_super,
                call_str,
                call_type,
                call_dict_update,
                call_dict_copy,
                call_hasattr,
                call_getattr,
                call_setattr,
                call_issubclass,
                call_int,
                call_float,
                call_default,
            ],
        ),
        (NodeKind::Eq, chain![strong_eq]),
        (NodeKind::Is, chain![strong_eq]),
        (NodeKind::NotEq, chain![strong_not_eq]),
        (NodeKind::IsNot, chain![strong_not_eq]),
        (NodeKind::Import, chain![import]),
        (NodeKind::ImportFrom, chain![import_from]),
        (NodeKind::Compare, chain![compare_in, compare_default]),
        (NodeKind::Subscript, chain![subscript_slice, subscript_super, subscript_default]),
        (NodeKind::Attribute, chain![attribute_super, attribute_list_append, attribute_default]),
        (NodeKind::Assert, chain![assert]),
        (NodeKind::Assign, chain![assign_all, assign_default_export, assign_default]),
        (NodeKind::Global, chain![global]),
    ]
}

// ---- Expr, BinOp, Name ----

/// Docstrings become comment blocks.
fn expr_docstring(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    Ok(tree
        .child(x, "value")
        .and_then(|value| tree.str_value(value))
        .map(JsNode::comment_block))
}

/// `a ** b` becomes `Math.pow(a, b)`.
fn bin_op_pow(t: &mut Transformer, x: NodeId) -> RuleResult {
    math_call(&t.tree(), x, NodeKind::Pow, |left, right| {
        JsNode::call(
            JsNode::attribute(JsNode::name("Math"), "pow"),
            vec![Arg::Source(left), Arg::Source(right)],
        )
    })
}

/// `a // b` becomes `Math.floor((a / b))`.
fn bin_op_floor_div(t: &mut Transformer, x: NodeId) -> RuleResult {
    math_call(&t.tree(), x, NodeKind::FloorDiv, |left, right| {
        JsNode::call(
            JsNode::attribute(JsNode::name("Math"), "floor"),
            vec![Arg::from(JsNode::bin_op(left, JsNode::op(JsOp::Div), right))],
        )
    })
}

fn math_call(tree: &SourceTree, x: NodeId, op: NodeKind, build: impl FnOnce(NodeId, NodeId) -> JsNode) -> RuleResult {
    let is_op = tree.child(x, "op").map(|o| tree.is(o, op)).unwrap_or(false);
    match (is_op, tree.child(x, "left"), tree.child(x, "right")) {
        (true, Some(left), Some(right)) => Ok(Some(build(left, right))),
        _ => Ok(None),
    }
}

fn name_self(t: &mut Transformer, x: NodeId) -> RuleResult {
    Ok(t.tree().is_name(x, "self").then(JsNode::this))
}

// ---- Call ----

/// Arguments of a call to the builtin `name`, when `x` is one.
fn builtin_args(tree: &SourceTree, x: NodeId, name: &str) -> Option<Vec<NodeId>> {
    is_call_to(tree, x, name).then(|| call_args(tree, x))
}

fn sources(ids: &[NodeId]) -> Vec<Arg> {
    ids.iter().copied().map(Arg::Source).collect()
}

/// `typeof(x)` becomes `(typeof x)`.
fn call_typeof(t: &mut Transformer, x: NodeId) -> RuleResult {
    let Some(args) = builtin_args(&t.tree(), x, "typeof") else {
        return Ok(None);
    };
    let [arg] = args[..] else {
        return Err(t.unsupported_error(x, "'typeof' takes exactly one argument"));
    };
    Ok(Some(JsNode::unary_op(JsNode::op(JsOp::Typeof), arg)))
}

/// `callable(x)` becomes `((x instanceof Function) || ((typeof x) === "function"))`.
fn call_callable(t: &mut Transformer, x: NodeId) -> RuleResult {
    let Some(args) = builtin_args(&t.tree(), x, "callable") else {
        return Ok(None);
    };
    let [arg] = args[..] else {
        return Err(t.unsupported_error(x, "'callable' takes exactly one argument"));
    };
    Ok(Some(JsNode::bin_op(
        JsNode::bin_op(arg, JsNode::op(JsOp::Instanceof), JsNode::name("Function")),
        JsNode::op(JsOp::Or),
        JsNode::bin_op(
            JsNode::unary_op(JsNode::op(JsOp::Typeof), arg),
            JsNode::op(JsOp::StrongEq),
            JsNode::str("function"),
        ),
    )))
}

/// `print(...)` becomes `console.log(...)`.
fn call_print(t: &mut Transformer, x: NodeId) -> RuleResult {
    let Some(args) = builtin_args(&t.tree(), x, "print") else {
        return Ok(None);
    };
    Ok(Some(JsNode::call(
        JsNode::attribute(JsNode::name("console"), "log"),
        sources(&args),
    )))
}

/// `len(x)` becomes `x.length`.
fn call_len(t: &mut Transformer, x: NodeId) -> RuleResult {
    match builtin_args(&t.tree(), x, "len").as_deref() {
        Some(&[arg]) => Ok(Some(JsNode::attribute(arg, "length"))),
        _ => Ok(None),
    }
}

/// `JS('code')` inlines `code` verbatim.
fn call_js(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let Some(&[arg]) = builtin_args(&tree, x, "JS").as_deref() else {
        return Ok(None);
    };
    match tree.str_value(arg) {
        Some(code) => Ok(Some(JsNode::literal(code))),
        None => Err(t.unsupported_error(x, "'JS' takes a string literal")),
    }
}

/// Calls to capitalised names are constructor calls; `new(Foo(x))` forces
/// one.
fn call_new(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let Some(func) = tree.child(x, "func") else {
        return Ok(None);
    };
    let callee = match tree.kind(func) {
        NodeKind::Name => tree.name_id(func),
        NodeKind::Attribute => tree.str_field(func, "attr"),
        NodeKind::Subscript => tree.child(func, "slice").and_then(|s| tree.str_value(s)),
        _ => None,
    };
    if callee.map(|name| name.starts_with(|c: char| c.is_ascii_uppercase())).unwrap_or(false) {
        return build_call(t, x, true).map(Some);
    }
    if tree.is_name(func, "new") {
        let subject = call_args(&tree, x).first().copied().filter(|&s| tree.is(s, NodeKind::Call));
        let Some(subject) = subject else {
            return Err(t.unsupported_error(x, "'new' takes a single call expression"));
        };
        return build_call(t, subject, true).map(Some);
    }
    Ok(None)
}

/// `str(x)` becomes `x.toString()`.
fn call_str(t: &mut Transformer, x: NodeId) -> RuleResult {
    match builtin_args(&t.tree(), x, "str").as_deref() {
        Some(&[arg]) => Ok(Some(JsNode::call(JsNode::attribute(arg, "toString"), Vec::new()))),
        _ => Ok(None),
    }
}

/// `type(x)` becomes `Object.getPrototypeOf(x)`.
fn call_type(t: &mut Transformer, x: NodeId) -> RuleResult {
    match builtin_args(&t.tree(), x, "type").as_deref() {
        Some(&[arg]) => Ok(Some(JsNode::call(
            JsNode::attribute(JsNode::name("Object"), "getPrototypeOf"),
            vec![Arg::Source(arg)],
        ))),
        Some(_) => Err(t.unsupported_error(x, "'type' takes exactly one argument")),
        None => Ok(None),
    }
}

/// Receiver of `dict(foo).<method>(...)`.
fn dict_method_subject(tree: &SourceTree, x: NodeId, method: &str) -> Option<NodeId> {
    let func = tree.child(x, "func")?;
    if !tree.is(func, NodeKind::Attribute) || tree.str_field(func, "attr") != Some(method) {
        return None;
    }
    let value = tree.child(func, "value")?;
    match builtin_args(tree, value, "dict").as_deref() {
        Some(&[subject]) => Some(subject),
        _ => None,
    }
}

/// `dict(foo).update(bar)` becomes `Object.assign(foo, bar)`.
fn call_dict_update(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let Some(subject) = dict_method_subject(&tree, x, "update") else {
        return Ok(None);
    };
    t.es6_guard(x, "dict.update() requires ES6")?;
    let mut args = vec![Arg::Source(subject)];
    args.extend(sources(tree.children(x, "args")));
    Ok(Some(JsNode::call(JsNode::attribute(JsNode::name("Object"), "assign"), args)))
}

/// `dict(foo).copy()` becomes `Object.assign({}, foo)`.
fn call_dict_copy(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let Some(subject) = dict_method_subject(&tree, x, "copy") else {
        return Ok(None);
    };
    t.es6_guard(x, "dict.copy() requires ES6")?;
    Ok(Some(JsNode::call(
        JsNode::attribute(JsNode::name("Object"), "assign"),
        vec![Arg::from(JsNode::dict(Vec::new(), Vec::new())), Arg::Source(subject)],
    )))
}

/// `hasattr(foo, bar)` becomes `(bar in foo)`.
fn call_hasattr(t: &mut Transformer, x: NodeId) -> RuleResult {
    match builtin_args(&t.tree(), x, "hasattr").as_deref() {
        Some(&[obj, attr]) => Ok(Some(JsNode::bin_op(attr, JsNode::op(JsOp::In), obj))),
        _ => Ok(None),
    }
}

/// `getattr(foo, bar[, default])` becomes `foo[bar]` or `(foo[bar] || default)`.
fn call_getattr(t: &mut Transformer, x: NodeId) -> RuleResult {
    match builtin_args(&t.tree(), x, "getattr").as_deref() {
        Some(&[obj, attr]) => Ok(Some(JsNode::subscript(obj, attr))),
        Some(&[obj, attr, default]) => Ok(Some(JsNode::bin_op(
            JsNode::subscript(obj, attr),
            JsNode::op(JsOp::Or),
            default,
        ))),
        _ => Ok(None),
    }
}

/// `setattr(foo, bar, value)` becomes `foo[bar] = value`.
fn call_setattr(t: &mut Transformer, x: NodeId) -> RuleResult {
    match builtin_args(&t.tree(), x, "setattr").as_deref() {
        Some(&[obj, attr, value]) => Ok(Some(JsNode::assignment(JsNode::subscript(obj, attr), value))),
        _ => Ok(None),
    }
}

fn number_parser(t: &mut Transformer, x: NodeId, builtin: &str, parser: &str) -> RuleResult {
    let Some(args) = builtin_args(&t.tree(), x, builtin) else {
        return Ok(None);
    };
    let func = if t.es6() {
        JsNode::attribute(JsNode::name("Number"), parser)
    } else {
        JsNode::name(parser)
    };
    Ok(Some(JsNode::call(func, sources(&args))))
}

fn call_int(t: &mut Transformer, x: NodeId) -> RuleResult {
    number_parser(t, x, "int", "parseInt")
}

fn call_float(t: &mut Transformer, x: NodeId) -> RuleResult {
    number_parser(t, x, "float", "parseFloat")
}

// ---- operators ----

fn strong_eq(_: &mut Transformer, _: NodeId) -> RuleResult {
    Ok(Some(JsNode::op(JsOp::StrongEq)))
}

fn strong_not_eq(_: &mut Transformer, _: NodeId) -> RuleResult {
    Ok(Some(JsNode::op(JsOp::StrongNotEq)))
}

/// `a in b` goes through the `_in` snippet (`in_es6` with ES6), which
/// also handles arrays and strings.
fn compare_in(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let Some(&op) = tree.children(x, "ops").first() else {
        return Ok(None);
    };
    let negated = match tree.kind(op) {
        NodeKind::In => false,
        NodeKind::NotIn => true,
        _ => return Ok(None),
    };
    if !t.options().snippets {
        return Ok(None);
    }
    let (Some(left), Some(&right)) = (tree.child(x, "left"), tree.children(x, "comparators").first()) else {
        return Ok(None);
    };
    let snippet = if t.es6() { snippets::IN_ES6 } else { snippets::IN };
    t.add_snippet(snippet);
    let call = JsNode::call(snippet_ref(snippet.name), vec![Arg::Source(left), Arg::Source(right)]);
    Ok(Some(if negated {
        JsNode::unary_op(JsNode::op(JsOp::Not), call)
    } else {
        call
    }))
}

// ---- Subscript, Attribute ----

/// `x[a:b]` becomes `x.slice(a, b)`.
fn subscript_slice(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let (Some(value), Some(slice)) = (tree.child(x, "value"), tree.child(x, "slice")) else {
        return Ok(None);
    };
    if !tree.is(slice, NodeKind::Slice) {
        return Ok(None);
    }
    let step = tree.child(slice, "step");
    let unit_step = step
        .map(|s| tree.is(s, NodeKind::Num) && tree.str_field(s, "n") == Some("1"))
        .unwrap_or(true);
    t.unsupported(x, !unit_step, "Slice step is unsupported")?;
    let mut args = vec![match tree.child(slice, "lower") {
        Some(lower) => Arg::Source(lower),
        None => Arg::from(JsNode::num("0")),
    }];
    if let Some(upper) = tree.child(slice, "upper") {
        args.push(Arg::Source(upper));
    }
    Ok(Some(JsNode::call(JsNode::attribute(value, "slice"), args)))
}

/// `list(foo).append` becomes `foo.push`.
fn attribute_list_append(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    if tree.str_field(x, "attr") != Some("append") {
        return Ok(None);
    }
    let subject = tree.child(x, "value").and_then(|value| builtin_args(&tree, value, "list"));
    match subject.as_deref() {
        Some(&[list]) => Ok(Some(JsNode::attribute(list, "push"))),
        _ => Ok(None),
    }
}

// ---- statements ----

fn assert(t: &mut Transformer, x: NodeId) -> RuleResult {
    if !t.options().snippets {
        return Ok(None);
    }
    let tree = t.tree();
    t.add_snippet(snippets::ASSERT);
    let msg = match tree.child(x, "msg") {
        Some(msg) => Arg::Source(msg),
        None => Arg::from(JsNode::null()),
    };
    Ok(Some(JsNode::expression_statement(JsNode::call(
        snippet_ref(snippets::ASSERT.name),
        vec![Arg::from(tree.child(x, "test")), msg],
    ))))
}

/// `__default__ = value` becomes `export default value;`
fn assign_default_export(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let targets = tree.children(x, "targets");
    if targets.len() != 1 || !tree.is_name(targets[0], "__default__") {
        return Ok(None);
    }
    t.unsupported(x, t.is_bundling(), "'__default__' cannot be exported from a bundled module")?;
    t.es6_guard(x, "'__default__' assignment requires ES6")?;
    let Some(value) = tree.child(x, "value") else {
        return Ok(None);
    };
    t.unsupported(
        value,
        matches!(tree.kind(value), NodeKind::Tuple | NodeKind::List),
        "Only one symbol can be exported using '__default__'.",
    )?;
    Ok(Some(match tree.str_value(value) {
        Some(name) => JsNode::export_default(Arg::text(name)),
        None => JsNode::export_default(value),
    }))
}

fn global(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let names: Vec<String> = tree
        .children(x, "names")
        .iter()
        .filter_map(|&name| tree.name_id(name))
        .map(str::to_string)
        .collect();
    t.add_globals(names);
    Ok(Some(JsNode::pass()))
}

// ---- imports ----

static AT_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^__([a-zA-Z0-9])").unwrap());
static INSIDE_DUNDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-zA-Z0-9])__([a-zA-Z0-9])").unwrap());

/// Module names spell `@scope` and `a-b` as `__scope` and `a__b`.
fn replace_symbols(dotted: &str) -> String {
    let dotted = AT_PREFIX_RE.replace(dotted, "@$1");
    INSIDE_DUNDER_RE.replace_all(&dotted, "$1-$2").into_owned()
}

fn module_path(dotted: &str) -> String {
    replace_symbols(dotted)
        .split('.')
        .map(normalize_name)
        .collect::<Vec<_>>()
        .join("/")
}

fn relative_prefix(level: i64) -> String {
    match level {
        0 => String::new(),
        1 => "./".to_string(),
        _ => "../".repeat((level - 1) as usize),
    }
}

/// `(name, asname)` pairs of an import's aliases.
fn aliases(tree: &SourceTree, x: NodeId) -> Vec<(String, Option<String>)> {
    tree.children(x, "names")
        .iter()
        .map(|&alias| {
            (
                tree.str_field(alias, "name").unwrap_or_default().to_string(),
                tree.str_field(alias, "asname").map(str::to_string),
            )
        })
        .collect()
}

fn bound_names(aliases: &[(String, Option<String>)]) -> Vec<String> {
    aliases
        .iter()
        .map(|(name, asname)| asname.clone().unwrap_or_else(|| name.clone()))
        .collect()
}

/// `import a.b as c` becomes `import * as c from 'a/b';`
fn import(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let aliases = aliases(&tree, x);
    if let Some((name, _)) = aliases.iter().find(|(name, _)| t.is_bundled(name)) {
        return Err(t.unsupported_error(
            x,
            format!("Module '{}' is bundled, import its names with 'from {} import ...'", name, name),
        ));
    }
    t.es6_guard(x, "'import' statement requires ES6")?;
    t.add_globals(bound_names(&aliases));
    let mut statements = Vec::with_capacity(aliases.len());
    for (name, asname) in aliases {
        let replaced = replace_symbols(&name);
        let path = replaced.replace('.', "/");
        if replaced != name && asname.is_none() {
            return Err(t.unsupported_error(
                x,
                format!("Invalid module name: '{}': use 'as' to give it a new name.", path),
            ));
        }
        statements.push(Arg::from(JsNode::star_import(path, asname.unwrap_or(name))));
    }
    Ok(Some(JsNode::statements(statements)))
}

/// `from a import b` becomes a named, default or star import depending on
/// the names and the relative level. `from __globals__ import x` only
/// declares `x` as a global.
fn import_from(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let aliases = aliases(&tree, x);
    let module = tree.str_field(x, "module");
    t.add_globals(bound_names(&aliases));
    if module == Some("__globals__") {
        return Ok(Some(JsNode::pass()));
    }
    let level = tree.int_field(x, "level").unwrap_or(0);
    if level == 0 && module.map(|m| t.is_bundled(m)).unwrap_or(false) {
        return import_from_bundled(t, x, &aliases);
    }
    t.es6_guard(x, "'import from' statement requires ES6")?;
    let prefix = relative_prefix(level);

    let Some(module) = module else {
        let statements = aliases
            .into_iter()
            .map(|(name, asname)| {
                let path = format!("{}{}", prefix, name);
                Arg::from(JsNode::star_import(path, asname.unwrap_or(name)))
            })
            .collect();
        return Ok(Some(JsNode::statements(statements)));
    };

    let path = format!("{}{}", prefix, module_path(module));
    if let [(name, asname)] = &aliases[..] {
        if name == "__default__" {
            let Some(asname) = asname else {
                return Err(t.unsupported_error(x, "Default import must declare an 'as' clause."));
            };
            return Ok(Some(JsNode::default_import(path, asname.clone())));
        }
    }
    Ok(Some(JsNode::named_import(path, aliases)))
}

/// Names of a bundled module are already in scope: the import only makes
/// them known as globals.
fn import_from_bundled(t: &mut Transformer, x: NodeId, aliases: &[(String, Option<String>)]) -> RuleResult {
    for (name, asname) in aliases {
        t.unsupported(x, name == "__default__", "Default imports from a bundled module are not supported")?;
        t.unsupported(
            x,
            asname.as_ref().map(|a| a != name).unwrap_or(false),
            format!("Name '{}' of a bundled module cannot be renamed", name),
        )?;
    }
    Ok(Some(JsNode::pass()))
}
