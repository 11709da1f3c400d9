//! Function and method definitions.

use std::collections::BTreeSet;

use crate::error::TransformError;
use crate::output::js_ast::{Arg, JsKind, JsNode};
use crate::py_parser::{NodeId, NodeKind, SourceTree};
use crate::transform::context::CtxValue;
use crate::transform::registry::Rule;
use crate::transform::rules::{chain, RuleResult};
use crate::transform::transformer::Transformer;
use crate::transform::util::{body_local_names, normalize_name};

pub fn rules() -> Vec<(NodeKind, Vec<Rule>)> {
    vec![
        (NodeKind::FunctionDef, chain![function_def]),
        (NodeKind::AsyncFunctionDef, chain![async_function_def]),
    ]
}

/// Rendered parameter list of a function-like node.
#[derive(Debug, Default)]
pub struct FunctionArgs {
    /// Positional parameters, with defaults as assignments
    pub args: Vec<Arg>,
    /// `...rest` accumulator
    pub acc: Arg,
    /// Keyword-only parameters destructured from a trailing object
    pub kwargs: Vec<Arg>,
    /// Source names bound by the parameter list
    pub names: BTreeSet<String>,
}

/// Source name and rendering of a single parameter.
fn param(tree: &SourceTree, arg: NodeId) -> (String, Arg) {
    let name = tree.str_field(arg, "arg").unwrap_or_default();
    let target = JsNode::name(normalize_name(name));
    let rendered = match tree.child(arg, "default") {
        Some(default) => Arg::from(JsNode::assignment(target, default)),
        None => Arg::from(target),
    };
    (name.to_string(), rendered)
}

/// Render the `Arguments` node `arguments` of `owner`, dropping the first
/// positional parameter when `strip_first` is set.
pub fn function_args(
    t: &Transformer,
    owner: NodeId,
    arguments: NodeId,
    strip_first: bool,
) -> Result<FunctionArgs, TransformError> {
    let tree = t.tree();
    let positional = tree.children(arguments, "args");
    let kwonly = tree.children(arguments, "kwonlyargs");
    let vararg = tree.child(arguments, "vararg");
    let kwarg = tree.child(arguments, "kwarg");

    let has_defaults = positional.iter().any(|&arg| tree.child(arg, "default").is_some());
    if vararg.is_some() || kwarg.is_some() || !kwonly.is_empty() || has_defaults {
        t.es6_guard(
            owner,
            "Arguments definitions other than plain params require ES6 to be enabled",
        )?;
    }
    t.unsupported(
        owner,
        kwarg.is_some() && !kwonly.is_empty(),
        "Keyword arguments together with keyword args accumulator are unsupported",
    )?;
    t.unsupported(
        owner,
        vararg.is_some() && (kwarg.is_some() || !kwonly.is_empty()),
        "Having both param accumulator and keyword args is unsupported",
    )?;

    let mut rendered = FunctionArgs::default();
    let skip = usize::from(strip_first && !positional.is_empty());
    for &arg in &positional[skip..] {
        let (name, arg) = param(&tree, arg);
        rendered.names.insert(name);
        rendered.args.push(arg);
    }
    if let Some(kwarg) = kwarg {
        let name = tree.str_field(kwarg, "arg").unwrap_or_default();
        rendered.args.push(Arg::from(JsNode::assignment(
            JsNode::name(normalize_name(name)),
            JsNode::dict(Vec::new(), Vec::new()),
        )));
        rendered.names.insert(name.to_string());
    }
    for &arg in kwonly {
        let (name, arg) = param(&tree, arg);
        rendered.names.insert(name);
        rendered.kwargs.push(arg);
    }
    if let Some(vararg) = vararg {
        let name = tree.str_field(vararg, "arg").unwrap_or_default();
        rendered.acc = Arg::from(JsNode::rest(JsNode::name(normalize_name(name))));
        rendered.names.insert(name.to_string());
    }
    Ok(rendered)
}

/// The single decorator a method rule turns into syntax: `property`,
/// `classmethod`, `staticmethod` or `<name>.setter`. Any other decorator
/// list is applied at runtime by the class rule.
pub fn managed_decorator(tree: &SourceTree, def: NodeId) -> Option<NodeId> {
    let decorators = tree.children(def, "decorator_list");
    let &first = decorators.first()?;
    let by_name = decorators.len() == 1
        && matches!(tree.name_id(first), Some("property" | "classmethod" | "staticmethod"));
    let setter = tree.is(first, NodeKind::Attribute) && tree.str_field(first, "attr") == Some("setter");
    (by_name || setter).then_some(first)
}

fn is_generator(tree: &SourceTree, body: &[NodeId]) -> bool {
    tree.walk_under_code_boundary(body)
        .into_iter()
        .any(|id| matches!(tree.kind(id), NodeKind::Yield | NodeKind::YieldFrom))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Accessor {
    Getter,
    Setter,
}

/// Functions become function declarations, methods become class members.
/// Nested functions inside methods are bound to `this`.
fn function_def(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let parent = t.parent_of(x);
    let is_method = parent.map(|p| tree.is(p, NodeKind::ClassDef)).unwrap_or(false);
    let raw_name = tree.str_field(x, "name").unwrap_or_default();
    let is_in_method = !raw_name.starts_with("fn_")
        && t.parents(x, Some(NodeKind::ClassDef))
            .last()
            .map(|p| tree.is(p, NodeKind::ClassDef))
            .unwrap_or(false);
    let body_ids = tree.children(x, "body");
    let generator = is_generator(&tree, body_ids);
    let is_async = tree.is(x, NodeKind::AsyncFunctionDef);

    let decorators = if is_method && managed_decorator(&tree, x).is_none() {
        &[][..]
    } else {
        tree.children(x, "decorator_list")
    };
    t.unsupported(x, !is_method && !decorators.is_empty(), "Function decorators are unsupported yet")?;
    t.unsupported(x, decorators.len() > 1, "No more than one decorator is supported")?;

    let Some(arguments) = tree.child(x, "args") else {
        return Ok(None);
    };
    let strip_first = is_method
        || tree
            .children(arguments, "args")
            .first()
            .and_then(|&arg| tree.str_field(arg, "arg"))
            == Some("self");
    let params = function_args(t, x, arguments, strip_first)?;

    let upper_vars = t.ctx().get_names("vars").cloned().unwrap_or_default();
    let local_vars: Vec<String> = body_local_names(&tree, body_ids)
        .into_iter()
        .filter(|name| !params.names.contains(name) && !upper_vars.contains(name))
        .collect();
    let mut scope_vars = upper_vars;
    scope_vars.extend(local_vars.iter().cloned());
    t.set_ctx("vars", CtxValue::Names(scope_vars));

    let mut body: Vec<Arg> = Vec::with_capacity(body_ids.len() + 1);
    if !local_vars.is_empty() {
        let values = vec![Arg::Absent; local_vars.len()];
        body.push(Arg::from(JsNode::var(local_vars, values)));
    }
    body.extend(body_ids.iter().copied().map(Arg::Source));

    let name = normalize_name(raw_name);
    let FunctionArgs { args, acc, kwargs, .. } = params;

    if is_method {
        let mut is_static = false;
        let mut accessor = None;
        if let Some(&deco) = decorators.first() {
            match tree.name_id(deco) {
                Some("property") => accessor = Some(Accessor::Getter),
                Some("classmethod") | Some("staticmethod") => is_static = true,
                _ if tree.is(deco, NodeKind::Attribute)
                    && tree.str_field(deco, "attr") == Some("setter")
                    && tree.child(deco, "value").map(|v| tree.is(v, NodeKind::Name)).unwrap_or(false) =>
                {
                    accessor = Some(Accessor::Setter)
                }
                _ => return Err(t.unsupported_error(x, "Unsupported method decorator")),
            }
        }
        if name == "__init__" {
            return Ok(Some(JsNode::new(
                JsKind::Constructor,
                vec![Arg::List(args), Arg::List(body), acc, Arg::List(kwargs)],
            )));
        }
        let member = match accessor {
            Some(Accessor::Getter) => JsNode::getter(name, body, is_static),
            Some(Accessor::Setter) => {
                let Some(arg) = args.into_iter().next() else {
                    return Err(t.unsupported_error(x, "Missing argument in setter"));
                };
                JsNode::setter(name, arg, body, is_static)
            }
            None if is_async => JsNode::function(JsKind::AsyncMethod { is_static }, Some(name), args, body, acc, kwargs),
            None if generator => JsNode::function(JsKind::GenMethod { is_static }, Some(name), args, body, acc, kwargs),
            None => match name.as_str() {
                "__len__" => JsNode::getter("length", body, is_static),
                "__str__" => method("toString", Vec::new(), body, is_static),
                "__get__" => method("get", Vec::new(), body, is_static),
                "__set__" => method("set", Vec::new(), body, is_static),
                "__instancecheck__" => method("[Symbol.hasInstance]", args, body, true),
                _ => JsNode::function(JsKind::Method { is_static }, Some(name), args, body, acc, kwargs),
            },
        };
        return Ok(Some(member));
    }

    if is_in_method {
        let origin = t.origin_of(x);
        // generator and async bodies get a bound function, not an arrow
        if generator || is_async {
            let kind = if is_async { JsKind::AsyncFunction } else { JsKind::GenFunction };
            let def = JsNode::function(kind, Some(name.clone()), args, body, acc, kwargs).with_origin(origin);
            let bind = JsNode::call(JsNode::attribute(JsNode::name(name.clone()), "bind"), vec![Arg::from(JsNode::this())]);
            let rebind = JsNode::expression_statement(JsNode::assignment(JsNode::name(name), bind));
            return Ok(Some(JsNode::statements(vec![Arg::from(def), Arg::from(rebind)])));
        }
        let def = JsNode::function(JsKind::ArrowFunction, Some(name.clone()), args, body, acc, kwargs)
            .with_origin(origin);
        let decl = JsNode::var(vec![name], vec![Arg::Absent]);
        return Ok(Some(JsNode::statements(vec![Arg::from(decl), Arg::from(def)])));
    }

    let kind = match (is_async, generator) {
        (true, _) => JsKind::AsyncFunction,
        (false, true) => JsKind::GenFunction,
        (false, false) => JsKind::Function,
    };
    Ok(Some(JsNode::function(kind, Some(name), args, body, acc, kwargs)))
}

/// `async def`, rendered like `def` with the `async` keyword.
fn async_function_def(t: &mut Transformer, x: NodeId) -> RuleResult {
    t.stage3_guard(x, "Async stuff requires 'stage3' to be enabled")?;
    let tree = t.tree();
    t.unsupported(
        x,
        is_generator(&tree, tree.children(x, "body")),
        "Async generators are not supported",
    )?;
    function_def(t, x)
}

fn method(name: &str, args: Vec<Arg>, body: Vec<Arg>, is_static: bool) -> JsNode {
    JsNode::function(JsKind::Method { is_static }, Some(name.to_string()), args, body, Arg::Absent, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::py_parser::{Parse, PyParser};

    fn first_def(src: &str) -> (SourceTree, NodeId) {
        let tree = PyParser.parse(src).unwrap();
        let stmt = tree.children(tree.root(), "body")[0];
        (tree, stmt)
    }

    #[test]
    fn should_recognize_managed_decorators() {
        let (tree, class) = first_def("class A:\n    @property\n    def a(self):\n        pass\n    @a.setter\n    def a(self, v):\n        pass\n    @deco\n    def b(self):\n        pass\n");
        let members = tree.children(class, "body");
        assert!(managed_decorator(&tree, members[0]).is_some());
        assert!(managed_decorator(&tree, members[1]).is_some());
        assert!(managed_decorator(&tree, members[2]).is_none());
    }

    #[test]
    fn should_detect_generators_outside_nested_functions() {
        let (tree, def) = first_def("def gen():\n    yield 1\n");
        assert!(is_generator(&tree, tree.children(def, "body")));
        let (tree, def) = first_def("def outer():\n    def inner():\n        yield 1\n    return inner\n");
        assert!(!is_generator(&tree, tree.children(def, "body")));
    }
}
