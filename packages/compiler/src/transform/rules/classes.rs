//! Class definitions and the builtins that only make sense around classes:
//! `super()`, `isinstance()` and `issubclass()`.

use crate::error::TransformError;
use crate::output::js_ast::{Arg, JsNode, JsOp};
use crate::py_parser::{NodeId, NodeKind, SourceTree};
use crate::transform::registry::Rule;
use crate::transform::rules::functions::managed_decorator;
use crate::transform::rules::{
    build_isinstance, call_args, chain, is_call_to, is_docstring, normalize_dict_keys, snippet_ref, RuleResult,
};
use crate::transform::snippets;
use crate::transform::transformer::Transformer;
use crate::transform::util::normalize_name;

pub fn rules() -> Vec<(NodeKind, Vec<Rule>)> {
    vec![(NodeKind::ClassDef, chain![class_def_exception, class_def_default])]
}

/// A plain subclass of `Exception` is rendered as a constructor function
/// chained to `Error.prototype`, so that `instanceof` keeps working.
const EXC_TEMPLATE_ES5: &str = "\
def %(name)s(self, message):
    self.name = '%(name)s'
    self.message = message or 'Custom error %(name)s'
    if typeof(Error.captureStackTrace) == 'function':
        Error.captureStackTrace(self, self.constructor)
    else:
        self.stack = Error(message).stack

%(name)s.prototype = Object.create(Error.prototype)
%(name)s.prototype.constructor = %(name)s
";

fn class_guards(t: &Transformer, tree: &SourceTree, x: NodeId) -> Result<(), TransformError> {
    t.es6_guard(x, "'class' statement requires ES6")?;
    t.unsupported(x, tree.children(x, "bases").len() > 1, "Multiple inheritance is not supported")?;
    for &member in tree.children(x, "body") {
        let allowed = tree.kind(member).is_function_def()
            || matches!(tree.kind(member), NodeKind::Assign | NodeKind::Pass)
            || is_docstring(tree, member);
        t.unsupported(x, !allowed, "Class' body members must be functions or assignments")?;
        t.unsupported(
            x,
            tree.is(member, NodeKind::Assign) && tree.children(member, "targets").len() > 1,
            "Assignments must have only one target",
        )?;
    }
    t.unsupported(
        x,
        !tree.children(x, "keywords").is_empty(),
        "Class arguments cannot be keywords",
    )?;
    Ok(())
}

const METHODS: &[NodeKind] = &[NodeKind::FunctionDef, NodeKind::AsyncFunctionDef];

fn members_of(tree: &SourceTree, x: NodeId, kinds: &[NodeKind]) -> Vec<NodeId> {
    tree.children(x, "body")
        .iter()
        .copied()
        .filter(|&member| kinds.contains(&tree.kind(member)))
        .collect()
}

fn class_def_exception(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    class_guards(t, &tree, x)?;
    let simple = members_of(&tree, x, METHODS).is_empty()
        && members_of(&tree, x, &[NodeKind::Assign]).is_empty()
        && tree
            .children(x, "bases")
            .first()
            .and_then(|&base| tree.name_id(base))
            .map(|base| base == "Exception" || base == "Error")
            .unwrap_or(false);
    if !simple {
        return Ok(None);
    }
    let name = tree.str_field(x, "name").unwrap_or_default();
    let src = EXC_TEMPLATE_ES5.replace("%(name)s", name);
    t.subtransform(&src, Some(x)).map(Some)
}

/// ES6 `class`. Class level assignments become non enumerable prototype
/// properties and generic decorators are applied at runtime, both through
/// snippets.
fn class_def_default(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    class_guards(t, &tree, x)?;
    let name = tree.str_field(x, "name").unwrap_or_default().to_string();
    let body = tree.children(x, "body");
    let fns = members_of(&tree, x, METHODS);
    let assigns = members_of(&tree, x, &[NodeKind::Assign]);

    for &def in &fns {
        let first_is_self = tree
            .child(def, "args")
            .and_then(|args| tree.children(args, "args").first().copied())
            .and_then(|arg| tree.str_field(arg, "arg"))
            == Some("self");
        t.unsupported(def, !first_is_self, "First arg on method must be 'self'")?;
    }

    let mut decos: Vec<(String, Vec<NodeId>)> = fns
        .iter()
        .filter(|&&def| !tree.children(def, "decorator_list").is_empty() && managed_decorator(&tree, def).is_none())
        .map(|&def| {
            (
                tree.str_field(def, "name").unwrap_or_default().to_string(),
                tree.children(def, "decorator_list").to_vec(),
            )
        })
        .collect();
    decos.sort_by(|a, b| a.0.cmp(&b.0));

    let mut members: Vec<Arg> = Vec::with_capacity(fns.len() + 1);
    if let Some(&doc) = body.first().filter(|&&first| is_docstring(&tree, first)) {
        members.push(Arg::Source(doc));
    }
    members.extend(fns.iter().copied().map(Arg::Source));

    let superclass = Arg::from(tree.children(x, "bases").first().copied());
    let class = JsNode::class(JsNode::name(name.clone()), superclass, members).with_origin(t.origin_of(x));
    let mut statements = vec![Arg::from(class)];

    if !assigns.is_empty() {
        let mut props: Vec<(String, Arg, NodeId)> = Vec::with_capacity(assigns.len());
        for &assign in &assigns {
            let Some(target) = tree.children(assign, "targets").first().copied() else {
                continue;
            };
            let Some(value) = tree.child(assign, "value") else {
                continue;
            };
            match tree.name_id(target) {
                Some(id) => props.push((id.to_string(), Arg::from(JsNode::str(normalize_name(id))), value)),
                None => props.push(("~".to_string(), Arg::Source(target), value)),
            }
        }
        props.sort_by(|a, b| a.0.cmp(&b.0));
        let (keys, values): (Vec<Arg>, Vec<Arg>) =
            props.into_iter().map(|(_, key, value)| (key, Arg::Source(value))).unzip();
        let keys = normalize_dict_keys(t, x, keys)?;
        require_snippets(t, x, "Class level assignments")?;
        t.add_snippet(snippets::SET_PROPERTIES);
        statements.push(Arg::from(JsNode::expression_statement(JsNode::call(
            snippet_ref("set_properties"),
            vec![Arg::from(JsNode::name(name.clone())), Arg::from(JsNode::dict(keys, values))],
        ))));
    }

    if !decos.is_empty() {
        let (keys, values): (Vec<Arg>, Vec<Arg>) = decos
            .into_iter()
            .map(|(method, list)| (Arg::from(JsNode::str(method)), Arg::from(JsNode::list(Arg::sources(&list)))))
            .unzip();
        require_snippets(t, x, "Method decorators")?;
        t.add_snippet(snippets::SET_DECORATORS);
        statements.push(Arg::from(JsNode::expression_statement(JsNode::call(
            snippet_ref("set_decorators"),
            vec![Arg::from(JsNode::name(name.clone())), Arg::from(JsNode::dict(keys, values))],
        ))));
    }

    let class_decos = tree.children(x, "decorator_list");
    if !class_decos.is_empty() {
        require_snippets(t, x, "Class decorators")?;
        t.add_snippet(snippets::SET_CLASS_DECORATORS);
        let decorated = JsNode::call(
            snippet_ref("set_class_decorators"),
            vec![Arg::from(JsNode::name(name.clone())), Arg::from(JsNode::list(Arg::sources(class_decos)))],
        );
        statements.push(Arg::from(JsNode::expression_statement(JsNode::assignment(
            JsNode::name(name),
            decorated,
        ))));
    }

    Ok(Some(JsNode::statements(statements)))
}

/// Runtime helpers are only collected when snippets are enabled.
fn require_snippets(t: &Transformer, x: NodeId, what: &str) -> Result<(), TransformError> {
    t.unsupported(x, !t.options().snippets, format!("{} require snippets", what))?;
    Ok(())
}

/// The method enclosing `x`, when `x` is inside one.
fn enclosing_method(t: &Transformer, tree: &SourceTree, x: NodeId) -> Option<NodeId> {
    let method = t.find_parent(x, METHODS)?;
    let parent = t.parent_of(method)?;
    tree.is(parent, NodeKind::ClassDef).then_some(method)
}

/// `super()` without arguments.
fn is_bare_super(tree: &SourceTree, id: NodeId) -> bool {
    is_call_to(tree, id, "super") && call_args(tree, id).is_empty()
}

/// `super().method(...)` becomes `super.method(...)`, or `super(...)` in
/// the constructor.
pub fn call_super(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    let Some(func) = tree.child(x, "func") else {
        return Ok(None);
    };
    let on_super = tree.is(func, NodeKind::Attribute)
        && tree.child(func, "value").map(|v| is_bare_super(&tree, v)).unwrap_or(false);
    if !on_super {
        return Ok(None);
    }
    let Some(method) = enclosing_method(t, &tree, x) else {
        return Ok(None);
    };
    let args = tree.children(x, "args").iter().copied().map(Arg::Source).collect::<Vec<_>>();
    if tree.str_field(method, "name") == Some("__init__") {
        return Ok(Some(JsNode::call(JsNode::super_(), args)));
    }
    let attr = normalize_name(tree.str_field(func, "attr").unwrap_or_default());
    Ok(Some(JsNode::call(JsNode::attribute(JsNode::super_(), attr), args)))
}

/// `super().attr` outside of constructors becomes `super.attr`.
pub fn attribute_super(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    if !tree.child(x, "value").map(|v| is_bare_super(&tree, v)).unwrap_or(false) {
        return Ok(None);
    }
    let Some(method) = enclosing_method(t, &tree, x) else {
        return Ok(None);
    };
    if tree.str_field(method, "name") == Some("__init__") {
        return Err(t.unsupported_error(x, "'super().attr' cannot be used in constructors"));
    }
    let attr = normalize_name(tree.str_field(x, "attr").unwrap_or_default());
    Ok(Some(JsNode::attribute(JsNode::super_(), attr)))
}

/// `super()[key]` outside of constructors becomes `super[key]`.
pub fn subscript_super(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    if !tree.child(x, "value").map(|v| is_bare_super(&tree, v)).unwrap_or(false) {
        return Ok(None);
    }
    let Some(method) = enclosing_method(t, &tree, x) else {
        return Ok(None);
    };
    if tree.str_field(method, "name") == Some("__init__") {
        return Err(t.unsupported_error(x, "'super()[expr]' cannot be used in constructors"));
    }
    Ok(Some(JsNode::subscript(JsNode::super_(), tree.child(x, "slice"))))
}

/// `isinstance(foo, Bar)` becomes `(foo instanceof Bar)`.
pub fn call_isinstance(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    if !is_call_to(&tree, x, "isinstance") {
        return Ok(None);
    }
    let args = call_args(&tree, x);
    if args.len() != 2 {
        return Err(t.unsupported_error(x, "'isinstance' takes exactly two arguments"));
    }
    Ok(Some(build_isinstance(&tree, Arg::Source(args[0]), args[1])))
}

/// `issubclass(Foo, Bar)` becomes `Bar.prototype.isPrototypeOf(Foo.prototype)`,
/// or'ed over a tuple of classes.
pub fn call_issubclass(t: &mut Transformer, x: NodeId) -> RuleResult {
    let tree = t.tree();
    if !is_call_to(&tree, x, "issubclass") {
        return Ok(None);
    }
    let args = call_args(&tree, x);
    let [target, classes] = args[..] else {
        return Err(t.unsupported_error(x, "'issubclass' takes exactly two arguments"));
    };
    let classes = if matches!(tree.kind(classes), NodeKind::Tuple | NodeKind::List) {
        tree.children(classes, "elts").to_vec()
    } else {
        vec![classes]
    };
    let result = classes.into_iter().fold(None::<JsNode>, |prev, cls| {
        let check = JsNode::call(
            JsNode::attribute(JsNode::attribute(cls, "prototype"), "isPrototypeOf"),
            vec![Arg::from(JsNode::attribute(target, "prototype"))],
        );
        Some(match prev {
            Some(prev) => JsNode::bin_op(prev, JsNode::op(JsOp::Or), check),
            None => check,
        })
    });
    Ok(result)
}
