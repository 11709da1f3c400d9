use pyjs_compiler::parse_util::SourcePos;
use pyjs_compiler::py_parser::{NodeId, NodeKind, Parse, PyParser, SourceTree};

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> SourceTree {
        PyParser::new().parse(text).unwrap()
    }

    fn first(tree: &SourceTree) -> NodeId {
        tree.children(tree.root(), "body")[0]
    }

    #[test]
    fn should_place_decorated_definitions_at_the_first_decorator() {
        let tree = parse("x = 1\n@foo\n@bar.baz(1)\ndef f(self):\n    pass\n");
        let func = tree.children(tree.root(), "body")[1];
        assert_eq!(tree.kind(func), NodeKind::FunctionDef);
        assert_eq!(tree.pos(func), Some(SourcePos::new(2, 0)));
        let decorators = tree.children(func, "decorator_list");
        assert_eq!(decorators.len(), 2);
        assert!(tree.is_name(decorators[0], "foo"));
        assert_eq!(tree.kind(decorators[1]), NodeKind::Call);
    }

    #[test]
    fn should_parse_class_bases_and_keywords() {
        let tree = parse("class A(B, metaclass=M):\n    '''Doc.'''\n    x = 1\n");
        let class = first(&tree);
        assert_eq!(tree.str_field(class, "name"), Some("A"));
        assert_eq!(tree.children(class, "bases").len(), 1);
        let keyword = tree.children(class, "keywords")[0];
        assert_eq!(tree.str_field(keyword, "arg"), Some("metaclass"));
        let doc = tree.children(class, "body")[0];
        let value = tree.child(doc, "value").unwrap();
        assert_eq!(tree.str_value(value), Some("Doc."));
    }

    #[test]
    fn should_split_parameters_by_kind() {
        let tree = parse("def f(a, b=1, *args, c, d=2, **kw):\n    pass\n");
        let args = tree.child(first(&tree), "args").unwrap();
        assert_eq!(tree.children(args, "args").len(), 2);
        let vararg = tree.child(args, "vararg").unwrap();
        assert_eq!(tree.str_field(vararg, "arg"), Some("args"));
        let kwonly = tree.children(args, "kwonlyargs");
        assert_eq!(kwonly.len(), 2);
        assert!(tree.child(kwonly[0], "default").is_none());
        assert!(tree.child(kwonly[1], "default").is_some());
        let kwarg = tree.child(args, "kwarg").unwrap();
        assert_eq!(tree.str_field(kwarg, "arg"), Some("kw"));
    }

    #[test]
    fn should_parse_call_keywords_and_double_star() {
        let tree = parse("f(1, x=2, **opts)\n");
        let call = tree.child(first(&tree), "value").unwrap();
        assert_eq!(tree.children(call, "args").len(), 1);
        let keywords = tree.children(call, "keywords");
        assert_eq!(keywords.len(), 2);
        assert_eq!(tree.str_field(keywords[0], "arg"), Some("x"));
        assert_eq!(tree.str_field(keywords[1], "arg"), None);
    }

    #[test]
    fn should_chain_comparisons() {
        let tree = parse("r = a < b <= c is not d\n");
        let compare = tree.child(first(&tree), "value").unwrap();
        let ops: Vec<NodeKind> = tree.children(compare, "ops").iter().map(|&op| tree.kind(op)).collect();
        assert_eq!(ops, vec![NodeKind::Lt, NodeKind::LtE, NodeKind::IsNot]);
        assert_eq!(tree.children(compare, "comparators").len(), 3);
    }

    #[test]
    fn should_bind_power_tighter_than_unary_minus() {
        let tree = parse("r = -2 ** 2 // 3\n");
        let value = tree.child(first(&tree), "value").unwrap();
        assert_eq!(tree.kind(tree.child(value, "op").unwrap()), NodeKind::FloorDiv);
        let left = tree.child(value, "left").unwrap();
        assert_eq!(tree.kind(left), NodeKind::UnaryOp);
        let operand = tree.child(left, "operand").unwrap();
        assert_eq!(tree.kind(tree.child(operand, "op").unwrap()), NodeKind::Pow);
    }

    #[test]
    fn should_parse_container_literals() {
        let tree = parse("d = {'a': [1, 2], 'b': (3,)}\n");
        let dict = tree.child(first(&tree), "value").unwrap();
        assert_eq!(tree.kind(dict), NodeKind::Dict);
        let values = tree.children(dict, "values");
        assert_eq!(tree.kind(values[0]), NodeKind::List);
        assert_eq!(tree.kind(values[1]), NodeKind::Tuple);
        assert_eq!(tree.children(values[1], "elts").len(), 1);
    }

    #[test]
    fn should_parse_tuple_targets_and_augmented_assignment() {
        let tree = parse("a, b = b, a\nc += 1\n");
        let body = tree.children(tree.root(), "body");
        let target = tree.children(body[0], "targets")[0];
        assert_eq!(tree.kind(target), NodeKind::Tuple);
        assert_eq!(tree.kind(body[1]), NodeKind::AugAssign);
        assert_eq!(tree.kind(tree.child(body[1], "op").unwrap()), NodeKind::Add);
    }

    #[test]
    fn should_parse_lambda_and_conditional_expressions() {
        let tree = parse("f = lambda x, y: x if y else None\n");
        let lambda = tree.child(first(&tree), "value").unwrap();
        assert_eq!(tree.kind(lambda), NodeKind::Lambda);
        let args = tree.child(lambda, "args").unwrap();
        assert_eq!(tree.children(args, "args").len(), 2);
        assert_eq!(tree.kind(tree.child(lambda, "body").unwrap()), NodeKind::IfExp);
    }

    #[test]
    fn should_parse_simple_statements() {
        let tree = parse("global a, b\nassert x, 'msg'\ndel a[0], b\nraise\n");
        let body = tree.children(tree.root(), "body");
        let kinds: Vec<NodeKind> = body.iter().map(|&id| tree.kind(id)).collect();
        assert_eq!(
            kinds,
            vec![NodeKind::Global, NodeKind::Assert, NodeKind::Delete, NodeKind::Raise]
        );
        assert_eq!(tree.children(body[0], "names").len(), 2);
        assert!(tree.child(body[1], "msg").is_some());
        assert_eq!(tree.children(body[2], "targets").len(), 2);
        assert!(tree.child(body[3], "exc").is_none());
    }

    #[test]
    fn should_parse_imports() {
        let tree = parse("import a.b as c\nfrom m import *\nfrom __globals__ import window\n");
        let body = tree.children(tree.root(), "body");
        let alias = tree.children(body[0], "names")[0];
        assert_eq!(tree.str_field(alias, "name"), Some("a.b"));
        assert_eq!(tree.str_field(alias, "asname"), Some("c"));
        let star = tree.children(body[1], "names")[0];
        assert_eq!(tree.str_field(star, "name"), Some("*"));
        assert_eq!(tree.int_field(body[2], "level"), Some(0));
        assert_eq!(tree.str_field(body[2], "module"), Some("__globals__"));
    }

    #[test]
    fn should_skip_comments_and_blank_lines() {
        let tree = parse("# leading\n\nx = 1  # trailing\n\n\ny = 2\n");
        let body = tree.children(tree.root(), "body");
        assert_eq!(body.len(), 2);
        assert_eq!(tree.pos(body[1]), Some(SourcePos::new(6, 0)));
    }

    #[test]
    fn should_concatenate_adjacent_strings() {
        let tree = parse("s = ('a'\n     \"b\"\n     '''c''')\n");
        let value = tree.child(first(&tree), "value").unwrap();
        assert_eq!(tree.str_value(value), Some("abc"));
    }

    #[test]
    fn should_stop_name_walks_at_nested_definitions() {
        let tree = parse("def f():\n    a = 1\n    def g():\n        b = 2\n");
        let body = tree.children(first(&tree), "body");
        let walked = tree.walk_under_code_boundary(body);
        assert!(walked.iter().any(|&id| tree.is_name(id, "a")));
        assert!(!walked.iter().any(|&id| tree.is_name(id, "b")));
    }

    #[test]
    fn should_parse_async_definitions_and_await() {
        let tree = parse("@deco\nasync def f(x):\n    return await g(x) ** 2\n");
        let func = first(&tree);
        assert_eq!(tree.kind(func), NodeKind::AsyncFunctionDef);
        assert_eq!(tree.pos(func), Some(SourcePos::new(1, 0)));
        assert_eq!(tree.children(func, "decorator_list").len(), 1);

        let ret = tree.children(func, "body")[0];
        let power = tree.child(ret, "value").unwrap();
        assert_eq!(tree.kind(tree.child(power, "op").unwrap()), NodeKind::Pow);
        let awaited = tree.child(power, "left").unwrap();
        assert_eq!(tree.kind(awaited), NodeKind::Await);
        assert_eq!(tree.kind(tree.child(awaited, "value").unwrap()), NodeKind::Call);
    }

    #[test]
    fn should_refuse_other_async_statements() {
        let err = PyParser::new().parse("async def f():\n    async for x in y:\n        pass\n").unwrap_err();
        assert_eq!(err.msg, "'async for' statements are not supported");
        assert_eq!(err.location.line, 2);
    }

    #[test]
    fn should_parse_list_comprehensions() {
        let tree = parse("r = [x * 2 for x in xs if x if not y for z in x]\n");
        let comp = tree.child(first(&tree), "value").unwrap();
        assert_eq!(tree.kind(comp), NodeKind::ListComp);
        assert_eq!(tree.kind(tree.child(comp, "elt").unwrap()), NodeKind::BinOp);
        let generators = tree.children(comp, "generators");
        assert_eq!(generators.len(), 2);
        assert!(tree.is_name(tree.child(generators[0], "target").unwrap(), "x"));
        assert!(tree.is_name(tree.child(generators[0], "iter").unwrap(), "xs"));
        assert_eq!(tree.children(generators[0], "ifs").len(), 2);
        assert!(tree.children(generators[1], "ifs").is_empty());
    }

    #[test]
    fn should_split_f_strings_into_joined_values() {
        let tree = parse("s = 'a' f'{x!r}-{y + 1:>4}'\n");
        let joined = tree.child(first(&tree), "value").unwrap();
        assert_eq!(tree.kind(joined), NodeKind::JoinedStr);
        let values = tree.children(joined, "values");
        let kinds: Vec<NodeKind> = values.iter().map(|&id| tree.kind(id)).collect();
        assert_eq!(
            kinds,
            vec![NodeKind::Str, NodeKind::FormattedValue, NodeKind::Str, NodeKind::FormattedValue]
        );
        assert_eq!(tree.str_value(values[0]), Some("a"));
        assert_eq!(tree.int_field(values[1], "conversion"), Some('r' as i64));
        assert!(tree.child(values[1], "format_spec").is_none());
        assert_eq!(tree.str_value(values[2]), Some("-"));
        assert_eq!(tree.int_field(values[3], "conversion"), Some(-1));
        let spec = tree.child(values[3], "format_spec").unwrap();
        assert_eq!(tree.str_value(spec), Some(">4"));

        let sum = tree.child(values[3], "value").unwrap();
        assert_eq!(tree.kind(sum), NodeKind::BinOp);
        assert_eq!(tree.pos(sum), Some(SourcePos::new(1, 8)));
    }

    #[test]
    fn should_keep_plain_strings_next_to_escaped_braces() {
        let tree = parse("s = f'{{x}}'\n");
        let joined = tree.child(first(&tree), "value").unwrap();
        let values = tree.children(joined, "values");
        assert_eq!(values.len(), 1);
        assert_eq!(tree.str_value(values[0]), Some("{x}"));
    }

    #[test]
    fn should_report_bad_f_string_fields_at_the_literal() {
        let err = PyParser::new().parse("x = 1\ns = f'{a b}'\n").unwrap_err();
        assert!(err.msg.starts_with("f-string: "));
        assert_eq!((err.location.line, err.location.col), (2, 4));
        assert!(PyParser::new().parse("s = f'{}'\n").is_err());
    }

    #[test]
    fn should_reject_inconsistent_indentation() {
        let err = PyParser::new().parse("if a:\n        x = 1\n    y = 2\n").unwrap_err();
        assert_eq!(err.location.line, 3);
    }
}
