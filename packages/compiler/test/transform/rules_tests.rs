use pyjs_compiler::error::{CompilerError, TransformError};
use pyjs_compiler::py_parser::NodeKind;
use pyjs_compiler::{translates, Features, TranslateOptions};

#[cfg(test)]
mod tests {
    use super::*;

    fn render(src: &str, features: Features) -> String {
        translates(src, &TranslateOptions::default().with_features(features))
            .unwrap()
            .text
    }

    fn es5(src: &str) -> String {
        render(src, Features::empty())
    }

    fn es6(src: &str) -> String {
        render(src, Features::ES6)
    }

    fn unsupported(src: &str, features: Features) -> (NodeKind, String) {
        refused(src, &TranslateOptions::default().with_features(features))
    }

    fn refused(src: &str, options: &TranslateOptions) -> (NodeKind, String) {
        match translates(src, options) {
            Err(CompilerError::Transform(TransformError::Unsupported { kind, message, .. })) => (kind, message),
            other => panic!("expected an unsupported construct, got {:?}", other.map(|t| t.text)),
        }
    }

    mod loops {
        use super::*;

        #[test]
        fn should_count_over_a_range() {
            assert_eq!(
                es5("for i in range(10):\n    print(i)\n"),
                "for (var i = 0, _pj_a = 10; (i < _pj_a); i += 1) {\n    console.log(i);\n}\n"
            );
        }

        #[test]
        fn should_walk_the_keys_of_a_dict() {
            assert_eq!(
                es5("for p in dict(props):\n    f(p)\n"),
                "var _pj_a = props;\nfor (var p in _pj_a) {\n    if (_pj_a.hasOwnProperty(p)) {\n        f(p);\n    }\n}\n"
            );
        }

        #[test]
        fn should_index_any_other_sequence() {
            assert_eq!(
                es5("for x in items:\n    f(x)\n"),
                "for (var x, _pj_c = 0, _pj_a = items, _pj_b = _pj_a.length; (_pj_c < _pj_b); _pj_c += 1) {\n    x = _pj_a[_pj_c];\n    f(x);\n}\n"
            );
        }

        #[test]
        fn should_walk_iterables_with_for_of() {
            assert_eq!(
                es6("for x in iterable(items):\n    f(x)\n"),
                "for (var x of items) {\n    f(x);\n}\n"
            );
        }

        #[test]
        fn should_require_es6_for_iterables() {
            let (kind, message) = unsupported("for x in iterable(items):\n    f(x)\n", Features::empty());
            assert_eq!(kind, NodeKind::For);
            assert_eq!(message, "for...of statement requires ES6");
        }

        #[test]
        fn should_refuse_loop_else() {
            let (kind, message) = unsupported("for x in y:\n    pass\nelse:\n    pass\n", Features::empty());
            assert_eq!(kind, NodeKind::For);
            assert!(message.contains("else"));
        }
    }

    mod exceptions {
        use super::*;

        #[test]
        fn should_chain_handlers_in_one_catch() {
            let src = "try:\n    f()\nexcept ValueError as e:\n    g(e)\nexcept:\n    h()\n";
            assert_eq!(
                es5(src),
                "try {\n    f();\n} catch(e) {\n    if ((e instanceof ValueError)) {\n        g(e);\n    } else {\n        h();\n    }\n}\n"
            );
        }

        #[test]
        fn should_rethrow_unmatched_values() {
            let text = es5("try:\n    f()\nexcept ValueError as e:\n    g(e)\n");
            assert!(text.contains("} else {\n        throw e;\n    }"));
        }

        #[test]
        fn should_refuse_try_else() {
            let src = "try:\n    f()\nexcept:\n    pass\nelse:\n    g()\n";
            let (kind, message) = unsupported(src, Features::empty());
            assert_eq!(kind, NodeKind::Try);
            assert_eq!(message, "'else' block of 'try' statement isn't supported");
        }
    }

    mod classes {
        use super::*;

        #[test]
        fn should_render_constructor_and_properties() {
            let src = "class A(B):\n    def __init__(self, x):\n        super().__init__(x)\n        self.x = x\n\n    @property\n    def value(self):\n        return self.x\n";
            assert_eq!(
                es6(src),
                "class A extends B {\n    constructor(x) {\n        super(x);\n        this.x = x;\n    }\n    get value() {\n        return this.x;\n    }\n}\n"
            );
        }

        #[test]
        fn should_register_method_decorators() {
            let text = es6("class A:\n    @deco\n    def m(self):\n        pass\n");
            assert!(text.contains("_pj.set_decorators(A, {\"m\": [deco]});"));
            assert!(text.contains("function set_decorators(cls, props) {"));
        }

        #[test]
        fn should_refuse_method_decorators_without_snippets() {
            let mut options = TranslateOptions::default().with_features(Features::ES6);
            options.transform.snippets = false;
            let (kind, message) = refused("class A:\n    @deco\n    def m(self):\n        pass\n", &options);
            assert_eq!(kind, NodeKind::ClassDef);
            assert_eq!(message, "Method decorators require snippets");
        }

        #[test]
        fn should_render_async_methods() {
            assert_eq!(
                render("class A:\n    async def m(self):\n        await self.x\n", Features::ES6 | Features::STAGE3),
                "class A {\n    async m() {\n        await this.x;\n    }\n}\n"
            );
        }

        #[test]
        fn should_refuse_multiple_inheritance() {
            let (kind, message) = unsupported("class A(B, C):\n    pass\n", Features::ES6);
            assert_eq!(kind, NodeKind::ClassDef);
            assert_eq!(message, "Multiple inheritance is not supported");
        }

        #[test]
        fn should_require_es6() {
            let (kind, message) = unsupported("class A:\n    pass\n", Features::empty());
            assert_eq!(kind, NodeKind::ClassDef);
            assert_eq!(message, "'class' statement requires ES6");
        }
    }

    mod operators {
        use super::*;

        #[test]
        fn should_call_math_for_power_and_floor_division() {
            assert_eq!(es5("a = 2 ** 3\n"), "var a;\na = Math.pow(2, 3);\n");
            assert!(es5("a = 7 // 2\n").contains("a = Math.floor((7 / 2));"));
        }

        #[test]
        fn should_compare_strictly() {
            assert!(es5("a = x == y\n").contains("a = (x === y);"));
            assert!(es5("a = x is not None\n").contains("a = (x !== null);"));
        }

        #[test]
        fn should_negate_with_a_bang() {
            assert!(es5("a = not x\n").contains("a = (! x);"));
        }

        #[test]
        fn should_slice_and_index_from_the_end() {
            assert!(es5("a = x[-1]\n").contains("a = x.slice((- 1))[0];"));
            assert!(es5("a = x[1:]\n").contains("a = x.slice(1);"));
        }

        #[test]
        fn should_pass_keywords_as_a_trailing_object() {
            assert!(es5("f(1, a=2)\n").contains("f(1, {\"a\": 2});"));
        }
    }

    mod functions {
        use super::*;

        #[test]
        fn should_render_lambdas_as_arrows() {
            assert!(es6("f = lambda x: x + 1\n").contains("f = (x) => {\n    return (x + 1);\n};"));
        }

        #[test]
        fn should_refuse_decorated_functions() {
            let (kind, message) = unsupported("@deco\ndef f():\n    pass\n", Features::empty());
            assert_eq!(kind, NodeKind::FunctionDef);
            assert_eq!(message, "Function decorators are unsupported yet");
        }
    }

    mod async_functions {
        use super::*;

        fn stage3(src: &str) -> String {
            render(src, Features::STAGE3)
        }

        #[test]
        fn should_prefix_functions_and_awaits() {
            assert_eq!(
                stage3("async def f(x):\n    return await g(x)\n"),
                "async function f(x) {\n    return await g(x);\n}\n"
            );
        }

        #[test]
        fn should_bind_async_functions_nested_in_methods() {
            let text = render(
                "class A:\n    def m(self):\n        async def inner():\n            await self.x\n        return inner\n",
                Features::ES6 | Features::STAGE3,
            );
            assert!(text.contains("        async function inner() {\n            await this.x;\n        }\n"));
            assert!(text.contains("        inner = inner.bind(this);\n"));
        }

        #[test]
        fn should_require_stage3() {
            let message = "Async stuff requires 'stage3' to be enabled";
            let (kind, refused) = unsupported("async def f():\n    pass\n", Features::ES6);
            assert_eq!((kind, refused.as_str()), (NodeKind::AsyncFunctionDef, message));
            let (kind, refused) = unsupported("def f():\n    await g()\n", Features::ES6);
            assert_eq!((kind, refused.as_str()), (NodeKind::Await, message));
        }

        #[test]
        fn should_refuse_async_generators() {
            let (kind, message) = unsupported("async def f():\n    yield 1\n", Features::STAGE3);
            assert_eq!(kind, NodeKind::AsyncFunctionDef);
            assert_eq!(message, "Async generators are not supported");
        }
    }

    mod comprehensions {
        use super::*;

        #[test]
        fn should_build_the_list_in_a_called_function() {
            assert_eq!(
                es5("a = [x * 2 for x in y if x]\n"),
                "var a;\n\
                 a = (function () {\n\
                 \x20   var _pj_a = [], _pj_b = y;\n\
                 \x20   for (var _pj_c = 0, _pj_d = _pj_b.length; (_pj_c < _pj_d); _pj_c += 1) {\n\
                 \x20       var x = _pj_b[_pj_c];\n\
                 \x20       if (x) {\n\
                 \x20           _pj_a.push((x * 2));\n\
                 \x20       }\n\
                 \x20   }\n\
                 \x20   return _pj_a;\n\
                 }).call(this);\n"
            );
        }

        #[test]
        fn should_keep_the_loop_name_out_of_the_module_scope() {
            let text = es5("b = [x for x in y]\n");
            assert!(text.starts_with("var b;\n"));
            assert!(text.contains("_pj_a.push(x);"));
        }

        #[test]
        fn should_refuse_nested_loops() {
            let (kind, message) = unsupported("a = [x for y in z for x in y]\n", Features::empty());
            assert_eq!(kind, NodeKind::ListComp);
            assert_eq!(message, "Only one 'for' clause is supported in list comprehensions");
        }
    }

    mod f_strings {
        use super::*;

        #[test]
        fn should_render_template_literals() {
            assert_eq!(es6("a = f'{x} + {y * 2}!'\n"), "var a;\na = `${x} + ${(y * 2)}!`;\n");
            assert_eq!(es6("a = 'n`' f'{x}'\n"), "var a;\na = `n\\`${x}`;\n");
        }

        #[test]
        fn should_require_es6() {
            let (kind, message) = unsupported("a = f'{x}'\n", Features::empty());
            assert_eq!(kind, NodeKind::JoinedStr);
            assert_eq!(message, "f-strings require ES6");
        }

        #[test]
        fn should_refuse_conversions_and_format_specs() {
            let (_, message) = unsupported("a = f'{x!r}'\n", Features::ES6);
            assert_eq!(message, "f-string conversion spec isn't supported");
            let (kind, message) = unsupported("a = f'{x:>10}'\n", Features::ES6);
            assert_eq!(kind, NodeKind::JoinedStr);
            assert_eq!(message, "f-string format spec isn't supported");
        }
    }

    mod modules {
        use super::*;

        #[test]
        fn should_import_names_from_a_module() {
            assert_eq!(es6("from foo.bar import a, b as c\n"), "import {a, b as c} from 'foo/bar';\n");
        }

        #[test]
        fn should_import_a_namespace() {
            assert_eq!(es6("import x.y as z\n"), "import * as z from 'x/y';\n");
            assert_eq!(es6("from . import sibling\n"), "import * as sibling from './sibling';\n");
        }

        #[test]
        fn should_import_the_default_export() {
            assert_eq!(es6("from foo import __default__ as Foo\n"), "import Foo from 'foo';\n");
        }

        #[test]
        fn should_export_declared_names() {
            assert!(es6("a = 1\nb = 2\n__all__ = ['a', 'b']\n").contains("export {a, b};"));
            assert!(es6("a = 1\n__default__ = 'a'\n").contains("export default a;"));
        }

        #[test]
        fn should_require_es6_for_imports() {
            let (kind, message) = unsupported("import foo\n", Features::empty());
            assert_eq!(kind, NodeKind::Import);
            assert_eq!(message, "'import' statement requires ES6");
        }
    }
}
