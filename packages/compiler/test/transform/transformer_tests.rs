use std::sync::Arc;

use pyjs_compiler::error::{CompilerError, TransformError};
use pyjs_compiler::output::fragment::Block;
use pyjs_compiler::parse_util::SourcePos;
use pyjs_compiler::py_parser::NodeKind;
use pyjs_compiler::{translates, Features, RuleRegistry, TransformOptions, TranslateOptions, Transformer};

#[cfg(test)]
mod tests {
    use super::*;

    fn es5(src: &str) -> String {
        translates(src, &TranslateOptions::default()).unwrap().text
    }

    fn es6(src: &str) -> String {
        let options = TranslateOptions::default().with_features(Features::ES6);
        translates(src, &options).unwrap().text
    }

    fn transform_error(src: &str, features: Features) -> TransformError {
        let options = TranslateOptions::default().with_features(features);
        match translates(src, &options) {
            Err(CompilerError::Transform(err)) => err,
            other => panic!("expected a transformation error, got {:?}", other.map(|t| t.text)),
        }
    }

    #[test]
    fn should_hoist_assigned_names_into_a_leading_var() {
        assert_eq!(
            es5("x = 1\nif x:\n    y = 2\n"),
            "var x, y;\nx = 1;\nif (x) {\n    y = 2;\n}\n"
        );
    }

    #[test]
    fn should_hoist_function_locals_but_not_parameters() {
        assert_eq!(
            es5("def f(a):\n    x = a + 1\n    return x\n"),
            "function f(a) {\n    var x;\n    x = (a + 1);\n    return x;\n}\n"
        );
    }

    #[test]
    fn should_not_hoist_globals() {
        assert_eq!(es5("from __globals__ import window\nwindow = 1\n"), "window = 1;\n");
        assert_eq!(es5("global y\ny = 2\n"), "y = 2;\n");
    }

    #[test]
    fn should_fail_when_no_rule_accepts_a_node() {
        let registry = RuleRegistry::standard().unwrap().without(&[NodeKind::FunctionDef]);
        let mut t = Transformer::new(Arc::new(registry), TransformOptions::default());
        match t.transform_code("x = 1\n\ndef f():\n    pass\n") {
            Err(TransformError::NoTransformation { kind, location }) => {
                assert_eq!(kind, NodeKind::FunctionDef);
                assert_eq!(location.0, Some(SourcePos::new(3, 0)));
            }
            other => panic!("expected no transformation, got {:?}", other),
        }
    }

    #[test]
    fn should_fail_on_an_empty_registry() {
        let mut t = Transformer::new(Arc::new(RuleRegistry::new()), TransformOptions::default());
        let err = t.transform_code("pass\n").unwrap_err();
        assert_eq!(err.kind(), Some(NodeKind::Pass));
        assert!(err.to_string().ends_with("No transformation for the node"));
    }

    #[test]
    fn should_report_unsupported_constructs_with_their_position() {
        let err = transform_error("x = 1\nclass A:\n    pass\n", Features::empty());
        assert_eq!(
            err.to_string(),
            "Node type 'ClassDef': Line: 2, column: 0. 'class' statement requires ES6"
        );
    }

    #[test]
    fn should_report_parse_errors() {
        match translates("def (:\n", &TranslateOptions::default()) {
            Err(CompilerError::Transform(TransformError::Parse(err))) => assert_eq!(err.location.line, 1),
            other => panic!("expected a parse error, got {:?}", other.map(|t| t.text)),
        }
    }

    #[test]
    fn should_reject_names_bound_twice_at_top_level() {
        let err = transform_error("def f():\n    pass\n\ndef f():\n    pass\n", Features::empty());
        assert!(matches!(err, TransformError::Unsupported { kind: NodeKind::FunctionDef, .. }));
        assert!(err.to_string().contains("Name 'f' is already bound"));

        let err = transform_error("f = 1\n\ndef f():\n    pass\n", Features::empty());
        assert!(err.to_string().contains("Name 'f' is already bound"));

        assert_eq!(es5("x = 1\nx = 2\n"), "var x;\nx = 1;\nx = 2;\n");
    }

    #[test]
    fn should_emit_each_snippet_once_before_the_code() {
        let text = es5("a = x in y\nb = z in w\n");
        assert_eq!(text.matches("function _in(left, right) {").count(), 1);
        assert_eq!(text.matches("function _pj_snippets(container) {").count(), 1);
        let snippets = text.find("_pj_snippets(_pj);").unwrap();
        let first_use = text.find("a = _pj._in(x, y);").unwrap();
        assert!(snippets < first_use);
        assert!(text.contains("b = _pj._in(z, w);"));
        assert!(text.contains("return (left in right);"));
    }

    #[test]
    fn should_leave_snippets_out_when_disabled() {
        let mut options = TranslateOptions::default();
        options.transform.snippets = false;
        let text = translates("a = x in y\n", &options).unwrap().text;
        assert_eq!(text, "var a;\na = (x in y);\n");
    }

    #[test]
    fn should_translate_deterministically() {
        let src = "class A(B):\n    @deco\n    def m(self):\n        for k in dict(self.d):\n            print(k in self)\n";
        let options = TranslateOptions::default().with_features(Features::ES6);
        let first = translates(src, &options).unwrap();
        let second = translates(src, &options).unwrap();
        assert_eq!(first.text, second.text);
        assert_eq!(
            first.source_map.stringify(false).unwrap(),
            second.source_map.stringify(false).unwrap()
        );
    }

    #[test]
    fn should_generate_fresh_names_per_unit() {
        let text = es5("for i in range(3):\n    pass\nfor j in range(3):\n    pass\n");
        assert!(text.contains("for (var i = 0, _pj_a = 3; (i < _pj_a); i += 1) {"));
        assert!(text.contains("for (var j = 0, _pj_b = 3; (j < _pj_b); j += 1) {"));
        // a new unit starts over
        assert!(es5("for i in range(3):\n    pass\n").contains("_pj_a"));
    }

    #[test]
    fn should_keep_the_map_within_the_text() {
        let src = "x = 1\n\ndef f(a, b):\n    if a:\n        return b\n    return a\n";
        let translation = translates(src, &TranslateOptions::default()).unwrap();
        let lines: Vec<&str> = translation.text.lines().collect();
        assert!(!translation.source_map.tokens().is_empty());
        for token in translation.source_map.tokens() {
            let line = lines[token.dst_line as usize];
            assert!((token.dst_col as usize) < line.chars().count(), "{:?} past {:?}", token, line);
        }
        let returns: Vec<u32> = translation
            .source_map
            .tokens()
            .iter()
            .filter(|t| lines[t.dst_line as usize][t.dst_col as usize..].starts_with("return"))
            .map(|t| t.src_line)
            .collect();
        assert_eq!(returns, vec![4, 5]);
    }

    #[test]
    fn should_attribute_subtransformed_code_to_the_class() {
        let src = "x = 1\nclass MyError(Exception):\n    pass\n";
        let options = TranslateOptions::default().with_features(Features::ES6);
        let translation = translates(src, &options).unwrap();
        assert!(translation.text.contains("function MyError(message) {"));
        assert!(translation.text.contains("this.name = \"MyError\";"));
        assert!(translation.text.contains("MyError.prototype = Object.create(Error.prototype);"));
        let first_line = translation.text.find("function MyError").unwrap();
        let dst_line = translation.text[..first_line].matches('\n').count() as u32;
        assert!(translation
            .source_map
            .tokens()
            .iter()
            .filter(|t| t.dst_line >= dst_line)
            .all(|t| t.src_line == 1 && t.src_col == 0));
    }

    #[test]
    fn should_collect_warnings_without_failing() {
        let options = TranslateOptions::default();
        let translation = translates("try:\n    f()\nexcept get_type() as e:\n    pass\n", &options).unwrap();
        assert_eq!(translation.warnings.len(), 1);
        assert_eq!(translation.warnings[0].kind, NodeKind::Try);
        assert!(translation.warnings[0].message.contains("might not evaluate to a valid type"));
    }

    #[test]
    fn should_relocate_dedented_fragments() {
        let options = TranslateOptions {
            src_offset: (10, 0),
            ..TranslateOptions::default()
        };
        let translation = translates("    x = 1\n    y = x\n", &options).unwrap();
        assert_eq!(translation.text, "var x, y;\nx = 1;\ny = x;\n");
        let token = translation.source_map.tokens().iter().find(|t| t.dst_line == 1).unwrap();
        assert_eq!((token.src_line, token.src_col), (10, 4));
    }

    #[test]
    fn should_translate_only_the_body_when_asked() {
        let options = TranslateOptions {
            body_only: true,
            ..TranslateOptions::default()
        };
        let translation = translates("def wrapper():\n    a = 1\n    return a\n", &options).unwrap();
        assert_eq!(translation.text, "var a;\na = 1;\n");
    }

    #[test]
    fn should_append_the_inline_map() {
        let options = TranslateOptions {
            inline_map: true,
            ..TranslateOptions::default()
        };
        let translation = translates("x = 1\n", &options).unwrap();
        assert!(translation.text.starts_with("var x;\nx = 1;\n\n//# sourceMappingURL=data:text/json;base64,"));
    }

    #[test]
    fn should_render_es6_only_constructs() {
        assert!(es6("class A:\n    pass\n").starts_with("class A {\n"));
    }

    #[test]
    fn should_render_blocks_from_transformed_nodes() {
        let registry = RuleRegistry::standard().unwrap();
        let mut t = Transformer::new(Arc::new(registry), TransformOptions::default());
        let node = t.transform_code("while x:\n    break\n").unwrap();
        assert_eq!(Block::new(&node.serialize()).read(), "while (x) {\n    break;\n}\n");
    }
}
