use std::sync::Arc;

use pyjs_compiler::error::CompilerError;
use pyjs_compiler::output::source_map::SourceMap;
use pyjs_compiler::{standard_rules, translates, translates_with, TranslateOptions};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_name_the_source_in_the_map() {
        let options = TranslateOptions::default().with_filename("app/main.py");
        let translation = translates("x = 1\n", &options).unwrap();
        assert!(translation.source_map.tokens().iter().all(|t| t.src.as_deref() == Some("app/main.py")));
        assert_eq!(
            translation.source_map.sources_content().get("app/main.py").map(String::as_str),
            Some("x = 1\n")
        );
    }

    #[test]
    fn should_embed_the_complete_source_of_a_fragment() {
        let complete = "<script>\n    x = 1\n</script>\n";
        let options = TranslateOptions {
            src_offset: (1, 0),
            complete_src: Some(complete.to_string()),
            ..TranslateOptions::default().with_filename("page.html")
        };
        let translation = translates("    x = 1\n", &options).unwrap();
        assert_eq!(
            translation.source_map.sources_content().get("page.html").map(String::as_str),
            Some(complete)
        );
        let token = translation.source_map.tokens().iter().find(|t| t.dst_line == 1).unwrap();
        assert_eq!((token.src_line, token.src_col), (1, 4));
    }

    #[test]
    fn should_shift_only_the_first_output_line_by_the_column_offset() {
        let options = TranslateOptions {
            dst_offset: (2, 10),
            ..TranslateOptions::default()
        };
        let translation = translates("f(1)\ng(2)\n", &options).unwrap();
        assert_eq!(translation.text, "f(1);\ng(2);\n");
        let dsts: Vec<(u32, u32)> = translation.source_map.tokens().iter().map(|t| t.dst()).collect();
        assert!(dsts.contains(&(2, 10)));
        assert!(dsts.contains(&(3, 0)));
    }

    #[test]
    fn should_keep_dedent_optional() {
        let options = TranslateOptions {
            dedent: false,
            ..TranslateOptions::default()
        };
        assert!(matches!(translates("    x = 1\n", &options), Err(CompilerError::Transform(_))));
    }

    #[test]
    fn should_decode_the_inline_map() {
        let options = TranslateOptions {
            inline_map: true,
            ..TranslateOptions::default()
        };
        let translation = translates("x = 1\ny = x\n", &options).unwrap();
        let pragma = translation.text.lines().last().unwrap();
        let encoded = pragma.rsplit(',').next().unwrap();
        assert!(!encoded.is_empty());

        let plain = translates("x = 1\ny = x\n", &TranslateOptions::default()).unwrap();
        let reparsed = SourceMap::decode(&plain.source_map.stringify(false).unwrap()).unwrap();
        assert_eq!(reparsed.tokens(), plain.source_map.tokens());
    }

    #[test]
    fn should_share_the_standard_rules() {
        let first = standard_rules().unwrap();
        let second = standard_rules().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let translation = translates_with(first, "a = 1\n", &TranslateOptions::default()).unwrap();
        assert_eq!(translation.text, "var a;\na = 1;\n");
        assert!(translation.warnings.is_empty());
    }

    #[test]
    fn should_declare_snippet_and_user_names_together() {
        let text = translates("a = 1 in b\nc = 2\n", &TranslateOptions::default()).unwrap().text;
        assert!(text.starts_with("var _pj, a, c;\nfunction _pj_snippets(container) {\n"));
        assert_eq!(text.lines().filter(|line| line.starts_with("var ")).count(), 1);
    }

    #[test]
    fn should_read_options_from_json() {
        let options: TranslateOptions =
            serde_json::from_str(r#"{"src_filename": "m.py", "body_only": true, "features": "ES6"}"#).unwrap();
        assert_eq!(options.src_filename, "m.py");
        assert!(options.body_only);
        assert!(options.transform.es6());
    }
}
