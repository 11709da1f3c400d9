use std::collections::BTreeMap;

use proptest::prelude::*;
use pyjs_compiler::error::SourceMapError;
use pyjs_compiler::output::source_map::{discover, shift_tokens, strip, SourceMap, Token};

const SOURCES: [&str; 3] = ["a.py", "pkg/b.py", "c.js"];
const NAMES: [&str; 3] = ["x", "self", "_pj_a"];

/// Generated position -> optional (source, line, column, optional name).
type Layout = BTreeMap<(u32, u32), Option<(usize, u32, u32, Option<usize>)>>;

fn layout_strategy() -> impl Strategy<Value = Layout> {
    let mapping = proptest::option::of((0..SOURCES.len(), 0u32..5_000, 0u32..400, proptest::option::of(0..NAMES.len())));
    proptest::collection::btree_map((0u32..60, 0u32..300), mapping, 0..80)
}

fn map_of(layout: &Layout) -> SourceMap {
    let mut map = SourceMap::new();
    for (&(dst_line, dst_col), mapping) in layout {
        let token = match *mapping {
            Some((src, src_line, src_col, name)) => {
                let token = Token::new(dst_line, dst_col, SOURCES[src], src_line, src_col);
                match name {
                    Some(name) => token.with_name(NAMES[name]),
                    None => token,
                }
            }
            None => Token::unmapped(dst_line, dst_col),
        };
        map.add_token(token).unwrap();
    }
    map
}

fn decode_error(mappings: &str) -> (String, String) {
    let json = serde_json::json!({ "version": 3, "sources": ["a.py"], "names": [], "mappings": mappings });
    match SourceMap::decode(&json.to_string()) {
        Err(SourceMapError::Decode { segment, reason }) => (segment, reason),
        other => panic!("expected a decode error, got {:?}", other.map(|m| m.tokens().to_vec())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SourceMap {
        let mut map = SourceMap::new();
        map.add_token(Token::new(0, 0, "a.py", 0, 0)).unwrap();
        map.add_token(Token::new(0, 4, "a.py", 0, 4).with_name("x")).unwrap();
        map.add_token(Token::new(1, 2, "b.py", 3, 1)).unwrap();
        map
    }

    #[test]
    fn should_encode_fields_as_deltas() {
        let raw = sample().encode();
        assert_eq!(raw.version, 3);
        assert_eq!(raw.sources, vec!["a.py", "b.py"]);
        assert_eq!(raw.names, vec!["x"]);
        assert_eq!(raw.mappings, "AAAA,IAAIA;ECGH");
    }

    #[test]
    fn should_decode_an_encoded_map() {
        let map = sample();
        let json = map.stringify(false).unwrap();
        let decoded = SourceMap::decode(&json).unwrap();
        assert_eq!(decoded.tokens(), map.tokens());
        assert!(decoded.raw().is_some());
    }

    #[test]
    fn should_skip_the_xssi_prefix() {
        let json = format!(")]}}'\n{}", sample().stringify(false).unwrap());
        let decoded = SourceMap::decode(&json).unwrap();
        assert_eq!(decoded.tokens().len(), 3);
    }

    #[test]
    fn should_apply_the_source_root() {
        let value = serde_json::json!({
            "version": 3,
            "sourceRoot": "lib/",
            "sources": ["a.py"],
            "names": [],
            "mappings": "AAAA",
        });
        let map = SourceMap::decode_value(value).unwrap();
        assert_eq!(map.tokens()[0].src.as_deref(), Some("lib/a.py"));
    }

    #[test]
    fn should_reject_segments_with_unknown_sources() {
        let json = r#"{"version": 3, "sources": ["a.py"], "names": [], "mappings": "AAAA,ACAA"}"#;
        match SourceMap::decode(json) {
            Err(SourceMapError::Decode { segment, reason }) => {
                assert_eq!(segment, "ACAA");
                assert!(reason.contains("references source 1"));
            }
            other => panic!("expected a decode error, got {:?}", other),
        }
    }

    #[test]
    fn should_reject_segments_with_unknown_names() {
        let json = r#"{"version": 3, "sources": ["a.py"], "names": [], "mappings": "AAAAA"}"#;
        assert!(matches!(SourceMap::decode(json), Err(SourceMapError::Decode { .. })));
    }

    #[test]
    fn should_refuse_columns_wider_than_u32() {
        match SourceMap::decode(r#"{"mappings":"+//////C"}"#) {
            Err(SourceMapError::Decode { segment, reason }) => {
                assert_eq!(segment, "+//////C");
                assert_eq!(reason, "dst_col out of range");
            }
            other => panic!("expected a decode error, got {:?}", other.map(|m| m.tokens().to_vec())),
        }

        let (segment, reason) = decode_error("+///////////H,+///////////H");
        assert_eq!(segment, "+///////////H");
        assert_eq!(reason, "dst_col out of range");
    }

    #[test]
    fn should_refuse_source_positions_wider_than_u32() {
        // src_line += 2^32
        let (segment, reason) = decode_error("AAggggggIA");
        assert_eq!(segment, "AAggggggIA");
        assert_eq!(reason, "src_line out of range");

        let (_, reason) = decode_error("AAAggggggI");
        assert_eq!(reason, "src_col out of range");
    }

    #[test]
    fn should_refuse_negative_running_values() {
        let (segment, reason) = decode_error("AAAA,DAAA");
        assert_eq!(segment, "DAAA");
        assert_eq!(reason, "negative dst_col");
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(layout in layout_strategy()) {
            let map = map_of(&layout);
            let decoded = SourceMap::decode(&map.stringify(false).unwrap()).unwrap();
            prop_assert_eq!(decoded.tokens(), map.tokens());
        }

        #[test]
        fn prop_tokens_stay_sorted(layout in layout_strategy(), seed in any::<u64>()) {
            let mut tokens = map_of(&layout).tokens().to_vec();
            // deterministic shuffle from the seed
            let mut state = seed | 1;
            for ix in (1..tokens.len()).rev() {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                tokens.swap(ix, (state % (ix as u64 + 1)) as usize);
            }
            let mut map = SourceMap::new();
            for token in tokens {
                map.add_token(token).unwrap();
            }
            let positions: Vec<(u32, u32)> = map.tokens().iter().map(Token::dst).collect();
            let expected: Vec<(u32, u32)> = layout.keys().copied().collect();
            prop_assert_eq!(positions, expected);
        }
    }

    #[test]
    fn should_reject_invalid_json() {
        assert!(matches!(SourceMap::decode("{"), Err(SourceMapError::Json(_))));
    }

    #[test]
    fn should_keep_tokens_sorted() {
        let mut map = SourceMap::new();
        map.add_token(Token::new(2, 0, "a.py", 2, 0)).unwrap();
        map.add_token(Token::new(0, 5, "a.py", 0, 0)).unwrap();
        map.add_token(Token::new(1, 0, "a.py", 1, 0)).unwrap();
        let positions: Vec<(u32, u32)> = map.tokens().iter().map(Token::dst).collect();
        assert_eq!(positions, vec![(0, 5), (1, 0), (2, 0)]);
    }

    #[test]
    fn should_reject_duplicate_positions_unless_ignoring_errors() {
        let mut map = SourceMap::new();
        map.add_token(Token::new(0, 0, "a.py", 0, 0)).unwrap();
        map.add_token(Token::new(1, 0, "a.py", 1, 0)).unwrap();
        let err = map.add_token(Token::new(0, 0, "a.py", 5, 5)).unwrap_err();
        assert!(matches!(err, SourceMapError::DuplicateToken { .. }));

        let mut lenient = SourceMap::new().ignore_errors(true);
        lenient.add_token(Token::new(0, 0, "a.py", 0, 0)).unwrap();
        lenient.add_token(Token::new(1, 0, "a.py", 1, 0)).unwrap();
        lenient.add_token(Token::new(0, 0, "a.py", 5, 5)).unwrap();
        assert_eq!(lenient.tokens().len(), 3);
    }

    #[test]
    fn should_embed_sources_content() {
        let mut map = sample();
        map.add_source_content("a.py", "x = 1\n");
        let raw = map.encode();
        assert_eq!(raw.sources_content, Some(vec![Some("x = 1\n".to_string()), None]));
    }

    #[test]
    fn should_stringify_as_an_inline_comment() {
        let inline = sample().stringify(true).unwrap();
        assert!(inline.starts_with("\n//# sourceMappingURL=data:text/json;base64,"));
        assert!(inline.ends_with('\n'));
        assert_eq!(discover(&inline).as_deref().map(|url| url.starts_with("data:text/json;base64,")), Some(true));
    }

    #[test]
    fn should_shift_and_merge_maps() {
        let shifted = shift_tokens(sample().tokens(), 10, 1, 2, 0);
        assert_eq!(shifted[0].dst(), (10, 1));
        assert_eq!((shifted[0].src_line, shifted[0].src_col), (2, 0));

        let mut bundle = SourceMap::new();
        bundle.add_token(Token::new(0, 0, "main.py", 0, 0)).unwrap();
        let mut other = sample();
        other.add_source_content("b.py", "pass\n");
        bundle.extend_shifted(&other, 3).unwrap();
        let lines: Vec<u32> = bundle.tokens().iter().map(|t| t.dst_line).collect();
        assert_eq!(lines, vec![0, 3, 3, 4]);
        assert_eq!(bundle.sources_content().get("b.py").map(String::as_str), Some("pass\n"));
    }

    #[test]
    fn should_find_and_strip_pragmas() {
        let js = "var a = 1;\n//# sourceMappingURL=a.js.map\n";
        assert_eq!(discover(js).as_deref(), Some("a.js.map"));
        assert!(!strip(js).contains("sourceMappingURL"));
        assert_eq!(discover("var a = 1;\n"), None);
    }
}
