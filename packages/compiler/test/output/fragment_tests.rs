use pyjs_compiler::output::fragment::{Block, Fragment, Item, Line, Part};
use pyjs_compiler::parse_util::SourcePos;

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(origin: SourcePos, text: &str) -> Fragment {
        Fragment::Line(Line::new(Some(origin), Part::text(None, text), 0, true))
    }

    #[test]
    fn should_map_each_line_once_per_origin() {
        let block = Block::new(&[
            statement(SourcePos::new(1, 0), "a = 1"),
            statement(SourcePos::new(2, 4), "b"),
        ]);
        assert_eq!(block.read(), "a = 1;\nb;\n");
        let mapped: Vec<(u32, u32, u32, u32)> = block
            .mappings()
            .iter()
            .map(|m| (m.dst_line, m.dst_col, m.src.line, m.src.col))
            .collect();
        assert_eq!(mapped, vec![(0, 0, 1, 0), (1, 0, 2, 4)]);
    }

    #[test]
    fn should_relocate_tokens_by_the_offsets() {
        let block = Block::new(&[
            statement(SourcePos::new(1, 0), "a = 1"),
            statement(SourcePos::new(2, 4), "b"),
        ]);
        let map = block.sourcemap("a = 1\nb\n", "f.py", (10, 2), (5, 3)).unwrap();
        let tokens = map.tokens();
        assert_eq!(tokens.len(), 2);
        // the column offset only applies to the first line
        assert_eq!(tokens[0].dst(), (5, 3));
        assert_eq!((tokens[0].src_line, tokens[0].src_col), (10, 2));
        assert_eq!(tokens[1].dst(), (6, 0));
        assert_eq!((tokens[1].src_line, tokens[1].src_col), (11, 6));
        assert_eq!(map.sources_content().get("f.py").map(String::as_str), Some("a = 1\nb\n"));
    }

    #[test]
    fn should_map_nested_parts_at_their_column() {
        let value = Part::text(Some(SourcePos::new(1, 4)), "y");
        let assign = Part::new(
            Some(SourcePos::new(1, 0)),
            vec![Item::Text("x = ".to_string()), Item::Part(value)],
        );
        let block = Block::new(&[Fragment::Line(Line::new(None, assign, 0, true))]);
        assert_eq!(block.read(), "x = y;\n");
        let columns: Vec<(u32, u32)> = block.mappings().iter().map(|m| (m.dst_col, m.src.col)).collect();
        assert_eq!(columns, vec![(0, 0), (4, 4)]);
    }

    #[test]
    fn should_carry_symbol_names() {
        let part = Part::text(Some(SourcePos::new(3, 2)), "foo").with_name("foo");
        let block = Block::new(&[Fragment::Line(Line::new(None, part, 0, false))]);
        let map = block.sourcemap("", "f.py", (0, 0), (0, 0)).unwrap();
        assert_eq!(map.tokens()[0].name.as_deref(), Some("foo"));
        assert_eq!(map.encode().names, vec!["foo"]);
    }

    #[test]
    fn should_not_map_text_without_origin() {
        let block = Block::new(&[
            Fragment::Part(Part::text(None, "// header")),
            Fragment::Line(Line::new(None, Part::text(None, "x"), 1, true)),
        ]);
        assert_eq!(block.read(), "// header\n    x;\n");
        assert!(block.mappings().is_empty());
    }
}
