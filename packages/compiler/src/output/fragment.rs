//! Output Fragments
//!
//! Target nodes serialize into `Fragment`s: a `Part` is inline text made of
//! literal runs and nested parts, a `Line` is a part with an indent level
//! and an optional `;` terminator. `Block` renders a fragment sequence in a
//! single pass that produces both the text and the source mappings, so the
//! map always describes exactly the text that was written.
//!
//! Nesting rules:
//! - lines in a sequence start a new physical line, indented by their
//!   level plus the level of the enclosing line;
//! - the first line nested inside a part continues the current physical
//!   line (e.g. the header of a function expression), later ones break.

use indexmap::IndexMap;
use tracing::debug;

use crate::error::SourceMapError;
use crate::output::source_map::{SourceMap, Token};
use crate::parse_util::SourcePos;

pub const INDENT_WITH: &str = "    ";

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Text(String),
    Part(Part),
    Line(Line),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Part {
    /// Source position of the node that produced this part
    pub origin: Option<SourcePos>,
    /// Symbol name attached to the mappings of this part
    pub name: Option<String>,
    pub items: Vec<Item>,
}

impl Part {
    pub fn new(origin: Option<SourcePos>, items: Vec<Item>) -> Self {
        Part {
            origin,
            name: None,
            items,
        }
    }

    pub fn text(origin: Option<SourcePos>, text: impl Into<String>) -> Self {
        Part::new(origin, vec![Item::Text(text.into())])
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Plain text of the part, ignoring line structure.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            match item {
                Item::Text(text) => out.push_str(text),
                Item::Part(part) => out.push_str(&part.to_text()),
                Item::Line(line) => out.push_str(&line.item.to_text()),
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Line {
    pub origin: Option<SourcePos>,
    pub name: Option<String>,
    pub indent: u32,
    pub delim: bool,
    pub item: Part,
}

impl Line {
    pub fn new(origin: Option<SourcePos>, item: Part, indent: u32, delim: bool) -> Self {
        Line {
            origin,
            name: None,
            indent,
            delim,
            item,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Part(Part),
    Line(Line),
}

impl Fragment {
    pub fn into_item(self) -> Item {
        match self {
            Fragment::Part(part) => Item::Part(part),
            Fragment::Line(line) => Item::Line(line),
        }
    }
}

/// One recorded correspondence between an output position (0-based line
/// and column, in characters) and a source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub dst_line: u32,
    pub dst_col: u32,
    pub src: SourcePos,
    pub name: Option<String>,
}

/// Push-style renderer tracking the output cursor.
#[derive(Default)]
struct Writer {
    out: String,
    line: u32,
    col: u32,
    started: bool,
    pending_indent: Option<u32>,
    mappings: Vec<Mapping>,
}

impl Writer {
    fn break_line(&mut self, indent: u32) {
        if self.started {
            self.out.push('\n');
            self.line += 1;
            self.col = 0;
        }
        self.started = true;
        self.pending_indent = Some(indent);
    }

    fn write(&mut self, text: &str, origin: Option<SourcePos>, name: Option<&str>) {
        if text.is_empty() {
            return;
        }
        self.started = true;
        if let Some(indent) = self.pending_indent.take() {
            for _ in 0..indent {
                self.out.push_str(INDENT_WITH);
            }
            self.col += indent * INDENT_WITH.len() as u32;
        }
        if let Some(src) = origin {
            self.map(src, name);
        }
        for ch in text.chars() {
            if ch == '\n' {
                self.line += 1;
                self.col = 0;
            } else {
                self.col += 1;
            }
        }
        self.out.push_str(text);
    }

    fn map(&mut self, src: SourcePos, name: Option<&str>) {
        if let Some(last) = self.mappings.last() {
            if last.dst_line == self.line && last.dst_col == self.col {
                debug!(line = self.line, col = self.col, "skipping mapping at an already mapped position");
                return;
            }
            // same line, same origin: the previous mapping already covers it
            if last.dst_line == self.line && last.src == src && last.name.as_deref() == name {
                return;
            }
        }
        debug!(
            dst_line = self.line,
            dst_col = self.col,
            src_line = src.line,
            src_col = src.col,
            "mapping"
        );
        self.mappings.push(Mapping {
            dst_line: self.line,
            dst_col: self.col,
            src,
            name: name.map(str::to_string),
        });
    }

    fn fragment(&mut self, fragment: &Fragment, base: u32) {
        match fragment {
            Fragment::Line(line) => self.line(line, base, None, false),
            Fragment::Part(part) => {
                self.break_line(base);
                self.part(part, base, None, None);
            }
        }
    }

    fn line(&mut self, line: &Line, base: u32, inherited: Option<SourcePos>, inline: bool) {
        let indent = base + line.indent;
        if !inline {
            self.break_line(indent);
        }
        let origin = line.origin.or(inherited);
        self.part(&line.item, indent, origin, line.name.as_deref());
        if line.delim {
            self.write(";", origin, None);
        }
    }

    fn part(&mut self, part: &Part, base: u32, inherited: Option<SourcePos>, inherited_name: Option<&str>) {
        let origin = part.origin.or(inherited);
        let name = part.name.as_deref().or(inherited_name);
        let mut seen_line = false;
        for item in &part.items {
            match item {
                Item::Text(text) => self.write(text, origin, name),
                Item::Part(child) => self.part(child, base, origin, None),
                Item::Line(line) => {
                    self.line(line, base, origin, !seen_line);
                    seen_line = true;
                }
            }
        }
    }

    fn finish(mut self) -> (String, Vec<Mapping>) {
        if self.started {
            self.out.push('\n');
        }
        (self.out, self.mappings)
    }
}

/// The rendered output of a whole compilation unit.
#[derive(Debug, Clone, Default)]
pub struct Block {
    text: String,
    mappings: Vec<Mapping>,
}

impl Block {
    pub fn new(fragments: &[Fragment]) -> Self {
        let mut writer = Writer::default();
        for fragment in fragments {
            writer.fragment(fragment, 0);
        }
        let (text, mappings) = writer.finish();
        Block { text, mappings }
    }

    /// The generated text; every line is newline terminated.
    pub fn read(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// Build a source map for this block.
    ///
    /// `src_offset` relocates source positions (lines and columns are added
    /// to every token), `dst_offset` gives the position the text will be
    /// placed at; its column only affects the first output line.
    pub fn sourcemap(
        &self,
        source: &str,
        src_filename: &str,
        src_offset: (u32, u32),
        dst_offset: (u32, u32),
    ) -> Result<SourceMap, SourceMapError> {
        let (sline, scol) = src_offset;
        let (dline, dcol) = dst_offset;

        let mut sources_content = IndexMap::new();
        sources_content.insert(src_filename.to_string(), source.to_string());
        let mut map = SourceMap::with_sources_content(sources_content);

        for m in &self.mappings {
            let dst_col = if m.dst_line == 0 { m.dst_col + dcol } else { m.dst_col };
            let mut token = Token::new(
                m.dst_line + dline,
                dst_col,
                src_filename,
                m.src.line.saturating_sub(1) + sline,
                m.src.col + scol,
            );
            if let Some(name) = &m.name {
                token = token.with_name(name.clone());
            }
            map.add_token(token)?;
        }
        Ok(map)
    }
}
