//! Source Map Module
//!
//! An ordered token collection that encodes to and decodes from the
//! version 3 source map JSON format, plus helpers to find and strip the
//! `sourceMappingURL` pragma and to build identity maps for text that is
//! passed through untouched.

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SourceMapError;
use crate::output::vlq::{decode_vlqs, encode_vlq, to_base64_string};

// https://docs.google.com/document/d/1U1RGAehQwRypUTovF1KRlpiOFze0b-_2gc6fAH0KY0k/edit
const VERSION: u32 = 3;
const JS_B64_PREFIX: &str = "# sourceMappingURL=data:text/json;base64,";
const XSSI_PREFIX: &str = ")]}'";

static SOURCE_MAP_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/[*/][#@]\s*sourceMappingURL=([^\s*]+)\s*(?:\*/)?").unwrap());

static IDENTITY_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?P<LINECOMMENT>//)|(?P<COMMENTSTART>/\*)|(?P<COMMENTEND>\*/)|(?P<DELIM>[{}\[\]();])").unwrap());

/// One generated position and, optionally, the original position it maps to.
///
/// Lines and columns are 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Token {
    pub dst_line: u32,
    pub dst_col: u32,
    pub src: Option<String>,
    pub src_line: u32,
    pub src_col: u32,
    pub name: Option<String>,
}

impl Token {
    pub fn new(dst_line: u32, dst_col: u32, src: impl Into<String>, src_line: u32, src_col: u32) -> Self {
        Token {
            dst_line,
            dst_col,
            src: Some(src.into()),
            src_line,
            src_col,
            name: None,
        }
    }

    /// A generated position without an original counterpart.
    pub fn unmapped(dst_line: u32, dst_col: u32) -> Self {
        Token {
            dst_line,
            dst_col,
            ..Token::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn dst(&self) -> (u32, u32) {
        (self.dst_line, self.dst_col)
    }
}

/// The JSON shape of a version 3 source map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSourceMap {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(rename = "sourceRoot", default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub names: Vec<String>,
    pub mappings: String,
    #[serde(rename = "sourcesContent", default, skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
}

fn default_version() -> u32 {
    VERSION
}

#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    tokens: Vec<Token>,
    sources_content: IndexMap<String, String>,
    raw: Option<RawSourceMap>,
    ignore_errors: bool,
}

impl SourceMap {
    pub fn new() -> Self {
        SourceMap::default()
    }

    /// A map seeded with the full text of its sources.
    pub fn with_sources_content(sources_content: IndexMap<String, String>) -> Self {
        SourceMap {
            sources_content,
            ..SourceMap::default()
        }
    }

    /// Tolerate tokens that share a generated position.
    pub fn ignore_errors(mut self, ignore: bool) -> Self {
        self.ignore_errors = ignore;
        self
    }

    pub fn from_tokens(
        tokens: impl IntoIterator<Item = Token>,
        sources_content: IndexMap<String, String>,
    ) -> Result<Self, SourceMapError> {
        let mut map = SourceMap::with_sources_content(sources_content);
        for token in tokens {
            map.add_token(token)?;
        }
        Ok(map)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn sources_content(&self) -> &IndexMap<String, String> {
        &self.sources_content
    }

    pub fn add_source_content(&mut self, src: impl Into<String>, content: impl Into<String>) {
        self.sources_content.insert(src.into(), content.into());
    }

    /// The JSON this map was decoded from, if any.
    pub fn raw(&self) -> Option<&RawSourceMap> {
        self.raw.as_ref()
    }

    /// Insert keeping tokens sorted by generated position.
    pub fn add_token(&mut self, token: Token) -> Result<(), SourceMapError> {
        match self.tokens.last() {
            None => self.tokens.push(token),
            Some(last) if token.dst() > last.dst() => self.tokens.push(token),
            Some(_) => {
                let index = self.tokens.partition_point(|t| t.dst() <= token.dst());
                if !self.ignore_errors && index > 0 && self.tokens[index - 1].dst() == token.dst() {
                    return Err(SourceMapError::DuplicateToken {
                        existing: Box::new(self.tokens[index - 1].clone()),
                        added: Box::new(token),
                    });
                }
                self.tokens.insert(index, token);
            }
        }
        Ok(())
    }

    /// Add every token of `other` moved down by `dst_line` lines, merging its
    /// sources content.
    pub fn extend_shifted(&mut self, other: &SourceMap, dst_line: u32) -> Result<(), SourceMapError> {
        for token in shift_tokens(&other.tokens, dst_line, 0, 0, 0) {
            self.add_token(token)?;
        }
        for (src, content) in &other.sources_content {
            self.sources_content
                .entry(src.clone())
                .or_insert_with(|| content.clone());
        }
        Ok(())
    }

    pub fn encode(&self) -> RawSourceMap {
        let mut sources: IndexSet<&str> = IndexSet::new();
        let mut names: IndexSet<&str> = IndexSet::new();
        let mut lines: Vec<Vec<String>> = Vec::new();

        let mut prev_dst_col: i64 = 0;
        let mut prev_src_id: i64 = 0;
        let mut prev_src_line: i64 = 0;
        let mut prev_src_col: i64 = 0;
        let mut prev_name_id: i64 = 0;

        for token in &self.tokens {
            while lines.len() <= token.dst_line as usize {
                lines.push(Vec::new());
                prev_dst_col = 0;
            }

            let mut segment = encode_vlq(token.dst_col as i64 - prev_dst_col);
            prev_dst_col = token.dst_col as i64;

            if let Some(src) = token.src.as_deref() {
                let (src_id, _) = sources.insert_full(src);
                let src_id = src_id as i64;
                segment += &encode_vlq(src_id - prev_src_id);
                segment += &encode_vlq(token.src_line as i64 - prev_src_line);
                segment += &encode_vlq(token.src_col as i64 - prev_src_col);

                if let Some(name) = token.name.as_deref() {
                    let (name_id, _) = names.insert_full(name);
                    let name_id = name_id as i64;
                    segment += &encode_vlq(name_id - prev_name_id);
                    prev_name_id = name_id;
                }

                prev_src_id = src_id;
                prev_src_line = token.src_line as i64;
                prev_src_col = token.src_col as i64;
            }

            if let Some(line) = lines.last_mut() {
                line.push(segment);
            }
        }

        let mappings = lines
            .iter()
            .map(|segments| segments.join(","))
            .collect::<Vec<_>>()
            .join(";");
        let sources_content = sources
            .iter()
            .map(|src| self.sources_content.get(*src).cloned())
            .collect();

        RawSourceMap {
            version: VERSION,
            file: None,
            source_root: None,
            sources: sources.into_iter().map(str::to_string).collect(),
            names: names.into_iter().map(str::to_string).collect(),
            mappings,
            sources_content: Some(sources_content),
        }
    }

    /// Decode a JSON source map. A leading `)]}'` line is skipped.
    pub fn decode(source: &str) -> Result<Self, SourceMapError> {
        let source = match source.strip_prefix(XSSI_PREFIX) {
            Some(rest) => rest.split_once('\n').map(|(_, json)| json).unwrap_or(""),
            None => source,
        };
        let raw: RawSourceMap = serde_json::from_str(source)?;
        Self::from_raw(raw)
    }

    pub fn decode_value(value: serde_json::Value) -> Result<Self, SourceMapError> {
        let raw: RawSourceMap = serde_json::from_value(value)?;
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawSourceMap) -> Result<Self, SourceMapError> {
        let sources: Vec<String> = match raw.source_root.as_deref() {
            Some(root) if !root.is_empty() => raw
                .sources
                .iter()
                .map(|s| format!("{}/{}", root.trim_end_matches('/'), s))
                .collect(),
            _ => raw.sources.clone(),
        };

        let mut tokens = Vec::new();
        let mut src_id: i64 = 0;
        let mut src_line: i64 = 0;
        let mut src_col: i64 = 0;
        let mut name_id: i64 = 0;

        for (dst_line, line) in raw.mappings.split(';').enumerate() {
            let mut dst_col: i64 = 0;
            for segment in line.split(',') {
                if segment.is_empty() {
                    continue;
                }
                let fields = decode_vlqs(segment)?;
                if !matches!(fields.len(), 1 | 4 | 5) {
                    return Err(SourceMapError::decode(
                        segment,
                        format!("invalid segment, parsed as {:?}", fields),
                    ));
                }

                dst_col = advance(segment, dst_col, fields[0], "dst_col")?;
                let dst_line = u32::try_from(dst_line)
                    .map_err(|_| SourceMapError::decode(segment, "dst_line out of range"))?;
                let mut token = Token::unmapped(dst_line, narrow(segment, dst_col, "dst_col")?);
                if fields.len() > 1 {
                    src_id = advance(segment, src_id, fields[1], "source index")?;
                    let src = usize::try_from(src_id)
                        .ok()
                        .and_then(|ix| sources.get(ix))
                        .ok_or_else(|| {
                            SourceMapError::decode(segment, format!("references source {} which does not exist", src_id))
                        })?;
                    src_line = advance(segment, src_line, fields[2], "src_line")?;
                    src_col = advance(segment, src_col, fields[3], "src_col")?;
                    token.src = Some(src.clone());
                    token.src_line = narrow(segment, src_line, "src_line")?;
                    token.src_col = narrow(segment, src_col, "src_col")?;
                }
                if fields.len() > 4 {
                    name_id = advance(segment, name_id, fields[4], "name index")?;
                    let name = usize::try_from(name_id)
                        .ok()
                        .and_then(|ix| raw.names.get(ix))
                        .ok_or_else(|| {
                            SourceMapError::decode(segment, format!("references name {} which does not exist", name_id))
                        })?;
                    token.name = Some(name.clone());
                }
                tokens.push(token);
            }
        }

        let mut sources_content = IndexMap::new();
        if let Some(contents) = &raw.sources_content {
            for (src, content) in sources.iter().zip(contents) {
                if let Some(content) = content {
                    sources_content.insert(src.clone(), content.clone());
                }
            }
        }

        let mut map = SourceMap::with_sources_content(sources_content).ignore_errors(true);
        for token in tokens {
            map.add_token(token)?;
        }
        map.raw = Some(raw);
        Ok(map)
    }

    /// JSON text of the encoded map, or a `sourceMappingURL` comment
    /// embedding it as base64 when `inline_comment` is set.
    pub fn stringify(&self, inline_comment: bool) -> Result<String, SourceMapError> {
        let data = serde_json::to_string(&self.encode())?;
        if inline_comment {
            Ok(format!("\n//{}{}\n", JS_B64_PREFIX, to_base64_string(&data)))
        } else {
            Ok(data)
        }
    }

    /// A map sending every statement start and delimiter of `content` to
    /// itself.
    pub fn identity(content: &str, src: &str) -> Self {
        let mut sources_content = IndexMap::new();
        sources_content.insert(src.to_string(), content.to_string());
        let mut map = SourceMap::with_sources_content(sources_content).ignore_errors(true);
        for token in identity_tokenize(content, src) {
            // duplicates are tolerated on this map
            let _ = map.add_token(token);
        }
        map
    }
}

/// Move tokens by the given offsets.
pub fn shift_tokens(tokens: &[Token], dst_line: u32, dst_col: u32, src_line: u32, src_col: u32) -> Vec<Token> {
    tokens
        .iter()
        .map(|t| Token {
            dst_line: t.dst_line + dst_line,
            dst_col: t.dst_col + dst_col,
            src_line: t.src_line + src_line,
            src_col: t.src_col + src_col,
            ..t.clone()
        })
        .collect()
}

fn identity_tokenize(content: &str, src: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut in_comment = false;

    for (line_num, line) in content.lines().enumerate() {
        let line_num = line_num as u32;
        let mut start_column = 0;
        if !line.trim().is_empty() {
            start_column = (line.len() - line.trim_start().len()) as u32;
            if start_column > 0 {
                tokens.push(Token::new(line_num, 0, src, line_num, 0));
            }
            tokens.push(Token::new(line_num, start_column, src, line_num, start_column));
        }
        for caps in IDENTITY_TOKEN_RE.captures_iter(line) {
            if in_comment {
                if caps.name("COMMENTEND").is_some() {
                    in_comment = false;
                }
            } else if caps.name("COMMENTSTART").is_some() {
                in_comment = true;
            } else if caps.name("LINECOMMENT").is_some() {
                break;
            } else if let Some(delim) = caps.name("DELIM") {
                let column = delim.start() as u32;
                if column > start_column {
                    tokens.push(Token::new(line_num, column, src, line_num, column));
                }
            }
        }
    }

    tokens
}

/// The `sourceMappingURL` of `source`, looked up in its first and last
/// five lines.
pub fn discover(source: &str) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    let candidates: Vec<&str> = if lines.len() > 10 {
        lines[..5].iter().chain(&lines[lines.len() - 5..]).copied().collect()
    } else {
        lines
    };

    candidates.into_iter().find_map(|line| {
        SOURCE_MAP_URL_RE
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// Remove every `sourceMappingURL` pragma from `content`.
pub fn strip(content: &str) -> String {
    SOURCE_MAP_URL_RE.replace_all(content, "").into_owned()
}

/// Add a relative field to its running value.
fn advance(segment: &str, current: i64, delta: i64, field: &str) -> Result<i64, SourceMapError> {
    current
        .checked_add(delta)
        .ok_or_else(|| SourceMapError::decode(segment, format!("{} out of range", field)))
}

/// A running value as a token coordinate: negative or wider than `u32` is
/// a decode error.
fn narrow(segment: &str, value: i64, field: &str) -> Result<u32, SourceMapError> {
    if value < 0 {
        return Err(SourceMapError::decode(segment, format!("negative {}", field)));
    }
    u32::try_from(value).map_err(|_| SourceMapError::decode(segment, format!("{} out of range", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_open_a_new_mappings_line_per_dst_line() {
        let mut map = SourceMap::new();
        map.add_token(Token::new(0, 0, "a.py", 0, 0)).unwrap();
        map.add_token(Token::new(2, 4, "a.py", 1, 0)).unwrap();
        assert_eq!(map.encode().mappings, "AAAA;;IACA");
    }

    #[test]
    fn should_identity_map_statement_starts_and_delimiters() {
        let map = SourceMap::identity("foo(1);\n  bar();\n", "x.js");
        let positions: Vec<(u32, u32)> = map.tokens().iter().map(Token::dst).collect();
        assert_eq!(positions, vec![(0, 0), (0, 3), (0, 5), (0, 6), (1, 0), (1, 2), (1, 5), (1, 6), (1, 7)]);
        assert!(map.tokens().iter().all(|t| t.dst_line == t.src_line && t.dst_col == t.src_col));
    }
}
