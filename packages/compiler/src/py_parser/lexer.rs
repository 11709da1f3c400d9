/**
 * Source Lexer
 *
 * Splits Python source text into tokens, producing INDENT / DEDENT tokens
 * from leading whitespace and NEWLINE tokens at the end of each logical
 * line. Newlines inside brackets and after a backslash do not end a line.
 */

use crate::chars;
use crate::parse_util::{ParseError, ParseLocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Name,
    Number,
    Str,
    /// Formatted string; the text keeps its `{...}` fields unparsed
    FStr,
    Op,
    Newline,
    Indent,
    Dedent,
    EndMarker,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Identifier, operator, normalized number or decoded string value
    pub text: String,
    pub loc: ParseLocation,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, loc: ParseLocation) -> Self {
        Token {
            kind,
            text: text.into(),
            loc,
        }
    }

    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Op && self.text == op
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Name && self.text == keyword
    }
}

pub const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import",
    "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while",
    "with", "yield",
];

// Longest first so that prefixes never shadow a longer operator.
const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "**", "//", "==", "!=", "<=", ">=", "<<", ">>", "+=", "-=", "*=",
    "/=", "%=", "&=", "|=", "^=", "@=", "->", "+", "-", "*", "/", "%", "&", "|", "^", "~", "<",
    ">", "(", ")", "[", "]", "{", "}", ",", ":", ".", ";", "=", "@",
];

pub struct Lexer;

impl Lexer {
    pub fn new() -> Self {
        Lexer
    }

    pub fn tokenize(&self, text: &str) -> Result<Vec<Token>, ParseError> {
        Scanner::new(text).scan()
    }
}

impl Default for Lexer {
    fn default() -> Self {
        Lexer::new()
    }
}

struct Scanner {
    chars: Vec<(usize, char)>,
    length: usize,
    index: usize,
    line: usize,
    col: usize,
    depth: usize,
    indents: Vec<usize>,
    tokens: Vec<Token>,
}

impl Scanner {
    fn new(input: &str) -> Self {
        Scanner {
            chars: input.char_indices().collect(),
            length: input.len(),
            index: 0,
            line: 1,
            col: 0,
            depth: 0,
            indents: vec![0],
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> char {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> char {
        self.chars.get(self.index + n).map(|(_, c)| *c).unwrap_or(chars::EOF)
    }

    fn at_end(&self) -> bool {
        self.index >= self.chars.len()
    }

    fn location(&self) -> ParseLocation {
        let offset = self.chars.get(self.index).map(|(o, _)| *o).unwrap_or(self.length);
        ParseLocation::new(offset, self.line, self.col)
    }

    fn advance(&mut self) {
        if self.peek() == chars::NEWLINE {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        self.index += 1;
    }

    fn error(&self, msg: impl Into<String>) -> ParseError {
        ParseError::new(msg, self.location())
    }

    /// Consume `\n`, `\r\n` or a lone `\r`.
    fn consume_newline(&mut self) {
        if self.peek() == chars::RETURN {
            self.index += 1;
            if self.peek() == chars::NEWLINE {
                self.advance();
            } else {
                self.line += 1;
                self.col = 0;
            }
        } else {
            self.advance();
        }
    }

    fn skip_comment(&mut self) {
        while !self.at_end() && !chars::is_new_line(self.peek()) {
            self.advance();
        }
    }

    fn push(&mut self, kind: TokenKind, text: impl Into<String>, loc: ParseLocation) {
        self.tokens.push(Token::new(kind, text, loc));
    }

    fn scan(mut self) -> Result<Vec<Token>, ParseError> {
        let mut at_line_start = true;

        loop {
            if at_line_start && self.depth == 0 {
                let mut width = 0;
                loop {
                    match self.peek() {
                        chars::SPACE => width += 1,
                        chars::TAB => width = (width / 8 + 1) * 8,
                        chars::FF => width = 0,
                        _ => break,
                    }
                    self.advance();
                }
                if self.at_end() {
                    break;
                }
                match self.peek() {
                    chars::HASH => {
                        self.skip_comment();
                        continue;
                    }
                    ch if chars::is_new_line(ch) => {
                        self.consume_newline();
                        continue;
                    }
                    _ => {}
                }
                at_line_start = false;
                self.indent_to(width)?;
            }

            while chars::is_inline_whitespace(self.peek()) {
                self.advance();
            }
            if self.at_end() {
                break;
            }

            let ch = self.peek();
            let start = self.location();
            match ch {
                chars::HASH => self.skip_comment(),
                chars::BACKSLASH if chars::is_new_line(self.peek_at(1)) => {
                    self.advance();
                    self.consume_newline();
                }
                ch if chars::is_new_line(ch) => {
                    if self.depth == 0 {
                        self.push(TokenKind::Newline, "", start);
                        at_line_start = true;
                    }
                    self.consume_newline();
                }
                ch if chars::is_identifier_start(ch) => {
                    let name = self.scan_identifier();
                    if chars::is_quote(self.peek()) && is_string_prefix(&name) {
                        let value = self.scan_string(&name)?;
                        let kind = if name.to_ascii_lowercase().contains('f') {
                            TokenKind::FStr
                        } else {
                            TokenKind::Str
                        };
                        self.push(kind, value, start);
                    } else {
                        self.push(TokenKind::Name, name, start);
                    }
                }
                ch if chars::is_digit(ch) || (ch == chars::PERIOD && chars::is_digit(self.peek_at(1))) => {
                    let number = self.scan_number()?;
                    self.push(TokenKind::Number, number, start);
                }
                ch if chars::is_quote(ch) => {
                    let value = self.scan_string("")?;
                    self.push(TokenKind::Str, value, start);
                }
                _ => {
                    let op = self.scan_operator()?;
                    match op {
                        "(" | "[" | "{" => self.depth += 1,
                        ")" | "]" | "}" => self.depth = self.depth.saturating_sub(1),
                        _ => {}
                    }
                    self.push(TokenKind::Op, op, start);
                }
            }
        }

        let end = self.location();
        if matches!(self.tokens.last(), Some(t) if t.kind != TokenKind::Newline) {
            self.push(TokenKind::Newline, "", end);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, "", end);
        }
        self.push(TokenKind::EndMarker, "", end);
        Ok(self.tokens)
    }

    fn indent_to(&mut self, width: usize) -> Result<(), ParseError> {
        let loc = self.location();
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            self.push(TokenKind::Indent, "", loc);
        } else {
            while width < self.indents.last().copied().unwrap_or(0) {
                self.indents.pop();
                self.push(TokenKind::Dedent, "", loc);
            }
            if width != self.indents.last().copied().unwrap_or(0) {
                return Err(self.error("unindent does not match any outer indentation level"));
            }
        }
        Ok(())
    }

    fn scan_identifier(&mut self) -> String {
        let mut name = String::new();
        while chars::is_identifier_part(self.peek()) {
            name.push(self.peek());
            self.advance();
        }
        name
    }

    fn scan_number(&mut self) -> Result<String, ParseError> {
        if self.peek() == chars::ZERO && matches!(self.peek_at(1), 'x' | 'X' | 'o' | 'O' | 'b' | 'B') {
            let radix = match self.peek_at(1) {
                'x' | 'X' => 16,
                'o' | 'O' => 8,
                _ => 2,
            };
            self.advance();
            self.advance();
            let mut digits = String::new();
            while chars::is_ascii_hex_digit(self.peek()) || self.peek() == chars::UNDERSCORE {
                if self.peek() != chars::UNDERSCORE {
                    digits.push(self.peek());
                }
                self.advance();
            }
            let value = i64::from_str_radix(&digits, radix).map_err(|_| self.error("invalid number literal"))?;
            return Ok(value.to_string());
        }

        let mut text = String::new();
        let mut is_float = false;
        self.scan_digits(&mut text);
        if self.peek() == chars::PERIOD {
            is_float = true;
            text.push(chars::PERIOD);
            self.advance();
            self.scan_digits(&mut text);
        }
        if matches!(self.peek(), 'e' | 'E') {
            is_float = true;
            text.push('e');
            self.advance();
            if matches!(self.peek(), '+' | '-') {
                text.push(self.peek());
                self.advance();
            }
            if !chars::is_digit(self.peek()) {
                return Err(self.error("invalid number literal"));
            }
            self.scan_digits(&mut text);
        }
        if matches!(self.peek(), 'j' | 'J') {
            return Err(self.error("complex numbers are not supported"));
        }
        if chars::is_identifier_start(self.peek()) {
            return Err(self.error("invalid number literal"));
        }

        if is_float {
            Ok(text)
        } else {
            // drop leading zeros such as `00`
            let trimmed = text.trim_start_matches(chars::ZERO);
            Ok(if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() })
        }
    }

    fn scan_digits(&mut self, out: &mut String) {
        while chars::is_digit(self.peek()) || self.peek() == chars::UNDERSCORE {
            if self.peek() != chars::UNDERSCORE {
                out.push(self.peek());
            }
            self.advance();
        }
    }

    fn scan_string(&mut self, prefix: &str) -> Result<String, ParseError> {
        let lower = prefix.to_ascii_lowercase();
        let raw = lower.contains('r');
        let quote = self.peek();
        let triple = self.peek_at(1) == quote && self.peek_at(2) == quote;
        let start = self.location();
        for _ in 0..if triple { 3 } else { 1 } {
            self.advance();
        }

        let mut value = String::new();
        loop {
            if self.at_end() {
                return Err(ParseError::new("unterminated string literal", start));
            }
            let ch = self.peek();
            if ch == quote {
                if !triple {
                    self.advance();
                    break;
                }
                if self.peek_at(1) == quote && self.peek_at(2) == quote {
                    self.advance();
                    self.advance();
                    self.advance();
                    break;
                }
            }
            if chars::is_new_line(ch) {
                if !triple {
                    return Err(self.error("EOL while scanning string literal"));
                }
                if ch == chars::RETURN && self.peek_at(1) == chars::NEWLINE {
                    self.index += 1;
                }
                value.push(chars::NEWLINE);
                self.advance();
                continue;
            }
            if ch == chars::BACKSLASH {
                self.advance();
                if self.at_end() {
                    return Err(ParseError::new("unterminated string literal", start));
                }
                let escaped = self.peek();
                if raw {
                    value.push(chars::BACKSLASH);
                    value.push(escaped);
                    self.advance();
                    continue;
                }
                if chars::is_new_line(escaped) {
                    self.consume_newline();
                    continue;
                }
                self.advance();
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    'a' => value.push('\x07'),
                    'b' => value.push('\x08'),
                    'f' => value.push('\x0C'),
                    'v' => value.push('\x0B'),
                    'x' => value.push(self.scan_hex_escape(2)?),
                    'u' => value.push(self.scan_hex_escape(4)?),
                    'U' => value.push(self.scan_hex_escape(8)?),
                    '\\' | '\'' | '"' => value.push(escaped),
                    other => {
                        value.push(chars::BACKSLASH);
                        value.push(other);
                    }
                }
                continue;
            }
            value.push(ch);
            self.advance();
        }
        Ok(value)
    }

    fn scan_hex_escape(&mut self, len: usize) -> Result<char, ParseError> {
        let mut digits = String::new();
        for _ in 0..len {
            if !chars::is_ascii_hex_digit(self.peek()) {
                return Err(self.error("truncated escape sequence"));
            }
            digits.push(self.peek());
            self.advance();
        }
        u32::from_str_radix(&digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| self.error("invalid escape sequence"))
    }

    fn scan_operator(&mut self) -> Result<&'static str, ParseError> {
        for op in OPERATORS {
            let matches = op.chars().enumerate().all(|(i, c)| self.peek_at(i) == c);
            if matches {
                for _ in 0..op.len() {
                    self.advance();
                }
                return Ok(op);
            }
        }
        Err(self.error(format!("unexpected character '{}'", self.peek())))
    }
}

fn is_string_prefix(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "r" | "u" | "b" | "f" | "br" | "rb" | "fr" | "rf"
    )
}
