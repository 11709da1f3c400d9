/**
 * Source Parser
 *
 * Recursive descent over the token stream produced by the lexer. Builds
 * the arena tree with the field layout the transformation rules read:
 * statement lists under `body` / `orelse`, operators as their own nodes
 * and literal values kept as text.
 */

use super::ast::{Field, NodeId, NodeKind, SourceTree};
use super::lexer::{Lexer, Token, TokenKind, KEYWORDS};
use super::Parse;
use crate::parse_util::{ParseError, ParseLocation, SourcePos};

type PResult<T> = Result<T, ParseError>;

/// The stock parser for the source language.
#[derive(Debug, Clone, Copy, Default)]
pub struct PyParser;

impl PyParser {
    pub fn new() -> Self {
        PyParser
    }
}

impl Parse for PyParser {
    fn parse(&self, text: &str) -> Result<SourceTree, ParseError> {
        let tokens = Lexer::new().tokenize(text)?;
        Parser::new(tokens).parse_module()
    }
}

const BINARY_LEVELS: &[&[(&str, NodeKind)]] = &[
    &[("|", NodeKind::BitOr)],
    &[("^", NodeKind::BitXor)],
    &[("&", NodeKind::BitAnd)],
    &[("<<", NodeKind::LShift), (">>", NodeKind::RShift)],
    &[("+", NodeKind::Add), ("-", NodeKind::Sub)],
    &[
        ("*", NodeKind::Mult),
        ("/", NodeKind::Div),
        ("//", NodeKind::FloorDiv),
        ("%", NodeKind::Mod),
    ],
];

const AUG_ASSIGN: &[(&str, NodeKind)] = &[
    ("+=", NodeKind::Add),
    ("-=", NodeKind::Sub),
    ("*=", NodeKind::Mult),
    ("/=", NodeKind::Div),
    ("//=", NodeKind::FloorDiv),
    ("%=", NodeKind::Mod),
    ("**=", NodeKind::Pow),
    ("<<=", NodeKind::LShift),
    (">>=", NodeKind::RShift),
    ("&=", NodeKind::BitAnd),
    ("|=", NodeKind::BitOr),
    ("^=", NodeKind::BitXor),
];

fn opt(id: Option<NodeId>) -> Field {
    id.map(Field::Node).unwrap_or(Field::Absent)
}

fn opt_str(value: Option<String>) -> Field {
    value.map(Field::Str).unwrap_or(Field::Absent)
}

/// Piece of an f-string body.
#[derive(Debug, Clone, PartialEq)]
enum FPiece {
    Text(String),
    Field {
        expr: String,
        conversion: Option<char>,
        spec: Option<String>,
    },
}

/// Split an f-string body into literal text and `{expr!c:spec}` fields.
/// `{{` and `}}` stand for single braces.
fn split_fstring(text: &str) -> Result<Vec<FPiece>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                literal.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                literal.push('}');
                i += 2;
            }
            '}' => return Err("f-string: single '}' is not allowed".to_string()),
            '{' => {
                if !literal.is_empty() {
                    pieces.push(FPiece::Text(std::mem::take(&mut literal)));
                }
                let (field, next) = scan_field(&chars, i + 1)?;
                pieces.push(field);
                i = next;
            }
            ch => {
                literal.push(ch);
                i += 1;
            }
        }
    }
    if !literal.is_empty() {
        pieces.push(FPiece::Text(literal));
    }
    Ok(pieces)
}

/// Read one replacement field starting right after its `{`; returns the
/// field and the index past its `}`.
fn scan_field(chars: &[char], start: usize) -> Result<(FPiece, usize), String> {
    let unclosed = || "f-string: expecting '}'".to_string();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut i = start;
    let expr_end = loop {
        let ch = *chars.get(i).ok_or_else(unclosed)?;
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']') => depth = depth.saturating_sub(1),
            (None, '}') if depth > 0 => depth -= 1,
            (None, '}') => break i,
            (None, ':') if depth == 0 => break i,
            (None, '!') if depth == 0 && chars.get(i + 1) != Some(&'=') => break i,
            _ => {}
        }
        i += 1;
    };
    let expr: String = chars[start..expr_end].iter().collect();
    if expr.trim().is_empty() {
        return Err("f-string: empty expression not allowed".to_string());
    }
    i = expr_end;
    let mut conversion = None;
    if chars[i] == '!' {
        match chars.get(i + 1) {
            Some(&c) if matches!(c, 's' | 'r' | 'a') => conversion = Some(c),
            _ => return Err("f-string: invalid conversion character".to_string()),
        }
        i += 2;
    }
    let mut spec = None;
    if chars.get(i) == Some(&':') {
        let spec_start = i + 1;
        let mut nested = 0usize;
        i = spec_start;
        loop {
            match *chars.get(i).ok_or_else(unclosed)? {
                '{' => nested += 1,
                '}' if nested > 0 => nested -= 1,
                '}' => break,
                _ => {}
            }
            i += 1;
        }
        spec = Some(chars[spec_start..i].iter().collect());
    }
    if chars.get(i) != Some(&'}') {
        return Err(unclosed());
    }
    Ok((FPiece::Field { expr, conversion, spec }, i + 1))
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    tree: SourceTree,
}

impl Parser {
    fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::EndMarker) {
            let loc = tokens.last().map(|t| t.loc).unwrap_or(ParseLocation::new(0, 1, 0));
            tokens.push(Token {
                kind: TokenKind::EndMarker,
                text: String::new(),
                loc,
            });
        }
        Parser {
            tokens,
            index: 0,
            tree: SourceTree::new(),
        }
    }

    // ---------------------------------------------------------------
    // token helpers

    fn current(&self) -> &Token {
        self.peek(0)
    }

    fn peek(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.index + n).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn at_kind(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn at_op(&self, op: &str) -> bool {
        self.current().is_op(op)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.current().is_keyword(keyword)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.at_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> PResult<Token> {
        if self.at_op(op) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected '{}', got {}", op, self.describe())))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> PResult<Token> {
        if self.at_keyword(keyword) {
            Ok(self.advance())
        } else {
            Err(self.error(format!("expected '{}', got {}", keyword, self.describe())))
        }
    }

    fn expect_name(&mut self) -> PResult<Token> {
        let token = self.current();
        if token.kind != TokenKind::Name {
            return Err(self.error(format!("expected a name, got {}", self.describe())));
        }
        if KEYWORDS.contains(&token.text.as_str()) {
            return Err(self.error(format!("'{}' is a reserved word", token.text)));
        }
        Ok(self.advance())
    }

    fn expect_newline(&mut self) -> PResult<()> {
        match self.current().kind {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::EndMarker => Ok(()),
            _ => Err(self.unexpected()),
        }
    }

    fn describe(&self) -> String {
        let token = self.current();
        match token.kind {
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Indent => "indent".to_string(),
            TokenKind::Dedent => "dedent".to_string(),
            TokenKind::EndMarker => "end of input".to_string(),
            TokenKind::Str | TokenKind::FStr => "string".to_string(),
            TokenKind::Number => format!("number {}", token.text),
            TokenKind::Name | TokenKind::Op => format!("'{}'", token.text),
        }
    }

    fn error(&self, msg: impl Into<String>) -> ParseError {
        ParseError::new(msg, self.current().loc)
    }

    fn unexpected(&self) -> ParseError {
        self.error(format!("unexpected {}", self.describe()))
    }

    /// Token ends an expression list: nothing more to read on this line.
    fn at_list_end(&self) -> bool {
        let token = self.current();
        match token.kind {
            TokenKind::Newline | TokenKind::EndMarker => true,
            TokenKind::Op => {
                matches!(token.text.as_str(), ")" | "]" | "}" | "=" | ";" | ":")
                    || AUG_ASSIGN.iter().any(|(op, _)| *op == token.text)
            }
            TokenKind::Name => token.text == "in",
            _ => false,
        }
    }

    // ---------------------------------------------------------------
    // tree helpers

    fn add<const N: usize>(
        &mut self,
        kind: NodeKind,
        pos: Option<SourcePos>,
        fields: [(&'static str, Field); N],
    ) -> NodeId {
        self.tree.add(kind, pos, fields)
    }

    fn pos_of(&self, id: NodeId) -> Option<SourcePos> {
        self.tree.pos(id)
    }

    fn op_node(&mut self, kind: NodeKind, token: &Token) -> NodeId {
        self.add(kind, Some(token.loc.pos()), [])
    }

    // ---------------------------------------------------------------
    // statements

    fn parse_module(mut self) -> PResult<SourceTree> {
        let mut body = Vec::new();
        loop {
            match self.current().kind {
                TokenKind::EndMarker => break,
                TokenKind::Newline => {
                    self.advance();
                }
                _ => body.extend(self.parse_statement()?),
            }
        }
        let module = self.add(NodeKind::Module, None, [("body", Field::List(body))]);
        self.tree.set_root(module);
        Ok(self.tree)
    }

    fn parse_statement(&mut self) -> PResult<Vec<NodeId>> {
        if self.at_kind(TokenKind::Indent) {
            return Err(self.unexpected());
        }
        if self.at_op("@") {
            return Ok(vec![self.parse_decorated()?]);
        }
        if self.at_kind(TokenKind::Name) {
            let compound = match self.current().text.as_str() {
                "if" => Some(self.parse_if()?),
                "while" => Some(self.parse_while()?),
                "for" => Some(self.parse_for()?),
                "try" => Some(self.parse_try()?),
                "with" => Some(self.parse_with()?),
                "def" => Some(self.parse_funcdef(Vec::new(), None)?),
                "class" => Some(self.parse_classdef(Vec::new(), None)?),
                "async" => Some(self.parse_async(Vec::new(), None)?),
                _ => None,
            };
            if let Some(stmt) = compound {
                return Ok(vec![stmt]);
            }
        }
        self.parse_simple_statement()
    }

    fn parse_simple_statement(&mut self) -> PResult<Vec<NodeId>> {
        let mut stmts = vec![self.parse_small_statement()?];
        while self.eat_op(";") {
            if matches!(self.current().kind, TokenKind::Newline | TokenKind::EndMarker) {
                break;
            }
            stmts.push(self.parse_small_statement()?);
        }
        self.expect_newline()?;
        Ok(stmts)
    }

    /// `':' NEWLINE INDENT stmt+ DEDENT` or a simple statement on the same line.
    fn parse_suite(&mut self) -> PResult<Vec<NodeId>> {
        self.expect_op(":")?;
        if !self.at_kind(TokenKind::Newline) {
            return self.parse_simple_statement();
        }
        self.advance();
        if !self.at_kind(TokenKind::Indent) {
            return Err(self.error("expected an indented block"));
        }
        self.advance();
        let mut body = Vec::new();
        loop {
            match self.current().kind {
                TokenKind::Dedent => {
                    self.advance();
                    break;
                }
                TokenKind::EndMarker => break,
                TokenKind::Newline => {
                    self.advance();
                }
                _ => body.extend(self.parse_statement()?),
            }
        }
        Ok(body)
    }

    fn parse_small_statement(&mut self) -> PResult<NodeId> {
        let token = self.current().clone();
        let pos = Some(token.loc.pos());
        if token.kind != TokenKind::Name {
            return self.parse_expr_statement();
        }
        match token.text.as_str() {
            "pass" => {
                self.advance();
                Ok(self.add(NodeKind::Pass, pos, []))
            }
            "break" => {
                self.advance();
                Ok(self.add(NodeKind::Break, pos, []))
            }
            "continue" => {
                self.advance();
                Ok(self.add(NodeKind::Continue, pos, []))
            }
            "return" => {
                self.advance();
                let value = if self.at_list_end() {
                    None
                } else {
                    Some(self.parse_testlist()?)
                };
                Ok(self.add(NodeKind::Return, pos, [("value", opt(value))]))
            }
            "del" => {
                self.advance();
                let mut targets = vec![self.parse_expr()?];
                while self.eat_op(",") {
                    if self.at_list_end() {
                        break;
                    }
                    targets.push(self.parse_expr()?);
                }
                Ok(self.add(NodeKind::Delete, pos, [("targets", Field::List(targets))]))
            }
            "raise" => {
                self.advance();
                let exc = if self.at_list_end() {
                    None
                } else {
                    Some(self.parse_test()?)
                };
                let cause = if exc.is_some() && self.eat_keyword("from") {
                    Some(self.parse_test()?)
                } else {
                    None
                };
                Ok(self.add(NodeKind::Raise, pos, [("exc", opt(exc)), ("cause", opt(cause))]))
            }
            "global" => {
                self.advance();
                let mut names = Vec::new();
                loop {
                    let name = self.expect_name()?;
                    names.push(self.add(
                        NodeKind::Name,
                        Some(name.loc.pos()),
                        [("id", Field::Str(name.text))],
                    ));
                    if !self.eat_op(",") {
                        break;
                    }
                }
                Ok(self.add(NodeKind::Global, pos, [("names", Field::List(names))]))
            }
            "nonlocal" => Err(self.error("nonlocal statements are not supported")),
            "assert" => {
                self.advance();
                let test = self.parse_test()?;
                let msg = if self.eat_op(",") {
                    Some(self.parse_test()?)
                } else {
                    None
                };
                Ok(self.add(NodeKind::Assert, pos, [("test", Field::Node(test)), ("msg", opt(msg))]))
            }
            "import" => self.parse_import(),
            "from" => self.parse_from_import(),
            _ => self.parse_expr_statement(),
        }
    }

    fn parse_expr_statement(&mut self) -> PResult<NodeId> {
        let first = self.parse_testlist_or_yield()?;
        let pos = self.pos_of(first);

        let aug = AUG_ASSIGN
            .iter()
            .find(|(op, _)| self.at_op(op))
            .map(|(_, kind)| *kind);
        if let Some(kind) = aug {
            let token = self.advance();
            let op = self.op_node(kind, &token);
            let value = self.parse_testlist_or_yield()?;
            return Ok(self.add(
                NodeKind::AugAssign,
                pos,
                [("target", Field::Node(first)), ("op", Field::Node(op)), ("value", Field::Node(value))],
            ));
        }

        if self.at_op("=") {
            let mut targets = vec![first];
            let value = loop {
                self.advance();
                let next = self.parse_testlist_or_yield()?;
                if self.at_op("=") {
                    targets.push(next);
                } else {
                    break next;
                }
            };
            return Ok(self.add(
                NodeKind::Assign,
                pos,
                [("targets", Field::List(targets)), ("value", Field::Node(value))],
            ));
        }

        if self.at_op(":") {
            // annotated assignment; the annotation is dropped
            self.advance();
            self.parse_test()?;
            if !self.eat_op("=") {
                return Err(self.error("annotations without a value are not supported"));
            }
            let value = self.parse_testlist_or_yield()?;
            return Ok(self.add(
                NodeKind::Assign,
                pos,
                [("targets", Field::List(vec![first])), ("value", Field::Node(value))],
            ));
        }

        Ok(self.add(NodeKind::Expr, pos, [("value", Field::Node(first))]))
    }

    fn parse_dotted_name(&mut self) -> PResult<String> {
        let mut name = self.expect_name()?.text;
        while self.eat_op(".") {
            name.push('.');
            name.push_str(&self.expect_name()?.text);
        }
        Ok(name)
    }

    fn parse_alias(&mut self, dotted: bool) -> PResult<NodeId> {
        let pos = Some(self.current().loc.pos());
        let name = if dotted {
            self.parse_dotted_name()?
        } else {
            self.expect_name()?.text
        };
        let asname = if self.eat_keyword("as") {
            Some(self.expect_name()?.text)
        } else {
            None
        };
        Ok(self.add(
            NodeKind::Alias,
            pos,
            [("name", Field::Str(name)), ("asname", opt_str(asname))],
        ))
    }

    fn parse_import(&mut self) -> PResult<NodeId> {
        let pos = Some(self.expect_keyword("import")?.loc.pos());
        let mut names = vec![self.parse_alias(true)?];
        while self.eat_op(",") {
            names.push(self.parse_alias(true)?);
        }
        Ok(self.add(NodeKind::Import, pos, [("names", Field::List(names))]))
    }

    fn parse_from_import(&mut self) -> PResult<NodeId> {
        let pos = Some(self.expect_keyword("from")?.loc.pos());
        let mut level = 0;
        while self.eat_op(".") {
            level += 1;
        }
        let module = if self.at_keyword("import") {
            None
        } else {
            Some(self.parse_dotted_name()?)
        };
        if module.is_none() && level == 0 {
            return Err(self.unexpected());
        }
        self.expect_keyword("import")?;

        let mut names = Vec::new();
        if self.at_op("*") {
            let star = self.advance();
            names.push(self.add(
                NodeKind::Alias,
                Some(star.loc.pos()),
                [("name", Field::Str("*".to_string())), ("asname", Field::Absent)],
            ));
        } else {
            let parens = self.eat_op("(");
            loop {
                names.push(self.parse_alias(false)?);
                if !self.eat_op(",") {
                    break;
                }
                if parens && self.at_op(")") {
                    break;
                }
            }
            if parens {
                self.expect_op(")")?;
            }
        }

        Ok(self.add(
            NodeKind::ImportFrom,
            pos,
            [
                ("module", opt_str(module)),
                ("names", Field::List(names)),
                ("level", Field::Int(level)),
            ],
        ))
    }

    fn parse_if(&mut self) -> PResult<NodeId> {
        // `if` or `elif`
        let pos = Some(self.advance().loc.pos());
        let test = self.parse_test()?;
        let body = self.parse_suite()?;
        let orelse = if self.at_keyword("elif") {
            vec![self.parse_if()?]
        } else if self.eat_keyword("else") {
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(self.add(
            NodeKind::If,
            pos,
            [
                ("test", Field::Node(test)),
                ("body", Field::List(body)),
                ("orelse", Field::List(orelse)),
            ],
        ))
    }

    fn parse_else(&mut self) -> PResult<Vec<NodeId>> {
        if self.eat_keyword("else") {
            self.parse_suite()
        } else {
            Ok(Vec::new())
        }
    }

    fn parse_while(&mut self) -> PResult<NodeId> {
        let pos = Some(self.expect_keyword("while")?.loc.pos());
        let test = self.parse_test()?;
        let body = self.parse_suite()?;
        let orelse = self.parse_else()?;
        Ok(self.add(
            NodeKind::While,
            pos,
            [
                ("test", Field::Node(test)),
                ("body", Field::List(body)),
                ("orelse", Field::List(orelse)),
            ],
        ))
    }

    fn parse_for(&mut self) -> PResult<NodeId> {
        let pos = Some(self.expect_keyword("for")?.loc.pos());
        let target = self.parse_exprlist()?;
        self.expect_keyword("in")?;
        let iter = self.parse_testlist()?;
        let body = self.parse_suite()?;
        let orelse = self.parse_else()?;
        Ok(self.add(
            NodeKind::For,
            pos,
            [
                ("target", Field::Node(target)),
                ("iter", Field::Node(iter)),
                ("body", Field::List(body)),
                ("orelse", Field::List(orelse)),
            ],
        ))
    }

    fn parse_try(&mut self) -> PResult<NodeId> {
        let pos = Some(self.expect_keyword("try")?.loc.pos());
        let body = self.parse_suite()?;

        let mut handlers = Vec::new();
        while self.at_keyword("except") {
            let hpos = Some(self.advance().loc.pos());
            let exc_type = if self.at_op(":") {
                None
            } else {
                Some(self.parse_test()?)
            };
            let name = if exc_type.is_some() && self.eat_keyword("as") {
                Some(self.expect_name()?.text)
            } else {
                None
            };
            let hbody = self.parse_suite()?;
            handlers.push(self.add(
                NodeKind::ExceptHandler,
                hpos,
                [
                    ("type", opt(exc_type)),
                    ("name", opt_str(name)),
                    ("body", Field::List(hbody)),
                ],
            ));
        }

        let orelse = if handlers.is_empty() {
            Vec::new()
        } else {
            self.parse_else()?
        };
        let finalbody = if self.eat_keyword("finally") {
            self.parse_suite()?
        } else {
            Vec::new()
        };
        if handlers.is_empty() && finalbody.is_empty() {
            return Err(self.error("expected 'except' or 'finally' block"));
        }

        Ok(self.add(
            NodeKind::Try,
            pos,
            [
                ("body", Field::List(body)),
                ("handlers", Field::List(handlers)),
                ("orelse", Field::List(orelse)),
                ("finalbody", Field::List(finalbody)),
            ],
        ))
    }

    fn parse_with(&mut self) -> PResult<NodeId> {
        let pos = Some(self.expect_keyword("with")?.loc.pos());
        let mut items = Vec::new();
        loop {
            let context_expr = self.parse_test()?;
            let vars = if self.eat_keyword("as") {
                Some(self.parse_expr()?)
            } else {
                None
            };
            let item_pos = self.pos_of(context_expr);
            items.push(self.add(
                NodeKind::WithItem,
                item_pos,
                [("context_expr", Field::Node(context_expr)), ("optional_vars", opt(vars))],
            ));
            if !self.eat_op(",") {
                break;
            }
        }
        let body = self.parse_suite()?;
        Ok(self.add(
            NodeKind::With,
            pos,
            [("items", Field::List(items)), ("body", Field::List(body))],
        ))
    }

    fn parse_decorated(&mut self) -> PResult<NodeId> {
        let pos = Some(self.current().loc.pos());
        let mut decorators = Vec::new();
        while self.eat_op("@") {
            decorators.push(self.parse_test()?);
            self.expect_newline()?;
        }
        if self.at_keyword("def") {
            self.parse_funcdef(decorators, pos)
        } else if self.at_keyword("async") {
            self.parse_async(decorators, pos)
        } else if self.at_keyword("class") {
            self.parse_classdef(decorators, pos)
        } else {
            Err(self.error(format!("expected 'def' or 'class' after decorators, got {}", self.describe())))
        }
    }

    /// `async def`; the other `async` statements are refused.
    fn parse_async(&mut self, decorators: Vec<NodeId>, pos: Option<SourcePos>) -> PResult<NodeId> {
        let token = self.expect_keyword("async")?;
        if !self.at_keyword("def") {
            return Err(self.error(format!("'async {}' statements are not supported", self.current().text)));
        }
        let func = self.parse_funcdef(decorators, pos.or(Some(token.loc.pos())))?;
        self.tree.set_kind(func, NodeKind::AsyncFunctionDef);
        Ok(func)
    }

    fn parse_funcdef(&mut self, decorators: Vec<NodeId>, pos: Option<SourcePos>) -> PResult<NodeId> {
        let def = self.expect_keyword("def")?;
        let pos = pos.or(Some(def.loc.pos()));
        let name = self.expect_name()?.text;
        self.expect_op("(")?;
        let args = self.parse_arguments(")", true)?;
        self.expect_op(")")?;
        if self.eat_op("->") {
            self.parse_test()?;
        }
        let body = self.parse_suite()?;
        Ok(self.add(
            NodeKind::FunctionDef,
            pos,
            [
                ("name", Field::Str(name)),
                ("args", Field::Node(args)),
                ("body", Field::List(body)),
                ("decorator_list", Field::List(decorators)),
            ],
        ))
    }

    fn parse_classdef(&mut self, decorators: Vec<NodeId>, pos: Option<SourcePos>) -> PResult<NodeId> {
        let class = self.expect_keyword("class")?;
        let pos = pos.or(Some(class.loc.pos()));
        let name = self.expect_name()?.text;
        let (bases, keywords) = if self.eat_op("(") {
            let parsed = self.parse_call_args()?;
            self.expect_op(")")?;
            parsed
        } else {
            (Vec::new(), Vec::new())
        };
        let body = self.parse_suite()?;
        Ok(self.add(
            NodeKind::ClassDef,
            pos,
            [
                ("name", Field::Str(name)),
                ("bases", Field::List(bases)),
                ("keywords", Field::List(keywords)),
                ("body", Field::List(body)),
                ("decorator_list", Field::List(decorators)),
            ],
        ))
    }

    /// Parameter list up to (not including) `closing`.
    fn parse_arguments(&mut self, closing: &str, annotations: bool) -> PResult<NodeId> {
        let mut args = Vec::new();
        let mut kwonlyargs = Vec::new();
        let mut vararg = None;
        let mut kwarg = None;
        let mut keyword_only = false;
        let mut seen_default = false;

        while !self.at_op(closing) {
            if self.eat_op("/") {
                // positional-only marker
            } else if self.eat_op("**") {
                kwarg = Some(self.parse_arg(annotations, false)?);
            } else if self.eat_op("*") {
                keyword_only = true;
                if !self.at_op(",") && !self.at_op(closing) {
                    vararg = Some(self.parse_arg(annotations, false)?);
                }
            } else {
                let arg = self.parse_arg(annotations, true)?;
                let has_default = self.tree.child(arg, "default").is_some();
                if keyword_only {
                    kwonlyargs.push(arg);
                } else {
                    if seen_default && !has_default {
                        return Err(self.error("non-default argument follows default argument"));
                    }
                    seen_default |= has_default;
                    args.push(arg);
                }
            }
            if !self.eat_op(",") {
                break;
            }
        }

        Ok(self.add(
            NodeKind::Arguments,
            None,
            [
                ("args", Field::List(args)),
                ("vararg", opt(vararg)),
                ("kwonlyargs", Field::List(kwonlyargs)),
                ("kwarg", opt(kwarg)),
            ],
        ))
    }

    fn parse_arg(&mut self, annotations: bool, defaults: bool) -> PResult<NodeId> {
        let name = self.expect_name()?;
        if annotations && self.eat_op(":") {
            self.parse_test()?;
        }
        let default = if defaults && self.eat_op("=") {
            Some(self.parse_test()?)
        } else {
            None
        };
        Ok(self.add(
            NodeKind::Arg,
            Some(name.loc.pos()),
            [("arg", Field::Str(name.text)), ("default", opt(default))],
        ))
    }

    // ---------------------------------------------------------------
    // expressions

    fn parse_testlist_or_yield(&mut self) -> PResult<NodeId> {
        if self.at_keyword("yield") {
            self.parse_yield()
        } else {
            self.parse_testlist()
        }
    }

    fn parse_testlist(&mut self) -> PResult<NodeId> {
        self.parse_list_of(Self::parse_test)
    }

    fn parse_exprlist(&mut self) -> PResult<NodeId> {
        self.parse_list_of(Self::parse_expr)
    }

    /// One item, or a bare tuple when items are separated by commas.
    fn parse_list_of(&mut self, item: fn(&mut Self) -> PResult<NodeId>) -> PResult<NodeId> {
        let first = item(self)?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.at_list_end() {
                break;
            }
            elts.push(item(self)?);
        }
        let pos = self.pos_of(first);
        Ok(self.add(NodeKind::Tuple, pos, [("elts", Field::List(elts))]))
    }

    fn parse_yield(&mut self) -> PResult<NodeId> {
        let pos = Some(self.expect_keyword("yield")?.loc.pos());
        if self.eat_keyword("from") {
            let value = self.parse_test()?;
            return Ok(self.add(NodeKind::YieldFrom, pos, [("value", Field::Node(value))]));
        }
        let value = if self.at_list_end() {
            None
        } else {
            Some(self.parse_testlist()?)
        };
        Ok(self.add(NodeKind::Yield, pos, [("value", opt(value))]))
    }

    fn parse_test(&mut self) -> PResult<NodeId> {
        if self.at_keyword("lambda") {
            return self.parse_lambda();
        }
        let body = self.parse_or_test()?;
        if !self.eat_keyword("if") {
            return Ok(body);
        }
        let test = self.parse_or_test()?;
        self.expect_keyword("else")?;
        let orelse = self.parse_test()?;
        let pos = self.pos_of(body);
        Ok(self.add(
            NodeKind::IfExp,
            pos,
            [
                ("test", Field::Node(test)),
                ("body", Field::Node(body)),
                ("orelse", Field::Node(orelse)),
            ],
        ))
    }

    fn parse_lambda(&mut self) -> PResult<NodeId> {
        let pos = Some(self.expect_keyword("lambda")?.loc.pos());
        let args = self.parse_arguments(":", false)?;
        self.expect_op(":")?;
        let body = self.parse_test()?;
        Ok(self.add(
            NodeKind::Lambda,
            pos,
            [("args", Field::Node(args)), ("body", Field::Node(body))],
        ))
    }

    fn parse_bool_op(
        &mut self,
        keyword: &str,
        kind: NodeKind,
        operand: fn(&mut Self) -> PResult<NodeId>,
    ) -> PResult<NodeId> {
        let first = operand(self)?;
        if !self.at_keyword(keyword) {
            return Ok(first);
        }
        let token = self.current().clone();
        let op = self.op_node(kind, &token);
        let mut values = vec![first];
        while self.eat_keyword(keyword) {
            values.push(operand(self)?);
        }
        let pos = self.pos_of(first);
        Ok(self.add(
            NodeKind::BoolOp,
            pos,
            [("op", Field::Node(op)), ("values", Field::List(values))],
        ))
    }

    fn parse_or_test(&mut self) -> PResult<NodeId> {
        self.parse_bool_op("or", NodeKind::Or, Self::parse_and_test)
    }

    fn parse_and_test(&mut self) -> PResult<NodeId> {
        self.parse_bool_op("and", NodeKind::And, Self::parse_not_test)
    }

    fn parse_not_test(&mut self) -> PResult<NodeId> {
        if !self.at_keyword("not") {
            return self.parse_comparison();
        }
        let token = self.advance();
        let op = self.op_node(NodeKind::Not, &token);
        let operand = self.parse_not_test()?;
        Ok(self.add(
            NodeKind::UnaryOp,
            Some(token.loc.pos()),
            [("op", Field::Node(op)), ("operand", Field::Node(operand))],
        ))
    }

    fn comparison_op(&self) -> Option<(NodeKind, usize)> {
        let token = self.current();
        match token.kind {
            TokenKind::Op => match token.text.as_str() {
                "<" => Some((NodeKind::Lt, 1)),
                ">" => Some((NodeKind::Gt, 1)),
                "==" => Some((NodeKind::Eq, 1)),
                ">=" => Some((NodeKind::GtE, 1)),
                "<=" => Some((NodeKind::LtE, 1)),
                "!=" => Some((NodeKind::NotEq, 1)),
                _ => None,
            },
            TokenKind::Name => match token.text.as_str() {
                "in" => Some((NodeKind::In, 1)),
                "not" if self.peek(1).is_keyword("in") => Some((NodeKind::NotIn, 2)),
                "is" if self.peek(1).is_keyword("not") => Some((NodeKind::IsNot, 2)),
                "is" => Some((NodeKind::Is, 1)),
                _ => None,
            },
            _ => None,
        }
    }

    fn parse_comparison(&mut self) -> PResult<NodeId> {
        let left = self.parse_expr()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        while let Some((kind, width)) = self.comparison_op() {
            let token = self.current().clone();
            for _ in 0..width {
                self.advance();
            }
            ops.push(self.op_node(kind, &token));
            comparators.push(self.parse_expr()?);
        }
        if ops.is_empty() {
            return Ok(left);
        }
        let pos = self.pos_of(left);
        Ok(self.add(
            NodeKind::Compare,
            pos,
            [
                ("left", Field::Node(left)),
                ("ops", Field::List(ops)),
                ("comparators", Field::List(comparators)),
            ],
        ))
    }

    fn parse_expr(&mut self) -> PResult<NodeId> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, level: usize) -> PResult<NodeId> {
        if level == BINARY_LEVELS.len() {
            return self.parse_factor();
        }
        let mut left = self.parse_binary(level + 1)?;
        loop {
            let kind = BINARY_LEVELS[level]
                .iter()
                .find(|(op, _)| self.at_op(op))
                .map(|(_, kind)| *kind);
            let Some(kind) = kind else { break };
            let token = self.advance();
            let op = self.op_node(kind, &token);
            let right = self.parse_binary(level + 1)?;
            let pos = self.pos_of(left);
            left = self.add(
                NodeKind::BinOp,
                pos,
                [("left", Field::Node(left)), ("op", Field::Node(op)), ("right", Field::Node(right))],
            );
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> PResult<NodeId> {
        let kind = if self.at_op("+") {
            NodeKind::UAdd
        } else if self.at_op("-") {
            NodeKind::USub
        } else if self.at_op("~") {
            NodeKind::Invert
        } else {
            return self.parse_power();
        };
        let token = self.advance();
        let op = self.op_node(kind, &token);
        let operand = self.parse_factor()?;
        Ok(self.add(
            NodeKind::UnaryOp,
            Some(token.loc.pos()),
            [("op", Field::Node(op)), ("operand", Field::Node(operand))],
        ))
    }

    fn parse_power(&mut self) -> PResult<NodeId> {
        let base = if self.at_keyword("await") {
            let pos = Some(self.advance().loc.pos());
            let value = self.parse_atom_expr()?;
            self.add(NodeKind::Await, pos, [("value", Field::Node(value))])
        } else {
            self.parse_atom_expr()?
        };
        if !self.at_op("**") {
            return Ok(base);
        }
        let token = self.advance();
        let op = self.op_node(NodeKind::Pow, &token);
        let exponent = self.parse_factor()?;
        let pos = self.pos_of(base);
        Ok(self.add(
            NodeKind::BinOp,
            pos,
            [("left", Field::Node(base)), ("op", Field::Node(op)), ("right", Field::Node(exponent))],
        ))
    }

    fn parse_atom_expr(&mut self) -> PResult<NodeId> {
        let mut expr = self.parse_atom()?;
        loop {
            let pos = self.pos_of(expr);
            if self.eat_op("(") {
                let (args, keywords) = self.parse_call_args()?;
                self.expect_op(")")?;
                expr = self.add(
                    NodeKind::Call,
                    pos,
                    [
                        ("func", Field::Node(expr)),
                        ("args", Field::List(args)),
                        ("keywords", Field::List(keywords)),
                    ],
                );
            } else if self.eat_op("[") {
                let slice = self.parse_subscript_list()?;
                self.expect_op("]")?;
                expr = self.add(
                    NodeKind::Subscript,
                    pos,
                    [("value", Field::Node(expr)), ("slice", Field::Node(slice))],
                );
            } else if self.eat_op(".") {
                let attr = self.expect_name()?.text;
                expr = self.add(
                    NodeKind::Attribute,
                    pos,
                    [("value", Field::Node(expr)), ("attr", Field::Str(attr))],
                );
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Positional arguments and keywords up to the closing parenthesis.
    fn parse_call_args(&mut self) -> PResult<(Vec<NodeId>, Vec<NodeId>)> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        while !self.at_op(")") {
            if self.at_op("**") {
                let token = self.advance();
                let value = self.parse_test()?;
                keywords.push(self.add(
                    NodeKind::Keyword,
                    Some(token.loc.pos()),
                    [("arg", Field::Absent), ("value", Field::Node(value))],
                ));
            } else if self.at_op("*") {
                return Err(self.error("starred arguments are not supported"));
            } else if self.at_kind(TokenKind::Name) && self.peek(1).is_op("=") {
                let name = self.expect_name()?;
                self.advance();
                let value = self.parse_test()?;
                keywords.push(self.add(
                    NodeKind::Keyword,
                    Some(name.loc.pos()),
                    [("arg", Field::Str(name.text)), ("value", Field::Node(value))],
                ));
            } else {
                let arg = self.parse_test()?;
                if self.at_keyword("for") {
                    return Err(self.error("generator expressions are not supported"));
                }
                if !keywords.is_empty() {
                    return Err(self.error("positional argument follows keyword argument"));
                }
                args.push(arg);
            }
            if !self.eat_op(",") {
                break;
            }
        }
        Ok((args, keywords))
    }

    fn parse_subscript_list(&mut self) -> PResult<NodeId> {
        let first = self.parse_subscript()?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.at_op("]") {
                break;
            }
            elts.push(self.parse_subscript()?);
        }
        let pos = self.pos_of(first);
        Ok(self.add(NodeKind::Tuple, pos, [("elts", Field::List(elts))]))
    }

    fn parse_subscript(&mut self) -> PResult<NodeId> {
        let pos = Some(self.current().loc.pos());
        let lower = if self.at_op(":") {
            None
        } else {
            Some(self.parse_test()?)
        };
        let lower = match lower {
            Some(index) if !self.at_op(":") => return Ok(index),
            other => other,
        };
        self.expect_op(":")?;
        let bound_end = |p: &Self| p.at_op(":") || p.at_op("]") || p.at_op(",");
        let upper = if bound_end(self) {
            None
        } else {
            Some(self.parse_test()?)
        };
        let step = if self.eat_op(":") && !bound_end(self) {
            Some(self.parse_test()?)
        } else {
            None
        };
        Ok(self.add(
            NodeKind::Slice,
            pos,
            [("lower", opt(lower)), ("upper", opt(upper)), ("step", opt(step))],
        ))
    }

    fn parse_atom(&mut self) -> PResult<NodeId> {
        let token = self.current().clone();
        let pos = Some(token.loc.pos());
        match token.kind {
            TokenKind::Number => {
                self.advance();
                Ok(self.add(NodeKind::Num, pos, [("n", Field::Str(token.text))]))
            }
            TokenKind::Str | TokenKind::FStr => self.parse_strings(pos),
            TokenKind::Name => match token.text.as_str() {
                "True" | "False" | "None" => {
                    self.advance();
                    Ok(self.add(NodeKind::NameConstant, pos, [("value", Field::Str(token.text))]))
                }
                _ => {
                    let name = self.expect_name()?;
                    Ok(self.add(NodeKind::Name, pos, [("id", Field::Str(name.text))]))
                }
            },
            TokenKind::Op => match token.text.as_str() {
                "(" => self.parse_paren(pos),
                "[" => self.parse_list(pos),
                "{" => self.parse_dict(pos),
                _ => Err(self.unexpected()),
            },
            _ => Err(self.unexpected()),
        }
    }

    fn parse_paren(&mut self, pos: Option<SourcePos>) -> PResult<NodeId> {
        self.expect_op("(")?;
        if self.eat_op(")") {
            return Ok(self.add(NodeKind::Tuple, pos, [("elts", Field::List(Vec::new()))]));
        }
        if self.at_keyword("yield") {
            let value = self.parse_yield()?;
            self.expect_op(")")?;
            return Ok(value);
        }
        let first = self.parse_test()?;
        if self.at_keyword("for") {
            return Err(self.error("generator expressions are not supported"));
        }
        if self.eat_op(")") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if self.at_op(")") {
                break;
            }
            elts.push(self.parse_test()?);
        }
        self.expect_op(")")?;
        Ok(self.add(NodeKind::Tuple, pos, [("elts", Field::List(elts))]))
    }

    /// Adjacent string literals. Plain ones fold into a single `Str`; as
    /// soon as one is formatted the result is a `JoinedStr` of `Str` and
    /// `FormattedValue` nodes.
    fn parse_strings(&mut self, pos: Option<SourcePos>) -> PResult<NodeId> {
        let mut values = Vec::new();
        let mut text = String::new();
        let mut formatted = false;
        while self.at_kind(TokenKind::Str) || self.at_kind(TokenKind::FStr) {
            let token = self.advance();
            if token.kind == TokenKind::Str {
                text.push_str(&token.text);
                continue;
            }
            formatted = true;
            let pieces = split_fstring(&token.text).map_err(|msg| ParseError::new(msg, token.loc))?;
            for piece in pieces {
                match piece {
                    FPiece::Text(chunk) => text.push_str(&chunk),
                    FPiece::Field { expr, conversion, spec } => {
                        if !text.is_empty() {
                            let chunk = std::mem::take(&mut text);
                            values.push(self.add(NodeKind::Str, pos, [("s", Field::Str(chunk))]));
                        }
                        let value = self.parse_embedded(&expr, token.loc)?;
                        let spec = spec.map(|spec| self.add(NodeKind::Str, pos, [("s", Field::Str(spec))]));
                        let field_pos = Some(token.loc.pos());
                        values.push(self.add(
                            NodeKind::FormattedValue,
                            field_pos,
                            [
                                ("value", Field::Node(value)),
                                ("conversion", Field::Int(conversion.map(|c| c as i64).unwrap_or(-1))),
                                ("format_spec", opt(spec)),
                            ],
                        ));
                    }
                }
            }
        }
        if !formatted {
            return Ok(self.add(NodeKind::Str, pos, [("s", Field::Str(text))]));
        }
        if !text.is_empty() {
            values.push(self.add(NodeKind::Str, pos, [("s", Field::Str(text))]));
        }
        Ok(self.add(NodeKind::JoinedStr, pos, [("values", Field::List(values))]))
    }

    /// Parse the expression of an f-string field into this tree. Its nodes
    /// are placed at the string literal.
    fn parse_embedded(&mut self, source: &str, loc: ParseLocation) -> PResult<NodeId> {
        let relocate = |err: ParseError| ParseError::new(format!("f-string: {}", err.msg), loc);
        let tokens = Lexer::new().tokenize(&format!("({})", source.trim())).map_err(relocate)?;
        let outer_tokens = std::mem::replace(&mut self.tokens, tokens);
        let outer_index = std::mem::replace(&mut self.index, 0);
        let first = NodeId(self.tree.len() as u32);
        let parsed = self.parse_testlist().and_then(|value| match self.current().kind {
            TokenKind::Newline | TokenKind::EndMarker => Ok(value),
            _ => Err(self.unexpected()),
        });
        self.tokens = outer_tokens;
        self.index = outer_index;
        let value = parsed.map_err(relocate)?;
        self.tree.set_pos_from(first, Some(loc.pos()));
        Ok(value)
    }

    /// `for target in iter if cond ...`, one `Comprehension` per `for`.
    fn parse_comprehensions(&mut self) -> PResult<Vec<NodeId>> {
        let mut generators = Vec::new();
        while self.at_keyword("for") {
            let pos = Some(self.advance().loc.pos());
            let target = self.parse_exprlist()?;
            self.expect_keyword("in")?;
            let iter = self.parse_or_test()?;
            let mut ifs = Vec::new();
            while self.eat_keyword("if") {
                ifs.push(self.parse_or_test()?);
            }
            generators.push(self.add(
                NodeKind::Comprehension,
                pos,
                [
                    ("target", Field::Node(target)),
                    ("iter", Field::Node(iter)),
                    ("ifs", Field::List(ifs)),
                ],
            ));
        }
        Ok(generators)
    }

    fn parse_list(&mut self, pos: Option<SourcePos>) -> PResult<NodeId> {
        self.expect_op("[")?;
        let mut elts = Vec::new();
        while !self.at_op("]") {
            let elt = self.parse_test()?;
            if self.at_keyword("for") && elts.is_empty() {
                let generators = self.parse_comprehensions()?;
                self.expect_op("]")?;
                return Ok(self.add(
                    NodeKind::ListComp,
                    pos,
                    [("elt", Field::Node(elt)), ("generators", Field::List(generators))],
                ));
            }
            elts.push(elt);
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op("]")?;
        Ok(self.add(NodeKind::List, pos, [("elts", Field::List(elts))]))
    }

    fn parse_dict(&mut self, pos: Option<SourcePos>) -> PResult<NodeId> {
        self.expect_op("{")?;
        let mut keys = Vec::new();
        let mut values = Vec::new();
        while !self.at_op("}") {
            if self.at_op("**") {
                return Err(self.error("dictionary unpacking is not supported"));
            }
            let key = self.parse_test()?;
            if !self.at_op(":") {
                return Err(self.error("set literals are not supported"));
            }
            self.advance();
            let value = self.parse_test()?;
            if self.at_keyword("for") {
                return Err(self.error("dict comprehensions are not supported"));
            }
            keys.push(key);
            values.push(value);
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op("}")?;
        Ok(self.add(
            NodeKind::Dict,
            pos,
            [("keys", Field::List(keys)), ("values", Field::List(values))],
        ))
    }
}
