//! Target Tree
//!
//! A single `JsNode` type describes every emitted JavaScript construct. A
//! node keeps the arguments a rule built it with (`args`, possibly still
//! pointing at source nodes) and, once the engine has finalized it, the
//! `transformed_args` where every source node has been replaced by its
//! rewritten counterpart. Serialization only reads the transformed
//! arguments.
//!
//! `serialize` returns the node's fragments, built with three primitives:
//! `part` (inline concatenation), `line` (a standalone output line with an
//! indent bump and an optional terminator) and `lines` (`line` mapped over
//! a body).

use crate::output::fragment::{Fragment, Item, Line, Part};
use crate::parse_util::SourcePos;
use crate::py_parser::{NodeId, NodeKind};

pub const JS_KEYWORDS: &[&str] = &[
    "break", "case", "catch", "continue", "default", "delete", "do", "else", "finally", "for",
    "function", "if", "in", "instanceof", "new", "return", "switch", "this", "throw", "try",
    "typeof", "var", "void", "while", "with", "abstract", "boolean", "byte", "char", "class",
    "const", "double", "enum", "export", "extends", "final", "float", "goto", "implements",
    "import", "int", "interface", "long", "native", "package", "private", "protected", "public",
    "short", "static", "super", "synchronized", "throws", "transient", "volatile",
];

/// True when `name` cannot be used as an identifier. ES6 allows `delete`
/// as a property name.
pub fn is_reserved(name: &str, es6: bool) -> bool {
    if es6 && name == "delete" {
        return false;
    }
    JS_KEYWORDS.contains(&name)
}

/// Operators, emitted as their bare token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsOp {
    In,
    And,
    Or,
    Not,
    Instanceof,
    Typeof,
    Add,
    Sub,
    Mult,
    Div,
    Mod,
    RShift,
    LShift,
    BitXor,
    BitAnd,
    BitOr,
    Invert,
    USub,
    StrongEq,
    StrongNotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

impl JsOp {
    pub fn as_str(self) -> &'static str {
        match self {
            JsOp::In => "in",
            JsOp::And => "&&",
            JsOp::Or => "||",
            JsOp::Not => "!",
            JsOp::Instanceof => "instanceof",
            JsOp::Typeof => "typeof",
            JsOp::Add => "+",
            JsOp::Sub => "-",
            JsOp::Mult => "*",
            JsOp::Div => "/",
            JsOp::Mod => "%",
            JsOp::RShift => ">>",
            JsOp::LShift => "<<",
            JsOp::BitXor => "^",
            JsOp::BitAnd => "&",
            JsOp::BitOr => "|",
            JsOp::Invert => "~",
            JsOp::USub => "-",
            JsOp::StrongEq => "===",
            JsOp::StrongNotEq => "!==",
            JsOp::Lt => "<",
            JsOp::LtE => "<=",
            JsOp::Gt => ">",
            JsOp::GtE => ">=",
        }
    }

    /// Operators that can only appear on the left side of their operand.
    pub fn is_prefix(self) -> bool {
        matches!(self, JsOp::Not | JsOp::Typeof | JsOp::Invert | JsOp::USub)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsKind {
    /// A statement list; squashed and reordered on output
    Statements,

    // blocks
    If,
    While,
    For,
    Foreach,
    ForOf,
    Try,

    // functions and classes
    Function,
    GenFunction,
    AsyncFunction,
    ArrowFunction,
    Class,
    Constructor,
    Method { is_static: bool },
    GenMethod { is_static: bool },
    AsyncMethod { is_static: bool },
    Getter { is_static: bool },
    Setter { is_static: bool },

    // statements
    Var { unmovable: bool },
    AugAssign,
    Return,
    Break,
    Continue,
    Delete,
    Throw,
    Yield,
    YieldStar,
    Await,
    NamedImport,
    StarImport,
    DefaultImport,
    Export,
    ExportDefault,
    ExpressionStatement,

    // expressions
    Expression,
    Assignment,
    IfExp,
    Call { new: bool },
    Attribute,
    Subscript,
    KeySubscript,
    BinOp,
    MultipleArgsOp,
    UnaryOp,
    Name,
    Super,
    This,
    Rest,
    Op(JsOp),

    // literals
    /// Raw JavaScript text
    Literal,
    Dict,
    List,
    True,
    False,
    Null,
    Num,
    Str,
    /// Backquoted string; text chunks interleaved with `${...}` values
    TemplateLiteral,

    // no-ops
    Pass,
    CommentBlock,
}

/// Source node a target node was derived from, with its resolved position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub kind: NodeKind,
    pub pos: Option<SourcePos>,
}

/// Argument of a target node.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Not yet transformed source node
    Source(NodeId),
    Node(Box<JsNode>),
    List(Vec<Arg>),
    Text(String),
    Absent,
}

static ABSENT: Arg = Arg::Absent;

impl Arg {
    pub fn text(text: impl Into<String>) -> Self {
        Arg::Text(text.into())
    }

    pub fn sources(ids: &[NodeId]) -> Self {
        Arg::List(ids.iter().copied().map(Arg::Source).collect())
    }

    pub fn is_absent(&self) -> bool {
        match self {
            Arg::Absent => true,
            Arg::List(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn as_node(&self) -> Option<&JsNode> {
        match self {
            Arg::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Arg::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> &[Arg] {
        match self {
            Arg::List(items) => items,
            _ => &[],
        }
    }
}

impl Default for Arg {
    fn default() -> Self {
        Arg::Absent
    }
}

impl From<JsNode> for Arg {
    fn from(node: JsNode) -> Self {
        Arg::Node(Box::new(node))
    }
}

impl From<NodeId> for Arg {
    fn from(id: NodeId) -> Self {
        Arg::Source(id)
    }
}

impl From<&str> for Arg {
    fn from(text: &str) -> Self {
        Arg::Text(text.to_string())
    }
}

impl From<String> for Arg {
    fn from(text: String) -> Self {
        Arg::Text(text)
    }
}

impl From<Vec<Arg>> for Arg {
    fn from(items: Vec<Arg>) -> Self {
        Arg::List(items)
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Arg::Absent)
    }
}

/// Output tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct JsNode {
    pub kind: JsKind,
    pub args: Vec<Arg>,
    pub transformed_args: Option<Vec<Arg>>,
    pub origin: Option<Origin>,
    /// Attribute fragments to `origin`; disabled for snippet code
    pub source_map: bool,
}

impl JsNode {
    pub fn new(kind: JsKind, args: Vec<Arg>) -> Self {
        JsNode {
            kind,
            args,
            transformed_args: None,
            origin: None,
            source_map: true,
        }
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn is_finalized(&self) -> bool {
        self.transformed_args.is_some()
    }

    /// Arguments used for output: the transformed ones once finalized.
    pub fn targs(&self) -> &[Arg] {
        self.transformed_args.as_deref().unwrap_or(&self.args)
    }

    pub fn targ(&self, ix: usize) -> &Arg {
        self.targs().get(ix).unwrap_or(&ABSENT)
    }

    pub fn transformed_args_mut(&mut self) -> &mut Vec<Arg> {
        self.transformed_args.get_or_insert_with(Vec::new)
    }

    // ---- statements ----

    pub fn statements(items: Vec<Arg>) -> Self {
        JsNode::new(JsKind::Statements, vec![Arg::List(items)])
    }

    /// Append the statements of `other` to this statement list.
    pub fn extend(&mut self, other: JsNode) {
        let incoming = match other.kind {
            JsKind::Statements => other.targ(0).as_list().to_vec(),
            _ => vec![Arg::from(other)],
        };
        let args = self.transformed_args_mut();
        if args.is_empty() {
            args.push(Arg::List(Vec::new()));
        }
        if let Arg::List(items) = &mut args[0] {
            items.extend(incoming);
        }
    }

    /// Insert a statement in front of a statement list.
    pub fn prepend(&mut self, node: JsNode) {
        let args = self.transformed_args_mut();
        if args.is_empty() {
            args.push(Arg::List(Vec::new()));
        }
        if let Arg::List(items) = &mut args[0] {
            items.insert(0, Arg::from(node));
        }
    }

    pub fn if_(test: impl Into<Arg>, body: impl Into<Arg>, orelse: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::If, vec![test.into(), body.into(), orelse.into()])
    }

    pub fn while_(test: impl Into<Arg>, body: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::While, vec![test.into(), body.into()])
    }

    pub fn for_(left: impl Into<Arg>, test: impl Into<Arg>, right: impl Into<Arg>, body: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::For, vec![left.into(), test.into(), right.into(), body.into()])
    }

    pub fn foreach(target: impl Into<Arg>, source: impl Into<Arg>, body: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::Foreach, vec![target.into(), source.into(), body.into()])
    }

    /// `for (var target of source)`
    pub fn for_of(target: impl Into<Arg>, source: impl Into<Arg>, body: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::ForOf, vec![target.into(), source.into(), body.into()])
    }

    pub fn try_(
        body: impl Into<Arg>,
        target: impl Into<Arg>,
        catch_body: impl Into<Arg>,
        finally_body: impl Into<Arg>,
    ) -> Self {
        JsNode::new(
            JsKind::Try,
            vec![body.into(), target.into(), catch_body.into(), finally_body.into()],
        )
    }

    pub fn var(keys: Vec<String>, values: Vec<Arg>) -> Self {
        JsNode::var_with(JsKind::Var { unmovable: false }, keys, values)
    }

    /// A declaration that stays where it is written.
    pub fn unmovable_var(keys: Vec<String>, values: Vec<Arg>) -> Self {
        JsNode::var_with(JsKind::Var { unmovable: true }, keys, values)
    }

    fn var_with(kind: JsKind, keys: Vec<String>, values: Vec<Arg>) -> Self {
        let keys = keys.into_iter().map(Arg::Text).collect();
        JsNode::new(kind, vec![Arg::List(keys), Arg::List(values)])
    }

    pub fn aug_assign(target: impl Into<Arg>, op: impl Into<Arg>, value: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::AugAssign, vec![target.into(), op.into(), value.into()])
    }

    pub fn return_(value: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::Return, vec![value.into()])
    }

    pub fn break_() -> Self {
        JsNode::new(JsKind::Break, vec![])
    }

    pub fn continue_() -> Self {
        JsNode::new(JsKind::Continue, vec![])
    }

    pub fn delete(value: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::Delete, vec![value.into()])
    }

    pub fn throw(value: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::Throw, vec![value.into()])
    }

    pub fn yield_(value: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::Yield, vec![value.into()])
    }

    pub fn yield_star(value: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::YieldStar, vec![value.into()])
    }

    pub fn await_(value: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::Await, vec![value.into()])
    }

    /// `import {name as alias, ...} from 'module'`; names are sorted on output.
    pub fn named_import(module: impl Into<String>, names: Vec<(String, Option<String>)>) -> Self {
        let names = names
            .into_iter()
            .map(|(name, alias)| Arg::List(vec![Arg::Text(name), Arg::from(alias)]))
            .collect();
        JsNode::new(JsKind::NamedImport, vec![Arg::text(module), Arg::List(names)])
    }

    pub fn star_import(module: impl Into<String>, name: impl Into<String>) -> Self {
        JsNode::new(JsKind::StarImport, vec![Arg::text(module), Arg::text(name)])
    }

    pub fn default_import(module: impl Into<String>, alias: impl Into<String>) -> Self {
        JsNode::new(JsKind::DefaultImport, vec![Arg::text(module), Arg::text(alias)])
    }

    pub fn export(names: Vec<Arg>) -> Self {
        JsNode::new(JsKind::Export, vec![Arg::List(names)])
    }

    pub fn export_default(value: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::ExportDefault, vec![value.into()])
    }

    pub fn expression_statement(value: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::ExpressionStatement, vec![value.into()])
    }

    // ---- functions and classes ----

    /// Arguments shared by every function-like kind: positional args, the
    /// rest accumulator and the keyword-only destructuring pattern.
    pub fn function(
        kind: JsKind,
        name: Option<String>,
        args: Vec<Arg>,
        body: impl Into<Arg>,
        acc: impl Into<Arg>,
        kwargs: Vec<Arg>,
    ) -> Self {
        JsNode::new(
            kind,
            vec![
                Arg::from(name),
                Arg::List(args),
                body.into(),
                acc.into(),
                Arg::List(kwargs),
            ],
        )
    }

    pub fn class(name: impl Into<Arg>, superclass: impl Into<Arg>, members: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::Class, vec![name.into(), superclass.into(), members.into()])
    }

    pub fn getter(name: impl Into<String>, body: impl Into<Arg>, is_static: bool) -> Self {
        JsNode::new(JsKind::Getter { is_static }, vec![Arg::text(name), body.into()])
    }

    pub fn setter(name: impl Into<String>, arg: impl Into<Arg>, body: impl Into<Arg>, is_static: bool) -> Self {
        JsNode::new(
            JsKind::Setter { is_static },
            vec![Arg::text(name), arg.into(), body.into()],
        )
    }

    // ---- expressions ----

    pub fn expression(expr: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::Expression, vec![expr.into()])
    }

    pub fn assignment(left: impl Into<Arg>, right: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::Assignment, vec![left.into(), right.into()])
    }

    pub fn if_exp(test: impl Into<Arg>, body: impl Into<Arg>, orelse: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::IfExp, vec![test.into(), body.into(), orelse.into()])
    }

    pub fn call(func: impl Into<Arg>, args: Vec<Arg>) -> Self {
        JsNode::call_with_kwargs(func, args, Arg::Absent)
    }

    pub fn call_with_kwargs(func: impl Into<Arg>, args: Vec<Arg>, kwargs: impl Into<Arg>) -> Self {
        JsNode::new(
            JsKind::Call { new: false },
            vec![func.into(), Arg::List(args), kwargs.into()],
        )
    }

    pub fn new_call(func: impl Into<Arg>, args: Vec<Arg>) -> Self {
        JsNode::new(
            JsKind::Call { new: true },
            vec![func.into(), Arg::List(args), Arg::Absent],
        )
    }

    pub fn attribute(obj: impl Into<Arg>, attr: impl Into<String>) -> Self {
        JsNode::new(JsKind::Attribute, vec![obj.into(), Arg::text(attr)])
    }

    pub fn subscript(obj: impl Into<Arg>, key: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::Subscript, vec![obj.into(), key.into()])
    }

    /// Computed key of an object literal, `[key]`.
    pub fn key_subscript(key: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::KeySubscript, vec![key.into()])
    }

    pub fn bin_op(left: impl Into<Arg>, op: impl Into<Arg>, right: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::BinOp, vec![left.into(), op.into(), right.into()])
    }

    /// `((a0 op a1) conj (b0 op b1) ...)`; `op` is a single operator or
    /// a list with one operator per pair.
    pub fn multiple_args_op(op: impl Into<Arg>, conj: impl Into<Arg>, pairs: Vec<(Arg, Arg)>) -> Self {
        let pairs = pairs.into_iter().map(|(l, r)| Arg::List(vec![l, r])).collect();
        JsNode::new(JsKind::MultipleArgsOp, vec![op.into(), conj.into(), Arg::List(pairs)])
    }

    pub fn unary_op(op: impl Into<Arg>, operand: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::UnaryOp, vec![op.into(), operand.into()])
    }

    pub fn name(name: impl Into<String>) -> Self {
        JsNode::new(JsKind::Name, vec![Arg::text(name)])
    }

    pub fn super_() -> Self {
        JsNode::new(JsKind::Super, vec![])
    }

    pub fn this() -> Self {
        JsNode::new(JsKind::This, vec![])
    }

    pub fn rest(value: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::Rest, vec![value.into()])
    }

    pub fn op(op: JsOp) -> Self {
        JsNode::new(JsKind::Op(op), vec![])
    }

    // ---- literals ----

    pub fn literal(text: impl Into<String>) -> Self {
        JsNode::new(JsKind::Literal, vec![Arg::text(text)])
    }

    pub fn dict(keys: Vec<Arg>, values: Vec<Arg>) -> Self {
        JsNode::new(JsKind::Dict, vec![Arg::List(keys), Arg::List(values)])
    }

    pub fn list(elts: impl Into<Arg>) -> Self {
        JsNode::new(JsKind::List, vec![elts.into()])
    }

    pub fn true_() -> Self {
        JsNode::new(JsKind::True, vec![])
    }

    pub fn false_() -> Self {
        JsNode::new(JsKind::False, vec![])
    }

    pub fn null() -> Self {
        JsNode::new(JsKind::Null, vec![])
    }

    pub fn num(text: impl Into<String>) -> Self {
        JsNode::new(JsKind::Num, vec![Arg::text(text)])
    }

    pub fn str(value: impl Into<String>) -> Self {
        JsNode::new(JsKind::Str, vec![Arg::text(value)])
    }

    /// Text chunks are `Arg::Text`, anything else is interpolated.
    pub fn template_literal(chunks: Vec<Arg>) -> Self {
        JsNode::new(JsKind::TemplateLiteral, vec![Arg::List(chunks)])
    }

    pub fn pass() -> Self {
        JsNode::new(JsKind::Pass, vec![])
    }

    pub fn comment_block(text: impl Into<String>) -> Self {
        JsNode::new(JsKind::CommentBlock, vec![Arg::text(text)])
    }

    // ---- queries ----

    pub fn is_import(&self) -> bool {
        matches!(
            self.kind,
            JsKind::NamedImport | JsKind::StarImport | JsKind::DefaultImport
        )
    }

    /// Identifiers this node writes verbatim and that must not be reserved
    /// words.
    pub fn identifiers(&self) -> Vec<&str> {
        match self.kind {
            JsKind::Name => self.targ(0).as_text().into_iter().collect(),
            JsKind::Attribute => self.targ(1).as_text().into_iter().collect(),
            JsKind::Var { .. } => self.targ(0).as_list().iter().filter_map(Arg::as_text).collect(),
            _ => Vec::new(),
        }
    }

    /// Flat text of the node, without line breaks.
    pub fn to_inline_text(&self) -> String {
        self.serialize()
            .into_iter()
            .map(|fragment| match fragment {
                Fragment::Part(part) => part.to_text(),
                Fragment::Line(line) => line.item.to_text(),
            })
            .collect()
    }

    // ---- serialization ----

    pub fn serialize(&self) -> Vec<Fragment> {
        let emitter = Emitter {
            node: self,
            origin: if self.source_map {
                self.origin.and_then(|o| o.pos)
            } else {
                None
            },
        };
        match self.kind {
            JsKind::Statements => emitter.statements(),
            _ => emitter.emit(),
        }
    }
}

/// Piece of a fragment under construction.
enum Piece<'a> {
    Lit(&'a str),
    Own(String),
    Node(&'a Arg),
    Frag(Fragment),
}

use Piece::{Frag, Lit, Node, Own};

struct Emitter<'a> {
    node: &'a JsNode,
    origin: Option<SourcePos>,
}

impl<'a> Emitter<'a> {
    fn arg(&self, ix: usize) -> &'a Arg {
        self.node.targ(ix)
    }

    fn expand(&self, arg: &Arg, out: &mut Vec<Item>) {
        match arg {
            Arg::Node(node) => out.extend(node.serialize().into_iter().map(Fragment::into_item)),
            Arg::List(items) => {
                for item in items {
                    self.expand(item, out);
                }
            }
            Arg::Text(text) => out.push(Item::Text(text.clone())),
            Arg::Source(_) | Arg::Absent => {}
        }
    }

    fn collect(&self, pieces: Vec<Piece<'_>>) -> Vec<Item> {
        let mut out = Vec::new();
        for piece in pieces {
            match piece {
                Lit(text) => out.push(Item::Text(text.to_string())),
                Own(text) => out.push(Item::Text(text)),
                Node(arg) => self.expand(arg, &mut out),
                Frag(fragment) => out.push(fragment.into_item()),
            }
        }
        out
    }

    fn make_part(&self, pieces: Vec<Piece<'_>>) -> Part {
        let mut items = self.collect(pieces);
        if items.len() == 1 {
            if let Item::Line(_) = &items[0] {
                if let Some(Item::Line(line)) = items.pop() {
                    let mut part = line.item;
                    part.origin = part.origin.or(line.origin).or(self.origin);
                    return part;
                }
            }
        }
        Part::new(self.origin, items)
    }

    fn part(&self, pieces: Vec<Piece<'_>>) -> Fragment {
        Fragment::Part(self.make_part(pieces))
    }

    /// A part whose mappings carry its own text as symbol name.
    fn named_part(&self, pieces: Vec<Piece<'_>>) -> Part {
        let part = self.make_part(pieces);
        let name = part.to_text();
        part.with_name(name)
    }

    fn line(&self, pieces: Vec<Piece<'_>>, indent: bool, delim: bool) -> Fragment {
        let item = Part::new(self.origin, self.collect(pieces));
        Fragment::Line(Line::new(self.origin, item, indent as u32, delim))
    }

    /// Turn an already serialized fragment into a line: lines only get
    /// their indent bumped, parts are wrapped.
    fn relines(&self, fragment: Fragment, indent: bool, delim: bool) -> Fragment {
        match fragment {
            Fragment::Line(mut line) => {
                line.indent += indent as u32;
                Fragment::Line(line)
            }
            Fragment::Part(part) => Fragment::Line(Line::new(self.origin, part, indent as u32, delim)),
        }
    }

    fn lines(&self, body: &Arg, indent: bool, delim: bool) -> Vec<Fragment> {
        let mut fragments = Vec::new();
        self.serialize_into(body, &mut fragments);
        fragments
            .into_iter()
            .map(|fragment| self.relines(fragment, indent, delim))
            .collect()
    }

    fn serialize_into(&self, arg: &Arg, out: &mut Vec<Fragment>) {
        match arg {
            Arg::Node(node) => out.extend(node.serialize()),
            Arg::List(items) => {
                for item in items {
                    self.serialize_into(item, out);
                }
            }
            Arg::Text(text) => out.push(Fragment::Part(Part::text(self.origin, text.clone()))),
            Arg::Source(_) | Arg::Absent => {}
        }
    }

    fn delimited<'b>(&self, delimiter: &'b str, items: Vec<Piece<'b>>) -> Vec<Piece<'b>> {
        let mut out = Vec::with_capacity(items.len() * 2);
        for (ix, item) in items.into_iter().enumerate() {
            if ix > 0 {
                out.push(Lit(delimiter));
            }
            out.push(item);
        }
        out
    }

    fn statements(&self) -> Vec<Fragment> {
        let mut squashed = Vec::new();
        squash(self.arg(0), &mut squashed);

        let mut imports = Vec::new();
        let mut vars = Vec::new();
        let mut others = Vec::new();
        for node in squashed {
            if node.is_import() {
                imports.push(node);
            } else if node.kind == (JsKind::Var { unmovable: false }) {
                vars.push(node);
            } else {
                others.push(node);
            }
        }
        // leading comments stay on top
        let leading = others
            .iter()
            .take_while(|node| node.kind == JsKind::CommentBlock)
            .count();
        let after = others.split_off(leading);

        let mut out = Vec::new();
        for node in others.into_iter().chain(imports).chain(vars).chain(after) {
            for fragment in node.serialize() {
                out.push(self.relines(fragment, false, true));
            }
        }
        out
    }

    fn emit(&self) -> Vec<Fragment> {
        let node = self.node;
        match node.kind {
            JsKind::Statements => self.statements(),

            JsKind::If => {
                let mut out = vec![self.line(vec![Lit("if ("), Node(self.arg(0)), Lit(") {")], false, false)];
                out.extend(self.lines(self.arg(1), true, true));
                if !self.arg(2).is_absent() {
                    out.push(self.line(vec![Lit("} else {")], false, false));
                    out.extend(self.lines(self.arg(2), true, true));
                }
                out.push(self.line(vec![Lit("}")], false, false));
                out
            }
            JsKind::While => {
                let mut out = vec![self.line(vec![Lit("while ("), Node(self.arg(0)), Lit(") {")], false, false)];
                out.extend(self.lines(self.arg(1), true, true));
                out.push(self.line(vec![Lit("}")], false, false));
                out
            }
            JsKind::For => {
                let header = vec![
                    Lit("for ("),
                    Node(self.arg(0)),
                    Lit("; "),
                    Node(self.arg(1)),
                    Lit("; "),
                    Node(self.arg(2)),
                    Lit(") {"),
                ];
                let mut out = vec![self.line(header, false, false)];
                out.extend(self.lines(self.arg(3), true, true));
                out.push(self.line(vec![Lit("}")], false, false));
                out
            }
            JsKind::Foreach | JsKind::ForOf => {
                let target = self.part(vec![Node(self.arg(0))]);
                let keyword = if node.kind == JsKind::Foreach { " in " } else { " of " };
                let header = vec![Lit("for (var "), Frag(target), Lit(keyword), Node(self.arg(1)), Lit(") {")];
                let mut out = vec![self.line(header, false, false)];
                out.extend(self.lines(self.arg(2), true, true));
                out.push(self.line(vec![Lit("}")], false, false));
                out
            }
            JsKind::Try => {
                let mut out = vec![self.line(vec![Lit("try {")], false, false)];
                out.extend(self.lines(self.arg(0), true, true));
                if !self.arg(2).is_absent() {
                    out.push(self.line(vec![Lit("} catch("), Node(self.arg(1)), Lit(") {")], false, false));
                    out.extend(self.lines(self.arg(2), true, true));
                }
                if !self.arg(3).is_absent() {
                    out.push(self.line(vec![Lit("} finally {")], false, false));
                    out.extend(self.lines(self.arg(3), true, true));
                }
                out.push(self.line(vec![Lit("}")], false, false));
                out
            }

            JsKind::Function | JsKind::GenFunction | JsKind::AsyncFunction => {
                let begin = match node.kind {
                    JsKind::GenFunction => "function* ",
                    JsKind::AsyncFunction => "async function ",
                    _ => "function ",
                };
                let mut header = vec![Lit(begin), Node(self.arg(0))];
                header.extend(self.fargs(self.arg(1), self.arg(3), self.arg(4)));
                header.push(Lit("{"));
                let mut first = self.line(header, false, false);
                if let (Fragment::Line(line), Some(name)) = (&mut first, self.arg(0).as_text()) {
                    line.name = Some(name.to_string());
                }
                let mut out = vec![first];
                out.extend(self.lines(self.arg(2), true, true));
                out.push(self.line(vec![Lit("}")], false, false));
                out
            }
            JsKind::ArrowFunction => {
                let named = !self.arg(0).is_absent();
                let mut header = Vec::new();
                if named {
                    header.push(Node(self.arg(0)));
                    header.push(Lit(" = "));
                }
                header.extend(self.fargs(self.arg(1), self.arg(3), self.arg(4)));
                header.push(Lit("=> {"));
                let mut out = vec![self.line(header, false, false)];
                out.extend(self.lines(self.arg(2), true, true));
                out.push(self.line(vec![Lit("}")], false, named));
                out
            }
            JsKind::Class => {
                let mut header = vec![Lit("class "), Node(self.arg(0))];
                if !self.arg(1).is_absent() {
                    header.push(Lit(" extends "));
                    header.push(Node(self.arg(1)));
                }
                header.push(Lit(" {"));
                let mut out = vec![self.line(header, false, false)];
                out.extend(self.lines(self.arg(2), true, true));
                out.push(self.line(vec![Lit("}")], false, false));
                out
            }
            JsKind::Constructor => {
                self.member("constructor".to_string(), false, self.arg(0), self.arg(1), self.arg(2), self.arg(3))
            }
            JsKind::Method { is_static } => {
                let name = self.arg(0).as_text().unwrap_or_default().to_string();
                self.member(name, is_static, self.arg(1), self.arg(2), self.arg(3), self.arg(4))
            }
            JsKind::GenMethod { is_static } => {
                let name = format!("* {}", self.arg(0).as_text().unwrap_or_default());
                self.member(name, is_static, self.arg(1), self.arg(2), self.arg(3), self.arg(4))
            }
            JsKind::AsyncMethod { is_static } => {
                let name = format!("async {}", self.arg(0).as_text().unwrap_or_default());
                self.member(name, is_static, self.arg(1), self.arg(2), self.arg(3), self.arg(4))
            }
            JsKind::Getter { is_static } => {
                let name = format!("get {}", self.arg(0).as_text().unwrap_or_default());
                self.member(name, is_static, &ABSENT, self.arg(1), &ABSENT, &ABSENT)
            }
            JsKind::Setter { is_static } => {
                let name = format!("set {}", self.arg(0).as_text().unwrap_or_default());
                self.member(name, is_static, self.arg(1), self.arg(2), &ABSENT, &ABSENT)
            }

            JsKind::Var { .. } => {
                let keys = self.arg(0).as_list();
                let values = self.arg(1).as_list();
                let mut pieces = vec![Lit("var ")];
                for (ix, key) in keys.iter().enumerate() {
                    if ix > 0 {
                        pieces.push(Lit(", "));
                    }
                    pieces.push(Node(key));
                    if let Some(value) = values.get(ix).filter(|v| !v.is_absent()) {
                        pieces.push(Lit(" = "));
                        pieces.push(Node(value));
                    }
                }
                vec![self.part(pieces)]
            }
            JsKind::AugAssign => {
                let target = self.named_part(vec![Node(self.arg(0))]);
                vec![self.part(vec![
                    Frag(Fragment::Part(target)),
                    Lit(" "),
                    Node(self.arg(1)),
                    Lit("= "),
                    Node(self.arg(2)),
                ])]
            }
            JsKind::Return => {
                if self.arg(0).is_absent() {
                    vec![self.line(vec![Lit("return")], false, true)]
                } else {
                    vec![self.line(vec![Lit("return "), Node(self.arg(0))], false, true)]
                }
            }
            JsKind::Break => vec![self.part(vec![Lit("break")])],
            JsKind::Continue => vec![self.part(vec![Lit("continue")])],
            JsKind::Delete => vec![self.line(vec![Lit("delete "), Node(self.arg(0))], false, true)],
            JsKind::Throw => vec![self.line(vec![Lit("throw "), Node(self.arg(0))], false, true)],
            JsKind::Yield => {
                if self.arg(0).is_absent() {
                    vec![self.part(vec![Lit("yield")])]
                } else {
                    vec![self.part(vec![Lit("yield "), Node(self.arg(0))])]
                }
            }
            JsKind::YieldStar => vec![self.part(vec![Lit("yield* "), Node(self.arg(0))])],
            JsKind::Await => vec![self.part(vec![Lit("await "), Node(self.arg(0))])],
            JsKind::NamedImport => {
                let mut names: Vec<(&str, Option<&str>)> = self
                    .arg(1)
                    .as_list()
                    .iter()
                    .map(|pair| {
                        let pair = pair.as_list();
                        let name = pair.first().and_then(Arg::as_text).unwrap_or_default();
                        let alias = pair.get(1).and_then(Arg::as_text);
                        (name, alias)
                    })
                    .collect();
                names.sort();
                let js_names = names
                    .into_iter()
                    .map(|(name, alias)| match alias {
                        Some(alias) => Own(format!("{} as {}", name, alias)),
                        None => Own(name.to_string()),
                    })
                    .collect();
                let mut pieces = vec![Lit("import {")];
                pieces.extend(self.delimited(", ", js_names));
                pieces.extend([Lit("} from '"), Node(self.arg(0)), Lit("'")]);
                vec![self.line(pieces, false, true)]
            }
            JsKind::StarImport => vec![self.line(
                vec![Lit("import * as "), Node(self.arg(1)), Lit(" from '"), Node(self.arg(0)), Lit("'")],
                false,
                true,
            )],
            JsKind::DefaultImport => vec![self.line(
                vec![Lit("import "), Node(self.arg(1)), Lit(" from '"), Node(self.arg(0)), Lit("'")],
                false,
                true,
            )],
            JsKind::Export => {
                let names = self.arg(0).as_list().iter().map(Node).collect();
                let mut pieces = vec![Lit("export {")];
                pieces.extend(self.delimited(", ", names));
                pieces.push(Lit("}"));
                vec![self.line(pieces, false, true)]
            }
            JsKind::ExportDefault => vec![self.line(vec![Lit("export default "), Node(self.arg(0))], false, true)],
            JsKind::ExpressionStatement => vec![self.part(vec![Node(self.arg(0))])],

            JsKind::Expression => vec![self.part(vec![Lit("("), Node(self.arg(0)), Lit(")")])],
            JsKind::Assignment => vec![self.part(vec![Node(self.arg(0)), Lit(" = "), Node(self.arg(1))])],
            JsKind::IfExp => vec![self.part(vec![
                Lit("("),
                Node(self.arg(0)),
                Lit(" ? "),
                Node(self.arg(1)),
                Lit(" : "),
                Node(self.arg(2)),
                Lit(")"),
            ])],
            JsKind::Call { new } => {
                let mut args: Vec<Piece<'_>> = self.arg(1).as_list().iter().map(Node).collect();
                if !self.arg(2).is_absent() {
                    args.push(Node(self.arg(2)));
                }
                let mut pieces = vec![Lit(if new { "new " } else { "" }), Node(self.arg(0)), Lit("(")];
                pieces.extend(self.delimited(", ", args));
                pieces.push(Lit(")"));
                vec![self.part(pieces)]
            }
            JsKind::Attribute => {
                let part = self.named_part(vec![Node(self.arg(0)), Lit("."), Node(self.arg(1))]);
                vec![Fragment::Part(part)]
            }
            JsKind::Subscript => {
                let obj = self.named_part(vec![Node(self.arg(0))]);
                let key = self.named_part(vec![Node(self.arg(1))]);
                vec![self.part(vec![
                    Frag(Fragment::Part(obj)),
                    Lit("["),
                    Frag(Fragment::Part(key)),
                    Lit("]"),
                ])]
            }
            JsKind::KeySubscript => {
                let key = self.part(vec![Node(self.arg(0))]);
                vec![self.part(vec![Lit("["), Frag(key), Lit("]")])]
            }
            JsKind::BinOp => vec![self.part(vec![
                Lit("("),
                Node(self.arg(0)),
                Lit(" "),
                Node(self.arg(1)),
                Lit(" "),
                Node(self.arg(2)),
                Lit(")"),
            ])],
            JsKind::MultipleArgsOp => {
                let ops = self.arg(0);
                let mut pieces = vec![Lit("(")];
                for (ix, pair) in self.arg(2).as_list().iter().enumerate() {
                    let op = match ops {
                        Arg::List(per_pair) => per_pair.get(ix).unwrap_or(&ABSENT),
                        single => single,
                    };
                    if ix > 0 {
                        pieces.extend([Lit(" "), Node(self.arg(1)), Lit(" ")]);
                    }
                    let pair = pair.as_list();
                    pieces.extend([
                        Lit("("),
                        Node(pair.first().unwrap_or(&ABSENT)),
                        Lit(" "),
                        Node(op),
                        Lit(" "),
                        Node(pair.get(1).unwrap_or(&ABSENT)),
                        Lit(")"),
                    ]);
                }
                pieces.push(Lit(")"));
                vec![self.part(pieces)]
            }
            JsKind::UnaryOp => vec![self.part(vec![
                Lit("("),
                Node(self.arg(0)),
                Lit(" "),
                Node(self.arg(1)),
                Lit(")"),
            ])],
            JsKind::Name => vec![Fragment::Part(self.named_part(vec![Node(self.arg(0))]))],
            JsKind::Super => vec![self.part(vec![Lit("super")])],
            JsKind::This => vec![self.part(vec![Lit("this")])],
            JsKind::Rest => vec![self.part(vec![Lit("..."), Node(self.arg(0))])],
            JsKind::Op(op) => vec![self.part(vec![Lit(op.as_str())])],

            JsKind::Literal => {
                let text = self.arg(0).as_text().unwrap_or_default();
                let lines: Vec<&str> = text.lines().collect();
                if lines.len() > 1 {
                    lines
                        .into_iter()
                        .map(|line| self.line(vec![Own(line.trim().to_string())], false, false))
                        .collect()
                } else {
                    vec![self.part(vec![Own(text.to_string())])]
                }
            }
            JsKind::Dict => {
                let keys = self.arg(0).as_list();
                let values = self.arg(1).as_list();
                let mut pieces = vec![Lit("{")];
                for (ix, key) in keys.iter().enumerate() {
                    if ix > 0 {
                        pieces.push(Lit(", "));
                    }
                    pieces.extend([Node(key), Lit(": "), Node(values.get(ix).unwrap_or(&ABSENT))]);
                }
                pieces.push(Lit("}"));
                vec![self.part(pieces)]
            }
            JsKind::List => {
                let elts = self.arg(0).as_list().iter().map(Node).collect();
                let mut pieces = vec![Lit("[")];
                pieces.extend(self.delimited(", ", elts));
                pieces.push(Lit("]"));
                vec![self.part(pieces)]
            }
            JsKind::True => vec![self.part(vec![Lit("true")])],
            JsKind::False => vec![self.part(vec![Lit("false")])],
            JsKind::Null => vec![self.part(vec![Lit("null")])],
            JsKind::Num => vec![self.part(vec![Node(self.arg(0))])],
            JsKind::Str => {
                let value = self.arg(0).as_text().unwrap_or_default();
                vec![self.part(vec![Own(quote(value))])]
            }
            JsKind::TemplateLiteral => {
                let mut pieces = vec![Lit("`")];
                for chunk in self.arg(0).as_list() {
                    match chunk {
                        Arg::Text(text) => pieces.push(Own(escape_template(text))),
                        value => pieces.extend([Lit("${"), Node(value), Lit("}")]),
                    }
                }
                pieces.push(Lit("`"));
                vec![self.part(pieces)]
            }

            JsKind::Pass => Vec::new(),
            JsKind::CommentBlock => {
                let text = self.arg(0).as_text().unwrap_or_default();
                self.comment_lines(text)
            }
        }
    }

    /// `(a, b, {kw=default}={}, ...rest) `
    fn fargs(&self, args: &'a Arg, acc: &'a Arg, kwargs: &'a Arg) -> Vec<Piece<'a>> {
        let mut js_args: Vec<Piece<'_>> = args.as_list().iter().map(Node).collect();
        if !kwargs.is_absent() {
            let kw = kwargs.as_list().iter().map(Node).collect();
            let mut pieces = vec![Lit("{")];
            pieces.extend(self.delimited(", ", kw));
            pieces.push(Lit("}={}"));
            js_args.push(Frag(self.part(pieces)));
        }
        if !acc.is_absent() {
            js_args.push(Node(acc));
        }
        let mut out = vec![Lit("(")];
        out.extend(self.delimited(", ", js_args));
        out.push(Lit(") "));
        out
    }

    fn member(
        &self,
        kind: String,
        is_static: bool,
        args: &'a Arg,
        body: &'a Arg,
        acc: &'a Arg,
        kwargs: &'a Arg,
    ) -> Vec<Fragment> {
        let mut header = Vec::new();
        if is_static {
            header.push(Lit("static "));
        }
        header.push(Own(kind));
        header.extend(self.fargs(args, acc, kwargs));
        header.push(Lit("{"));
        let mut out = vec![self.line(header, false, false)];
        out.extend(self.lines(body, true, true));
        out.push(self.line(vec![Lit("}")], false, false));
        out
    }

    fn comment_lines(&self, text: &str) -> Vec<Fragment> {
        let lines: Vec<&str> = text.lines().collect();
        if lines.len() > 1 {
            let last = lines.len() - 1;
            let mut out = vec![self.line(vec![Lit("/*"), Own(lines[0].trim().to_string())], false, false)];
            for line in &lines[1..last] {
                out.push(self.line(vec![Own(line.trim().to_string())], false, false));
            }
            out.push(self.line(vec![Own(lines[last].trim().to_string()), Lit("*/")], false, false));
            out
        } else {
            vec![self.line(vec![Lit("/* "), Own(text.to_string()), Lit(" */")], false, false)]
        }
    }
}

fn squash<'n>(arg: &'n Arg, out: &mut Vec<&'n JsNode>) {
    match arg {
        Arg::Node(node) if node.kind == JsKind::Statements => squash(node.targ(0), out),
        Arg::Node(node) => out.push(node),
        Arg::List(items) => {
            for item in items {
                squash(item, out);
            }
        }
        _ => {}
    }
}

/// JSON string literal with non-ASCII characters escaped.
pub fn quote(value: &str) -> String {
    let json = serde_json::Value::String(value.to_string()).to_string();
    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            let mut buf = [0u16; 2];
            for unit in ch.encode_utf16(&mut buf) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

/// Template literal text: backquotes, backslashes and `${` are escaped,
/// line breaks are written as escapes so the literal stays on one line.
pub fn escape_template(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '`' => out.push_str("\\`"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::fragment::Block;

    fn finalize(mut node: JsNode) -> JsNode {
        fn walk(arg: &mut Arg) {
            match arg {
                Arg::Node(node) => {
                    let mut args = std::mem::take(&mut node.args);
                    args.iter_mut().for_each(walk);
                    node.transformed_args = Some(args);
                }
                Arg::List(items) => items.iter_mut().for_each(walk),
                _ => {}
            }
        }
        let mut args = std::mem::take(&mut node.args);
        args.iter_mut().for_each(walk);
        node.transformed_args = Some(args);
        node
    }

    fn render(node: JsNode) -> String {
        Block::new(&finalize(node).serialize()).into_text()
    }

    #[test]
    fn should_hoist_imports_and_vars_after_leading_comments() {
        let body = JsNode::statements(vec![
            JsNode::comment_block("doc").into(),
            JsNode::expression_statement(JsNode::call(JsNode::name("f"), vec![])).into(),
            JsNode::var(vec!["a".into()], vec![Arg::Absent]).into(),
            JsNode::star_import("m", "m").into(),
        ]);
        assert_eq!(render(body), "/* doc */\nimport * as m from 'm';\nvar a;\nf();\n");
    }

    #[test]
    fn should_keep_unmovable_vars_in_place() {
        let body = JsNode::statements(vec![
            JsNode::expression_statement(JsNode::name("x")).into(),
            JsNode::unmovable_var(vec!["b".into()], vec![JsNode::num("1").into()]).into(),
        ]);
        assert_eq!(render(body), "x;\nvar b = 1;\n");
    }

    #[test]
    fn should_render_nested_blocks() {
        let node = JsNode::statements(vec![JsNode::if_(
            JsNode::name("a"),
            vec![Arg::from(JsNode::return_(JsNode::num("1")))],
            vec![Arg::from(JsNode::break_())],
        )
        .into()]);
        assert_eq!(render(node), "if (a) {\n    return 1;\n} else {\n    break;\n}\n");
    }

    #[test]
    fn should_render_functions_inline() {
        let func = JsNode::function(
            JsKind::Function,
            None,
            vec![JsNode::name("x").into()],
            vec![Arg::from(JsNode::return_(JsNode::name("x")))],
            Arg::Absent,
            vec![],
        );
        let node = JsNode::statements(vec![JsNode::expression_statement(JsNode::assignment(
            JsNode::name("f"),
            func,
        ))
        .into()]);
        assert_eq!(render(node), "f = function (x) {\n    return x;\n};\n");
    }

    #[test]
    fn should_sort_named_imports() {
        let node = JsNode::statements(vec![JsNode::named_import(
            "./m",
            vec![("b".into(), None), ("a".into(), Some("c".into()))],
        )
        .into()]);
        assert_eq!(render(node), "import {a as c, b} from './m';\n");
    }

    #[test]
    fn should_split_multi_line_comments() {
        let node = JsNode::statements(vec![JsNode::comment_block("first\n  second\nlast").into()]);
        assert_eq!(render(node), "/*first\nsecond\nlast*/\n");
    }

    #[test]
    fn should_quote_strings_as_ascii_json() {
        assert_eq!(quote("a\"b\n"), r#""a\"b\n""#);
        assert_eq!(quote("è"), r#""\u00e8""#);
    }

    #[test]
    fn should_render_template_literals_on_one_line() {
        let node = JsNode::template_literal(vec![
            Arg::text("a`b${c}\n"),
            Arg::from(JsNode::name("x")),
            Arg::text("!"),
        ]);
        assert_eq!(finalize(node).to_inline_text(), "`a\\`b\\${c}\\n${x}!`");
    }

    #[test]
    fn should_prefix_async_functions_and_methods() {
        let func = JsNode::function(JsKind::AsyncFunction, Some("f".into()), vec![], vec![], Arg::Absent, vec![]);
        assert_eq!(render(func), "async function f() {\n}\n");
        let method = JsNode::function(
            JsKind::AsyncMethod { is_static: true },
            Some("m".into()),
            vec![],
            vec![Arg::from(JsNode::expression_statement(JsNode::await_(JsNode::name("p"))))],
            Arg::Absent,
            vec![],
        );
        assert_eq!(render(method), "static async m() {\n    await p;\n}\n");
    }

    #[test]
    fn should_relax_delete_under_es6() {
        assert!(is_reserved("delete", false));
        assert!(!is_reserved("delete", true));
        assert!(is_reserved("class", true));
        assert!(!is_reserved("self", false));
    }
}
