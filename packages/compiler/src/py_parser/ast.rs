//! Source AST
//!
//! Nodes live in an arena (`SourceTree`) and are addressed by dense
//! `NodeId`s. Every node has a kind tag, an optional position and a short
//! list of named fields.

use smallvec::SmallVec;
use std::fmt;

use crate::parse_util::SourcePos;

/// Index of a node inside its `SourceTree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

macro_rules! node_kinds {
    ($($kind:ident),+ $(,)?) => {
        /// Kind tag of a source node.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum NodeKind {
            $($kind),+
        }

        impl NodeKind {
            pub const ALL: &'static [NodeKind] = &[$(NodeKind::$kind),+];

            pub fn name(self) -> &'static str {
                match self {
                    $(NodeKind::$kind => stringify!($kind)),+
                }
            }
        }
    };
}

node_kinds! {
    Module,
    // statements
    FunctionDef, AsyncFunctionDef, ClassDef, Return, Delete, Assign, AugAssign, For, While, If,
    With, Raise, Try, Assert, Import, ImportFrom, Global, Expr, Pass, Break,
    Continue,
    // expressions
    BoolOp, BinOp, UnaryOp, Lambda, IfExp, Dict, ListComp, Await, Compare,
    Call, Yield, YieldFrom, Num, Str, JoinedStr, FormattedValue, NameConstant,
    Attribute, Subscript, Slice, Name, List, Tuple,
    // auxiliary
    ExceptHandler, Arguments, Arg, Keyword, Alias, WithItem, Comprehension,
    // operators
    And, Or, Add, Sub, Mult, Div, FloorDiv, Mod, Pow, LShift, RShift, BitOr,
    BitXor, BitAnd, Invert, Not, UAdd, USub, Eq, NotEq, Lt, LtE, Gt, GtE, Is,
    IsNot, In, NotIn,
}

impl NodeKind {
    /// Statement nodes open a context frame during transformation.
    pub fn is_statement(self) -> bool {
        use NodeKind::*;
        matches!(
            self,
            FunctionDef
                | AsyncFunctionDef
                | ClassDef
                | Return
                | Delete
                | Assign
                | AugAssign
                | For
                | While
                | If
                | With
                | Raise
                | Try
                | Assert
                | Import
                | ImportFrom
                | Global
                | Expr
                | Pass
                | Break
                | Continue
        )
    }

    /// Nodes that open a new scope; name walks stop at them.
    pub fn is_code_block(self) -> bool {
        matches!(self, NodeKind::FunctionDef | NodeKind::AsyncFunctionDef | NodeKind::ClassDef)
    }

    pub fn is_function_def(self) -> bool {
        matches!(self, NodeKind::FunctionDef | NodeKind::AsyncFunctionDef)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of a named node field.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Node(NodeId),
    List(Vec<NodeId>),
    Str(String),
    Int(i64),
    Bool(bool),
    Absent,
}

#[derive(Debug, Clone)]
pub struct SourceNode {
    pub kind: NodeKind,
    pub pos: Option<SourcePos>,
    fields: SmallVec<[(&'static str, Field); 4]>,
}

impl SourceNode {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, f)| f)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &Field)> {
        self.fields.iter().map(|(n, f)| (*n, f))
    }
}

/// Arena holding a parsed module.
#[derive(Debug, Clone, Default)]
pub struct SourceTree {
    nodes: Vec<SourceNode>,
    root: Option<NodeId>,
}

impl SourceTree {
    pub fn new() -> Self {
        SourceTree::default()
    }

    /// Allocate a node; ids are handed out in creation order.
    pub fn add(
        &mut self,
        kind: NodeKind,
        pos: Option<SourcePos>,
        fields: impl IntoIterator<Item = (&'static str, Field)>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(SourceNode {
            kind,
            pos,
            fields: fields.into_iter().collect(),
        });
        id
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    /// The module node. Trees are only handed out by a parser once it is set.
    pub fn root(&self) -> NodeId {
        self.root.unwrap_or(NodeId(0))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &SourceNode {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    pub fn pos(&self, id: NodeId) -> Option<SourcePos> {
        self.node(id).pos
    }

    pub fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes[id.index()].kind = kind;
    }

    /// Move every node allocated from `from` on to `pos`.
    pub fn set_pos_from(&mut self, from: NodeId, pos: Option<SourcePos>) {
        let len = self.nodes.len();
        for node in &mut self.nodes[from.index().min(len)..] {
            node.pos = pos;
        }
    }

    pub fn is(&self, id: NodeId, kind: NodeKind) -> bool {
        self.kind(id) == kind
    }

    pub fn field(&self, id: NodeId, name: &str) -> Option<&Field> {
        self.node(id).field(name)
    }

    /// Single child stored under `name`.
    pub fn child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        match self.field(id, name) {
            Some(Field::Node(child)) => Some(*child),
            _ => None,
        }
    }

    /// Child list stored under `name`; empty when missing.
    pub fn children(&self, id: NodeId, name: &str) -> &[NodeId] {
        match self.field(id, name) {
            Some(Field::List(children)) => children,
            _ => &[],
        }
    }

    pub fn str_field(&self, id: NodeId, name: &str) -> Option<&str> {
        match self.field(id, name) {
            Some(Field::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn int_field(&self, id: NodeId, name: &str) -> Option<i64> {
        match self.field(id, name) {
            Some(Field::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn bool_field(&self, id: NodeId, name: &str) -> bool {
        matches!(self.field(id, name), Some(Field::Bool(true)))
    }

    /// Direct children in field order.
    pub fn iter_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node(id).fields.iter().flat_map(|(_, field)| {
            let ids: &[NodeId] = match field {
                Field::Node(child) => std::slice::from_ref(child),
                Field::List(children) => children,
                _ => &[],
            };
            ids.iter().copied()
        })
    }

    /// Identifier of a `Name` node.
    pub fn name_id(&self, id: NodeId) -> Option<&str> {
        if self.is(id, NodeKind::Name) {
            self.str_field(id, "id")
        } else {
            None
        }
    }

    /// True when `id` is a `Name` spelling `name`.
    pub fn is_name(&self, id: NodeId, name: &str) -> bool {
        self.name_id(id) == Some(name)
    }

    /// Value of a `Str` node.
    pub fn str_value(&self, id: NodeId) -> Option<&str> {
        if self.is(id, NodeKind::Str) {
            self.str_field(id, "s")
        } else {
            None
        }
    }

    /// Pre-order walk of `roots` that does not enter nested function or
    /// class bodies. The code block nodes themselves are yielded.
    pub fn walk_under_code_boundary(&self, roots: &[NodeId]) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            if self.kind(id).is_code_block() {
                continue;
            }
            let children: Vec<NodeId> = self.iter_children(id).collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }
}
