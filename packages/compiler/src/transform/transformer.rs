//! Transformer
//!
//! Depth-first, rule-driven rewrite of a source tree into a target tree.
//! Each source node is offered to the chain of rules registered for its
//! kind; the first rule returning a node wins and the node is finalized
//! right away, which recursively transforms every source node it still
//! references.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::TransformOptions;
use crate::error::{Location, TransformError};
use crate::output::js_ast::{is_reserved, Arg, JsNode, Origin};
use crate::parse_util::SourcePos;
use crate::py_parser::{NodeId, NodeKind, Parse, PyParser, SourceTree};
use crate::transform::context::{ContextStack, CtxValue};
use crate::transform::registry::RuleRegistry;
use crate::transform::snippets::{self, Snippet};
use crate::transform::util::{body_local_names, dedent, node_names};

const NAME_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// A non-fatal diagnostic collected while transforming a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: NodeKind,
    pub location: Location,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node type '{}': {}. {}", self.kind, self.location, self.message)
    }
}

/// The tree being transformed and its parent map.
struct Unit {
    tree: Arc<SourceTree>,
    parents: Vec<Option<NodeId>>,
}

impl Unit {
    fn new(tree: Arc<SourceTree>) -> Self {
        let mut parents = vec![None; tree.len()];
        let mut stack = vec![tree.root()];
        while let Some(id) = stack.pop() {
            for child in tree.iter_children(id) {
                parents[child.index()] = Some(id);
                stack.push(child);
            }
        }
        Unit { tree, parents }
    }
}

pub struct Transformer {
    registry: Arc<RuleRegistry>,
    parser: Arc<dyn Parse>,
    options: TransformOptions,
    /// Origin forced on every produced node
    remap_to: Option<Origin>,
    unit: Option<Unit>,
    ctx: ContextStack,
    snippets: BTreeMap<&'static str, Snippet>,
    globals: BTreeSet<String>,
    warnings: Vec<Warning>,
    name_ix: usize,
    /// Modules compiled into the same bundle; importing them binds nothing
    bundled: Arc<BTreeSet<String>>,
}

/// Frame guard held while a statement node is transformed.
struct Scoped<'a> {
    transformer: &'a mut Transformer,
    pushed: bool,
}

impl<'a> Scoped<'a> {
    fn enter(transformer: &'a mut Transformer, push: bool) -> Self {
        if push {
            transformer.ctx.push();
        }
        Scoped {
            transformer,
            pushed: push,
        }
    }
}

impl Deref for Scoped<'_> {
    type Target = Transformer;

    fn deref(&self) -> &Transformer {
        self.transformer
    }
}

impl DerefMut for Scoped<'_> {
    fn deref_mut(&mut self) -> &mut Transformer {
        self.transformer
    }
}

impl Drop for Scoped<'_> {
    fn drop(&mut self) {
        if self.pushed {
            self.transformer.ctx.pop();
        }
    }
}

impl Transformer {
    pub fn new(registry: Arc<RuleRegistry>, options: TransformOptions) -> Self {
        Transformer::with_parser(registry, Arc::new(PyParser::new()), options)
    }

    pub fn with_parser(registry: Arc<RuleRegistry>, parser: Arc<dyn Parse>, options: TransformOptions) -> Self {
        Transformer {
            registry,
            parser,
            options,
            remap_to: None,
            unit: None,
            ctx: ContextStack::new(),
            snippets: BTreeMap::new(),
            globals: BTreeSet::new(),
            warnings: Vec::new(),
            name_ix: 0,
            bundled: Arc::default(),
        }
    }

    /// Compile as a member of a bundle made of `modules`.
    pub fn with_bundled(mut self, modules: Arc<BTreeSet<String>>) -> Self {
        self.bundled = modules;
        self
    }

    pub fn is_bundling(&self) -> bool {
        !self.bundled.is_empty()
    }

    pub fn is_bundled(&self, module: &str) -> bool {
        self.bundled.contains(module)
    }

    /// An engine sharing this one's rules and parser.
    fn child(&self, options: TransformOptions, remap_to: Option<Origin>) -> Transformer {
        let mut child = Transformer::with_parser(Arc::clone(&self.registry), Arc::clone(&self.parser), options);
        child.remap_to = remap_to;
        child.bundled = Arc::clone(&self.bundled);
        child
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    pub fn es6(&self) -> bool {
        self.options.es6()
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    /// Transform a whole module. Per-unit state (context, globals,
    /// snippets, warnings and the name counter) starts over.
    pub fn transform_code(&mut self, text: &str) -> Result<JsNode, TransformError> {
        self.ctx.reset();
        self.name_ix = 0;
        self.globals.clear();
        self.snippets.clear();
        self.warnings.clear();
        self.transform_text(text)
    }

    /// Parse `text` with this engine's front end.
    pub fn parse(&self, text: &str) -> Result<SourceTree, TransformError> {
        Ok(self.parser.parse(text)?)
    }

    fn transform_text(&mut self, text: &str) -> Result<JsNode, TransformError> {
        let tree = self.parser.parse(text)?;
        let body = tree.children(tree.root(), "body").to_vec();
        self.transform_tree(Arc::new(tree), &body)
    }

    /// Transform the statements `body` of `tree` into a statement list,
    /// hoisting the names they assign into a leading `var`.
    pub fn transform_tree(&mut self, tree: Arc<SourceTree>, body: &[NodeId]) -> Result<JsNode, TransformError> {
        let (mut node, declared) = self.transform_body(tree, body)?;
        if let Some(decl) = self.declaration(declared)? {
            node.prepend(decl);
        }
        Ok(node)
    }

    /// Transform the statements `body` of `tree`, leaving the declaration
    /// of the names they assign to the caller. Returns the statement list
    /// and those names, sorted.
    pub fn transform_body(
        &mut self,
        tree: Arc<SourceTree>,
        body: &[NodeId],
    ) -> Result<(JsNode, Vec<String>), TransformError> {
        self.unit = Some(Unit::new(tree));
        let result = self.transform_statements(body);
        // node ids must not outlive their tree
        self.unit = None;
        result
    }

    /// A `var` statement declaring `names`, if there are any.
    pub fn declaration(&mut self, names: Vec<String>) -> Result<Option<JsNode>, TransformError> {
        if names.is_empty() {
            return Ok(None);
        }
        let values = vec![Arg::Absent; names.len()];
        self.finalize(JsNode::var(names, values), None).map(Some)
    }

    fn transform_statements(&mut self, body: &[NodeId]) -> Result<(JsNode, Vec<String>), TransformError> {
        let tree = self.tree();
        let local_vars = body_local_names(&tree, body);
        self.ctx.set("vars", CtxValue::Names(local_vars.clone()));

        let statements = JsNode::statements(body.iter().copied().map(Arg::Source).collect());
        let result = self.finalize(statements, None)?;
        self.check_top_level_names(&tree, body)?;

        let names = local_vars.difference(&self.globals).cloned().collect();
        Ok((result, names))
    }

    /// A name bound twice by `def`/`class`, or by `def`/`class` and an
    /// assignment, is refused.
    fn check_top_level_names(&self, tree: &SourceTree, body: &[NodeId]) -> Result<(), TransformError> {
        let assigned: BTreeSet<String> = body.iter().flat_map(|&id| node_names(tree, id)).collect();
        let mut defined = BTreeSet::new();
        for &id in body {
            if !tree.kind(id).is_code_block() {
                continue;
            }
            let Some(name) = tree.str_field(id, "name") else {
                continue;
            };
            if self.globals.contains(name) {
                continue;
            }
            if !defined.insert(name) || assigned.contains(name) {
                return Err(self.unsupported_error(id, format!("Name '{}' is already bound in this module", name)));
            }
        }
        Ok(())
    }

    /// Rewrite one source node through its rule chain.
    pub fn transform_node(&mut self, id: NodeId) -> Result<JsNode, TransformError> {
        let tree = self.tree();
        let kind = tree.kind(id);
        let mut scope = Scoped::enter(self, kind.is_statement());
        let registry = Arc::clone(&scope.registry);
        for rule in registry.rules_for(kind) {
            if let Some(node) = rule(&mut *scope, id)? {
                return scope.finalize(node, Some(id));
            }
        }
        debug!(kind = %kind, "no rule accepted the node");
        Err(TransformError::NoTransformation {
            kind,
            location: Location(tree.pos(id)),
        })
    }

    /// Attach the origin to `node` and transform its arguments.
    fn finalize(&mut self, mut node: JsNode, source: Option<NodeId>) -> Result<JsNode, TransformError> {
        node.origin = self
            .remap_to
            .or_else(|| source.map(|id| self.origin_of(id)))
            .or(node.origin);
        node.source_map = self.options.source_map;
        if !node.is_finalized() {
            let args = std::mem::take(&mut node.args);
            let transformed = args
                .into_iter()
                .map(|arg| self.transform_arg(arg))
                .collect::<Result<Vec<_>, _>>()?;
            node.transformed_args = Some(transformed);
        }
        self.check_identifiers(&node)?;
        Ok(node)
    }

    fn transform_arg(&mut self, arg: Arg) -> Result<Arg, TransformError> {
        Ok(match arg {
            Arg::Source(id) => Arg::from(self.transform_node(id)?),
            Arg::Node(node) => Arg::from(self.finalize(*node, None)?),
            Arg::List(items) => Arg::List(
                items
                    .into_iter()
                    .map(|item| self.transform_arg(item))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            other => other,
        })
    }

    fn check_identifiers(&self, node: &JsNode) -> Result<(), TransformError> {
        let es6 = self.es6();
        let Some(name) = node.identifiers().into_iter().find(|name| is_reserved(name, es6)) else {
            return Ok(());
        };
        let message = format!("Name '{}' is reserved in JavaScript.", name);
        Err(match node.origin {
            Some(origin) => TransformError::Unsupported {
                kind: origin.kind,
                location: Location(origin.pos),
                message,
            },
            None => TransformError::transformation(message),
        })
    }

    /// Origin recorded for nodes produced from `id`. Decorated definitions
    /// map to the line after their last decorator.
    pub fn origin_of(&self, id: NodeId) -> Origin {
        let tree = self.tree();
        let kind = tree.kind(id);
        let mut pos = tree.pos(id);
        if kind.is_code_block() {
            if let Some(&last) = tree.children(id, "decorator_list").last() {
                let col = pos.map(|p| p.col).unwrap_or(0);
                pos = tree.pos(last).map(|p| SourcePos::new(p.line + 1, col));
            }
        }
        Origin { kind, pos }
    }

    // ---- tree queries ----

    /// The tree of the unit being transformed; empty outside of a unit.
    pub fn tree(&self) -> Arc<SourceTree> {
        self.unit
            .as_ref()
            .map(|unit| Arc::clone(&unit.tree))
            .unwrap_or_default()
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.unit.as_ref()?.parents.get(id.index()).copied().flatten()
    }

    /// Ancestors of `id`, innermost first, up to and including the first
    /// one of kind `stop_at`.
    pub fn parents(&self, id: NodeId, stop_at: Option<NodeKind>) -> impl Iterator<Item = NodeId> + '_ {
        let mut current = Some(id);
        std::iter::from_fn(move || {
            let parent = self.parent_of(current?)?;
            let stop = match (stop_at, &self.unit) {
                (Some(kind), Some(unit)) => unit.tree.is(parent, kind),
                _ => false,
            };
            current = if stop { None } else { Some(parent) };
            Some(parent)
        })
    }

    /// Nearest ancestor of one of the given kinds.
    pub fn find_parent(&self, id: NodeId, kinds: &[NodeKind]) -> Option<NodeId> {
        let unit = self.unit.as_ref()?;
        self.parents(id, None)
            .find(|&parent| kinds.contains(&unit.tree.kind(parent)))
    }

    /// First node of the given kinds in `roots`, not looking inside nested
    /// functions or classes.
    pub fn find_child(&self, roots: &[NodeId], kinds: &[NodeKind]) -> Option<NodeId> {
        let unit = self.unit.as_ref()?;
        unit.tree
            .walk_under_code_boundary(roots)
            .into_iter()
            .find(|&id| kinds.contains(&unit.tree.kind(id)))
    }

    pub fn has_child(&self, roots: &[NodeId], kinds: &[NodeKind]) -> bool {
        self.find_child(roots, kinds).is_some()
    }

    // ---- context ----

    pub fn ctx(&self) -> &ContextStack {
        &self.ctx
    }

    /// Set `key` in the frame of the statement being transformed.
    pub fn set_ctx(&mut self, key: &'static str, value: CtxValue) {
        self.ctx.set(key, value);
    }

    // ---- names ----

    /// A fresh identifier: `_pj_a` to `_pj_z`, then `_pj_A` to `_pj_Z`.
    pub fn new_name(&mut self) -> Result<String, TransformError> {
        let letter = NAME_ALPHABET
            .get(self.name_ix)
            .ok_or_else(|| TransformError::transformation("Reached maximum index for auto-generated variable names"))?;
        self.name_ix += 1;
        Ok(format!("_pj_{}", *letter as char))
    }

    /// Names provided by the environment; never declared.
    pub fn add_globals<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.globals.extend(names.into_iter().map(Into::into));
    }

    pub fn globals(&self) -> &BTreeSet<String> {
        &self.globals
    }

    // ---- diagnostics ----

    pub fn unsupported_error(&self, id: NodeId, message: impl Into<String>) -> TransformError {
        let tree = self.tree();
        TransformError::Unsupported {
            kind: tree.kind(id),
            location: Location(tree.pos(id)),
            message: message.into(),
        }
    }

    /// Fail with an unsupported-syntax error when `condition` holds.
    pub fn unsupported(&self, id: NodeId, condition: bool, message: impl Into<String>) -> Result<bool, TransformError> {
        if condition {
            Err(self.unsupported_error(id, message))
        } else {
            Ok(false)
        }
    }

    pub fn es6_guard(&self, id: NodeId, message: impl Into<String>) -> Result<(), TransformError> {
        self.unsupported(id, !self.options.es6(), message).map(drop)
    }

    pub fn stage3_guard(&self, id: NodeId, message: impl Into<String>) -> Result<(), TransformError> {
        self.unsupported(id, !self.options.stage3(), message).map(drop)
    }

    pub fn warn(&mut self, id: NodeId, message: impl Into<String>) {
        let tree = self.tree();
        let warning = Warning {
            kind: tree.kind(id),
            location: Location(tree.pos(id)),
            message: message.into(),
        };
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    // ---- snippets ----

    pub fn add_snippet(&mut self, snippet: Snippet) {
        self.snippets.insert(snippet.name, snippet);
    }

    pub fn snippets(&self) -> impl Iterator<Item = Snippet> + '_ {
        self.snippets.values().copied()
    }

    /// Compile the collected snippets into the block that defines them,
    /// returned with the names it needs declared. Snippet code is
    /// transformed by the same rules, without snippets of its own and
    /// without source positions.
    pub fn transform_snippets(&mut self) -> Result<Option<(JsNode, Vec<String>)>, TransformError> {
        if self.snippets.is_empty() {
            return Ok(None);
        }
        debug!(snippets = ?self.snippets.keys().collect::<Vec<_>>(), "compiling snippets");
        let source = snippets::render(&self.snippets);
        let options = TransformOptions {
            snippets: false,
            source_map: false,
            ..self.options
        };
        let mut child = self.child(options, None);
        let tree = child.parse(&source)?;
        let body = tree.children(tree.root(), "body").to_vec();
        child.transform_body(Arc::new(tree), &body).map(Some)
    }

    /// Transform `text` as a module of its own and return its statements.
    /// With `remap_to`, every produced node is attributed to that node.
    /// Snippets the child asks for are collected here.
    pub fn subtransform(&mut self, text: &str, remap_to: Option<NodeId>) -> Result<JsNode, TransformError> {
        let (text, _) = dedent(text);
        let remap = remap_to.map(|id| self.origin_of(id)).or(self.remap_to);
        let mut child = self.child(self.options, remap);
        child.name_ix = self.name_ix;
        let result = child.transform_text(&text);
        self.name_ix = child.name_ix;
        self.warnings.append(&mut child.warnings);
        self.snippets.append(&mut child.snippets);
        result
    }
}
