//! Bundle Builder
//!
//! Compiles a root module and everything it imports into a single script
//! with a single source map. Modules are compiled in parallel as members of
//! the bundle, then stitched together in dependency order inside one
//! function scope:
//!
//! ```text
//! (function () {
//! var <every top-level name of the bundle>;
//! <snippets used by any module>
//! <modules, dependencies first>
//! })();
//! ```
//!
//! Importing a bundled module binds nothing, its names are already in the
//! shared scope. A top-level name bound by two modules is an error.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::api::{merge_names, standard_rules};
use crate::config::TranslateOptions;
use crate::error::{CompilerError, ResolutionError, Result};
use crate::importing::{ordered_modules, SourcePath};
use crate::output::fragment::Block;
use crate::output::js_ast::JsNode;
use crate::output::source_map::{self, SourceMap};
use crate::transform::snippets::Snippet;
use crate::transform::util::dedent;
use crate::transform::{RuleRegistry, Transformer, Warning};

const HEADER: &str = "(function () {\n";
const FOOTER: &str = "})();\n";

/// A compiled module of a bundle.
#[derive(Debug, Clone)]
struct Unit {
    module: String,
    text: String,
    map: SourceMap,
    /// Assigned names the bundle has to declare
    declared: Vec<String>,
    /// Every name the module binds at top level
    top_level: Vec<String>,
    snippets: Vec<Snippet>,
    warnings: Vec<Warning>,
}

#[derive(Debug, Clone)]
pub struct Bundle {
    /// Name of the root module
    pub name: String,
    /// Modules in the order they appear in `text`
    pub modules: Vec<String>,
    pub text: String,
    pub source_map: SourceMap,
    pub warnings: Vec<Warning>,
}

/// Compile `root` and its dependencies found on `search_path`.
///
/// `.js` modules are copied verbatim (minus any map pragma) with an identity
/// map, the others go through the engine with `options`. Offsets, inline
/// maps and `body_only` do not apply to bundles.
pub fn build_bundle(search_path: &SourcePath, root: &str, options: &TranslateOptions) -> Result<Bundle> {
    let modules = ordered_modules(search_path, root)?;
    let registry = standard_rules()?;
    let bundled: Arc<BTreeSet<String>> = Arc::new(modules.iter().cloned().collect());
    info!(root, modules = modules.len(), "building bundle");

    let units = modules
        .par_iter()
        .map(|module| compile_module(&registry, &bundled, search_path, module, options))
        .collect::<Result<Vec<Unit>>>()?;
    check_top_level_names(&units)?;

    let prelude = prelude(&registry, &units, options)?;
    let mut text = format!("{}{}", HEADER, prelude);
    let mut map = SourceMap::new();
    let mut warnings = Vec::new();
    for unit in units {
        let line = text.matches('\n').count() as u32;
        debug!(module = %unit.module, line, "placing module");
        map.extend_shifted(&unit.map, line)?;
        text.push_str(&unit.text);
        if !text.ends_with('\n') {
            text.push('\n');
        }
        warnings.extend(unit.warnings);
    }
    text.push_str(FOOTER);

    Ok(Bundle {
        name: root.to_string(),
        modules,
        text,
        source_map: map,
        warnings,
    })
}

/// The `var` declaring every assigned top-level name of the bundle,
/// followed by the snippets any module asked for.
fn prelude(registry: &Arc<RuleRegistry>, units: &[Unit], options: &TranslateOptions) -> Result<String> {
    let mut t = Transformer::new(Arc::clone(registry), options.transform);
    for snippet in units.iter().flat_map(|unit| &unit.snippets) {
        t.add_snippet(*snippet);
    }

    let (mut node, mut declared) = match t.transform_snippets()? {
        Some((node, names)) => (node, names),
        None => (JsNode::statements(Vec::new()), Vec::new()),
    };
    for unit in units {
        declared = merge_names(declared, unit.declared.clone());
    }
    if let Some(decl) = t.declaration(declared)? {
        node.prepend(decl);
    }
    Ok(Block::new(&node.serialize()).into_text())
}

fn check_top_level_names(units: &[Unit]) -> Result<()> {
    let mut bound: IndexMap<&str, &str> = IndexMap::new();
    for unit in units {
        for name in &unit.top_level {
            if let Some(bound_by) = bound.insert(name.as_str(), unit.module.as_str()) {
                return Err(CompilerError::DuplicateName {
                    name: name.clone(),
                    module: unit.module.clone(),
                    bound_by: bound_by.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn compile_module(
    registry: &Arc<RuleRegistry>,
    bundled: &Arc<BTreeSet<String>>,
    search_path: &SourcePath,
    module: &str,
    options: &TranslateOptions,
) -> Result<Unit> {
    let path = search_path.path_for_module(module)?;
    let src = fs::read_to_string(&path).map_err(|source| ResolutionError::Io {
        path: path.clone(),
        source,
    })?;
    let filename = path.to_string_lossy().into_owned();
    info!(module, path = %filename, "compiling module");

    if path.extension().map(|ext| ext == "js").unwrap_or(false) {
        let text = source_map::strip(&src);
        let map = SourceMap::identity(&text, &filename);
        return Ok(Unit {
            module: module.to_string(),
            text,
            map,
            declared: Vec::new(),
            top_level: Vec::new(),
            snippets: Vec::new(),
            warnings: Vec::new(),
        });
    }

    let (text, margin) = if options.dedent { dedent(&src) } else { (src.clone(), 0) };
    let mut t = Transformer::new(Arc::clone(registry), options.transform).with_bundled(Arc::clone(bundled));
    let tree = Arc::new(t.parse(&text)?);
    let body = tree.children(tree.root(), "body").to_vec();
    let (node, declared) = t.transform_body(Arc::clone(&tree), &body)?;

    let defined = body
        .iter()
        .filter(|&&id| tree.kind(id).is_code_block())
        .filter_map(|&id| tree.str_field(id, "name"))
        .filter(|name| !t.globals().contains(*name))
        .map(str::to_string);
    let top_level = merge_names(declared.clone(), defined.collect());

    let block = Block::new(&node.serialize());
    let map = block.sourcemap(&src, &filename, (0, margin as u32), (0, 0))?;
    Ok(Unit {
        module: module.to_string(),
        text: block.into_text(),
        map,
        declared,
        top_level,
        snippets: t.snippets().collect(),
        warnings: t.take_warnings(),
    })
}

/// Write `<name>.js`, ending with a `sourceMappingURL` pragma, and
/// `<name>.js.map` into `out_dir`. Returns the path of the script.
pub fn write_bundle(bundle: &Bundle, out_dir: &Path) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(out_dir).with_context(|| format!("Failed to create '{}'", out_dir.display()))?;

    let js_name = format!("{}.js", bundle.name);
    let map_name = format!("{}.map", js_name);
    let js_path = out_dir.join(&js_name);
    let map_path = out_dir.join(&map_name);

    let map = bundle
        .source_map
        .stringify(false)
        .context("Failed to serialize the bundle source map")?;
    fs::write(&map_path, map).with_context(|| format!("Failed to write '{}'", map_path.display()))?;

    let text = format!("{}\n//# sourceMappingURL={}\n", bundle.text, map_name);
    fs::write(&js_path, text).with_context(|| format!("Failed to write '{}'", js_path.display()))?;

    info!(path = %js_path.display(), "bundle written");
    Ok(js_path)
}
