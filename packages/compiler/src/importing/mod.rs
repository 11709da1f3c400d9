//! Importing Module
//!
//! Resolves a root module into the ordered list of modules it depends on.
//! Dependencies are found with a line based scan for `from X import`
//! statements, not a parse, so that any module can be ordered before it is
//! compiled.

pub mod graph;

pub use graph::DirectedGraph;

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::error::ResolutionError;

/// Extensions tried for each module, in order.
pub const MODULE_EXTENSIONS: &[&str] = &["py", "pj", "js"];

static FROM_IMPORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*from[ \t]+([^ \t]+)[ \t]+import").unwrap());

/// Folders searched for module files.
#[derive(Debug, Clone, Default)]
pub struct SourcePath {
    folders: Vec<PathBuf>,
}

impl SourcePath {
    pub fn new<I, P>(folders: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        SourcePath {
            folders: folders.into_iter().map(Into::into).collect(),
        }
    }

    pub fn folders(&self) -> &[PathBuf] {
        &self.folders
    }

    /// The single file implementing the dotted `module`.
    pub fn path_for_module(&self, module: &str) -> Result<PathBuf, ResolutionError> {
        let relative: PathBuf = module.split('.').collect();
        let mut candidates = Vec::new();
        for folder in &self.folders {
            for ext in MODULE_EXTENSIONS {
                let path = folder.join(&relative).with_extension(ext);
                if path.is_file() {
                    candidates.push(path);
                }
            }
        }
        match candidates.len() {
            0 => Err(ResolutionError::ModuleNotFound {
                module: module.to_string(),
                folders: self.folders.clone(),
            }),
            1 => Ok(candidates.remove(0)),
            _ => Err(ResolutionError::AmbiguousModule {
                module: module.to_string(),
                candidates,
            }),
        }
    }
}

/// Modules imported by `source` through `from X import ...` lines.
/// Relative imports and `__globals__` do not name modules.
pub fn parse_imports(source: &str) -> Vec<String> {
    source
        .lines()
        .filter_map(|line| FROM_IMPORT_RE.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|module| !module.starts_with('.') && *module != "__globals__")
        .map(str::to_string)
        .collect()
}

fn read_module(path: &Path) -> Result<String, ResolutionError> {
    fs::read_to_string(path).map_err(|source| ResolutionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// The graph of `root` and every module reachable from it, with an arc from
/// each module to each of its imports.
pub fn dependency_graph(search_path: &SourcePath, root: &str) -> Result<DirectedGraph, ResolutionError> {
    let mut graph = DirectedGraph::new();
    let mut todo: IndexSet<String> = IndexSet::from([root.to_string()]);
    let mut done: IndexSet<String> = IndexSet::new();

    while let Some(module) = todo.shift_remove_index(0) {
        graph.add_node(module.clone());
        let path = search_path.path_for_module(&module)?;
        debug!(module = %module, path = %path.display(), "scanning module");
        let source = read_module(&path)?;
        for prereq in parse_imports(&source) {
            graph.add_arc(module.clone(), prereq.clone());
            if !done.contains(&prereq) && prereq != module {
                todo.insert(prereq);
            }
        }
        done.insert(module);
    }
    Ok(graph)
}

/// Module names ordered so that each comes after its dependencies.
pub fn ordered_modules(search_path: &SourcePath, root: &str) -> Result<Vec<String>, ResolutionError> {
    let graph = dependency_graph(search_path, root)?;
    let ordering = graph.topological_ordering()?;
    info!(root, modules = ordering.len(), "resolved module order");
    Ok(ordering)
}
