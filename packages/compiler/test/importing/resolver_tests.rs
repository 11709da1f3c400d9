use std::fs;
use std::path::Path;

use proptest::prelude::*;
use pyjs_compiler::error::ResolutionError;
use pyjs_compiler::importing::{dependency_graph, parse_imports, DirectedGraph};
use pyjs_compiler::{ordered_modules, SourcePath};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Arcs only point from a node to a lower numbered one, so the graph has
/// no cycle.
fn acyclic_graph(size: usize, arcs: &[(usize, usize)]) -> DirectedGraph {
    let mut graph = DirectedGraph::new();
    for node in 0..size {
        graph.add_node(format!("m{}", node));
    }
    for &(a, b) in arcs {
        let (a, b) = (a % size, b % size);
        if a > b {
            graph.add_arc(format!("m{}", a), format!("m{}", b));
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_order_dependencies_before_dependents() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "main.py", "from b import run\nrun()\n");
        write(dir.path(), "b.py", "from a import helper\n\ndef run():\n    helper()\n");
        write(dir.path(), "a.py", "def helper():\n    pass\n");

        let search_path = SourcePath::new([dir.path()]);
        assert_eq!(ordered_modules(&search_path, "main").unwrap(), vec!["a", "b", "main"]);
    }

    #[test]
    fn should_follow_dotted_modules_into_folders() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "main.py", "from pkg.util import f\nf()\n");
        write(dir.path(), "pkg/util.pj", "from __globals__ import console\n");

        let search_path = SourcePath::new([dir.path()]);
        assert_eq!(
            search_path.path_for_module("pkg.util").unwrap(),
            dir.path().join("pkg").join("util.pj")
        );
        assert_eq!(ordered_modules(&search_path, "main").unwrap(), vec!["pkg.util", "main"]);
    }

    #[test]
    fn should_search_every_folder() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write(first.path(), "main.py", "from lib import x\n");
        write(second.path(), "lib.js", "var x = 1;\n");

        let search_path = SourcePath::new([first.path(), second.path()]);
        assert_eq!(search_path.folders().len(), 2);
        assert_eq!(ordered_modules(&search_path, "main").unwrap(), vec!["lib", "main"]);
    }

    #[test]
    fn should_record_each_import_as_an_arc() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "main.py", "from a import x\nfrom b import y\n");
        write(dir.path(), "a.py", "from b import y\n");
        write(dir.path(), "b.py", "y = 1\n");

        let graph = dependency_graph(&SourcePath::new([dir.path()]), "main").unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.arcs_from("main").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(graph.arcs_from("a").collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(graph.arcs_from("b").count(), 0);
    }

    #[test]
    fn should_detect_cycles() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "main.py", "from a import x\n");
        write(dir.path(), "a.py", "from b import y\n");
        write(dir.path(), "b.py", "from a import x\n");

        match ordered_modules(&SourcePath::new([dir.path()]), "main") {
            Err(ResolutionError::Cycle { residual }) => {
                assert!(residual.contains(&"a".to_string()));
                assert!(residual.contains(&"b".to_string()));
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn should_report_missing_modules() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "main.py", "from nowhere import x\n");

        match ordered_modules(&SourcePath::new([dir.path()]), "main") {
            Err(ResolutionError::ModuleNotFound { module, folders }) => {
                assert_eq!(module, "nowhere");
                assert_eq!(folders, vec![dir.path().to_path_buf()]);
            }
            other => panic!("expected a missing module, got {:?}", other),
        }
    }

    #[test]
    fn should_refuse_ambiguous_modules() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.py", "x = 1\n");
        write(dir.path(), "a.js", "var x = 1;\n");

        let err = SourcePath::new([dir.path()]).path_for_module("a").unwrap_err();
        match &err {
            ResolutionError::AmbiguousModule { module, candidates } => {
                assert_eq!(module, "a");
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected an ambiguous module, got {:?}", other),
        }
        assert!(err.to_string().starts_with("Module 'a' is ambiguous"));
    }

    #[test]
    fn should_ignore_relative_and_global_imports() {
        let src = "import os\nfrom . import sibling\nfrom __globals__ import window\n  from x.y import z\n";
        assert_eq!(parse_imports(src), vec!["x.y"]);
    }

    proptest! {
        #[test]
        fn prop_ordering_places_every_dependency_first(
            size in 1usize..16,
            arcs in proptest::collection::vec((0usize..16, 0usize..16), 0..40),
        ) {
            let graph = acyclic_graph(size, &arcs);
            let ordering = graph.topological_ordering().unwrap();
            prop_assert_eq!(ordering.len(), size);
            let position = |node: &str| ordering.iter().position(|n| n == node).unwrap();
            for node in graph.nodes() {
                for dep in graph.arcs_from(node) {
                    prop_assert!(position(dep) < position(node));
                }
            }
        }

        #[test]
        fn prop_back_arcs_are_reported_as_cycles(
            size in 2usize..16,
            arcs in proptest::collection::vec((0usize..16, 0usize..16), 0..40),
        ) {
            let mut graph = acyclic_graph(size, &arcs);
            let last = format!("m{}", size - 1);
            graph.add_arc(last.clone(), "m0");
            graph.add_arc("m0", last.clone());
            match graph.topological_ordering() {
                Err(ResolutionError::Cycle { residual }) => {
                    prop_assert!(residual.contains(&"m0".to_string()));
                    prop_assert!(residual.contains(&last));
                }
                other => prop_assert!(false, "expected a cycle, got {:?}", other),
            }
        }
    }
}
