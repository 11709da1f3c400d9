//! Directed graph with a topological ordering.
//!
//! Nodes and arcs keep their insertion order, so the ordering of a given
//! graph is always the same.

use indexmap::{IndexMap, IndexSet};

use crate::error::ResolutionError;

#[derive(Debug, Clone, Default)]
pub struct DirectedGraph {
    /// node -> nodes it points to
    arcs: IndexMap<String, IndexSet<String>>,
}

impl DirectedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: impl Into<String>) {
        self.arcs.entry(node.into()).or_default();
    }

    /// Add an arc `from -> to`, creating both nodes when missing.
    pub fn add_arc(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let to = to.into();
        self.add_node(to.clone());
        self.arcs.entry(from.into()).or_default().insert(to);
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.arcs.keys().map(String::as_str)
    }

    pub fn arcs_from(&self, node: &str) -> impl Iterator<Item = &str> {
        self.arcs.get(node).into_iter().flatten().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Every node placed after all the nodes it points to.
    ///
    /// A node is taken as soon as it has no outgoing arc left; its incoming
    /// arcs are then discharged. When nodes remain and none can be taken,
    /// the remaining ones form (or depend on) a cycle.
    pub fn topological_ordering(&self) -> Result<Vec<String>, ResolutionError> {
        let mut pending = self.arcs.clone();
        let mut ordering = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let Some(free) = pending
                .iter()
                .find(|(_, deps)| deps.is_empty())
                .map(|(node, _)| node.clone())
            else {
                return Err(ResolutionError::Cycle {
                    residual: pending.keys().cloned().collect(),
                });
            };
            pending.shift_remove(&free);
            for deps in pending.values_mut() {
                deps.shift_remove(&free);
            }
            ordering.push(free);
        }
        Ok(ordering)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_place_dependencies_first() {
        let mut graph = DirectedGraph::new();
        graph.add_arc("main", "b");
        graph.add_arc("main", "a");
        graph.add_arc("b", "a");
        assert_eq!(graph.topological_ordering().unwrap(), vec!["a", "b", "main"]);
    }

    #[test]
    fn should_keep_insertion_order_among_independent_nodes() {
        let mut graph = DirectedGraph::new();
        graph.add_node("z");
        graph.add_node("y");
        graph.add_node("x");
        assert_eq!(graph.topological_ordering().unwrap(), vec!["z", "y", "x"]);
    }

    #[test]
    fn should_report_the_residual_cycle() {
        let mut graph = DirectedGraph::new();
        graph.add_arc("main", "a");
        graph.add_arc("a", "b");
        graph.add_arc("b", "a");
        graph.add_node("leaf");
        match graph.topological_ordering() {
            Err(ResolutionError::Cycle { residual }) => assert_eq!(residual, vec!["main", "a", "b"]),
            other => panic!("expected a cycle, got {:?}", other),
        }
    }
}
