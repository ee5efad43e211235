//! Provenance graph derived from the step list

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef as _;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use super::Step;

/// Steps linked by the files that flow between them.
///
/// An edge `a -> b` labelled with a path means step `b` consumed the path
/// and step `a` was the last step to produce it before `b` ran.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    graph: DiGraph<Step, PathBuf>,
    /// Last step to produce each path that still exists
    producers: HashMap<PathBuf, NodeIndex>,
}

impl WorkflowGraph {
    /// Build the graph from steps in append order
    pub fn from_steps(steps: &[Step]) -> Self {
        let mut graph = DiGraph::new();
        let mut producers: HashMap<PathBuf, NodeIndex> = HashMap::new();

        for step in steps {
            let node = graph.add_node(step.clone());

            for path in step.read_paths() {
                if let Some(&producer) = producers.get(&path) {
                    graph.add_edge(producer, node, path);
                }
            }
            for path in &step.changes.removed {
                producers.remove(path);
            }
            for path in &step.changes.produced {
                producers.insert(path.clone(), node);
            }
        }

        Self { graph, producers }
    }

    pub fn step_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Step that last produced `path`
    pub fn producer_of(&self, path: &Path) -> Option<&Step> {
        self.producers.get(path).map(|&node| &self.graph[node])
    }

    /// Steps whose outputs `step` consumed, with the paths involved
    pub fn dependencies(&self, sequence: u64) -> Vec<(&Step, &Path)> {
        let Some(node) = self.node_of(sequence) else {
            return Vec::new();
        };
        let mut dependencies: Vec<(&Step, &Path)> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|edge| (&self.graph[edge.source()], edge.weight().as_path()))
            .collect();
        dependencies.sort_by_key(|(step, path)| (step.sequence, path.to_path_buf()));
        dependencies
    }

    /// Every step that contributed to the current content of `path`, oldest first
    pub fn upstream_of(&self, path: &Path) -> Vec<&Step> {
        let Some(&start) = self.producers.get(path) else {
            return Vec::new();
        };

        let mut seen = BTreeSet::from([start]);
        let mut pending = vec![start];
        while let Some(node) = pending.pop() {
            for parent in self.graph.neighbors_directed(node, Direction::Incoming) {
                if seen.insert(parent) {
                    pending.push(parent);
                }
            }
        }

        let mut steps: Vec<&Step> = seen.into_iter().map(|node| &self.graph[node]).collect();
        steps.sort_by_key(|step| step.sequence);
        steps
    }

    fn node_of(&self, sequence: u64) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|&node| self.graph[node].sequence == sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::sample_step;

    fn sequences(steps: &[&Step]) -> Vec<u64> {
        steps.iter().map(|s| s.sequence).collect()
    }

    #[test]
    fn test_upstream_follows_latest_producer() {
        let steps = vec![
            sample_step(1, &["raw.csv"], &["clean.csv"]),
            sample_step(2, &["clean.csv"], &["model.bin"]),
            sample_step(3, &["raw.csv"], &["notes.txt"]),
            sample_step(4, &["model.bin", "clean.csv"], &["report.pdf"]),
        ];
        let graph = WorkflowGraph::from_steps(&steps);

        assert_eq!(graph.step_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(sequences(&graph.upstream_of(Path::new("report.pdf"))), [1, 2, 4]);
        assert_eq!(sequences(&graph.upstream_of(Path::new("notes.txt"))), [3]);
        assert!(graph.upstream_of(Path::new("raw.csv")).is_empty());

        let deps = graph.dependencies(4);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].0.sequence, 1);
        assert_eq!(deps[0].1, Path::new("clean.csv"));
        assert_eq!(deps[1].0.sequence, 2);
    }

    #[test]
    fn test_reproduced_file_switches_producer() {
        let steps = vec![
            sample_step(1, &[], &["data.csv"]),
            sample_step(2, &[], &["data.csv"]),
            sample_step(3, &["data.csv"], &["plot.png"]),
        ];
        let graph = WorkflowGraph::from_steps(&steps);

        assert_eq!(graph.producer_of(Path::new("data.csv")).map(|s| s.sequence), Some(2));
        assert_eq!(sequences(&graph.upstream_of(Path::new("plot.png"))), [2, 3]);
    }
}
