//! Collaborators the resolution passes consume: a cache of already-resolved
//! document trees and a sink for build-graph edges.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::Node;

/// Source of resolved document trees, keyed by project-relative path.
pub trait DocumentCache: Send + Sync {
    /// Returns a copy of the resolved tree of `file_path`.
    fn resolved_tree(&self, file_path: &str) -> Option<Node>;
}

/// In-memory document cache.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentCache {
    trees: BTreeMap<String, Node>,
}

impl MemoryDocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file_path: impl Into<String>, tree: Node) {
        self.trees.insert(file_path.into(), tree);
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

impl DocumentCache for MemoryDocumentCache {
    fn resolved_tree(&self, file_path: &str) -> Option<Node> {
        self.trees.get(file_path).cloned()
    }
}

/// Receives "document depends on document" edges for incremental rebuilds.
pub trait DependencyGraph {
    fn add_local_dependency(&mut self, path: &str, dependency: &str);
}

/// Dependency edges held in memory, ordered for stable output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl LocalDependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents that `path` depends on.
    pub fn dependencies_of(&self, path: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(path)
            .into_iter()
            .flat_map(|deps| deps.iter().map(String::as_str))
    }

    /// Documents that depend on `dependency`, i.e. those to rebuild when it changes.
    pub fn dependents_of<'a>(&'a self, dependency: &'a str) -> impl Iterator<Item = &'a str> {
        self.edges
            .iter()
            .filter(move |(_, deps)| deps.contains(dependency))
            .map(|(path, _)| path.as_str())
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Moves every edge of `other` into this graph.
    pub fn merge(&mut self, other: LocalDependencyGraph) {
        for (path, deps) in other.edges {
            self.edges.entry(path).or_default().extend(deps);
        }
    }
}

impl DependencyGraph for LocalDependencyGraph {
    fn add_local_dependency(&mut self, path: &str, dependency: &str) {
        self.edges
            .entry(path.to_string())
            .or_default()
            .insert(dependency.to_string());
    }
}
