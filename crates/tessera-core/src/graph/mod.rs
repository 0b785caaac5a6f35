//! Identity-keyed dependency graph of DSL definitions.
//!
//! # Architecture
//!
//! Nodes are immutable values shared behind `Arc`; an update replaces the
//! whole node. The graph also keeps one [`ModuleSummary`] per analyzed file
//! (including files without definitions) so that removed files are visible
//! to the differ and import edges can be resolved without re-reading
//! expressions.
//!
//! [`GraphIndex`] groups node ids by file and is maintained alongside the
//! graph by [`patch::apply_patch`]; it never holds an empty set.

pub mod build;
pub mod patch;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use indexmap::IndexMap;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::analysis::{ModuleDefinition, ModuleExport, ModuleImport};
use crate::error::GraphError;
use crate::id::CanonicalId;

pub use build::build_graph;
pub use patch::{apply_patch, diff_graphs, DependencyGraphPatch};

/// The symbol chain in an expression that resolved to a dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolReference {
    /// One segment for a local or named import, two for `namespace.member`.
    pub path: SmallVec<[String; 2]>,
    pub target: CanonicalId,
}

/// Import and export surface of one file, without expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSummary {
    pub file_path: String,
    pub imports: Vec<ModuleImport>,
    pub exports: Vec<ModuleExport>,
    /// Resolution of every relative specifier; `None` when unresolved.
    pub resolved: IndexMap<String, Option<String>>,
    /// Top-level definitions keyed by their local binding name.
    pub top_level: IndexMap<String, CanonicalId>,
    pub exported_ids: Vec<CanonicalId>,
    pub has_definitions: bool,
}

impl ModuleSummary {
    /// Resolved file paths this module imports or re-exports from.
    pub fn resolved_files(&self) -> impl Iterator<Item = &str> {
        self.resolved.values().filter_map(|path| path.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGraphNode {
    pub id: CanonicalId,
    pub file_path: String,
    pub local_path: String,
    pub is_exported: bool,
    pub definition: ModuleDefinition,
    pub dependencies: Vec<CanonicalId>,
    pub references: Vec<SymbolReference>,
    pub module_summary: Arc<ModuleSummary>,
}

/// `CanonicalId -> node`, plus per-file summaries.
///
/// Equality ignores insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyGraph {
    nodes: IndexMap<CanonicalId, Arc<DependencyGraphNode>>,
    summaries: IndexMap<String, Arc<ModuleSummary>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &CanonicalId) -> Option<&Arc<DependencyGraphNode>> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &CanonicalId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Arc<DependencyGraphNode>> {
        self.nodes.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &CanonicalId> {
        self.nodes.keys()
    }

    pub fn summary(&self, file_path: &str) -> Option<&Arc<ModuleSummary>> {
        self.summaries.get(file_path)
    }

    pub fn summaries(&self) -> impl Iterator<Item = &Arc<ModuleSummary>> {
        self.summaries.values()
    }

    /// Every file known to the graph: summarized files first, then any file
    /// that only appears on a node.
    pub fn files(&self) -> BTreeSet<String> {
        self.summaries
            .keys()
            .cloned()
            .chain(self.nodes.values().map(|node| node.file_path.clone()))
            .collect()
    }

    /// Inserts or replaces a node, returning the previous one.
    pub fn insert_node(&mut self, node: Arc<DependencyGraphNode>) -> Option<Arc<DependencyGraphNode>> {
        self.nodes.insert(node.id.clone(), node)
    }

    pub fn remove_node(&mut self, id: &CanonicalId) -> Option<Arc<DependencyGraphNode>> {
        self.nodes.shift_remove(id)
    }

    pub fn insert_summary(&mut self, summary: Arc<ModuleSummary>) {
        self.summaries.insert(summary.file_path.clone(), summary);
    }

    pub fn remove_summary(&mut self, file_path: &str) -> Option<Arc<ModuleSummary>> {
        self.summaries.shift_remove(file_path)
    }

    /// Ids of every dependency that has no node.
    pub fn dangling(&self) -> Vec<(CanonicalId, CanonicalId)> {
        self.nodes
            .values()
            .flat_map(|node| {
                node.dependencies
                    .iter()
                    .filter(|dep| !self.nodes.contains_key(*dep))
                    .map(|dep| (node.id.clone(), dep.clone()))
            })
            .collect()
    }

    /// Node ids in dependency-first order.
    ///
    /// Uses Tarjan's SCC algorithm; any component with more than one node, or
    /// a node depending on itself, is a cycle.
    pub fn topological_order(&self) -> Result<Vec<CanonicalId>, GraphError> {
        let mut graph: DiGraph<CanonicalId, ()> = DiGraph::new();
        let mut indices: IndexMap<&CanonicalId, NodeIndex> = IndexMap::new();
        for id in self.nodes.keys() {
            indices.insert(id, graph.add_node(id.clone()));
        }
        for node in self.nodes.values() {
            let from = indices[&node.id];
            for dep in &node.dependencies {
                if let Some(to) = indices.get(dep) {
                    graph.add_edge(from, *to, ());
                }
            }
        }
        let mut order = Vec::with_capacity(self.nodes.len());
        for component in tarjan_scc(&graph) {
            let self_loop = component.len() == 1 && graph.contains_edge(component[0], component[0]);
            if component.len() > 1 || self_loop {
                let mut chain: Vec<String> = component.iter().rev().map(|ix| graph[*ix].to_string()).collect();
                if let Some(first) = chain.first().cloned() {
                    chain.push(first);
                }
                return Err(GraphError::CircularDependency { chain });
            }
            order.push(graph[component[0]].clone());
        }
        Ok(order)
    }
}

/// `filePath -> set of node ids`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphIndex {
    by_file: BTreeMap<String, BTreeSet<CanonicalId>>,
}

impl GraphIndex {
    pub fn from_graph(graph: &DependencyGraph) -> Self {
        let mut index = GraphIndex::default();
        for node in graph.nodes() {
            index.insert(&node.file_path, node.id.clone());
        }
        index
    }

    pub fn insert(&mut self, file_path: &str, id: CanonicalId) {
        self.by_file.entry(file_path.to_string()).or_default().insert(id);
    }

    /// Removes one id; drops the file entry when it becomes empty.
    pub fn remove(&mut self, file_path: &str, id: &CanonicalId) {
        if let Some(ids) = self.by_file.get_mut(file_path) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_file.remove(file_path);
            }
        }
    }

    pub fn remove_file(&mut self, file_path: &str) -> BTreeSet<CanonicalId> {
        self.by_file.remove(file_path).unwrap_or_default()
    }

    pub fn ids_in(&self, file_path: &str) -> Option<&BTreeSet<CanonicalId>> {
        self.by_file.get(file_path)
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.by_file.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_file.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn summary(file: &str) -> Arc<ModuleSummary> {
        Arc::new(ModuleSummary {
            file_path: file.to_string(),
            imports: Vec::new(),
            exports: Vec::new(),
            resolved: IndexMap::new(),
            top_level: IndexMap::new(),
            exported_ids: Vec::new(),
            has_definitions: true,
        })
    }

    pub(crate) fn node(file: &str, name: &str, deps: &[&CanonicalId]) -> Arc<DependencyGraphNode> {
        let id = CanonicalId::new(file, name);
        Arc::new(DependencyGraphNode {
            id: id.clone(),
            file_path: file.to_string(),
            local_path: name.to_string(),
            is_exported: false,
            definition: ModuleDefinition {
                canonical_id: id,
                ast_path: name.to_string(),
                is_top_level: true,
                is_exported: false,
                local_binding: Some(name.to_string()),
                export_binding: None,
                expression: "1".to_string(),
            },
            dependencies: deps.iter().map(|d| (*d).clone()).collect(),
            references: Vec::new(),
            module_summary: summary(file),
        })
    }

    #[test]
    fn topological_order_puts_dependencies_first() {
        let a = node("/a.ts", "a", &[]);
        let b = node("/b.ts", "b", &[&a.id]);
        let c = node("/c.ts", "c", &[&b.id, &a.id]);
        let mut graph = DependencyGraph::new();
        graph.insert_node(c.clone());
        graph.insert_node(b.clone());
        graph.insert_node(a.clone());

        let order = graph.topological_order().unwrap();
        let pos = |id: &CanonicalId| order.iter().position(|x| x == id).unwrap();
        assert!(pos(&a.id) < pos(&b.id));
        assert!(pos(&b.id) < pos(&c.id));
    }

    #[test]
    fn topological_order_reports_cycles() {
        let a_id = CanonicalId::new("/a.ts", "a");
        let b = node("/b.ts", "b", &[&a_id]);
        let a = node("/a.ts", "a", &[&b.id]);
        let mut graph = DependencyGraph::new();
        graph.insert_node(a);
        graph.insert_node(b);

        let err = graph.topological_order().unwrap_err();
        let GraphError::CircularDependency { chain } = err else {
            panic!("expected cycle");
        };
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.first(), chain.last());
        assert!(chain.contains(&"/a.ts::a".to_string()));
        assert!(chain.contains(&"/b.ts::b".to_string()));
    }

    #[test]
    fn index_mirrors_file_grouping() {
        let mut graph = DependencyGraph::new();
        graph.insert_node(node("/a.ts", "x", &[]));
        graph.insert_node(node("/a.ts", "y", &[]));
        graph.insert_node(node("/b.ts", "z", &[]));
        let mut index = GraphIndex::from_graph(&graph);
        assert_eq!(index.len(), 2);
        assert_eq!(index.ids_in("/a.ts").map(|s| s.len()), Some(2));

        index.remove("/b.ts", &CanonicalId::new("/b.ts", "z"));
        assert_eq!(index.ids_in("/b.ts"), None);
        assert_eq!(index.files().collect::<Vec<_>>(), vec!["/a.ts"]);
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let x = node("/a.ts", "x", &[]);
        let y = node("/a.ts", "y", &[]);
        let mut left = DependencyGraph::new();
        left.insert_node(x.clone());
        left.insert_node(y.clone());
        let mut right = DependencyGraph::new();
        right.insert_node(y);
        right.insert_node(x);
        assert_eq!(left, right);
    }

    #[test]
    fn dangling_edges_are_listed() {
        let missing = CanonicalId::new("/gone.ts", "g");
        let mut graph = DependencyGraph::new();
        graph.insert_node(node("/a.ts", "a", &[&missing]));
        assert_eq!(graph.dangling(), vec![(CanonicalId::new("/a.ts", "a"), missing)]);
    }
}
