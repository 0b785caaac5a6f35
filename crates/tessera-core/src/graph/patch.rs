//! Minimal patches between graph snapshots.
//!
//! [`diff_graphs`] compares whole nodes and summaries, so any field change
//! (dependencies, references, expression, path, export flag, summary) shows
//! up as an upsert. [`apply_patch`] applies removals before upserts and keeps
//! the [`GraphIndex`] in lock-step. Applying the same patch twice is a no-op
//! the second time.

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;

use super::{DependencyGraph, DependencyGraphNode, GraphIndex, ModuleSummary};
use crate::id::CanonicalId;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyGraphPatch {
    /// Files present before and absent now; all their nodes go with them.
    pub removed_modules: BTreeSet<String>,
    /// Individual nodes removed from files that still exist.
    pub removed_nodes: BTreeSet<CanonicalId>,
    /// New or changed nodes.
    pub upsert_nodes: IndexMap<CanonicalId, Arc<DependencyGraphNode>>,
    /// New or changed file summaries.
    pub module_summaries: IndexMap<String, Arc<ModuleSummary>>,
}

impl DependencyGraphPatch {
    pub fn is_empty(&self) -> bool {
        self.removed_modules.is_empty()
            && self.removed_nodes.is_empty()
            && self.upsert_nodes.is_empty()
            && self.module_summaries.is_empty()
    }

    /// Files whose contents the patch touches.
    pub fn touched_files(&self) -> BTreeSet<String> {
        let mut files: BTreeSet<String> = self.removed_modules.iter().cloned().collect();
        files.extend(self.removed_nodes.iter().map(|id| id.file_path().to_string()));
        files.extend(self.upsert_nodes.values().map(|node| node.file_path.clone()));
        files.extend(self.module_summaries.keys().cloned());
        files
    }
}

/// Computes the patch that turns `old` into `new`.
pub fn diff_graphs(old: &DependencyGraph, new: &DependencyGraph) -> DependencyGraphPatch {
    let new_files = new.files();
    let removed_modules: BTreeSet<String> = old
        .files()
        .into_iter()
        .filter(|file| !new_files.contains(file))
        .collect();

    let removed_nodes = old
        .nodes()
        .filter(|node| !new.contains(&node.id) && !removed_modules.contains(&node.file_path))
        .map(|node| node.id.clone())
        .collect();

    let upsert_nodes = new
        .nodes()
        .filter(|node| old.get(&node.id) != Some(*node))
        .map(|node| (node.id.clone(), node.clone()))
        .collect();

    let module_summaries = new
        .summaries()
        .filter(|summary| old.summary(&summary.file_path) != Some(*summary))
        .map(|summary| (summary.file_path.clone(), summary.clone()))
        .collect();

    DependencyGraphPatch {
        removed_modules,
        removed_nodes,
        upsert_nodes,
        module_summaries,
    }
}

/// Applies `patch` to `graph` and `index` in place.
pub fn apply_patch(graph: &mut DependencyGraph, index: &mut GraphIndex, patch: &DependencyGraphPatch) {
    for file in &patch.removed_modules {
        for id in index.remove_file(file) {
            graph.remove_node(&id);
        }
        graph.remove_summary(file);
    }

    for id in &patch.removed_nodes {
        if let Some(node) = graph.remove_node(id) {
            index.remove(&node.file_path, id);
        }
    }

    for (id, node) in &patch.upsert_nodes {
        if let Some(previous) = graph.insert_node(node.clone()) {
            if previous.file_path != node.file_path {
                index.remove(&previous.file_path, id);
            }
        }
        index.insert(&node.file_path, id.clone());
    }

    for summary in patch.module_summaries.values() {
        graph.insert_summary(summary.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{node, summary};

    fn graph_of(nodes: &[Arc<DependencyGraphNode>]) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for n in nodes {
            graph.insert_summary(summary(&n.file_path));
            graph.insert_node(n.clone());
        }
        graph
    }

    #[test]
    fn empty_diff_for_identical_graphs() {
        let g = graph_of(&[node("/a.ts", "a", &[])]);
        assert!(diff_graphs(&g, &g).is_empty());
    }

    #[test]
    fn classifies_removals_and_upserts() {
        let a = node("/a.ts", "a", &[]);
        let b = node("/b.ts", "b", &[]);
        let c = node("/a.ts", "c", &[]);
        let old = graph_of(&[a.clone(), b.clone(), c]);
        let a2 = node("/a.ts", "a", &[&b.id]);
        let d = node("/d.ts", "d", &[]);
        let new = graph_of(&[a2.clone(), d.clone()]);

        let patch = diff_graphs(&old, &new);
        assert_eq!(patch.removed_modules, BTreeSet::from(["/b.ts".to_string()]));
        assert_eq!(
            patch.removed_nodes,
            BTreeSet::from([CanonicalId::new("/a.ts", "c")])
        );
        assert_eq!(
            patch.upsert_nodes.keys().cloned().collect::<Vec<_>>(),
            vec![a2.id.clone(), d.id.clone()]
        );
        assert_eq!(
            patch.module_summaries.keys().cloned().collect::<Vec<_>>(),
            vec!["/d.ts".to_string()]
        );
        assert!(patch.touched_files().contains("/a.ts"));
    }

    #[test]
    fn apply_reaches_target_and_is_idempotent() {
        let old = graph_of(&[node("/a.ts", "a", &[]), node("/b.ts", "b", &[])]);
        let new = graph_of(&[node("/a.ts", "a2", &[]), node("/c.ts", "c", &[])]);
        let patch = diff_graphs(&old, &new);

        let mut graph = old.clone();
        let mut index = GraphIndex::from_graph(&graph);
        apply_patch(&mut graph, &mut index, &patch);
        assert_eq!(graph, new);
        assert_eq!(index, GraphIndex::from_graph(&new));

        apply_patch(&mut graph, &mut index, &patch);
        assert_eq!(graph, new);
        assert_eq!(index, GraphIndex::from_graph(&new));
    }

    #[test]
    fn upsert_moving_files_reindexes() {
        let id = CanonicalId::new("/a.ts", "x");
        let mut moved = (*node("/a.ts", "x", &[])).clone();
        moved.file_path = "/elsewhere.ts".to_string();
        let patch = DependencyGraphPatch {
            upsert_nodes: IndexMap::from([(id.clone(), Arc::new(moved))]),
            ..Default::default()
        };
        let mut graph = graph_of(&[node("/a.ts", "x", &[])]);
        let mut index = GraphIndex::from_graph(&graph);
        apply_patch(&mut graph, &mut index, &patch);
        assert_eq!(index.ids_in("/a.ts"), None);
        assert!(index.ids_in("/elsewhere.ts").unwrap().contains(&id));
    }
}
