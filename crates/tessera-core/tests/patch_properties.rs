//! Property tests for graph diffing and patching.

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;
use proptest::prelude::*;

use tessera_core::{
    apply_patch, diff_graphs, CanonicalId, DependencyGraph, DependencyGraphNode, GraphIndex,
    ModuleDefinition, ModuleSummary,
};

const FILES: [&str; 4] = ["/src/a.ts", "/src/b.ts", "/src/c.ts", "/src/lib/d.ts"];
const NAMES: [&str; 4] = ["alpha", "beta", "gamma", "delta"];
const EXPRESSIONS: [&str; 3] = [
    "gql.default(({ fragment }) => fragment.User({}))",
    "gql.default(({ query }) => query.operation({ name: \"Q\" }))",
    "gql.default(({ model }) => model.Post({}))",
];

#[derive(Debug, Clone)]
struct NodeSpec {
    file: usize,
    name: usize,
    expression: usize,
    exported: bool,
    deps: Vec<(usize, usize)>,
}

fn node_spec() -> impl Strategy<Value = NodeSpec> {
    (
        0..FILES.len(),
        0..NAMES.len(),
        0..EXPRESSIONS.len(),
        any::<bool>(),
        prop::collection::vec((0..FILES.len(), 0..NAMES.len()), 0..3),
    )
        .prop_map(|(file, name, expression, exported, deps)| NodeSpec {
            file,
            name,
            expression,
            exported,
            deps,
        })
}

/// A graph plus the set of definitionless files that still carry a summary.
fn graph_spec() -> impl Strategy<Value = (Vec<NodeSpec>, BTreeSet<usize>)> {
    (
        prop::collection::vec(node_spec(), 0..10),
        prop::collection::btree_set(0..FILES.len(), 0..3),
    )
}

fn summary(file: &str, has_definitions: bool) -> Arc<ModuleSummary> {
    Arc::new(ModuleSummary {
        file_path: file.to_string(),
        imports: Vec::new(),
        exports: Vec::new(),
        resolved: IndexMap::new(),
        top_level: IndexMap::new(),
        exported_ids: Vec::new(),
        has_definitions,
    })
}

fn build((specs, extra_files): &(Vec<NodeSpec>, BTreeSet<usize>)) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for spec in specs {
        let file = FILES[spec.file];
        let id = CanonicalId::new(file, NAMES[spec.name]);
        if graph.contains(&id) {
            continue;
        }
        let summary = summary(file, true);
        graph.insert_summary(summary.clone());
        graph.insert_node(Arc::new(DependencyGraphNode {
            id: id.clone(),
            file_path: file.to_string(),
            local_path: NAMES[spec.name].to_string(),
            is_exported: spec.exported,
            definition: ModuleDefinition {
                canonical_id: id,
                ast_path: NAMES[spec.name].to_string(),
                is_top_level: true,
                is_exported: spec.exported,
                local_binding: Some(NAMES[spec.name].to_string()),
                export_binding: spec.exported.then(|| NAMES[spec.name].to_string()),
                expression: EXPRESSIONS[spec.expression].to_string(),
            },
            dependencies: spec
                .deps
                .iter()
                .map(|(f, n)| CanonicalId::new(FILES[*f], NAMES[*n]))
                .collect(),
            references: Vec::new(),
            module_summary: summary,
        }));
    }
    for file in extra_files {
        if graph.summary(FILES[*file]).is_none() {
            graph.insert_summary(summary(FILES[*file], false));
        }
    }
    graph
}

fn index_matches(graph: &DependencyGraph, index: &GraphIndex) -> bool {
    *index == GraphIndex::from_graph(graph)
        && index
            .files()
            .all(|file| index.ids_in(file).is_some_and(|ids| !ids.is_empty()))
}

proptest! {
    #[test]
    fn apply_diff_reaches_target(g0 in graph_spec(), g1 in graph_spec()) {
        let old = build(&g0);
        let new = build(&g1);
        let patch = diff_graphs(&old, &new);

        let mut graph = old.clone();
        let mut index = GraphIndex::from_graph(&graph);
        apply_patch(&mut graph, &mut index, &patch);

        prop_assert_eq!(&graph, &new);
        prop_assert!(index_matches(&graph, &index));
    }

    #[test]
    fn apply_is_idempotent(g0 in graph_spec(), g1 in graph_spec()) {
        let old = build(&g0);
        let new = build(&g1);
        let patch = diff_graphs(&old, &new);

        let mut graph = old;
        let mut index = GraphIndex::from_graph(&graph);
        apply_patch(&mut graph, &mut index, &patch);
        let once = graph.clone();
        apply_patch(&mut graph, &mut index, &patch);

        prop_assert_eq!(&graph, &once);
        prop_assert!(index_matches(&graph, &index));
    }

    #[test]
    fn self_diff_is_empty(g in graph_spec()) {
        let graph = build(&g);
        prop_assert!(diff_graphs(&graph, &graph).is_empty());
    }

    #[test]
    fn index_stays_consistent_across_patch_sequences(
        steps in prop::collection::vec(graph_spec(), 1..6)
    ) {
        let mut graph = DependencyGraph::new();
        let mut index = GraphIndex::default();
        for step in &steps {
            let target = build(step);
            let patch = diff_graphs(&graph, &target);
            apply_patch(&mut graph, &mut index, &patch);
            prop_assert_eq!(&graph, &target);
            prop_assert!(index_matches(&graph, &index));
        }
    }
}
