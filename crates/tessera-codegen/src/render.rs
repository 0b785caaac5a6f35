//! Intermediate module rendering.
//!
//! Every definition expression is reparsed, its dependency references are
//! replaced with `all["<id>"]` lookups, and the result is printed in
//! canonical form. A chunk collects the rendered definitions of one file:
//!
//! ```text
//! // tessera intermediate chunk
//! // source: /src/profile.query.ts
//! // requires: ["/src/user.ts"]
//! const all = {
//!   "/src/profile.query.ts::profileQuery": (...),
//! };
//! export const { models, slices, operations, fragments } = evaluate(all);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tessera_core::hash::content_hash;
use tessera_core::syntax::printer::quote;
use tessera_core::syntax::{parse_expression, print_expression_at, rewrite_references, Expr};
use tessera_core::{CanonicalId, DependencyGraph, DependencyGraphNode, GraphIndex};

use crate::error::CodegenError;

/// Name of the lookup table in emitted chunks.
pub const ALL_BINDING: &str = "all";
/// Chunk id used when everything is emitted as one module.
pub const SINGLE_CHUNK_ID: &str = "tessera:all";

pub(crate) const HEADER: &str = "// tessera intermediate chunk";
pub(crate) const SOURCE_PREFIX: &str = "// source: ";
pub(crate) const REQUIRES_PREFIX: &str = "// requires: ";
pub(crate) const BODY_PREFIX: &str = "const all = ";
pub(crate) const EXPORT_LINE: &str =
    "export const { models, slices, operations, fragments } = evaluate(all);";

const ENTRY_INDENT: usize = 2;

/// One emitted intermediate module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntermediateChunk {
    /// Source file path, or [`SINGLE_CHUNK_ID`].
    pub id: String,
    /// Chunks this one must be evaluated after.
    pub requires: Vec<String>,
    /// Definitions in evaluation order.
    pub entries: Vec<CanonicalId>,
    pub text: String,
    /// blake3 of `text`.
    pub hash: String,
}

impl IntermediateChunk {
    pub fn has_definitions(&self) -> bool {
        !self.entries.is_empty()
    }
}

/// Renders one node's expression with dependency references rewritten.
pub fn render_definition(node: &DependencyGraphNode) -> Result<String, CodegenError> {
    let expr = parse_expression(&node.definition.expression).map_err(|source| {
        CodegenError::Transform {
            id: node.id.to_string(),
            source,
        }
    })?;
    let references = &node.references;
    let rewritten = rewrite_references(expr, |path| {
        references
            .iter()
            .find(|r| r.path.iter().map(String::as_str).eq(path.iter().copied()))
            .map(|r| Expr::index(Expr::ident(ALL_BINDING), r.target.as_str()))
    });
    Ok(print_expression_at(&rewritten, ENTRY_INDENT))
}

/// Renders the chunk for `file`.
///
/// Files known only through a summary still get a chunk without entries so
/// that their import edges take part in evaluation order.
pub fn render_file_chunk(
    graph: &DependencyGraph,
    index: &GraphIndex,
    file: &str,
) -> Result<IntermediateChunk, CodegenError> {
    let nodes: Vec<&Arc<DependencyGraphNode>> = index
        .ids_in(file)
        .into_iter()
        .flatten()
        .filter_map(|id| graph.get(id))
        .collect();
    let ordered = order_definitions(&nodes)?;

    let mut requires = BTreeSet::new();
    for node in &nodes {
        for dep in &node.dependencies {
            if dep.file_path() != file {
                requires.insert(dep.file_path().to_string());
            }
        }
    }
    if let Some(summary) = graph.summary(file) {
        for resolved in summary.resolved_files() {
            if resolved != file && graph.summary(resolved).is_some() {
                requires.insert(resolved.to_string());
            }
        }
    }

    let mut entries = Vec::with_capacity(ordered.len());
    for node in ordered {
        entries.push((node.id.clone(), render_definition(node)?));
    }
    Ok(assemble(file, requires.into_iter().collect(), entries))
}

/// Renders one chunk per file known to the graph, in path order.
pub fn render_chunks(
    graph: &DependencyGraph,
    index: &GraphIndex,
) -> Result<Vec<IntermediateChunk>, CodegenError> {
    graph
        .files()
        .iter()
        .map(|file| render_file_chunk(graph, index, file))
        .collect()
}

/// Renders the whole graph as a single chunk in dependency order.
pub fn render_single_chunk(graph: &DependencyGraph) -> Result<IntermediateChunk, CodegenError> {
    let order = graph.topological_order()?;
    let mut entries = Vec::with_capacity(order.len());
    for id in order {
        if let Some(node) = graph.get(&id) {
            entries.push((id, render_definition(node)?));
        }
    }
    Ok(assemble(SINGLE_CHUNK_ID, Vec::new(), entries))
}

fn assemble(
    id: &str,
    requires: Vec<String>,
    entries: Vec<(CanonicalId, String)>,
) -> IntermediateChunk {
    let mut text = String::new();
    text.push_str(HEADER);
    text.push('\n');
    text.push_str(SOURCE_PREFIX);
    text.push_str(id);
    text.push('\n');
    text.push_str(REQUIRES_PREFIX);
    let quoted: Vec<String> = requires.iter().map(|r| quote(r)).collect();
    text.push('[');
    text.push_str(&quoted.join(", "));
    text.push_str("]\n");
    text.push_str(BODY_PREFIX);
    if entries.is_empty() {
        text.push_str("{};\n");
    } else {
        text.push_str("{\n");
        for (entry_id, rendered) in &entries {
            text.push_str("  ");
            text.push_str(&quote(entry_id.as_str()));
            text.push_str(": (");
            text.push_str(rendered);
            text.push_str("),\n");
        }
        text.push_str("};\n");
    }
    text.push_str(EXPORT_LINE);
    text.push('\n');

    IntermediateChunk {
        id: id.to_string(),
        requires,
        entries: entries.into_iter().map(|(id, _)| id).collect(),
        hash: content_hash(text.as_bytes()),
        text,
    }
}

/// Orders one file's definitions so that every intra-file dependency comes
/// first. Ties break by canonical id, independent of graph insertion order.
fn order_definitions<'a>(
    nodes: &[&'a Arc<DependencyGraphNode>],
) -> Result<Vec<&'a Arc<DependencyGraphNode>>, CodegenError> {
    let local: BTreeMap<&CanonicalId, &'a Arc<DependencyGraphNode>> =
        nodes.iter().map(|node| (&node.id, *node)).collect();
    let mut pending: BTreeMap<&CanonicalId, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&CanonicalId, Vec<&CanonicalId>> = BTreeMap::new();
    for (id, node) in &local {
        let mut count = 0;
        for dep in &node.dependencies {
            if let Some((dep_id, _)) = local.get_key_value(dep) {
                count += 1;
                dependents.entry(*dep_id).or_default().push(*id);
            }
        }
        pending.insert(*id, count);
    }

    let mut ready: BTreeSet<&CanonicalId> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut ordered = Vec::with_capacity(local.len());
    while let Some(id) = ready.pop_first() {
        ordered.push(local[id]);
        for dependent in dependents.get(id).into_iter().flatten() {
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if ordered.len() < local.len() {
        let placed: BTreeSet<&CanonicalId> = ordered.iter().map(|node| &node.id).collect();
        return Err(CodegenError::CircularDefinition {
            chain: cycle_chain(&local, &placed),
        });
    }
    Ok(ordered)
}

/// Walks unplaced nodes along unplaced dependencies until one repeats.
fn cycle_chain(
    local: &BTreeMap<&CanonicalId, &Arc<DependencyGraphNode>>,
    placed: &BTreeSet<&CanonicalId>,
) -> Vec<String> {
    let Some(start) = local.keys().find(|id| !placed.contains(**id)) else {
        return Vec::new();
    };
    let mut path: Vec<&CanonicalId> = vec![*start];
    let mut current = *start;
    loop {
        let next = local[current]
            .dependencies
            .iter()
            .find(|dep| local.contains_key(dep) && !placed.contains(dep));
        let Some(next) = next else {
            break;
        };
        if let Some(position) = path.iter().position(|id| *id == next) {
            let mut chain: Vec<String> = path[position..].iter().map(|id| id.to_string()).collect();
            chain.push(next.to_string());
            return chain;
        }
        path.push(next);
        current = next;
    }
    path.iter().map(|id| id.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::analysis::AnalysisBuilder;
    use tessera_core::{build_graph, CandidateResolver, FileAnalysis};

    fn user() -> FileAnalysis {
        let mut b = AnalysisBuilder::new("/src/user.ts");
        b.export_named("userFragment", "userFragment");
        b.top_level("userFragment", "gql.default(({ fragment }) => fragment.User({}))")
            .unwrap();
        b.finish()
    }

    fn profile() -> FileAnalysis {
        let mut b = AnalysisBuilder::new("/src/profile.query.ts");
        b.import_named("./user", "userFragment", "userFragment");
        b.top_level(
            "profileQuery",
            "gql.default(({ query }) => query.operation({ name: \"ProfilePageQuery\", fields: () => ({ ...userFragment.spread() }) }))",
        )
        .unwrap();
        b.finish()
    }

    fn graph_of(analyses: &[FileAnalysis]) -> (DependencyGraph, GraphIndex) {
        let resolver = CandidateResolver::new(analyses.iter().map(|a| a.file_path.clone()));
        let graph = build_graph(analyses, &resolver).unwrap();
        let index = GraphIndex::from_graph(&graph);
        (graph, index)
    }

    #[test]
    fn rewrites_imported_reference_to_lookup() {
        let (graph, index) = graph_of(&[user(), profile()]);
        let chunk = render_file_chunk(&graph, &index, "/src/profile.query.ts").unwrap();
        insta::assert_snapshot!(chunk.text, @r#"
        // tessera intermediate chunk
        // source: /src/profile.query.ts
        // requires: ["/src/user.ts"]
        const all = {
          "/src/profile.query.ts::profileQuery": (gql.default(({ query }) => query.operation({
            name: "ProfilePageQuery",
            fields: () => ({ ...all["/src/user.ts::userFragment"].spread() }),
          }))),
        };
        export const { models, slices, operations, fragments } = evaluate(all);
        "#);
        assert_eq!(chunk.requires, vec!["/src/user.ts".to_string()]);
    }

    #[test]
    fn shadowed_names_are_left_alone() {
        let mut b = AnalysisBuilder::new("/src/a.ts");
        b.top_level("base", "1").unwrap();
        b.top_level("derived", "[base, ((base) => base)(2)]").unwrap();
        let (graph, _) = graph_of(&[b.finish()]);
        let node = graph.get(&CanonicalId::new("/src/a.ts", "derived")).unwrap();
        assert_eq!(
            render_definition(node).unwrap(),
            "[all[\"/src/a.ts::base\"], ((base) => base)(2)]"
        );
    }

    #[test]
    fn entries_follow_intra_file_dependencies() {
        let mut b = AnalysisBuilder::new("/src/a.ts");
        b.top_level("zeta", "1").unwrap();
        b.top_level("alpha", "zeta + 1").unwrap();
        let (graph, index) = graph_of(&[b.finish()]);
        let chunk = render_file_chunk(&graph, &index, "/src/a.ts").unwrap();
        assert_eq!(
            chunk.entries,
            vec![
                CanonicalId::new("/src/a.ts", "zeta"),
                CanonicalId::new("/src/a.ts", "alpha")
            ]
        );
    }

    #[test]
    fn intra_file_cycle_is_fatal() {
        let mut b = AnalysisBuilder::new("/src/a.ts");
        b.top_level("a", "[b]").unwrap();
        b.top_level("b", "[a]").unwrap();
        let (graph, index) = graph_of(&[b.finish()]);
        let err = render_file_chunk(&graph, &index, "/src/a.ts").unwrap_err();
        assert_eq!(err.code(), "GRAPH_CIRCULAR_DEPENDENCY");
        assert_eq!(err.to_string(), "circular dependency: /src/a.ts::a -> /src/a.ts::b -> /src/a.ts::a");
    }

    #[test]
    fn definitionless_file_gets_an_empty_chunk() {
        let mut barrel = AnalysisBuilder::new("/src/index.ts");
        barrel.reexport_all("./user");
        let (graph, index) = graph_of(&[user(), barrel.finish()]);
        let chunk = render_file_chunk(&graph, &index, "/src/index.ts").unwrap();
        assert!(!chunk.has_definitions());
        assert_eq!(chunk.requires, vec!["/src/user.ts".to_string()]);
        assert!(chunk.text.contains("const all = {};"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let (graph, index) = graph_of(&[user(), profile()]);
        let first = render_chunks(&graph, &index).unwrap();
        let second = render_chunks(&graph, &index).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_ne!(first[0].hash, first[1].hash);
    }

    #[test]
    fn single_chunk_orders_dependencies_first() {
        let (graph, _) = graph_of(&[profile(), user()]);
        let chunk = render_single_chunk(&graph).unwrap();
        assert_eq!(chunk.id, SINGLE_CHUNK_ID);
        assert_eq!(
            chunk.entries,
            vec![
                CanonicalId::new("/src/user.ts", "userFragment"),
                CanonicalId::new("/src/profile.query.ts", "profileQuery")
            ]
        );
    }
}
