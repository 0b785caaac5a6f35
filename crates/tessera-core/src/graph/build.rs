//! Graph construction from per-file analyses.
//!
//! Each definition's expression is parsed once and scanned for free
//! references. A reference becomes an edge when its root names a sibling
//! top-level definition, or an import binding whose source module exports a
//! definition under the imported name (following re-exports). Globals and
//! bare package imports produce no edges.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::{smallvec, SmallVec};

use super::{DependencyGraph, DependencyGraphNode, ModuleSummary, SymbolReference};
use crate::analysis::{FileAnalysis, ImportKind, ModuleExport};
use crate::error::GraphError;
use crate::id::CanonicalId;
use crate::resolve::{is_relative, ModuleResolver};
use crate::syntax::{free_references, parse_expression};

/// Builds the summary of one analysis.
pub fn summarize<R: ModuleResolver + ?Sized>(analysis: &FileAnalysis, resolver: &R) -> ModuleSummary {
    let mut resolved = IndexMap::new();
    for specifier in analysis.specifiers() {
        if is_relative(specifier) {
            resolved.insert(
                specifier.to_string(),
                resolver.resolve(&analysis.file_path, specifier),
            );
        }
    }
    let mut top_level = IndexMap::new();
    for def in &analysis.definitions {
        if let Some(local) = def.binding() {
            top_level
                .entry(local.to_string())
                .or_insert_with(|| def.canonical_id.clone());
        }
    }
    let exported_ids = analysis
        .definitions
        .iter()
        .filter(|def| def.is_top_level && def.is_exported)
        .map(|def| def.canonical_id.clone())
        .collect();
    ModuleSummary {
        file_path: analysis.file_path.clone(),
        imports: analysis.imports.clone(),
        exports: analysis.exports.clone(),
        resolved,
        top_level,
        exported_ids,
        has_definitions: analysis.has_definitions(),
    }
}

/// Builds the full graph. `analyses` order determines node order.
pub fn build_graph<'a, I, R>(analyses: I, resolver: &R) -> Result<DependencyGraph, GraphError>
where
    I: IntoIterator<Item = &'a FileAnalysis>,
    R: ModuleResolver + ?Sized,
{
    let analyses: Vec<&FileAnalysis> = analyses.into_iter().collect();
    let mut summaries: IndexMap<String, Arc<ModuleSummary>> = IndexMap::new();
    for analysis in &analyses {
        analysis.validate()?;
        summaries.insert(
            analysis.file_path.clone(),
            Arc::new(summarize(analysis, resolver)),
        );
    }

    let linker = Linker {
        summaries: &summaries,
    };
    let mut graph = DependencyGraph::new();
    for analysis in &analyses {
        let summary = &summaries[analysis.file_path.as_str()];
        graph.insert_summary(summary.clone());
        for def in &analysis.definitions {
            let expr = parse_expression(&def.expression).map_err(|source| GraphError::Syntax {
                id: def.canonical_id.clone(),
                source,
            })?;
            let mut references: Vec<SymbolReference> = Vec::new();
            let mut dependencies: Vec<CanonicalId> = Vec::new();
            for reference in free_references(&expr) {
                let Some(link) = linker.link(summary, &reference.path)? else {
                    continue;
                };
                if link.target == def.canonical_id {
                    continue;
                }
                if !dependencies.contains(&link.target) {
                    dependencies.push(link.target.clone());
                }
                if !references.iter().any(|r| r.path == link.path) {
                    references.push(link);
                }
            }
            graph.insert_node(Arc::new(DependencyGraphNode {
                id: def.canonical_id.clone(),
                file_path: analysis.file_path.clone(),
                local_path: def.ast_path.clone(),
                is_exported: def.is_exported,
                definition: def.clone(),
                dependencies,
                references,
                module_summary: summary.clone(),
            }));
        }
    }
    Ok(graph)
}

struct Linker<'a> {
    summaries: &'a IndexMap<String, Arc<ModuleSummary>>,
}

impl Linker<'_> {
    /// Resolves one free reference path to a dependency, if it names one.
    fn link(
        &self,
        summary: &ModuleSummary,
        path: &[String],
    ) -> Result<Option<SymbolReference>, GraphError> {
        let root = path[0].as_str();
        if let Some(target) = summary.top_level.get(root) {
            return Ok(Some(SymbolReference {
                path: smallvec![root.to_string()],
                target: target.clone(),
            }));
        }
        let Some(import) = summary.imports.iter().find(|import| import.local == root) else {
            return Ok(None);
        };
        let Some(source_file) = self.source_file(summary, &import.source)? else {
            return Ok(None);
        };
        let (imported, ref_path): (&str, SmallVec<[String; 2]>) = match import.kind {
            ImportKind::Named | ImportKind::Default => {
                (import.imported.as_str(), smallvec![root.to_string()])
            }
            ImportKind::Namespace => match path.get(1) {
                Some(member) => (member.as_str(), smallvec![root.to_string(), member.clone()]),
                None => return Ok(None),
            },
        };
        let mut visited = HashSet::new();
        match self.resolve_export(&source_file, imported, &mut visited)? {
            Some(target) => Ok(Some(SymbolReference {
                path: ref_path,
                target,
            })),
            // The module is analyzed but exports no definition under that name.
            None => Err(GraphError::MissingImport {
                importer: summary.file_path.clone(),
                specifier: import.source.clone(),
            }),
        }
    }

    /// The analyzed file a specifier points at. Bare specifiers yield `None`;
    /// unresolved relative ones are an error.
    fn source_file(&self, summary: &ModuleSummary, specifier: &str) -> Result<Option<String>, GraphError> {
        if !is_relative(specifier) {
            return Ok(None);
        }
        match summary.resolved.get(specifier).cloned().flatten() {
            Some(path) if self.summaries.contains_key(&path) => Ok(Some(path)),
            _ => Err(GraphError::MissingImport {
                importer: summary.file_path.clone(),
                specifier: specifier.to_string(),
            }),
        }
    }

    /// Follows `file`'s exports to the definition exported as `name`.
    fn resolve_export(
        &self,
        file: &str,
        name: &str,
        visited: &mut HashSet<(String, String)>,
    ) -> Result<Option<CanonicalId>, GraphError> {
        if !visited.insert((file.to_string(), name.to_string())) {
            return Ok(None);
        }
        let Some(summary) = self.summaries.get(file) else {
            return Ok(None);
        };
        for export in &summary.exports {
            match export {
                ModuleExport::Named { exported, local } if exported == name => {
                    if let Some(id) = summary.top_level.get(local) {
                        return Ok(Some(id.clone()));
                    }
                    // `import { x } from "./y"; export { x };`
                    let Some(import) = summary
                        .imports
                        .iter()
                        .find(|import| &import.local == local && import.kind != ImportKind::Namespace)
                    else {
                        return Ok(None);
                    };
                    return match self.source_file(summary, &import.source)? {
                        Some(next) => self.resolve_export(&next, &import.imported, visited),
                        None => Ok(None),
                    };
                }
                ModuleExport::Reexport {
                    exported,
                    source,
                    imported,
                } if exported == name => {
                    return match self.source_file(summary, source)? {
                        Some(next) => self.resolve_export(&next, imported, visited),
                        None => Ok(None),
                    };
                }
                ModuleExport::ReexportAll { source } if name != "default" => {
                    if let Some(next) = self.source_file(summary, source)? {
                        if let Some(id) = self.resolve_export(&next, name, visited)? {
                            return Ok(Some(id));
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisBuilder;
    use crate::resolve::CandidateResolver;

    fn user() -> FileAnalysis {
        let mut b = AnalysisBuilder::new("/src/user.ts");
        b.export_named("userFragment", "userFragment");
        b.top_level(
            "userFragment",
            "gql.default(({ fragment }) => fragment.User({}, ({ f }) => ({ ...f.id() })))",
        )
        .unwrap();
        b.finish()
    }

    fn profile(import_source: &str) -> FileAnalysis {
        let mut b = AnalysisBuilder::new("/src/profile.query.ts");
        b.import_named(import_source, "userFragment", "userFragment");
        b.export_named("profileQuery", "profileQuery");
        b.top_level(
            "profileQuery",
            "gql.default(({ query }) => query.operation({ name: \"ProfilePageQuery\", fields: () => ({ ...userFragment.spread() }) }))",
        )
        .unwrap();
        b.finish()
    }

    fn resolver() -> CandidateResolver {
        CandidateResolver::new(["/src/user.ts", "/src/profile.query.ts", "/src/index.ts", "/src/barrel.ts"])
    }

    #[test]
    fn links_named_imports() {
        let analyses = [user(), profile("./user")];
        let graph = build_graph(&analyses, &resolver()).unwrap();

        let query = graph
            .get(&CanonicalId::new("/src/profile.query.ts", "profileQuery"))
            .unwrap();
        assert_eq!(
            query.dependencies,
            vec![CanonicalId::new("/src/user.ts", "userFragment")]
        );
        assert_eq!(query.references[0].path.as_slice(), ["userFragment".to_string()]);
        assert!(graph.dangling().is_empty());
    }

    #[test]
    fn links_sibling_definitions_and_skips_globals() {
        let mut b = AnalysisBuilder::new("/src/a.ts");
        b.top_level("base", "gql.default(() => 1)").unwrap();
        b.top_level("derived", "gql.default(() => [base, other, console.log])").unwrap();
        let analysis = b.finish();
        let graph = build_graph([&analysis], &resolver()).unwrap();
        let derived = graph.get(&CanonicalId::new("/src/a.ts", "derived")).unwrap();
        assert_eq!(derived.dependencies, vec![CanonicalId::new("/src/a.ts", "base")]);
    }

    #[test]
    fn shadowed_names_are_not_edges() {
        let mut b = AnalysisBuilder::new("/src/a.ts");
        b.top_level("base", "1").unwrap();
        b.top_level("derived", "((base) => base)(2)").unwrap();
        let analysis = b.finish();
        let graph = build_graph([&analysis], &resolver()).unwrap();
        let derived = graph.get(&CanonicalId::new("/src/a.ts", "derived")).unwrap();
        assert!(derived.dependencies.is_empty());
    }

    #[test]
    fn namespace_imports_link_members() {
        let mut b = AnalysisBuilder::new("/src/profile.query.ts");
        b.import_namespace("./user", "users");
        b.top_level("q", "gql.default(() => users.userFragment.spread())").unwrap();
        let analyses = [user(), b.finish()];
        let graph = build_graph(&analyses, &resolver()).unwrap();
        let q = graph.get(&CanonicalId::new("/src/profile.query.ts", "q")).unwrap();
        assert_eq!(q.dependencies, vec![CanonicalId::new("/src/user.ts", "userFragment")]);
        assert_eq!(
            q.references[0].path.as_slice(),
            ["users".to_string(), "userFragment".to_string()]
        );
    }

    #[test]
    fn follows_reexports() {
        let mut index = AnalysisBuilder::new("/src/index.ts");
        index.reexport_all("./barrel");
        let mut barrel = AnalysisBuilder::new("/src/barrel.ts");
        barrel.reexport("./user", "userFragment", "userFragment");
        let analyses = [user(), index.finish(), barrel.finish(), profile("./index")];
        let graph = build_graph(&analyses, &resolver()).unwrap();
        let query = graph
            .get(&CanonicalId::new("/src/profile.query.ts", "profileQuery"))
            .unwrap();
        assert_eq!(
            query.dependencies,
            vec![CanonicalId::new("/src/user.ts", "userFragment")]
        );
    }

    #[test]
    fn reexport_cycles_terminate_without_a_target() {
        let mut a = AnalysisBuilder::new("/src/index.ts");
        a.reexport_all("./barrel");
        let mut b = AnalysisBuilder::new("/src/barrel.ts");
        b.reexport_all("./index");
        let analyses = [a.finish(), b.finish(), profile("./index")];
        assert_eq!(
            build_graph(&analyses, &resolver()).unwrap_err(),
            GraphError::MissingImport {
                importer: "/src/profile.query.ts".into(),
                specifier: "./index".into(),
            }
        );
    }

    #[test]
    fn import_of_unexported_name_is_missing() {
        let mut b = AnalysisBuilder::new("/src/profile.query.ts");
        b.import_named("./user", "typoFragment", "typoFragment");
        b.top_level(
            "profileQuery",
            "gql.default(({ query }) => query.operation({ name: \"P\", uses: [typoFragment] }))",
        )
        .unwrap();
        let analyses = [user(), b.finish()];
        assert_eq!(
            build_graph(&analyses, &resolver()).unwrap_err(),
            GraphError::MissingImport {
                importer: "/src/profile.query.ts".into(),
                specifier: "./user".into(),
            }
        );
    }

    #[test]
    fn namespace_member_without_export_is_missing() {
        let mut b = AnalysisBuilder::new("/src/profile.query.ts");
        b.import_namespace("./user", "users");
        b.top_level("q", "gql.default(() => users.nothing)").unwrap();
        let analyses = [user(), b.finish()];
        assert!(matches!(
            build_graph(&analyses, &resolver()),
            Err(GraphError::MissingImport { .. })
        ));
    }

    /// `$` is an identifier character, not only the duplicate-suffix marker.
    fn dollar_binding_graph(binding: &str) -> DependencyGraph {
        let mut user = AnalysisBuilder::new("/src/user.ts");
        user.export_named(binding, binding);
        user.top_level(binding, "gql.default(({ fragment }) => fragment.User({}))")
            .unwrap();
        let mut query = AnalysisBuilder::new("/src/profile.query.ts");
        query.import_named("./user", binding, binding);
        query
            .top_level(
                "profileQuery",
                &format!("gql.default(({{ query }}) => query.operation({{ name: \"P\", uses: [{binding}] }}))"),
            )
            .unwrap();
        let analyses = [user.finish(), query.finish()];
        build_graph(&analyses, &resolver()).unwrap()
    }

    #[test]
    fn links_leading_dollar_bindings() {
        let graph = dollar_binding_graph("$userFragment");
        let query = graph
            .get(&CanonicalId::new("/src/profile.query.ts", "profileQuery"))
            .unwrap();
        assert_eq!(
            query.dependencies,
            vec![CanonicalId::new("/src/user.ts", "$userFragment")]
        );
    }

    #[test]
    fn links_inner_dollar_bindings() {
        let graph = dollar_binding_graph("user$Fragment");
        let query = graph
            .get(&CanonicalId::new("/src/profile.query.ts", "profileQuery"))
            .unwrap();
        assert_eq!(
            query.dependencies,
            vec![CanonicalId::new("/src/user.ts", "user$Fragment")]
        );
        assert!(graph
            .get(&CanonicalId::new("/src/user.ts", "user$Fragment"))
            .unwrap()
            .is_exported);
    }

    #[test]
    fn dollar_sibling_resolves_within_the_file() {
        let mut b = AnalysisBuilder::new("/src/a.ts");
        b.top_level("$base", "gql.default(({ model }) => model.Base({}))").unwrap();
        b.top_level("derived", "gql.default(() => [$base])").unwrap();
        let analysis = b.finish();
        let graph = build_graph([&analysis], &resolver()).unwrap();
        let derived = graph.get(&CanonicalId::new("/src/a.ts", "derived")).unwrap();
        assert_eq!(derived.dependencies, vec![CanonicalId::new("/src/a.ts", "$base")]);
    }

    #[test]
    fn unresolved_relative_import_is_missing() {
        let analyses = [profile("./nowhere")];
        let err = build_graph(&analyses, &resolver()).unwrap_err();
        assert_eq!(
            err,
            GraphError::MissingImport {
                importer: "/src/profile.query.ts".into(),
                specifier: "./nowhere".into(),
            }
        );
        assert_eq!(err.code(), "GRAPH_MISSING_IMPORT");
    }

    #[test]
    fn resolved_but_unanalyzed_import_is_missing() {
        // "./user" resolves on disk but user.ts is not part of the analysis set.
        let analyses = [profile("./user")];
        assert!(matches!(
            build_graph(&analyses, &resolver()),
            Err(GraphError::MissingImport { .. })
        ));
    }

    #[test]
    fn unused_unresolved_imports_are_ignored() {
        let mut b = AnalysisBuilder::new("/src/a.ts");
        b.import_named("./nowhere", "thing", "thing");
        b.import_named("graphql", "parse", "parse");
        b.top_level("a", "gql.default(() => parse)").unwrap();
        let analysis = b.finish();
        let graph = build_graph([&analysis], &resolver()).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(
            graph.summary("/src/a.ts").unwrap().resolved.get("./nowhere"),
            Some(&None)
        );
    }

    #[test]
    fn unparsable_expression_fails() {
        let mut b = AnalysisBuilder::new("/src/a.ts");
        b.top_level("a", "gql.default(() => )").unwrap();
        let analysis = b.finish();
        let err = build_graph([&analysis], &resolver()).unwrap_err();
        assert_eq!(err.code(), "TRANSFORM_FAILED");
    }

    #[test]
    fn files_without_definitions_keep_a_summary() {
        let mut b = AnalysisBuilder::new("/src/index.ts");
        b.reexport_all("./user");
        let analyses = [user(), b.finish()];
        let graph = build_graph(&analyses, &resolver()).unwrap();
        let summary = graph.summary("/src/index.ts").unwrap();
        assert!(!summary.has_definitions);
        assert_eq!(summary.resolved_files().collect::<Vec<_>>(), vec!["/src/user.ts"]);
    }
}
