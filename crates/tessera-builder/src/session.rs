//! Builder session: full and incremental builds over one workspace.
//!
//! # Architecture
//!
//! A build runs these steps against copies of the committed state:
//!
//! 1. **Discovery**: analyze entry points (full build) or changed files
//!    (incremental), following resolved relative imports to new files.
//! 2. **Graph**: rebuild the dependency graph, diff it against the last one,
//!    and apply the patch to the committed graph and index.
//! 3. **Render**: re-render the chunks of files the patch touched.
//! 4. **Load**: evaluate chunks in dependency order, or reuse the last
//!    evaluation when no chunk changed.
//! 5. **Classify**: register every node's element and freeze the artifact.
//!
//! State is replaced only after every step succeeds, so a failed build
//! leaves the previous artifact in place.

use std::collections::{BTreeSet, VecDeque};
use std::time::Instant;

use indexmap::IndexMap;
use tessera_codegen::{
    order_chunks, render_file_chunk, render_single_chunk, ChunkCache, IntermediateChunk,
};
use tessera_core::resolve::is_relative;
use tessera_core::{
    apply_patch, build_graph, diff_graphs, CandidateResolver, DependencyGraph,
    DependencyGraphPatch, DiagnosticSeverity, FileAnalysis, GraphIndex, ModuleResolver,
};

use crate::analyzer::{Analyzer, StaticAnalyzer};
use crate::artifact::{ArtifactRegistry, BuildWarning, BuilderArtifact, CacheStats};
use crate::classify::classify;
use crate::error::BuilderError;
use crate::loader::{EvaluatedModule, ModuleLoader, RuntimeLoader};
use crate::options::BuilderOptions;

/// Files changed since the last build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub updated: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(mut self, file_path: impl Into<String>) -> Self {
        self.updated.insert(file_path.into());
        self
    }

    pub fn remove(mut self, file_path: impl Into<String>) -> Self {
        self.removed.insert(file_path.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
struct SessionState {
    analyses: IndexMap<String, FileAnalysis>,
    graph: DependencyGraph,
    index: GraphIndex,
    chunks: IndexMap<String, IntermediateChunk>,
    cache: ChunkCache,
    evaluated: Option<EvaluatedModule>,
    artifact: Option<BuilderArtifact>,
}

pub struct BuilderSession<A, R, L> {
    analyzer: A,
    resolver: R,
    loader: L,
    options: BuilderOptions,
    state: SessionState,
}

impl BuilderSession<StaticAnalyzer, CandidateResolver, RuntimeLoader> {
    /// A session over in-memory analyses, resolving against the analyzed
    /// file set with the default `gql` host.
    pub fn in_memory(analyzer: StaticAnalyzer, options: BuilderOptions) -> Self {
        let resolver = CandidateResolver::new(analyzer.files().map(str::to_string))
            .with_candidates(options.candidates());
        BuilderSession::new(analyzer, resolver, RuntimeLoader::default(), options)
    }

    /// Replaces a file's analysis and makes it resolvable.
    pub fn put_file(&mut self, analysis: FileAnalysis) {
        self.resolver.insert(analysis.file_path.clone());
        self.analyzer.insert(analysis);
    }

    /// Forgets a file in both the analyzer and the resolver.
    pub fn drop_file(&mut self, file_path: &str) {
        self.resolver.remove(file_path);
        self.analyzer.remove(file_path);
    }
}

impl<A, R, L> BuilderSession<A, R, L>
where
    A: Analyzer,
    R: ModuleResolver,
    L: ModuleLoader,
{
    pub fn new(analyzer: A, resolver: R, loader: L, options: BuilderOptions) -> Self {
        BuilderSession {
            analyzer,
            resolver,
            loader,
            options,
            state: SessionState::default(),
        }
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    pub fn analyzer_mut(&mut self) -> &mut A {
        &mut self.analyzer
    }

    pub fn resolver_mut(&mut self) -> &mut R {
        &mut self.resolver
    }

    /// The last successfully built graph.
    pub fn graph(&self) -> &DependencyGraph {
        &self.state.graph
    }

    pub fn index(&self) -> &GraphIndex {
        &self.state.index
    }

    /// The last successful artifact, if any build has succeeded.
    pub fn artifact(&self) -> Option<&BuilderArtifact> {
        self.state.artifact.as_ref()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &IntermediateChunk> {
        self.state.chunks.values()
    }

    /// Runs a full build (`None`) or an incremental one.
    ///
    /// An incremental build on a session that has never built falls back to
    /// discovery from the entry points.
    pub fn build(&mut self, changes: Option<&ChangeSet>) -> Result<&BuilderArtifact, BuilderError> {
        let started = Instant::now();
        let incremental = changes.is_some() && self.state.artifact.is_some();
        tracing::info!(
            "{} build started",
            if incremental { "incremental" } else { "full" }
        );

        let analyses = match changes {
            Some(changes) if incremental => self.rediscover(changes)?,
            _ => self.discover()?,
        };
        let mut registry = ArtifactRegistry::new();
        self.collect_diagnostics(&analyses, &mut registry)?;

        let next_graph = build_graph(analyses.values(), &self.resolver)?;
        let patch = diff_graphs(&self.state.graph, &next_graph);
        tracing::debug!(
            "graph patch: {} upserted, {} removed node(s), {} removed module(s)",
            patch.upsert_nodes.len(),
            patch.removed_nodes.len(),
            patch.removed_modules.len()
        );
        let mut graph = self.state.graph.clone();
        let mut index = self.state.index.clone();
        apply_patch(&mut graph, &mut index, &patch);
        debug_assert!(graph.dangling().is_empty());

        let chunks = self.render(&graph, &index, &patch)?;
        let chunk_list: Vec<IntermediateChunk> = chunks.values().cloned().collect();
        let plan = self.state.cache.compute_plan(&chunk_list);
        tracing::info!(
            "chunks: {} dirty, {} dependent, {} cached, {} removed",
            plan.dirty.len(),
            plan.dirty_dependents.len(),
            plan.cached.len(),
            plan.removed.len()
        );

        let evaluated = match &self.state.evaluated {
            Some(previous) if !plan.needs_reload => {
                tracing::debug!("no chunk changed, reusing previous evaluation");
                EvaluatedModule {
                    cache: CacheStats {
                        hits: chunk_list.len(),
                        misses: 0,
                    },
                    ..previous.clone()
                }
            }
            _ => {
                let ordered = order_chunks(&chunk_list);
                self.loader.load(&ordered, self.options.cycle_policy)?
            }
        };

        classify(&graph, &index, &analyses, &evaluated, &mut registry)?;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let artifact = registry.snapshot(evaluated.cache, duration_ms);
        tracing::info!(
            "build finished: {} element(s), {} warning(s) in {}ms",
            artifact.len(),
            artifact.report.warnings.len(),
            duration_ms
        );

        let mut cache = self.state.cache.clone();
        cache.update(&chunk_list);
        self.state = SessionState {
            analyses,
            graph,
            index,
            chunks,
            cache,
            evaluated: Some(evaluated),
            artifact: None,
        };
        let artifact: &BuilderArtifact = self.state.artifact.insert(artifact);
        Ok(artifact)
    }

    /// Analyzes everything reachable from the entry points.
    fn discover(&self) -> Result<IndexMap<String, FileAnalysis>, BuilderError> {
        let mut analyses = IndexMap::new();
        let queue = self.options.entry_points.iter().cloned().collect();
        self.walk(queue, &mut analyses, &BTreeSet::new())?;
        Ok(analyses)
    }

    /// Re-analyzes changed files on top of the committed analyses.
    fn rediscover(&self, changes: &ChangeSet) -> Result<IndexMap<String, FileAnalysis>, BuilderError> {
        let mut analyses = self.state.analyses.clone();
        for removed in &changes.removed {
            analyses.shift_remove(removed);
        }
        let queue = changes
            .updated
            .iter()
            .filter(|path| !changes.removed.contains(*path))
            .cloned()
            .collect();
        self.walk(queue, &mut analyses, &changes.removed)?;
        tracing::debug!(
            "re-analyzed {} file(s), dropped {}",
            changes.updated.len(),
            changes.removed.len()
        );
        Ok(analyses)
    }

    fn walk(
        &self,
        mut queue: VecDeque<String>,
        analyses: &mut IndexMap<String, FileAnalysis>,
        removed: &BTreeSet<String>,
    ) -> Result<(), BuilderError> {
        let mut visited = BTreeSet::new();
        while let Some(path) = queue.pop_front() {
            if !visited.insert(path.clone()) {
                continue;
            }
            let analysis = self.analyzer.analyze(&path)?;
            for specifier in analysis.specifiers() {
                if !is_relative(specifier) {
                    continue;
                }
                if let Some(target) = self.resolver.resolve(&path, specifier) {
                    if !analyses.contains_key(&target)
                        && !removed.contains(&target)
                        && !visited.contains(&target)
                    {
                        queue.push_back(target);
                    }
                }
            }
            analyses.insert(path, analysis);
        }
        Ok(())
    }

    fn collect_diagnostics(
        &self,
        analyses: &IndexMap<String, FileAnalysis>,
        registry: &mut ArtifactRegistry,
    ) -> Result<(), BuilderError> {
        for analysis in analyses.values() {
            let errors: Vec<String> = analysis
                .diagnostics
                .iter()
                .filter(|d| d.severity == DiagnosticSeverity::Error)
                .map(|d| d.message.clone())
                .collect();
            if self.options.fail_on_analyzer_errors && !errors.is_empty() {
                return Err(BuilderError::AnalyzerErrors {
                    file_path: analysis.file_path.clone(),
                    messages: errors,
                });
            }
            for diagnostic in &analysis.diagnostics {
                let code = match diagnostic.severity {
                    DiagnosticSeverity::Error => "ANALYZER_ERROR",
                    DiagnosticSeverity::Warning => "ANALYZER_WARNING",
                };
                let message = match &diagnostic.location {
                    Some(location) => format!("{} ({location})", diagnostic.message),
                    None => diagnostic.message.clone(),
                };
                registry.warn(BuildWarning {
                    code: code.to_string(),
                    message,
                    file_path: Some(analysis.file_path.clone()),
                });
            }
        }
        Ok(())
    }

    fn render(
        &self,
        graph: &DependencyGraph,
        index: &GraphIndex,
        patch: &DependencyGraphPatch,
    ) -> Result<IndexMap<String, IntermediateChunk>, BuilderError> {
        if !self.options.chunked {
            let chunk = render_single_chunk(graph)?;
            return Ok(IndexMap::from([(chunk.id.clone(), chunk)]));
        }

        let files = graph.files();
        let touched = patch.touched_files();
        let mut chunks: IndexMap<String, IntermediateChunk> = self
            .state
            .chunks
            .iter()
            .filter(|(id, _)| files.contains(*id))
            .map(|(id, chunk)| (id.clone(), chunk.clone()))
            .collect();

        let mut rendered = 0usize;
        for file in &files {
            let stale = match chunks.get(file) {
                None => true,
                Some(chunk) => {
                    touched.contains(file)
                        || chunk.requires.iter().any(|r| touched.contains(r))
                        || graph
                            .summary(file)
                            .is_some_and(|s| s.resolved_files().any(|r| touched.contains(r)))
                }
            };
            if stale {
                chunks.insert(file.clone(), render_file_chunk(graph, index, file)?);
                rendered += 1;
            }
        }
        chunks.sort_keys();
        tracing::debug!("rendered {} of {} chunk(s)", rendered, chunks.len());
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::AnalysisBuilder;

    fn user(typename: &str) -> FileAnalysis {
        let mut b = AnalysisBuilder::new("/src/user.ts");
        b.export_named("userFragment", "userFragment");
        b.top_level(
            "userFragment",
            &format!("gql.default(({{ fragment }}) => fragment.{typename}({{}}))"),
        )
        .unwrap();
        b.finish()
    }

    fn session(files: Vec<FileAnalysis>, entry: &str) -> BuilderSession<StaticAnalyzer, CandidateResolver, RuntimeLoader> {
        let options = BuilderOptions {
            entry_points: vec![entry.to_string()],
            ..BuilderOptions::default()
        };
        BuilderSession::in_memory(files.into_iter().collect(), options)
    }

    #[test]
    fn change_set_builder() {
        let changes = ChangeSet::new().update("/src/a.ts").remove("/src/b.ts");
        assert!(!changes.is_empty());
        assert!(changes.updated.contains("/src/a.ts"));
        assert!(changes.removed.contains("/src/b.ts"));
    }

    #[test]
    fn unchanged_rebuild_reuses_evaluation() {
        let mut session = session(vec![user("User")], "/src/user.ts");
        session.build(None).unwrap();
        let artifact = session.build(Some(&ChangeSet::new())).unwrap();
        assert_eq!(artifact.report.cache, CacheStats { hits: 1, misses: 0 });
        assert_eq!(artifact.len(), 1);
    }

    #[test]
    fn analyzer_diagnostics_become_warnings() {
        let mut b = AnalysisBuilder::new("/src/user.ts");
        b.diagnostic(DiagnosticSeverity::Error, "unsupported syntax");
        let mut session = session(vec![b.finish()], "/src/user.ts");
        let artifact = session.build(None).unwrap();
        assert_eq!(artifact.report.warnings.len(), 1);
        assert_eq!(artifact.report.warnings[0].code, "ANALYZER_ERROR");
        assert_eq!(artifact.report.warnings[0].file_path.as_deref(), Some("/src/user.ts"));
    }

    #[test]
    fn analyzer_errors_can_be_fatal() {
        let mut b = AnalysisBuilder::new("/src/user.ts");
        b.diagnostic(DiagnosticSeverity::Error, "unsupported syntax");
        let options = BuilderOptions {
            entry_points: vec!["/src/user.ts".to_string()],
            fail_on_analyzer_errors: true,
            ..BuilderOptions::default()
        };
        let mut session = BuilderSession::in_memory([b.finish()].into_iter().collect(), options);
        let err = session.build(None).unwrap_err();
        assert_eq!(err.code(), "ANALYZER_ERRORS");
        assert!(session.artifact().is_none());
    }

    #[test]
    fn single_chunk_mode_emits_one_chunk() {
        let options = BuilderOptions {
            entry_points: vec!["/src/user.ts".to_string()],
            chunked: false,
            ..BuilderOptions::default()
        };
        let mut session = BuilderSession::in_memory([user("User")].into_iter().collect(), options);
        session.build(None).unwrap();
        let ids: Vec<&str> = session.chunks().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![tessera_codegen::SINGLE_CHUNK_ID]);
    }
}
