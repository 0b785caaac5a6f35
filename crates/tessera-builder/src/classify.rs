//! Matching evaluated values back to graph nodes.
//!
//! Kind is decided by id membership, checked in priority order: model,
//! slice, operation, fragment. [`classify`] walks the graph;
//! [`aggregate`] walks analyses directly for callers that evaluated
//! elements elsewhere.

use indexmap::IndexMap;
use tessera_check::ElementKind;
use tessera_core::{DependencyGraph, FileAnalysis, GraphIndex};

use crate::artifact::{ArtifactMetadata, ArtifactRegistry, BuildWarning, BuilderArtifact};
use crate::error::BuilderError;
use crate::loader::EvaluatedModule;

/// Registers every graph node's evaluated element into `registry`.
///
/// Files are visited in path order and ids in canonical order, so the
/// artifact does not depend on graph insertion order.
pub fn classify(
    graph: &DependencyGraph,
    index: &GraphIndex,
    analyses: &IndexMap<String, FileAnalysis>,
    evaluated: &EvaluatedModule,
    registry: &mut ArtifactRegistry,
) -> Result<(), BuilderError> {
    for file in index.files() {
        let content_hash = analyses
            .get(file)
            .map(|a| a.signature.clone())
            .unwrap_or_default();
        for id in index.ids_in(file).into_iter().flatten() {
            if graph.get(id).is_none() {
                continue;
            }
            let metadata = ArtifactMetadata {
                source_path: file.to_string(),
                content_hash: content_hash.clone(),
            };
            register(id.as_str(), file, evaluated, registry, metadata)?;
        }
    }
    record_issues(evaluated, registry);
    Ok(())
}

/// Builds an artifact from analyses and already-evaluated elements.
pub fn aggregate<'a, I>(analyses: I, evaluated: &EvaluatedModule) -> Result<BuilderArtifact, BuilderError>
where
    I: IntoIterator<Item = &'a FileAnalysis>,
{
    let mut registry = ArtifactRegistry::new();
    for analysis in analyses {
        for def in &analysis.definitions {
            let metadata = ArtifactMetadata {
                source_path: analysis.file_path.clone(),
                content_hash: analysis.signature.clone(),
            };
            register(
                def.canonical_id.as_str(),
                &analysis.file_path,
                evaluated,
                &mut registry,
                metadata,
            )?;
        }
    }
    record_issues(evaluated, &mut registry);
    Ok(registry.snapshot(evaluated.cache, 0))
}

fn register(
    id: &str,
    file: &str,
    evaluated: &EvaluatedModule,
    registry: &mut ArtifactRegistry,
    metadata: ArtifactMetadata,
) -> Result<(), BuilderError> {
    let kind = ElementKind::ALL.into_iter().find(|kind| match kind {
        ElementKind::Model => evaluated.models.contains_key(id),
        ElementKind::Slice => evaluated.slices.contains_key(id),
        ElementKind::Operation => evaluated.operations.contains_key(id),
        ElementKind::Fragment => evaluated.fragments.contains_key(id),
    });
    match kind {
        Some(ElementKind::Model) => {
            registry.register_model(id, evaluated.models[id].clone(), metadata)
        }
        Some(ElementKind::Slice) => {
            registry.register_slice(id, evaluated.slices[id].clone(), metadata)
        }
        Some(ElementKind::Operation) => {
            registry.register_operation(id, evaluated.operations[id].clone(), metadata)
        }
        Some(ElementKind::Fragment) => {
            registry.register_fragment(id, evaluated.fragments[id].clone(), metadata)
        }
        None => match evaluated.unknown.get(id) {
            Some(found) => Err(BuilderError::UnknownArtifactKind {
                id: id.to_string(),
                found: found.clone(),
            }),
            None => Err(BuilderError::ArtifactNotFound {
                id: id.to_string(),
                file_path: file.to_string(),
            }),
        },
    }
}

fn record_issues(evaluated: &EvaluatedModule, registry: &mut ArtifactRegistry) {
    for issue in &evaluated.issues {
        registry.warn(BuildWarning {
            code: issue.code.clone(),
            message: issue.message.clone(),
            file_path: None,
        });
    }
}
