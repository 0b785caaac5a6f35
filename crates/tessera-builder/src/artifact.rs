//! The frozen build output and the registry that assembles it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tessera_check::runtime::element::{
    FragmentPrebuild, ModelPrebuild, OperationPrebuild, SlicePrebuild,
};
use tessera_check::ElementKind;

use crate::error::BuilderError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    pub source_path: String,
    pub content_hash: String,
}

/// One classified element, tagged by `"type"` in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ArtifactElement {
    Model {
        id: String,
        prebuild: ModelPrebuild,
        metadata: ArtifactMetadata,
    },
    Slice {
        id: String,
        prebuild: SlicePrebuild,
        metadata: ArtifactMetadata,
    },
    Operation {
        id: String,
        prebuild: OperationPrebuild,
        metadata: ArtifactMetadata,
    },
    Fragment {
        id: String,
        prebuild: FragmentPrebuild,
        metadata: ArtifactMetadata,
    },
}

impl ArtifactElement {
    pub fn id(&self) -> &str {
        match self {
            ArtifactElement::Model { id, .. }
            | ArtifactElement::Slice { id, .. }
            | ArtifactElement::Operation { id, .. }
            | ArtifactElement::Fragment { id, .. } => id,
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            ArtifactElement::Model { .. } => ElementKind::Model,
            ArtifactElement::Slice { .. } => ElementKind::Slice,
            ArtifactElement::Operation { .. } => ElementKind::Operation,
            ArtifactElement::Fragment { .. } => ElementKind::Fragment,
        }
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        match self {
            ArtifactElement::Model { metadata, .. }
            | ArtifactElement::Slice { metadata, .. }
            | ArtifactElement::Operation { metadata, .. }
            | ArtifactElement::Fragment { metadata, .. } => metadata,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementCounts {
    pub models: usize,
    pub slices: usize,
    pub operations: usize,
    pub fragments: usize,
}

impl ElementCounts {
    pub fn total(&self) -> usize {
        self.models + self.slices + self.operations + self.fragments
    }

    fn bump(&mut self, kind: ElementKind) {
        match kind {
            ElementKind::Model => self.models += 1,
            ElementKind::Slice => self.slices += 1,
            ElementKind::Operation => self.operations += 1,
            ElementKind::Fragment => self.fragments += 1,
        }
    }
}

/// A non-fatal problem surfaced in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildWarning {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub counts: ElementCounts,
    pub warnings: Vec<BuildWarning>,
    pub cache: CacheStats,
    pub duration_ms: u64,
}

/// Elements keyed by canonical id, plus the build report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderArtifact {
    pub elements: IndexMap<String, ArtifactElement>,
    pub report: BuildReport,
}

impl BuilderArtifact {
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ArtifactElement> {
        self.elements.get(id)
    }

    pub fn of_kind(&self, kind: ElementKind) -> impl Iterator<Item = &ArtifactElement> {
        self.elements.values().filter(move |e| e.kind() == kind)
    }
}

/// Collects elements for one build. Each id registers at most once.
#[derive(Debug, Default)]
pub struct ArtifactRegistry {
    elements: IndexMap<String, ArtifactElement>,
    counts: ElementCounts,
    warnings: Vec<BuildWarning>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_model(
        &mut self,
        id: &str,
        prebuild: ModelPrebuild,
        metadata: ArtifactMetadata,
    ) -> Result<(), BuilderError> {
        self.insert(ArtifactElement::Model {
            id: id.to_string(),
            prebuild,
            metadata,
        })
    }

    pub fn register_slice(
        &mut self,
        id: &str,
        prebuild: SlicePrebuild,
        metadata: ArtifactMetadata,
    ) -> Result<(), BuilderError> {
        self.insert(ArtifactElement::Slice {
            id: id.to_string(),
            prebuild,
            metadata,
        })
    }

    pub fn register_operation(
        &mut self,
        id: &str,
        prebuild: OperationPrebuild,
        metadata: ArtifactMetadata,
    ) -> Result<(), BuilderError> {
        self.insert(ArtifactElement::Operation {
            id: id.to_string(),
            prebuild,
            metadata,
        })
    }

    pub fn register_fragment(
        &mut self,
        id: &str,
        prebuild: FragmentPrebuild,
        metadata: ArtifactMetadata,
    ) -> Result<(), BuilderError> {
        self.insert(ArtifactElement::Fragment {
            id: id.to_string(),
            prebuild,
            metadata,
        })
    }

    fn insert(&mut self, element: ArtifactElement) -> Result<(), BuilderError> {
        let kind = element.kind();
        if self.elements.contains_key(element.id()) {
            return Err(BuilderError::AlreadyRegistered {
                kind,
                id: element.id().to_string(),
            });
        }
        self.counts.bump(kind);
        self.elements.insert(element.id().to_string(), element);
        Ok(())
    }

    pub fn warn(&mut self, warning: BuildWarning) {
        tracing::warn!("{}: {}", warning.code, warning.message);
        self.warnings.push(warning);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Freezes the registry into an artifact.
    pub fn snapshot(self, cache: CacheStats, duration_ms: u64) -> BuilderArtifact {
        BuilderArtifact {
            elements: self.elements,
            report: BuildReport {
                counts: self.counts,
                warnings: self.warnings,
                cache,
                duration_ms,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ArtifactMetadata {
        ArtifactMetadata {
            source_path: "/src/user.ts".to_string(),
            content_hash: "abc".to_string(),
        }
    }

    #[test]
    fn repeated_id_is_rejected_across_kinds() {
        let mut registry = ArtifactRegistry::new();
        registry
            .register_fragment(
                "/src/user.ts::userFragment",
                FragmentPrebuild {
                    typename: "User".to_string(),
                },
                meta(),
            )
            .unwrap();
        let err = registry
            .register_model(
                "/src/user.ts::userFragment",
                ModelPrebuild {
                    typename: "User".to_string(),
                },
                meta(),
            )
            .unwrap_err();
        assert_eq!(err.code(), "MODEL_ALREADY_REGISTERED");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn snapshot_counts_and_serializes_tagged() {
        let mut registry = ArtifactRegistry::new();
        registry
            .register_fragment(
                "/src/user.ts::userFragment",
                FragmentPrebuild {
                    typename: "User".to_string(),
                },
                meta(),
            )
            .unwrap();
        let artifact = registry.snapshot(CacheStats { hits: 0, misses: 1 }, 0);
        assert_eq!(artifact.report.counts.fragments, 1);
        assert_eq!(artifact.report.counts.total(), 1);
        insta::assert_json_snapshot!(artifact, @r#"
        {
          "elements": {
            "/src/user.ts::userFragment": {
              "type": "fragment",
              "id": "/src/user.ts::userFragment",
              "prebuild": {
                "typename": "User"
              },
              "metadata": {
                "sourcePath": "/src/user.ts",
                "contentHash": "abc"
              }
            }
          },
          "report": {
            "counts": {
              "models": 0,
              "slices": 0,
              "operations": 0,
              "fragments": 1
            },
            "warnings": [],
            "cache": {
              "hits": 0,
              "misses": 1
            },
            "durationMs": 0
          }
        }
        "#);
    }
}
