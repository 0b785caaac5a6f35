//! Build orchestration for tessera.
//!
//! A [`BuilderSession`] owns the last good dependency graph, chunks and
//! artifact, and turns file changes into a new [`BuilderArtifact`]:
//! analyze, diff and patch the graph, render chunks, load them through a
//! [`ModuleLoader`], and classify the evaluated elements.

pub mod analyzer;
pub mod artifact;
pub mod classify;
pub mod error;
pub mod loader;
pub mod options;
pub mod session;

pub use analyzer::{AnalysisBundle, Analyzer, StaticAnalyzer};
pub use artifact::{
    ArtifactElement, ArtifactMetadata, ArtifactRegistry, BuildReport, BuildWarning,
    BuilderArtifact, CacheStats, ElementCounts,
};
pub use classify::{aggregate, classify};
pub use error::{BuilderError, ErrorPayload};
pub use loader::{EvaluatedModule, ModuleLoader, RuntimeLoader};
pub use options::BuilderOptions;
pub use session::{BuilderSession, ChangeSet};
