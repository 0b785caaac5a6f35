//! Core data model for tessera: canonical identities, per-file analyses, the
//! expression grammar, module resolution and the dependency graph with its
//! diff/patch machinery.

pub mod analysis;
pub mod error;
pub mod graph;
pub mod hash;
pub mod id;
pub mod resolve;
pub mod syntax;
pub mod tracker;

// Re-export commonly used types
pub use analysis::{
    AnalysisBuilder, AnalyzerDiagnostic, DiagnosticSeverity, FileAnalysis, ImportKind,
    ModuleDefinition, ModuleExport, ModuleImport,
};
pub use error::{CoreError, GraphError};
pub use graph::{
    apply_patch, build_graph, diff_graphs, DependencyGraph, DependencyGraphNode,
    DependencyGraphPatch, GraphIndex, ModuleSummary, SymbolReference,
};
pub use id::CanonicalId;
pub use resolve::{CandidateResolver, FsResolver, ModuleResolver};
pub use syntax::SyntaxError;
pub use tracker::{IdentityTracker, ScopeKind};
