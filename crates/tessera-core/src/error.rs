//! Core error types for tessera-core.
//!
//! Uses `thiserror` for structured, matchable variants. Every variant maps to
//! a stable code string via [`CoreError::code`] / [`GraphError::code`] so the
//! builder can surface them unchanged.

use thiserror::Error;

use crate::id::CanonicalId;
use crate::syntax::SyntaxError;

/// Errors raised while tracking identities or assembling analyses.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// `exit_scope` was called with a handle that is not the innermost frame.
    #[error("scope mismatch: expected depth {expected}, found {found}")]
    ScopeMismatch { expected: usize, found: usize },

    /// A definition was registered while no scope was open.
    #[error("definition registered outside of any scope in '{file_path}'")]
    DefinitionOutsideScope { file_path: String },

    /// An analysis contains two definitions with the same id.
    #[error("duplicate definition id: {id}")]
    DuplicateDefinition { id: CanonicalId },
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ScopeMismatch { .. } => "SCOPE_MISMATCH",
            CoreError::DefinitionOutsideScope { .. } => "DEFINITION_OUTSIDE_SCOPE",
            CoreError::DuplicateDefinition { .. } => "DUPLICATE_DEFINITION",
        }
    }
}

/// Errors raised while building the dependency graph.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    /// A relative import used by a definition does not resolve to an analyzed file.
    #[error("cannot resolve import '{specifier}' from '{importer}'")]
    MissingImport { importer: String, specifier: String },

    /// A definition's expression could not be parsed for reference scanning.
    #[error("cannot parse expression of {id}: {source}")]
    Syntax {
        id: CanonicalId,
        #[source]
        source: SyntaxError,
    },

    /// Definitions reference each other within one file.
    #[error("circular dependency: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl GraphError {
    pub fn code(&self) -> &'static str {
        match self {
            GraphError::MissingImport { .. } => "GRAPH_MISSING_IMPORT",
            GraphError::Syntax { .. } => "TRANSFORM_FAILED",
            GraphError::CircularDependency { .. } => "GRAPH_CIRCULAR_DEPENDENCY",
            GraphError::Core(err) => err.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let err = GraphError::MissingImport {
            importer: "/src/a.ts".into(),
            specifier: "./b".into(),
        };
        assert_eq!(err.code(), "GRAPH_MISSING_IMPORT");
        assert_eq!(err.to_string(), "cannot resolve import './b' from '/src/a.ts'");

        let err = GraphError::CircularDependency {
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "circular dependency: a -> b -> a");
    }

    #[test]
    fn core_errors_pass_through() {
        let err: GraphError = CoreError::DuplicateDefinition {
            id: CanonicalId::new("/a.ts", "x"),
        }
        .into();
        assert_eq!(err.code(), "DUPLICATE_DEFINITION");
    }
}
