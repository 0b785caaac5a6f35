//! Builder error type and its machine-readable payload.
//!
//! [`BuilderError`] is the one error type a build returns. Lower-crate errors
//! convert into it with their stable codes preserved, and every variant
//! renders to an [`ErrorPayload`] of the form `{ code, message, ...fields }`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tessera_check::{ElementKind, TrampolineError};
use tessera_codegen::CodegenError;
use tessera_core::{CanonicalId, CoreError, GraphError};

/// Structured error detail for callers that want JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Stable error code, e.g. `GRAPH_MISSING_IMPORT`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Variant-specific fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum BuilderError {
    #[error("analysis of '{file_path}' failed: {message}")]
    AnalysisFailed { file_path: String, message: String },

    #[error("analyzer reported {} error(s) in '{file_path}'", messages.len())]
    AnalyzerErrors {
        file_path: String,
        messages: Vec<String>,
    },

    #[error("failed to load runtime module '{file_path}': {message}")]
    RuntimeModuleLoadFailed {
        file_path: String,
        ast_path: Option<String>,
        message: String,
    },

    #[error("module '{target}' requested by '{requester}' is not registered")]
    ModuleNotFound { requester: String, target: String },

    #[error("circular dependency: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    #[error("artifact '{id}' from '{file_path}' was not found in the runtime module")]
    ArtifactNotFound { id: String, file_path: String },

    #[error("artifact '{id}' evaluated to an unrecognized value ({found})")]
    UnknownArtifactKind { id: String, found: String },

    #[error("{} '{id}' is already registered", kind.as_str())]
    AlreadyRegistered { kind: ElementKind, id: String },

    #[error("invalid options: {message}")]
    InvalidOptions { message: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

impl BuilderError {
    pub fn code(&self) -> &'static str {
        match self {
            BuilderError::AnalysisFailed { .. } => "ANALYSIS_FAILED",
            BuilderError::AnalyzerErrors { .. } => "ANALYZER_ERRORS",
            BuilderError::RuntimeModuleLoadFailed { .. } => "RUNTIME_MODULE_LOAD_FAILED",
            BuilderError::ModuleNotFound { .. } => "MODULE_NOT_FOUND",
            BuilderError::CircularDependency { .. } => "GRAPH_CIRCULAR_DEPENDENCY",
            BuilderError::ArtifactNotFound { .. } => "ARTIFACT_NOT_FOUND_IN_RUNTIME_MODULE",
            BuilderError::UnknownArtifactKind { .. } => "UNKNOWN_ARTIFACT_KIND",
            BuilderError::AlreadyRegistered { kind, .. } => match kind {
                ElementKind::Model => "MODEL_ALREADY_REGISTERED",
                ElementKind::Slice => "SLICE_ALREADY_REGISTERED",
                ElementKind::Operation => "OPERATION_ALREADY_REGISTERED",
                ElementKind::Fragment => "FRAGMENT_ALREADY_REGISTERED",
            },
            BuilderError::InvalidOptions { .. } => "INVALID_OPTIONS",
            BuilderError::Core(err) => err.code(),
            BuilderError::Graph(err) => err.code(),
            BuilderError::Codegen(err) => err.code(),
        }
    }

    pub fn payload(&self) -> ErrorPayload {
        let fields = match self {
            BuilderError::AnalysisFailed { file_path, .. } => json!({ "filePath": file_path }),
            BuilderError::AnalyzerErrors {
                file_path,
                messages,
            } => json!({ "filePath": file_path, "messages": messages }),
            BuilderError::RuntimeModuleLoadFailed {
                file_path,
                ast_path,
                ..
            } => json!({ "filePath": file_path, "astPath": ast_path }),
            BuilderError::ModuleNotFound { requester, target } => {
                json!({ "requester": requester, "target": target })
            }
            BuilderError::CircularDependency { chain }
            | BuilderError::Graph(GraphError::CircularDependency { chain })
            | BuilderError::Codegen(CodegenError::CircularDefinition { chain }) => {
                json!({ "chain": chain })
            }
            BuilderError::ArtifactNotFound { id, file_path } => {
                json!({ "id": id, "filePath": file_path })
            }
            BuilderError::UnknownArtifactKind { id, found } => json!({ "id": id, "found": found }),
            BuilderError::AlreadyRegistered { id, .. } => json!({ "id": id }),
            BuilderError::Graph(GraphError::MissingImport {
                importer,
                specifier,
            })
            | BuilderError::Codegen(CodegenError::Graph(GraphError::MissingImport {
                importer,
                specifier,
            })) => json!({ "importer": importer, "specifier": specifier }),
            BuilderError::Graph(GraphError::Syntax { id, source })
            | BuilderError::Codegen(CodegenError::Graph(GraphError::Syntax { id, source })) => {
                transform_fields(id.as_str(), source.offset)
            }
            BuilderError::Codegen(CodegenError::Transform { id, source }) => {
                transform_fields(id, source.offset)
            }
            BuilderError::Core(CoreError::DuplicateDefinition { id }) => json!({ "id": id }),
            _ => json!({}),
        };
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        ErrorPayload {
            code: self.code().to_string(),
            message: self.to_string(),
            fields,
        }
    }
}

fn transform_fields(id: &str, offset: usize) -> Value {
    let id = CanonicalId::from_raw(id);
    json!({
        "id": id.as_str(),
        "filePath": id.file_path(),
        "astPath": id.ast_path(),
        "offset": offset,
    })
}

impl From<TrampolineError> for BuilderError {
    fn from(err: TrampolineError) -> Self {
        match err {
            TrampolineError::CircularDependency { chain } => {
                BuilderError::CircularDependency { chain }
            }
            TrampolineError::ModuleNotFound { requester, target } => {
                BuilderError::ModuleNotFound { requester, target }
            }
            TrampolineError::Computation { module, source } => {
                let (file_path, ast_path) = match source.entry_id() {
                    Some(id) => {
                        let id = CanonicalId::from_raw(id);
                        (id.file_path().to_string(), Some(id.ast_path().to_string()))
                    }
                    None => (module, None),
                };
                BuilderError::RuntimeModuleLoadFailed {
                    file_path,
                    ast_path,
                    message: source.root_cause().to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_check::RuntimeError;

    #[test]
    fn already_registered_codes_follow_kind() {
        let err = BuilderError::AlreadyRegistered {
            kind: ElementKind::Fragment,
            id: "/src/a.ts::a".to_string(),
        };
        assert_eq!(err.code(), "FRAGMENT_ALREADY_REGISTERED");
        assert_eq!(err.to_string(), "fragment '/src/a.ts::a' is already registered");
    }

    #[test]
    fn lower_crate_codes_pass_through() {
        let err: BuilderError = GraphError::MissingImport {
            importer: "/src/a.ts".to_string(),
            specifier: "./b".to_string(),
        }
        .into();
        assert_eq!(err.code(), "GRAPH_MISSING_IMPORT");
        let payload = err.payload();
        assert_eq!(payload.fields["importer"], "/src/a.ts");
        assert_eq!(payload.fields["specifier"], "./b");
    }

    #[test]
    fn runtime_failures_carry_definition_context() {
        let err: BuilderError = TrampolineError::Computation {
            module: "/src/a.ts".to_string(),
            source: RuntimeError::Entry {
                id: "/src/a.ts::outer.inner".to_string(),
                source: Box::new(RuntimeError::UnresolvedReference {
                    name: "missing".to_string(),
                }),
            },
        }
        .into();
        assert_eq!(err.code(), "RUNTIME_MODULE_LOAD_FAILED");
        insta::assert_json_snapshot!(err.payload(), @r#"
        {
          "code": "RUNTIME_MODULE_LOAD_FAILED",
          "message": "failed to load runtime module '/src/a.ts': 'missing' is not defined",
          "filePath": "/src/a.ts",
          "astPath": "outer.inner"
        }
        "#);
    }
}
