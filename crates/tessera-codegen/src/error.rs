use tessera_core::{GraphError, SyntaxError};
use thiserror::Error;

/// Errors raised while rendering or reading intermediate chunks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodegenError {
    #[error("failed to transform '{id}': {source}")]
    Transform {
        id: String,
        #[source]
        source: SyntaxError,
    },

    #[error("circular dependency: {}", chain.join(" -> "))]
    CircularDefinition { chain: Vec<String> },

    #[error("malformed chunk '{chunk}': {message}")]
    MalformedChunk { chunk: String, message: String },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl CodegenError {
    pub fn code(&self) -> &'static str {
        match self {
            CodegenError::Transform { .. } => "TRANSFORM_FAILED",
            CodegenError::CircularDefinition { .. } => "GRAPH_CIRCULAR_DEPENDENCY",
            CodegenError::MalformedChunk { .. } => "CHUNK_MALFORMED",
            CodegenError::Graph(err) => err.code(),
        }
    }
}
