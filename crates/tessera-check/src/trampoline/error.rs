use thiserror::Error;

use crate::runtime::RuntimeError;

/// Failures surfaced by [`super::Registry::evaluate`].
#[derive(Debug, Clone, Error)]
pub enum TrampolineError {
    #[error("circular dependency: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    #[error("module '{target}' requested by '{requester}' is not registered")]
    ModuleNotFound { requester: String, target: String },

    #[error("module '{module}' failed: {source}")]
    Computation {
        module: String,
        #[source]
        source: RuntimeError,
    },
}

impl TrampolineError {
    pub fn code(&self) -> &'static str {
        match self {
            TrampolineError::CircularDependency { .. } => "GRAPH_CIRCULAR_DEPENDENCY",
            TrampolineError::ModuleNotFound { .. } => "MODULE_NOT_FOUND",
            TrampolineError::Computation { .. } => "RUNTIME_MODULE_LOAD_FAILED",
        }
    }
}
