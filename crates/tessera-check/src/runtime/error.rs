use serde::{Deserialize, Serialize};

/// Errors raised while evaluating definition expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum RuntimeError {
    #[error("'{name}' is not defined")]
    UnresolvedReference { name: String },

    #[error("all[\"{id}\"] has not been evaluated")]
    UnresolvedModuleEntry { id: String },

    #[error("{description} is not a function")]
    NotCallable { description: String },

    #[error("cannot read property '{property}' of {base}")]
    PropertyOfNullish { property: String, base: String },

    #[error("type error: {message}")]
    TypeError { message: String },

    #[error("call depth exceeded (limit: {limit})")]
    CallDepthExceeded { limit: usize },

    #[error("{message}")]
    Dsl { message: String },

    #[error("while evaluating '{id}': {source}")]
    Entry {
        id: String,
        #[source]
        source: Box<RuntimeError>,
    },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> Self {
        RuntimeError::TypeError {
            message: message.into(),
        }
    }

    pub fn dsl(message: impl Into<String>) -> Self {
        RuntimeError::Dsl {
            message: message.into(),
        }
    }

    /// Canonical id of the definition that failed, if the error carries one.
    pub fn entry_id(&self) -> Option<&str> {
        match self {
            RuntimeError::Entry { id, .. } => Some(id),
            _ => None,
        }
    }

    /// The innermost error, with entry context stripped.
    pub fn root_cause(&self) -> &RuntimeError {
        let mut current = self;
        while let RuntimeError::Entry { source, .. } = current {
            current = source;
        }
        current
    }
}
