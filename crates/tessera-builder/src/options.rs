//! Builder configuration.

use serde::{Deserialize, Serialize};
use tessera_check::CyclePolicy;
use tessera_core::resolve::candidates_from_extensions;

use crate::error::BuilderError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuilderOptions {
    /// Absolute paths discovery starts from on a full build.
    pub entry_points: Vec<String>,
    pub cycle_policy: CyclePolicy,
    /// Emit one chunk per file instead of a single module.
    pub chunked: bool,
    /// Extensions the resolver appends to relative specifiers.
    pub resolver_extensions: Vec<String>,
    /// Treat analyzer error diagnostics as fatal.
    pub fail_on_analyzer_errors: bool,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        BuilderOptions {
            entry_points: Vec::new(),
            cycle_policy: CyclePolicy::default(),
            chunked: true,
            resolver_extensions: [".ts", ".tsx", ".js", ".jsx"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            fail_on_analyzer_errors: false,
        }
    }
}

impl BuilderOptions {
    pub fn from_json(text: &str) -> Result<Self, BuilderError> {
        let options: BuilderOptions =
            serde_json::from_str(text).map_err(|err| BuilderError::InvalidOptions {
                message: err.to_string(),
            })?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), BuilderError> {
        if let Some(ext) = self
            .resolver_extensions
            .iter()
            .find(|ext| !ext.starts_with('.'))
        {
            return Err(BuilderError::InvalidOptions {
                message: format!("resolver extension '{ext}' must start with '.'"),
            });
        }
        Ok(())
    }

    /// Resolver candidate suffixes derived from `resolver_extensions`.
    pub fn candidates(&self) -> Vec<String> {
        candidates_from_extensions(&self.resolver_extensions)
    }
}
