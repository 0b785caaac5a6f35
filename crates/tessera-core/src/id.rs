//! Canonical identity for DSL call-sites.
//!
//! A [`CanonicalId`] is `"<absoluteFilePath>::<astPath>"`. The file path is
//! everything before the last `::` separator, so paths containing `::` stay
//! recoverable as long as the AST path itself never does (segments are
//! identifiers, `<kind>#<n>` or `name$<n>`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between the file path and the AST path.
pub const ID_SEPARATOR: &str = "::";

/// Stable identifier of a single DSL definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalId(String);

impl CanonicalId {
    /// Builds the id for `ast_path` inside `file_path`.
    pub fn new(file_path: &str, ast_path: &str) -> Self {
        CanonicalId(format!("{file_path}{ID_SEPARATOR}{ast_path}"))
    }

    /// Wraps an already formatted id string.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        CanonicalId(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The file path portion.
    pub fn file_path(&self) -> &str {
        match self.0.rsplit_once(ID_SEPARATOR) {
            Some((file, _)) => file,
            None => &self.0,
        }
    }

    /// The AST path portion (empty if the id is malformed).
    pub fn ast_path(&self) -> &str {
        match self.0.rsplit_once(ID_SEPARATOR) {
            Some((_, path)) => path,
            None => "",
        }
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
