//! Per-file analysis records consumed by the graph builder.
//!
//! These are produced by an external analyzer (TypeScript parsing is not this
//! crate's job) and arrive either in memory or as a JSON bundle. Field names
//! serialize in camelCase to match the bundle format.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hash::hash_parts;
use crate::id::CanonicalId;
use crate::tracker::{IdentityTracker, ScopeHandle, ScopeKind};

/// One DSL call-site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDefinition {
    pub canonical_id: CanonicalId,
    pub ast_path: String,
    pub is_top_level: bool,
    pub is_exported: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_binding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_binding: Option<String>,
    /// Raw expression text of the call-site.
    pub expression: String,
}

impl ModuleDefinition {
    /// The file-scope binding a top-level definition is assigned to.
    ///
    /// Analyses without `localBinding` fall back to the AST path minus a
    /// trailing `$<n>` duplicate suffix.
    pub fn binding(&self) -> Option<&str> {
        if !self.is_top_level {
            return None;
        }
        if let Some(local) = &self.local_binding {
            return Some(local);
        }
        let path = self.ast_path.as_str();
        Some(match path.rsplit_once('$') {
            Some((base, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => base,
            _ => path,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportKind {
    Named,
    Default,
    Namespace,
}

/// An import binding. `imported` is `"default"` for default imports and
/// `"*"` for namespace imports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleImport {
    pub source: String,
    pub imported: String,
    pub local: String,
    pub kind: ImportKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ModuleExport {
    /// `export { local as exported }` or `export const exported = ...`.
    Named { exported: String, local: String },
    /// `export { imported as exported } from "source"`.
    Reexport {
        exported: String,
        source: String,
        imported: String,
    },
    /// `export * from "source"`.
    ReexportAll { source: String },
}

impl ModuleExport {
    /// Source specifier of a re-export.
    pub fn source(&self) -> Option<&str> {
        match self {
            ModuleExport::Named { .. } => None,
            ModuleExport::Reexport { source, .. } | ModuleExport::ReexportAll { source } => {
                Some(source)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// A problem the analyzer hit while reading a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerDiagnostic {
    pub severity: DiagnosticSeverity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Everything the core needs to know about one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAnalysis {
    pub file_path: String,
    /// Content signature of the source file; becomes the artifact `contentHash`.
    pub signature: String,
    #[serde(default)]
    pub definitions: Vec<ModuleDefinition>,
    #[serde(default)]
    pub imports: Vec<ModuleImport>,
    #[serde(default)]
    pub exports: Vec<ModuleExport>,
    #[serde(default)]
    pub diagnostics: Vec<AnalyzerDiagnostic>,
}

impl FileAnalysis {
    /// Every specifier this file imports from or re-exports from, in order,
    /// without duplicates.
    pub fn specifiers(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        let sources = self
            .imports
            .iter()
            .map(|import| import.source.as_str())
            .chain(self.exports.iter().filter_map(ModuleExport::source));
        for source in sources {
            if !seen.contains(&source) {
                seen.push(source);
            }
        }
        seen
    }

    pub fn has_definitions(&self) -> bool {
        !self.definitions.is_empty()
    }

    /// Looks up a definition by id.
    pub fn definition(&self, id: &CanonicalId) -> Option<&ModuleDefinition> {
        self.definitions.iter().find(|def| &def.canonical_id == id)
    }

    /// Fails on duplicate canonical ids.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut seen: IndexMap<&CanonicalId, ()> = IndexMap::new();
        for def in &self.definitions {
            if seen.insert(&def.canonical_id, ()).is_some() {
                return Err(CoreError::DuplicateDefinition {
                    id: def.canonical_id.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Assembles a [`FileAnalysis`] while driving an [`IdentityTracker`].
///
/// Analyzers (and tests) use it to mirror a traversal:
///
/// ```
/// use tessera_core::analysis::AnalysisBuilder;
/// use tessera_core::tracker::ScopeKind;
///
/// let mut builder = AnalysisBuilder::new("/src/user.ts");
/// builder.export_named("userFragment", "userFragment");
/// builder.enter(ScopeKind::Variable, Some("userFragment"));
/// builder.define("gql.default(({ fragment }) => fragment.User({}))").unwrap();
/// builder.exit().unwrap();
/// let analysis = builder.finish();
/// assert_eq!(analysis.definitions[0].canonical_id.as_str(), "/src/user.ts::userFragment");
/// ```
#[derive(Debug)]
pub struct AnalysisBuilder {
    tracker: IdentityTracker,
    handles: Vec<ScopeHandle>,
    definitions: Vec<ModuleDefinition>,
    imports: Vec<ModuleImport>,
    exports: Vec<ModuleExport>,
    diagnostics: Vec<AnalyzerDiagnostic>,
}

impl AnalysisBuilder {
    pub fn new(file_path: impl Into<String>) -> Self {
        AnalysisBuilder {
            tracker: IdentityTracker::new(file_path),
            handles: Vec::new(),
            definitions: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn import_named(&mut self, source: &str, imported: &str, local: &str) -> &mut Self {
        self.push_import(source, imported, local, ImportKind::Named)
    }

    pub fn import_default(&mut self, source: &str, local: &str) -> &mut Self {
        self.push_import(source, "default", local, ImportKind::Default)
    }

    pub fn import_namespace(&mut self, source: &str, local: &str) -> &mut Self {
        self.push_import(source, "*", local, ImportKind::Namespace)
    }

    fn push_import(
        &mut self,
        source: &str,
        imported: &str,
        local: &str,
        kind: ImportKind,
    ) -> &mut Self {
        self.imports.push(ModuleImport {
            source: source.to_string(),
            imported: imported.to_string(),
            local: local.to_string(),
            kind,
        });
        self
    }

    /// `export { local as exported }`; also used for CommonJS `exports.x`.
    pub fn export_named(&mut self, local: &str, exported: &str) -> &mut Self {
        self.tracker.register_export(local, exported);
        self.exports.push(ModuleExport::Named {
            exported: exported.to_string(),
            local: local.to_string(),
        });
        self
    }

    pub fn reexport(&mut self, source: &str, imported: &str, exported: &str) -> &mut Self {
        self.exports.push(ModuleExport::Reexport {
            exported: exported.to_string(),
            source: source.to_string(),
            imported: imported.to_string(),
        });
        self
    }

    pub fn reexport_all(&mut self, source: &str) -> &mut Self {
        self.exports.push(ModuleExport::ReexportAll {
            source: source.to_string(),
        });
        self
    }

    pub fn diagnostic(&mut self, severity: DiagnosticSeverity, message: &str) -> &mut Self {
        self.diagnostics.push(AnalyzerDiagnostic {
            severity,
            message: message.to_string(),
            location: None,
        });
        self
    }

    pub fn enter(&mut self, kind: ScopeKind, name: Option<&str>) -> &mut Self {
        let handle = self.tracker.enter_scope(kind, name);
        self.handles.push(handle);
        self
    }

    pub fn exit(&mut self) -> Result<&mut Self, CoreError> {
        let handle = self.handles.pop().ok_or(CoreError::ScopeMismatch {
            expected: self.tracker.depth(),
            found: 0,
        })?;
        self.tracker.exit_scope(handle)?;
        Ok(self)
    }

    /// Registers a call-site with `expression` at the current scope path.
    pub fn define(&mut self, expression: &str) -> Result<CanonicalId, CoreError> {
        let site = self.tracker.register_definition()?;
        let canonical_id = self.tracker.canonical_id(&site.ast_path);
        self.definitions.push(ModuleDefinition {
            canonical_id: canonical_id.clone(),
            ast_path: site.ast_path,
            is_top_level: site.is_top_level,
            is_exported: site.export_binding.is_some(),
            local_binding: site.local_binding,
            export_binding: site.export_binding,
            expression: expression.to_string(),
        });
        Ok(canonical_id)
    }

    /// `const <name> = <expression>` at file scope.
    pub fn top_level(&mut self, name: &str, expression: &str) -> Result<CanonicalId, CoreError> {
        self.enter(ScopeKind::Variable, Some(name));
        let id = self.define(expression)?;
        self.exit()?;
        Ok(id)
    }

    /// Finishes the file. Exports registered after a definition are
    /// back-filled onto top-level definitions.
    pub fn finish(mut self) -> FileAnalysis {
        for def in &mut self.definitions {
            if def.export_binding.is_some() {
                continue;
            }
            let exported = def.binding().and_then(|local| self.tracker.export_name(local));
            if let Some(exported) = exported.map(str::to_string) {
                def.export_binding = Some(exported);
                def.is_exported = true;
            }
        }
        let exports = self.exports.iter().flat_map(|export| match export {
            ModuleExport::Named { exported, local } => vec!["named", exported.as_str(), local.as_str()],
            ModuleExport::Reexport {
                exported,
                source,
                imported,
            } => vec!["reexport", exported.as_str(), source.as_str(), imported.as_str()],
            ModuleExport::ReexportAll { source } => vec!["all", source.as_str()],
        });
        let signature = hash_parts(
            self.definitions
                .iter()
                .flat_map(|def| [def.ast_path.as_str(), def.expression.as_str()])
                .chain(self.imports.iter().flat_map(|i| {
                    [i.source.as_str(), i.imported.as_str(), i.local.as_str()]
                }))
                .chain(exports),
        );
        FileAnalysis {
            file_path: self.tracker.file_path().to_string(),
            signature,
            definitions: self.definitions,
            imports: self.imports,
            exports: self.exports,
            diagnostics: self.diagnostics,
        }
    }
}
