//! Source analysis boundary.
//!
//! The builder never parses source files itself. An [`Analyzer`] hands it a
//! [`FileAnalysis`] per path; [`StaticAnalyzer`] serves analyses prepared
//! ahead of time.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tessera_core::FileAnalysis;

use crate::error::BuilderError;

pub trait Analyzer {
    fn analyze(&self, file_path: &str) -> Result<FileAnalysis, BuilderError>;
}

impl<A: Analyzer + ?Sized> Analyzer for Box<A> {
    fn analyze(&self, file_path: &str) -> Result<FileAnalysis, BuilderError> {
        (**self).analyze(file_path)
    }
}

/// In-memory analyses keyed by file path.
#[derive(Debug, Clone, Default)]
pub struct StaticAnalyzer {
    files: IndexMap<String, FileAnalysis>,
}

impl StaticAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the analysis for its file path.
    pub fn insert(&mut self, analysis: FileAnalysis) {
        self.files.insert(analysis.file_path.clone(), analysis);
    }

    pub fn remove(&mut self, file_path: &str) -> Option<FileAnalysis> {
        self.files.shift_remove(file_path)
    }

    pub fn get(&self, file_path: &str) -> Option<&FileAnalysis> {
        self.files.get(file_path)
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }
}

impl FromIterator<FileAnalysis> for StaticAnalyzer {
    fn from_iter<I: IntoIterator<Item = FileAnalysis>>(iter: I) -> Self {
        let mut analyzer = StaticAnalyzer::new();
        for analysis in iter {
            analyzer.insert(analysis);
        }
        analyzer
    }
}

impl Analyzer for StaticAnalyzer {
    fn analyze(&self, file_path: &str) -> Result<FileAnalysis, BuilderError> {
        self.files
            .get(file_path)
            .cloned()
            .ok_or_else(|| BuilderError::AnalysisFailed {
                file_path: file_path.to_string(),
                message: "no analysis available for file".to_string(),
            })
    }
}

/// A serialized set of analyses, as read by the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisBundle {
    /// Overrides the configured entry points when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_points: Option<Vec<String>>,
    pub files: Vec<FileAnalysis>,
}

impl AnalysisBundle {
    pub fn from_json(text: &str) -> Result<Self, BuilderError> {
        serde_json::from_str(text).map_err(|err| BuilderError::AnalysisFailed {
            file_path: "<bundle>".to_string(),
            message: err.to_string(),
        })
    }

    /// Entry points from the bundle, or every file in bundle order.
    pub fn entry_points_or_all(&self) -> Vec<String> {
        match &self.entry_points {
            Some(entries) => entries.clone(),
            None => self.files.iter().map(|f| f.file_path.clone()).collect(),
        }
    }

    pub fn into_analyzer(self) -> StaticAnalyzer {
        self.files.into_iter().collect()
    }
}
