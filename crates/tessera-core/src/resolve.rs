//! Relative module specifier resolution.
//!
//! Only `./` and `../` specifiers resolve; bare package specifiers never
//! produce edges. Candidates are tried in order: the path as written, each
//! extension appended, then each `/index` file.

use std::collections::BTreeSet;
use std::path::Path;

/// Suffixes tried after the joined specifier, in priority order.
pub const DEFAULT_CANDIDATES: &[&str] = &[
    "",
    ".ts",
    ".tsx",
    ".js",
    ".jsx",
    "/index.ts",
    "/index.tsx",
    "/index.js",
    "/index.jsx",
];

/// Maps `(importer, specifier)` to the imported file path.
pub trait ModuleResolver {
    fn resolve(&self, importer: &str, specifier: &str) -> Option<String>;
}

impl<R: ModuleResolver + ?Sized> ModuleResolver for &R {
    fn resolve(&self, importer: &str, specifier: &str) -> Option<String> {
        (**self).resolve(importer, specifier)
    }
}

impl<R: ModuleResolver + ?Sized> ModuleResolver for Box<R> {
    fn resolve(&self, importer: &str, specifier: &str) -> Option<String> {
        (**self).resolve(importer, specifier)
    }
}

pub fn is_relative(specifier: &str) -> bool {
    specifier == "." || specifier == ".." || specifier.starts_with("./") || specifier.starts_with("../")
}

/// Collapses `.` and `..` segments and duplicate slashes. `..` above the
/// root of an absolute path is dropped.
pub fn normalize_path(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(last) if *last != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Directory of `file_path` joined with `specifier`, normalized.
pub fn join_specifier(importer: &str, specifier: &str) -> String {
    let dir = match importer.rfind('/') {
        Some(0) => "/",
        Some(index) => &importer[..index],
        None => "",
    };
    if dir.is_empty() {
        normalize_path(specifier)
    } else {
        normalize_path(&format!("{dir}/{specifier}"))
    }
}

fn candidate_paths<'a>(
    importer: &str,
    specifier: &str,
    candidates: &'a [String],
) -> Option<impl Iterator<Item = String> + 'a> {
    if !is_relative(specifier) {
        return None;
    }
    let base = join_specifier(importer, specifier);
    Some(candidates.iter().map(move |suffix| format!("{base}{suffix}")))
}

fn default_candidates() -> Vec<String> {
    DEFAULT_CANDIDATES.iter().map(|s| s.to_string()).collect()
}

/// Resolves against a known set of file paths.
#[derive(Debug, Clone)]
pub struct CandidateResolver {
    known: BTreeSet<String>,
    candidates: Vec<String>,
}

impl CandidateResolver {
    pub fn new<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CandidateResolver {
            known: files.into_iter().map(Into::into).collect(),
            candidates: default_candidates(),
        }
    }

    /// Replaces the suffix list (e.g. from configured extensions).
    pub fn with_candidates(mut self, candidates: Vec<String>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn insert(&mut self, file_path: impl Into<String>) {
        self.known.insert(file_path.into());
    }

    pub fn remove(&mut self, file_path: &str) {
        self.known.remove(file_path);
    }

    pub fn contains(&self, file_path: &str) -> bool {
        self.known.contains(file_path)
    }
}

impl ModuleResolver for CandidateResolver {
    fn resolve(&self, importer: &str, specifier: &str) -> Option<String> {
        let mut paths = candidate_paths(importer, specifier, &self.candidates)?;
        paths.find(|path| self.known.contains(path))
    }
}

/// Resolves against the real filesystem.
#[derive(Debug, Clone)]
pub struct FsResolver {
    candidates: Vec<String>,
}

impl Default for FsResolver {
    fn default() -> Self {
        FsResolver {
            candidates: default_candidates(),
        }
    }
}

impl FsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_candidates(candidates: Vec<String>) -> Self {
        FsResolver { candidates }
    }
}

impl ModuleResolver for FsResolver {
    fn resolve(&self, importer: &str, specifier: &str) -> Option<String> {
        let mut paths = candidate_paths(importer, specifier, &self.candidates)?;
        paths.find(|path| Path::new(path).is_file())
    }
}

/// Builds a candidate suffix list from bare extensions such as `[".ts", ".js"]`.
pub fn candidates_from_extensions(extensions: &[String]) -> Vec<String> {
    let mut candidates = vec![String::new()];
    candidates.extend(extensions.iter().cloned());
    candidates.extend(extensions.iter().map(|ext| format!("/index{ext}")));
    candidates
}
