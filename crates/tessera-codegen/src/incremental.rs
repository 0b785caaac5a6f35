//! Chunk-level change tracking between builds.
//!
//! # Architecture
//!
//! - [`ChunkCache`]: chunk hashes from the last successful build.
//! - [`ChunkPlan`]: which chunks changed, which must be reloaded because
//!   something they require changed, and which can reuse their previous
//!   evaluation inputs.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use serde::Serialize;

use crate::render::IntermediateChunk;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkCache {
    /// Chunk id to content hash at the last successful build.
    last_hashes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkPlan {
    /// New chunks, or chunks whose text changed.
    pub dirty: Vec<String>,
    /// Unchanged chunks that transitively require a dirty chunk.
    pub dirty_dependents: Vec<String>,
    /// Unchanged chunks with no dirty requirement.
    pub cached: Vec<String>,
    /// Chunks from the last build that no longer exist.
    pub removed: Vec<String>,
    pub needs_reload: bool,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.last_hashes.is_empty()
    }

    pub fn hash_of(&self, id: &str) -> Option<&str> {
        self.last_hashes.get(id).map(String::as_str)
    }

    pub fn compute_plan(&self, chunks: &[IntermediateChunk]) -> ChunkPlan {
        let current: BTreeSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();

        let dirty: BTreeSet<&str> = chunks
            .iter()
            .filter(|c| self.hash_of(&c.id) != Some(c.hash.as_str()))
            .map(|c| c.id.as_str())
            .collect();

        let removed: Vec<String> = self
            .last_hashes
            .keys()
            .filter(|id| !current.contains(id.as_str()))
            .cloned()
            .collect();

        // required -> requirers
        let mut reverse: HashMap<&str, Vec<&str>> = HashMap::new();
        for chunk in chunks {
            for required in &chunk.requires {
                reverse
                    .entry(required.as_str())
                    .or_default()
                    .push(chunk.id.as_str());
            }
        }

        let mut dependents: BTreeSet<&str> = BTreeSet::new();
        let mut queue: VecDeque<&str> = dirty.iter().copied().collect();
        queue.extend(removed.iter().map(String::as_str));
        while let Some(id) = queue.pop_front() {
            for &requirer in reverse.get(id).into_iter().flatten() {
                if !dirty.contains(requirer) && dependents.insert(requirer) {
                    queue.push_back(requirer);
                }
            }
        }

        let cached: Vec<String> = current
            .iter()
            .filter(|id| !dirty.contains(*id) && !dependents.contains(*id))
            .map(|id| id.to_string())
            .collect();

        let needs_reload = !dirty.is_empty() || !dependents.is_empty() || !removed.is_empty();
        ChunkPlan {
            dirty: dirty.into_iter().map(str::to_string).collect(),
            dirty_dependents: dependents.into_iter().map(str::to_string).collect(),
            cached,
            removed,
            needs_reload,
        }
    }

    /// Records the hashes of a successful build.
    pub fn update(&mut self, chunks: &[IntermediateChunk]) {
        self.last_hashes = chunks
            .iter()
            .map(|c| (c.id.clone(), c.hash.clone()))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, hash: &str, requires: &[&str]) -> IntermediateChunk {
        IntermediateChunk {
            id: id.to_string(),
            requires: requires.iter().map(|r| r.to_string()).collect(),
            entries: Vec::new(),
            text: String::new(),
            hash: hash.to_string(),
        }
    }

    fn chain(c_hash: &str) -> Vec<IntermediateChunk> {
        vec![
            chunk("a", "ha", &["b"]),
            chunk("b", "hb", &["c"]),
            chunk("c", c_hash, &[]),
            chunk("d", "hd", &[]),
        ]
    }

    #[test]
    fn first_build_is_all_dirty() {
        let plan = ChunkCache::new().compute_plan(&chain("hc"));
        assert_eq!(plan.dirty, vec!["a", "b", "c", "d"]);
        assert!(plan.cached.is_empty());
        assert!(plan.needs_reload);
    }

    #[test]
    fn changed_chunk_dirties_its_requirers() {
        let mut cache = ChunkCache::new();
        cache.update(&chain("hc"));
        let plan = cache.compute_plan(&chain("hc2"));
        assert_eq!(plan.dirty, vec!["c"]);
        assert_eq!(plan.dirty_dependents, vec!["a", "b"]);
        assert_eq!(plan.cached, vec!["d"]);
    }

    #[test]
    fn unchanged_build_is_fully_cached() {
        let mut cache = ChunkCache::new();
        cache.update(&chain("hc"));
        let plan = cache.compute_plan(&chain("hc"));
        assert!(plan.dirty.is_empty());
        assert!(plan.dirty_dependents.is_empty());
        assert_eq!(plan.cached.len(), 4);
        assert!(!plan.needs_reload);
    }

    #[test]
    fn removed_chunk_dirties_requirers() {
        let mut cache = ChunkCache::new();
        cache.update(&chain("hc"));
        let chunks = vec![chunk("a", "ha", &["b"]), chunk("b", "hb", &["c"])];
        let plan = cache.compute_plan(&chunks);
        assert_eq!(plan.removed, vec!["c", "d"]);
        assert_eq!(plan.dirty_dependents, vec!["a", "b"]);
        assert!(plan.needs_reload);
    }
}
