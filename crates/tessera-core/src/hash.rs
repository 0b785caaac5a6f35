//! Deterministic content hashing using blake3.
//!
//! Hashes are derived state. Callers feed already canonical bytes (printer
//! output, `serde_json` of types without `HashMap` fields) so the same
//! content always produces the same digest.

use serde::Serialize;

/// Hex-encoded blake3 digest of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Hash of a sequence of parts, each length-prefixed so that
/// `["ab", "c"]` and `["a", "bc"]` differ.
pub fn hash_parts<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        let bytes = part.as_ref();
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    hasher.finalize().to_hex().to_string()
}

/// Hash of the JSON serialization of `value`.
///
/// Returns `None` only if serialization fails, which cannot happen for the
/// plain data types of this crate.
pub fn hash_json<T: Serialize>(value: &T) -> Option<String> {
    serde_json::to_vec(value).ok().map(|bytes| content_hash(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_deterministic() {
        assert_eq!(content_hash(b"query"), content_hash(b"query"));
        assert_ne!(content_hash(b"query"), content_hash(b"mutation"));
        assert_eq!(content_hash(b"").len(), 64);
    }

    #[test]
    fn hash_parts_is_boundary_sensitive() {
        assert_ne!(hash_parts(["ab", "c"]), hash_parts(["a", "bc"]));
        assert_eq!(hash_parts(["a", "b"]), hash_parts(vec!["a", "b"]));
    }

    #[test]
    fn hash_json_matches_manual_serialization() {
        let value = vec!["x", "y"];
        let bytes = serde_json::to_vec(&value).unwrap();
        assert_eq!(hash_json(&value), Some(content_hash(&bytes)));
    }
}
