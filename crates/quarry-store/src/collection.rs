//! Deterministic collection naming.

use std::path::Path;

/// Derive the collection key for an indexed root directory.
///
/// Same root path yields the same key across process restarts; distinct
/// roots yield distinct keys. Callers should pass an absolute path so
/// relative spellings of one directory do not fan out into separate
/// collections.
#[must_use]
pub fn collection_key(root: &Path) -> String {
    let hash = blake3::hash(root.to_string_lossy().as_bytes()).to_hex();
    format!("rag_{}", &hash.as_str()[..16])
}
