//! Key and file-name generation.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Generate a key for a record that has no natural identifier.
///
/// A random v4 UUID in simple form: 32 lowercase hex characters.
pub fn generate_record_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Cache file used for `source` inside `cache_dir`.
///
/// The name is derived from the canonical source path when it can be
/// resolved, so different spellings of the same path share one cache.
pub fn cache_file_for(cache_dir: &Path, source: &Path) -> PathBuf {
    let resolved = std::fs::canonicalize(source).unwrap_or_else(|_| source.to_path_buf());
    let mut hasher = Sha256::new();
    hasher.update(resolved.to_string_lossy().as_bytes());
    cache_dir.join(format!("{}.sqlite", hex::encode(hasher.finalize())))
}
