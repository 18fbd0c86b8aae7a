//! Content-addressed file identity.
//!
//! A signature holds a path relative to the project root, the length and
//! the SHA-256 of the content. Absolute paths and timestamps never enter
//! it, so signatures compare equal across machines and checkouts.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 of `bytes`, hex encoded.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileSignature {
    /// Relative to the project root, `/` separated.
    pub path: String,
    pub len: u64,
    pub sha256: String,
}

impl FileSignature {
    pub fn from_bytes(relative_path: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            path: relative_path.into(),
            len: bytes.len() as u64,
            sha256: content_hash(bytes),
        }
    }

    /// Whether `bytes` are the content this signature was taken from.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        self.len == bytes.len() as u64 && self.sha256 == content_hash(bytes)
    }
}

/// `file` relative to `root` with `/` separators, or displayed as given if
/// it lies outside `root`.
pub fn relative_to(root: &Path, file: &Path) -> String {
    match file.strip_prefix(root) {
        Ok(relative) => relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => file.display().to_string(),
    }
}
