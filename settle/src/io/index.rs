//! Record of files known to be clean, stored at `.settle/index.json`.
//!
//! The index is stamped with a fingerprint of everything that decides
//! whether a file is clean (the formatter key and lint suppressions). A
//! file is skipped only if its current bytes match the signature recorded
//! when it was last found clean under the same fingerprint.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::signature::FileSignature;
use crate::io::write_atomic;

pub const INDEX_DIR: &str = ".settle";
pub const INDEX_FILE: &str = "index.json";

pub fn index_path(root: &Path) -> PathBuf {
    root.join(INDEX_DIR).join(INDEX_FILE)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIndex {
    fingerprint: String,
    files: BTreeMap<String, FileSignature>,
}

impl FileIndex {
    pub fn empty(fingerprint: impl Into<String>) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            files: BTreeMap::new(),
        }
    }

    /// Load the index under `root`, starting over when it is missing,
    /// unreadable, or was written under a different fingerprint.
    pub fn load(root: &Path, fingerprint: &str) -> Result<Self> {
        let path = index_path(root);
        if !path.exists() {
            return Ok(Self::empty(fingerprint));
        }
        let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let index: FileIndex = match serde_json::from_str(&raw) {
            Ok(index) => index,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "discarding unreadable index");
                return Ok(Self::empty(fingerprint));
            }
        };
        if index.fingerprint != fingerprint {
            info!(path = %path.display(), "configuration changed, discarding index");
            return Ok(Self::empty(fingerprint));
        }
        debug!(entries = index.files.len(), "loaded index");
        Ok(index)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let mut payload = serde_json::to_string_pretty(self).context("serialize index")?;
        payload.push('\n');
        write_atomic(&index_path(root), payload.as_bytes())
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Whether `bytes` are exactly what `relative_path` held when it was
    /// last recorded clean.
    pub fn is_clean(&self, relative_path: &str, bytes: &[u8]) -> bool {
        self.files
            .get(relative_path)
            .is_some_and(|signature| signature.matches(bytes))
    }

    pub fn mark_clean(&mut self, relative_path: &str, bytes: &[u8]) {
        self.files.insert(
            relative_path.to_string(),
            FileSignature::from_bytes(relative_path, bytes),
        );
    }

    pub fn forget(&mut self, relative_path: &str) {
        self.files.remove(relative_path);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut index = FileIndex::empty("fp");
        index.mark_clean("src/a.txt", b"hello\n");
        index.save(temp.path()).expect("save");

        let loaded = FileIndex::load(temp.path(), "fp").expect("load");
        assert_eq!(loaded, index);
        assert!(loaded.is_clean("src/a.txt", b"hello\n"));
        assert!(!loaded.is_clean("src/a.txt", b"hello!\n"));
        assert!(!loaded.is_clean("src/b.txt", b"hello\n"));
    }

    #[test]
    fn fingerprint_change_discards_entries() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut index = FileIndex::empty("old");
        index.mark_clean("a.txt", b"x");
        index.save(temp.path()).expect("save");

        let loaded = FileIndex::load(temp.path(), "new").expect("load");
        assert!(loaded.is_empty());
        assert_eq!(loaded.fingerprint(), "new");
    }

    #[test]
    fn corrupt_index_starts_over() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join(INDEX_DIR)).expect("mkdir");
        fs::write(index_path(temp.path()), "{not json").expect("write");
        let loaded = FileIndex::load(temp.path(), "fp").expect("load");
        assert!(loaded.is_empty());
    }

    #[test]
    fn forget_removes_entry() {
        let mut index = FileIndex::empty("fp");
        index.mark_clean("a.txt", b"x");
        index.forget("a.txt");
        assert!(!index.is_clean("a.txt", b"x"));
    }
}
