//! Finding the files a run should look at.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::WalkDir;

use crate::io::config::SettleConfig;

/// Files under `root` (or under each of `paths`, if given) whose extension
/// is configured, skipping excluded directories. Sorted, deduplicated.
///
/// A path naming a file is taken as-is, whatever its extension.
pub fn discover(root: &Path, paths: &[PathBuf], config: &SettleConfig) -> Result<Vec<PathBuf>> {
    let starts: Vec<PathBuf> = if paths.is_empty() {
        vec![root.to_path_buf()]
    } else {
        paths
            .iter()
            .map(|path| if path.is_absolute() { path.clone() } else { root.join(path) })
            .collect()
    };

    let mut files = Vec::new();
    for start in starts {
        if start.is_file() {
            files.push(start);
            continue;
        }
        let walker = WalkDir::new(&start)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !(entry.file_type().is_dir() && is_excluded(entry.path(), &start, config)));
        for entry in walker {
            let entry = entry.with_context(|| format!("walk {}", start.display()))?;
            if entry.file_type().is_file() && has_configured_extension(entry.path(), config) {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();
    files.dedup();
    debug!(count = files.len(), "discovered files");
    Ok(files)
}

fn is_excluded(dir: &Path, start: &Path, config: &SettleConfig) -> bool {
    dir != start
        && dir
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| config.exclude_dirs.iter().any(|excluded| excluded == name))
}

fn has_configured_extension(file: &Path, config: &SettleConfig) -> bool {
    file.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| config.extensions.iter().any(|wanted| wanted == ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::project;

    #[test]
    fn walks_configured_extensions() {
        let temp = project(&[
            ("a.txt", "a"),
            ("src/b.rs", "b"),
            ("image.png", "x"),
            ("target/c.rs", "c"),
            (".git/d.txt", "d"),
        ]);
        let files = discover(temp.path(), &[], &SettleConfig::default()).expect("discover");
        let relative: Vec<_> = files
            .iter()
            .map(|file| file.strip_prefix(temp.path()).expect("under root").to_path_buf())
            .collect();
        assert_eq!(relative, vec![PathBuf::from("a.txt"), PathBuf::from("src/b.rs")]);
    }

    #[test]
    fn explicit_paths_narrow_the_walk() {
        let temp = project(&[("a.txt", "a"), ("src/b.rs", "b"), ("notes.log", "n")]);
        let files = discover(
            temp.path(),
            &[PathBuf::from("src"), PathBuf::from("notes.log")],
            &SettleConfig::default(),
        )
        .expect("discover");
        assert_eq!(files, vec![temp.path().join("notes.log"), temp.path().join("src/b.rs")]);
    }
}
