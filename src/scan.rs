use anyhow::{Context, Result};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Enumerate regular files under `dir` as absolute paths, sorted.
///
/// Hidden files and directories are skipped. Symlinks are not followed.
/// Unreadable entries are logged and skipped.
pub fn scan_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let root = dir
        .absolutize()
        .with_context(|| format!("failed to resolve scan directory {}", dir.display()))?
        .into_owned();
    if !root.is_dir() {
        anyhow::bail!("not a directory: {}", root.display());
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(&root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();
    debug!(count = files.len(), root = %root.display(), "scan complete");
    Ok(files)
}
