//! Which files under a history directory get parsed.
//!
//! Exports are kept one folder per account, e.g. `history/bbt-checking/`.
//! Files directly in the root are always taken; sub-directories are taken
//! when their name starts with one of the filter prefixes (all of them when
//! there are no filters).

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Regular files only; symlinks are never followed, so a link back into the
/// tree cannot list the same export twice.
pub fn collect_paths(root: &Path, filters: &[String], recursive: bool) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 2 };
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() > 1 || !e.file_type().is_dir() || selected(e, filters));

    let mut out = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("read {}", root.display()))?;
        if entry.depth() == 1 && entry.file_type().is_dir() {
            tracing::info!("found dir: {}", entry.path().display());
        } else if entry.file_type().is_file() {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

fn selected(dir: &DirEntry, filters: &[String]) -> bool {
    if filters.is_empty() {
        return true;
    }
    let name = dir.file_name().to_str().unwrap_or("");
    filters.iter().any(|f| name.starts_with(f.as_str()))
}
