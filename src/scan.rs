//! Single-level directory listing helpers shared by the walker, the
//! archive expander and the leaf extractors.

use globset::{Glob, GlobMatcher};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::CollectError;

/// Immediate children of `dir`, in filesystem enumeration order.
pub fn children(dir: &Path) -> Result<Vec<PathBuf>, CollectError> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| CollectError::io(dir, e))?;
        out.push(entry.into_path());
    }
    Ok(out)
}

/// Immediate child directories of `dir`. Symlinks to directories count.
pub fn child_dirs(dir: &Path) -> Result<Vec<PathBuf>, CollectError> {
    Ok(children(dir)?.into_iter().filter(|p| p.is_dir()).collect())
}

/// Files directly inside `dir` whose name matches `pattern`, sorted by path.
pub fn files_matching(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, CollectError> {
    let matcher = name_matcher(pattern)?;
    let mut files: Vec<PathBuf> = children(dir)?
        .into_iter()
        .filter(|p| p.is_file())
        .filter(|p| p.file_name().is_some_and(|n| matcher.is_match(n)))
        .collect();
    files.sort();
    Ok(files)
}

fn name_matcher(pattern: &str) -> Result<GlobMatcher, CollectError> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|e| CollectError::Extraction {
            path: PathBuf::from(pattern),
            message: e.to_string(),
        })
}
