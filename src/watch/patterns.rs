// src/watch/patterns.rs

use std::fmt;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::errors::{BundlewatchError, Result};

/// Globs that are always ignored, in addition to `watch_options.ignored`.
pub const DEFAULT_IGNORED: &[&str] = &["**/node_modules/**", "**/.git/**"];

/// Paths whose changes must never trigger a rebuild.
///
/// Globs are matched against the full event path; `dirs` are plain prefixes
/// (used for the bundle output directory, so writing the bundle does not
/// trigger another build).
#[derive(Clone)]
pub struct IgnoreSet {
    globs: GlobSet,
    dirs: Vec<PathBuf>,
}

impl fmt::Debug for IgnoreSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IgnoreSet")
            .field("globs", &self.globs.len())
            .field("dirs", &self.dirs)
            .finish()
    }
}

impl IgnoreSet {
    pub fn build(patterns: &[String], dirs: Vec<PathBuf>) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in DEFAULT_IGNORED
            .iter()
            .copied()
            .chain(patterns.iter().map(String::as_str))
        {
            let glob = Glob::new(pattern).map_err(|e| {
                BundlewatchError::InvalidPattern(format!("ignored pattern {pattern:?}: {e}"))
            })?;
            builder.add(glob);
        }
        let globs = builder
            .build()
            .map_err(|e| BundlewatchError::InvalidPattern(e.to_string()))?;
        Ok(Self { globs, dirs })
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        self.dirs.iter().any(|dir| path.starts_with(dir)) || self.globs.is_match(path)
    }
}

/// Directories to watch for a set of entry files: each entry's parent,
/// without duplicates or directories nested inside another root.
pub fn watch_roots(entries: &[PathBuf]) -> Vec<PathBuf> {
    let mut parents: Vec<PathBuf> = entries
        .iter()
        .filter_map(|entry| entry.parent())
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .collect();
    parents.sort();
    parents.dedup();

    let mut roots: Vec<PathBuf> = Vec::new();
    for parent in parents {
        if !roots.iter().any(|root| parent.starts_with(root)) {
            roots.push(parent);
        }
    }
    roots
}
