// src/watch/hash.rs

//! Content hashing so that saves without real changes don't trigger rebuilds.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// Compute the blake3 hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("reading file for hashing: {:?}", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Last seen content hash per file.
#[derive(Debug, Default)]
pub struct ContentCache {
    hashes: HashMap<PathBuf, String>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current hash of every readable path.
    pub fn seed<P: AsRef<Path>>(&mut self, fs: &dyn FileSystem, paths: &[P]) {
        for path in paths {
            let path = path.as_ref();
            if let Ok(hash) = compute_file_hash(fs, path) {
                self.hashes.insert(path.to_path_buf(), hash);
            }
        }
    }

    /// Re-hash `path` and report whether it changed since last seen.
    ///
    /// Unknown files count as changed. A file that can no longer be read
    /// (deleted, or not a regular file) also counts as changed.
    pub fn refresh(&mut self, fs: &dyn FileSystem, path: &Path) -> bool {
        match compute_file_hash(fs, path) {
            Ok(hash) => {
                let changed = self.hashes.get(path) != Some(&hash);
                if !changed {
                    debug!(?path, "content unchanged");
                }
                self.hashes.insert(path.to_path_buf(), hash);
                changed
            }
            Err(err) => {
                debug!(?path, error = %err, "could not hash changed path; treating as changed");
                self.hashes.remove(path);
                true
            }
        }
    }
}
