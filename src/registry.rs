// src/registry.rs

//! Path → bundle promise mapping shared by every session of a preprocessor.
//!
//! The registry is the only place callers look for an existing build. It is
//! an explicit context object (cloned into each session) rather than a
//! process-wide static, so tests can create isolated instances or `reset` one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::types::BundlePromise;

#[derive(Debug, Clone, Default)]
pub struct BundleRegistry {
    bundles: Arc<Mutex<HashMap<PathBuf, BundlePromise>>>,
}

impl BundleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, BundlePromise>> {
        // No operation leaves the map half-updated; poisoning is ignored.
        self.bundles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cache decision: the current promise for `path`, if any.
    pub fn lookup(&self, path: &Path) -> Option<BundlePromise> {
        self.entries().get(path).cloned()
    }

    /// Publish `promise` as the current build for `path`, replacing any
    /// previous entry.
    pub fn publish(&self, path: &Path, promise: BundlePromise) {
        debug!(file = %path.display(), promise = promise.id(), "publishing bundle promise");
        self.entries().insert(path.to_path_buf(), promise);
    }

    /// Replace the entry for `path` only while it still holds `expected`.
    ///
    /// Returns `false` (and leaves the map untouched) when the entry was
    /// evicted or already replaced by someone else.
    pub fn replace_if_current(
        &self,
        path: &Path,
        expected: &BundlePromise,
        next: BundlePromise,
    ) -> bool {
        let mut entries = self.entries();
        match entries.get_mut(path) {
            Some(current) if current.ptr_eq(expected) => {
                debug!(
                    file = %path.display(),
                    previous = expected.id(),
                    next = next.id(),
                    "replacing bundle promise for new build cycle"
                );
                *current = next;
                true
            }
            _ => false,
        }
    }

    /// Remove the entry for `path`. Returns the removed promise, if any.
    pub fn evict(&self, path: &Path) -> Option<BundlePromise> {
        let removed = self.entries().remove(path);
        if removed.is_some() {
            debug!(file = %path.display(), "evicted bundle promise");
        }
        removed
    }

    /// Remove the entry for `path` only while it still holds `expected`.
    pub fn evict_if_current(&self, path: &Path, expected: &BundlePromise) -> bool {
        let mut entries = self.entries();
        match entries.get(path) {
            Some(current) if current.ptr_eq(expected) => {
                entries.remove(path);
                debug!(file = %path.display(), promise = expected.id(), "evicted bundle promise");
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Drop every entry. Intended for isolating independent test runs.
    pub fn reset(&self) {
        let mut entries = self.entries();
        debug!(count = entries.len(), "resetting bundle registry");
        entries.clear();
    }
}
