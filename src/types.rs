use std::path::PathBuf;

use crate::deferred::{Deferred, Promise};
use crate::errors::BuildFailure;

/// Absolute path to a finished bundle on disk.
pub type BundlePath = PathBuf;

/// Deferred bundle result for one build cycle.
pub type BundleDeferred = Deferred<BundlePath, BuildFailure>;

/// What callers await: the output path, or the reason the build failed.
pub type BundlePromise = Promise<BundlePath, BuildFailure>;

/// How the engine is driven for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// A single build pass.
    Once,
    /// A persistent watcher that rebuilds on every source change.
    Watch,
}

impl BuildMode {
    pub fn from_should_watch(should_watch: bool) -> Self {
        if should_watch { BuildMode::Watch } else { BuildMode::Once }
    }

    pub fn is_watch(self) -> bool {
        matches!(self, BuildMode::Watch)
    }
}

/// Lifecycle of a single file's bundle, as tracked by its session.
///
/// `Ready` and `Failed` go back to `Building` only in watch mode. `Closed`
/// is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleState {
    Building,
    Ready,
    Failed,
    Closed,
}
