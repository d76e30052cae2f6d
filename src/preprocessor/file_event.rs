// src/preprocessor/file_event.rs

//! The caller-owned handle describing one file to bundle.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, oneshot};
use tracing::debug;

/// Runs synchronously when the file event is closed and returns a receiver
/// that completes once the session's teardown has finished.
pub(crate) type CloseHook = Box<dyn FnOnce() -> oneshot::Receiver<()> + Send>;

const RERUN_CAPACITY: usize = 16;

/// One file to bundle, plus the signals exchanged with the preprocessor:
///
/// - `rerun` (preprocessor → caller): a watch-mode rebuild has settled and
///   the caller should request the bundle again.
/// - `close` (caller → preprocessor): stop watching and forget the bundle.
///
/// Clones share the same signals. Dropping every clone closes the file.
#[derive(Clone)]
pub struct FileEvent {
    inner: Arc<FileEventInner>,
}

struct FileEventInner {
    file_path: PathBuf,
    output_path: PathBuf,
    should_watch: bool,
    rerun_tx: broadcast::Sender<()>,
    close_hooks: Mutex<Vec<CloseHook>>,
}

impl fmt::Debug for FileEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileEvent")
            .field("file_path", &self.inner.file_path)
            .field("output_path", &self.inner.output_path)
            .field("should_watch", &self.inner.should_watch)
            .finish_non_exhaustive()
    }
}

impl FileEvent {
    pub fn new(
        file_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        should_watch: bool,
    ) -> Self {
        let (rerun_tx, _) = broadcast::channel(RERUN_CAPACITY);
        Self {
            inner: Arc::new(FileEventInner {
                file_path: file_path.into(),
                output_path: output_path.into(),
                should_watch,
                rerun_tx,
                close_hooks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.inner.file_path
    }

    /// Requested bundle location, before `.js` normalization.
    pub fn output_path(&self) -> &Path {
        &self.inner.output_path
    }

    pub fn should_watch(&self) -> bool {
        self.inner.should_watch
    }

    /// Listen for rerun notifications. Only notifications sent after this
    /// call are received.
    pub fn subscribe_rerun(&self) -> broadcast::Receiver<()> {
        self.inner.rerun_tx.subscribe()
    }

    /// Sender the session uses to emit reruns.
    ///
    /// Sessions keep only this sender, never the event itself, so that
    /// dropping the caller's clones still closes the file.
    pub(crate) fn rerun_sender(&self) -> broadcast::Sender<()> {
        self.inner.rerun_tx.clone()
    }

    pub(crate) fn on_close(&self, hook: CloseHook) {
        self.hooks().push(hook);
    }

    fn hooks(&self) -> MutexGuard<'_, Vec<CloseHook>> {
        self.inner
            .close_hooks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn run_close_hooks(&self) -> Vec<oneshot::Receiver<()>> {
        let hooks: Vec<CloseHook> = self.hooks().drain(..).collect();
        debug!(
            file = %self.inner.file_path.display(),
            sessions = hooks.len(),
            "close"
        );
        hooks.into_iter().map(|hook| hook()).collect()
    }

    /// Close the file.
    ///
    /// The bundle is forgotten immediately, before this returns; the returned
    /// future completes once every watcher for the file has stopped.
    pub fn close(&self) -> impl Future<Output = ()> + Send + 'static {
        let teardowns = self.run_close_hooks();
        async move {
            for teardown in teardowns {
                let _ = teardown.await;
            }
        }
    }

    /// Close the file and run `callback` once teardown has finished.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn close_with<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let done = self.close();
        tokio::spawn(async move {
            done.await;
            callback();
        });
    }
}
