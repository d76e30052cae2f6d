// src/watch/watcher.rs

use std::path::PathBuf;

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{info, trace, warn};

use crate::watch::patterns::IgnoreSet;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle
/// stops file watching and closes the change channel.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `roots` recursively and forward every changed, non-ignored path.
///
/// Access events are dropped: the bundler reads its sources on every build,
/// and those reads must not schedule another build.
pub fn spawn_watcher(
    roots: &[PathBuf],
    ignore: IgnoreSet,
) -> Result<(WatcherHandle, mpsc::UnboundedReceiver<PathBuf>)> {
    // Channel from the blocking notify callback into the async world.
    let (change_tx, change_rx) = mpsc::unbounded_channel::<PathBuf>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                for path in event.paths {
                    if ignore.is_ignored(&path) {
                        trace!(?path, "ignoring change");
                        continue;
                    }
                    if change_tx.send(path).is_err() {
                        // Rebuild loop is gone; nothing left to notify.
                        return;
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "file watch error");
            }
        },
        Config::default(),
    )
    .context("creating file watcher")?;

    for root in roots {
        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("watching {:?}", root))?;
        info!("file watcher started on {:?}", root);
    }

    Ok((WatcherHandle { _inner: watcher }, change_rx))
}
