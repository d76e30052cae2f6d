// src/exec/command.rs

//! Process-backed bundler engine.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{CommandSection, EngineOptions, WatchOptions};
use crate::errors::Result;
use crate::exec::backend::{BundlerEngine, CompilerEvent, CompilerEvents, Watching};
use crate::exec::build_runner::{remove_rendered_config, run_build};
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::{spawn_watcher, watch_roots, ContentCache, IgnoreSet, WatcherHandle};

/// Debounce applied to file changes when `watch_options.aggregate_timeout`
/// is not set.
pub const DEFAULT_AGGREGATE_TIMEOUT_MS: u64 = 300;

/// Runs an external bundler command for every compile.
#[derive(Clone)]
pub struct CommandEngine {
    command: CommandSection,
    fs: Arc<dyn FileSystem>,
}

impl fmt::Debug for CommandEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEngine")
            .field("program", &self.command.program)
            .finish_non_exhaustive()
    }
}

impl CommandEngine {
    pub fn new(command: CommandSection) -> Self {
        Self::with_fs(command, Arc::new(RealFileSystem))
    }

    pub fn with_fs(command: CommandSection, fs: Arc<dyn FileSystem>) -> Self {
        Self { command, fs }
    }
}

impl BundlerEngine for CommandEngine {
    fn run(&self, options: EngineOptions, events: CompilerEvents) -> Result<()> {
        let command = self.command.clone();
        let fs = Arc::clone(&self.fs);

        tokio::spawn(async move {
            build_once(&command, &options, fs.as_ref(), &events).await;
            remove_rendered_config(&options, fs.as_ref());
        });

        Ok(())
    }

    fn watch(
        &self,
        options: EngineOptions,
        watch_options: WatchOptions,
        events: CompilerEvents,
    ) -> Result<Box<dyn Watching>> {
        let output_dirs: Vec<PathBuf> = options.output.iter().map(|o| o.path.clone()).collect();
        let ignore = IgnoreSet::build(&watch_options.ignored, output_dirs)?;
        let roots = watch_roots(&options.entry);
        let (watcher, changes) = spawn_watcher(&roots, ignore)?;

        let debounce = Duration::from_millis(
            watch_options
                .aggregate_timeout
                .unwrap_or(DEFAULT_AGGREGATE_TIMEOUT_MS),
        );
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let rebuilds = RebuildLoop {
            command: self.command.clone(),
            options,
            fs: Arc::clone(&self.fs),
            events,
            changes,
            debounce,
        };
        let handle = tokio::spawn(rebuilds.run(stop_rx));

        Ok(Box::new(CommandWatching {
            stop: Some(stop_tx),
            handle,
            watcher,
        }))
    }
}

/// Emit `CompileStarted`, build, emit `Done`.
///
/// Returns false once the session has stopped listening.
async fn build_once(
    command: &CommandSection,
    options: &EngineOptions,
    fs: &dyn FileSystem,
    events: &CompilerEvents,
) -> bool {
    if events.send(CompilerEvent::CompileStarted).is_err() {
        return false;
    }
    let result = run_build(command, options, fs).await;
    events.send(CompilerEvent::Done(result)).is_ok()
}

struct RebuildLoop {
    command: CommandSection,
    options: EngineOptions,
    fs: Arc<dyn FileSystem>,
    events: CompilerEvents,
    changes: mpsc::UnboundedReceiver<PathBuf>,
    debounce: Duration,
}

impl RebuildLoop {
    /// Initial build, then one rebuild per debounced batch of real changes.
    ///
    /// `stop` is only observed between builds; an in-flight build always
    /// runs to completion.
    async fn run(mut self, mut stop: oneshot::Receiver<()>) {
        self.rebuild_until_stopped(&mut stop).await;
        remove_rendered_config(&self.options, self.fs.as_ref());
        debug!("rebuild loop finished");
    }

    async fn rebuild_until_stopped(&mut self, stop: &mut oneshot::Receiver<()>) {
        let mut cache = ContentCache::new();
        cache.seed(self.fs.as_ref(), &self.options.entry);

        if !build_once(&self.command, &self.options, self.fs.as_ref(), &self.events).await {
            return;
        }

        loop {
            let first = tokio::select! {
                biased;
                _ = &mut *stop => break,
                changed = self.changes.recv() => match changed {
                    Some(path) => path,
                    None => break,
                },
            };

            let mut batch = vec![first];
            loop {
                tokio::select! {
                    biased;
                    _ = &mut *stop => {
                        debug!("rebuild loop stopped while collecting changes");
                        return;
                    }
                    changed = self.changes.recv() => match changed {
                        Some(path) => batch.push(path),
                        None => break,
                    },
                    _ = tokio::time::sleep(self.debounce) => break,
                }
            }

            let changed: Vec<PathBuf> = batch
                .into_iter()
                .filter(|path| cache.refresh(self.fs.as_ref(), path))
                .collect();
            if changed.is_empty() {
                debug!("no content changes; skipping rebuild");
                continue;
            }

            info!(files = ?changed, "source changed; rebuilding");
            if !build_once(&self.command, &self.options, self.fs.as_ref(), &self.events).await {
                break;
            }
        }
    }
}

/// Watch-mode handle returned by [`CommandEngine::watch`].
struct CommandWatching {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
    watcher: WatcherHandle,
}

impl Watching for CommandWatching {
    fn close(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        let CommandWatching {
            stop,
            handle,
            watcher,
        } = *self;

        Box::pin(async move {
            if let Some(stop) = stop {
                let _ = stop.send(());
            }
            if let Err(err) = handle.await {
                warn!(error = %err, "rebuild loop ended abnormally");
            }
            drop(watcher);
            debug!("command watcher closed");
        })
    }
}
