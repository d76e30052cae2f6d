// src/compiler/session.rs

use std::fmt;
use std::path::PathBuf;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info};

use crate::compiler::core::SessionCore;
use crate::compiler::{SessionCommand, SessionEvent};
use crate::config::ResolvedBuild;
use crate::errors::{BundlewatchError, FailureKind, Result};
use crate::exec::{BundlerEngine, CompilerEvent, Watching};
use crate::preprocessor::FileEvent;
use crate::registry::BundleRegistry;
use crate::types::{BuildMode, BundlePromise};

/// Close request sent to a session; carries the acknowledgement channel.
type ShutdownRequest = oneshot::Sender<()>;

/// Start a compiler session for `file`.
///
/// The first cycle's promise is published before the engine is invoked.
/// If the engine refuses to start, the entry is withdrawn and the error is
/// returned; otherwise the session runs on its own task until the file
/// event is closed or dropped.
///
/// Must be called from within a Tokio runtime.
pub fn start_session(
    engine: &dyn BundlerEngine,
    file: &FileEvent,
    build: ResolvedBuild,
    registry: &BundleRegistry,
) -> Result<BundlePromise> {
    let file_path = file.file_path().to_path_buf();
    let mode = BuildMode::from_should_watch(file.should_watch());

    let mut core = SessionCore::new(
        file_path.clone(),
        build.output_path,
        mode,
        registry.clone(),
    );
    core.publish();
    let promise = core.current_promise();

    let (events_tx, events_rx) = mpsc::unbounded_channel::<CompilerEvent>();
    let started = match mode {
        BuildMode::Once => engine.run(build.engine_options, events_tx).map(|()| None),
        BuildMode::Watch => engine
            .watch(build.engine_options, build.watch_options, events_tx)
            .map(Some),
    };
    let watching = match started {
        Ok(watching) => watching,
        Err(err) => {
            core.withdraw();
            error!(file = %file_path.display(), error = %err, "engine failed to start");
            return Err(BundlewatchError::EngineStart {
                path: file_path,
                message: err.to_string(),
            });
        }
    };

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<ShutdownRequest>();
    let close_registry = registry.clone();
    let close_path = file_path.clone();
    file.on_close(Box::new(move || {
        close_registry.evict(&close_path);
        let (ack_tx, ack_rx) = oneshot::channel();
        // A session that already ended drops the ack, which completes
        // the receiver right away.
        let _ = shutdown_tx.send(ack_tx);
        ack_rx
    }));

    let runtime = SessionRuntime {
        core,
        events: events_rx,
        shutdown: shutdown_rx,
        watching,
        rerun: file.rerun_sender(),
    };
    tokio::spawn(runtime.run());

    info!(file = %file_path.display(), ?mode, "compiler session started");
    Ok(promise)
}

/// Async shell around [`SessionCore`].
///
/// Drains the engine's event channel and the close request from a single
/// task, feeds them to the core and executes the commands it returns.
pub struct SessionRuntime {
    core: SessionCore,
    events: mpsc::UnboundedReceiver<CompilerEvent>,
    shutdown: oneshot::Receiver<ShutdownRequest>,
    watching: Option<Box<dyn Watching>>,
    rerun: broadcast::Sender<()>,
}

impl fmt::Debug for SessionRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRuntime")
            .field("core", &self.core)
            .field("watching", &self.watching.is_some())
            .finish_non_exhaustive()
    }
}

impl SessionRuntime {
    /// Main event loop.
    ///
    /// Runs until the file event is closed. A dropped file event counts as
    /// a close without anyone to acknowledge.
    pub async fn run(mut self) {
        let file = self.core.file_path().to_path_buf();
        let mut engine_open = true;

        let ack = loop {
            let event = tokio::select! {
                biased;
                request = &mut self.shutdown => {
                    break request.ok();
                }
                received = self.events.recv(), if engine_open => match received {
                    Some(event) => SessionEvent::from(event),
                    None => {
                        debug!(file = %file.display(), "engine event channel closed");
                        engine_open = false;
                        SessionEvent::EngineStopped
                    }
                },
            };

            debug!(file = %file.display(), ?event, "session received event");

            let step = self.core.step(event);
            self.execute(step.commands).await;

            if !step.keep_running {
                break None;
            }
        };

        let step = self.core.step(SessionEvent::CloseRequested);
        self.execute(step.commands).await;

        if let Some(ack) = ack {
            let _ = ack.send(());
        }
        info!(file = %file.display(), "compiler session closed");
    }

    async fn execute(&mut self, commands: Vec<SessionCommand>) {
        for command in commands {
            match command {
                SessionCommand::NotifyRerunAfter(promise) => {
                    spawn_rerun_notifier(
                        self.core.file_path().to_path_buf(),
                        promise,
                        self.rerun.clone(),
                    );
                }
                SessionCommand::StopWatching => {
                    if let Some(watching) = self.watching.take() {
                        watching.close().await;
                        debug!(file = %self.core.file_path().display(), "watcher stopped");
                    }
                }
            }
        }
    }
}

/// Wait for a rebuild to settle, then tell the caller to request the bundle
/// again.
///
/// Rejections are only logged here; callers see them by awaiting the
/// promise they get from the next request. Nothing is emitted when the
/// session itself went away.
pub fn spawn_rerun_notifier(
    file_path: PathBuf,
    promise: BundlePromise,
    rerun: broadcast::Sender<()>,
) {
    tokio::spawn(async move {
        match promise.wait().await {
            Ok(_) => {}
            Err(failure) if matches!(failure.kind, FailureKind::Closed | FailureKind::Abandoned) => {
                debug!(file = %file_path.display(), "session ended before rebuild settled; no rerun");
                return;
            }
            Err(failure) => {
                debug!(file = %file_path.display(), error = %failure, "rebuild failed");
            }
        }

        debug!(file = %file_path.display(), "emitting rerun");
        // No receivers just means nobody is listening right now.
        let _ = rerun.send(());
    });
}
