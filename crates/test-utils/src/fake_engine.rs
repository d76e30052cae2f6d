use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bundlewatch::config::{EngineOptions, WatchOptions};
use bundlewatch::errors::{BundlewatchError, Result};
use bundlewatch::exec::{
    BuildStats, BundlerEngine, CompilerEvent, CompilerEvents, EngineFailure, Watching,
};

#[derive(Debug, Clone)]
enum Behaviour {
    /// The test drives every event through a [`FakeCompiler`].
    Manual,
    /// Every invocation immediately reports a clean build.
    AutoSucceed,
    /// Every invocation is refused with this message.
    FailToStart(String),
}

/// One call to `run` or `watch`.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub options: EngineOptions,
    /// `Some` for `watch`, `None` for `run`.
    pub watch_options: Option<WatchOptions>,
    pub compiler: FakeCompiler,
}

impl Invocation {
    pub fn is_watch(&self) -> bool {
        self.watch_options.is_some()
    }

    /// First entry, i.e. the file being bundled.
    pub fn file_path(&self) -> Option<&Path> {
        self.options.entry.first().map(PathBuf::as_path)
    }
}

/// A fake bundler engine that:
/// - records every invocation with its resolved options
/// - hands the test a [`FakeCompiler`] to emit events for that session
pub struct FakeEngine {
    behaviour: Behaviour,
    invocations: Arc<Mutex<Vec<Invocation>>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::with_behaviour(Behaviour::Manual)
    }

    pub fn auto_succeed() -> Self {
        Self::with_behaviour(Behaviour::AutoSucceed)
    }

    pub fn failing_to_start(message: &str) -> Self {
        Self::with_behaviour(Behaviour::FailToStart(message.to_string()))
    }

    fn with_behaviour(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }

    /// Number of sessions started for `path`.
    pub fn invocations_for(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|inv| inv.file_path() == Some(path))
            .count()
    }

    /// Compiler of the most recent session for `path`.
    pub fn controller(&self, path: impl AsRef<Path>) -> Option<FakeCompiler> {
        let path = path.as_ref();
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|inv| inv.file_path() == Some(path))
            .map(|inv| inv.compiler.clone())
    }

    fn record(
        &self,
        options: EngineOptions,
        watch_options: Option<WatchOptions>,
        events: CompilerEvents,
    ) -> Result<FakeCompiler> {
        if let Behaviour::FailToStart(message) = &self.behaviour {
            return Err(BundlewatchError::Other(anyhow::anyhow!(message.clone())));
        }

        let compiler = FakeCompiler::new(events);
        if matches!(self.behaviour, Behaviour::AutoSucceed) {
            compiler.compile_started();
            compiler.succeed();
        }

        self.invocations.lock().unwrap().push(Invocation {
            options,
            watch_options,
            compiler: compiler.clone(),
        });
        Ok(compiler)
    }
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BundlerEngine for FakeEngine {
    fn run(&self, options: EngineOptions, events: CompilerEvents) -> Result<()> {
        self.record(options, None, events).map(|_| ())
    }

    fn watch(
        &self,
        options: EngineOptions,
        watch_options: WatchOptions,
        events: CompilerEvents,
    ) -> Result<Box<dyn Watching>> {
        let compiler = self.record(options, Some(watch_options), events)?;
        Ok(Box::new(FakeWatching {
            closed: Arc::clone(&compiler.closed),
        }))
    }
}

/// Emits engine events for one session.
#[derive(Debug, Clone)]
pub struct FakeCompiler {
    events: Arc<Mutex<Option<CompilerEvents>>>,
    closed: Arc<AtomicBool>,
}

impl FakeCompiler {
    fn new(events: CompilerEvents) -> Self {
        Self {
            events: Arc::new(Mutex::new(Some(events))),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn emit(&self, event: CompilerEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    pub fn compile_started(&self) {
        self.emit(CompilerEvent::CompileStarted);
    }

    pub fn succeed(&self) {
        self.succeed_with(BuildStats::default());
    }

    pub fn succeed_with(&self, stats: BuildStats) {
        self.emit(CompilerEvent::Done(Ok(stats)));
    }

    pub fn fail_compilation(&self, errors: &[&str]) {
        self.succeed_with(BuildStats {
            errors: errors.iter().map(|e| e.to_string()).collect(),
            ..BuildStats::default()
        });
    }

    pub fn fail_engine(&self, message: &str) {
        self.emit(CompilerEvent::Done(Err(EngineFailure::new(message))));
    }

    /// Drop the event sender, as an engine that crashed would.
    pub fn stop(&self) {
        self.events.lock().unwrap().take();
    }

    /// True once the session closed its watcher.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct FakeWatching {
    closed: Arc<AtomicBool>,
}

impl Watching for FakeWatching {
    fn close(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        self.closed.store(true, Ordering::SeqCst);
        Box::pin(async {})
    }
}
