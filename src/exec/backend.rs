// src/exec/backend.rs

//! Pluggable bundler engine abstraction.
//!
//! The compiler session talks to a `BundlerEngine` instead of a concrete
//! bundler. Engines report progress through a per-session event channel,
//! which the session drains from a single task.
//!
//! - [`CommandEngine`](super::command::CommandEngine) is the production
//!   implementation: it runs an external bundler process.
//! - Tests provide their own engine that records invocations and lets the
//!   test decide when (and how) each build finishes.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::{EngineOptions, WatchOptions};
use crate::errors::Result;

/// Statistics for one finished compile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Compilation errors, one message per error.
    pub errors: Vec<String>,
    /// Diagnostics that never fail a build.
    pub warnings: Vec<String>,
    pub duration: Duration,
}

impl BuildStats {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "compiled in {}ms: {} error(s), {} warning(s)",
            self.duration.as_millis(),
            self.errors.len(),
            self.warnings.len()
        )?;
        for warning in &self.warnings {
            writeln!(f, "warning: {warning}")?;
        }
        for error in &self.errors {
            writeln!(f, "error: {error}")?;
        }
        Ok(())
    }
}

/// The engine failed before it could produce statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFailure {
    pub message: String,
}

impl EngineFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Events an engine emits for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilerEvent {
    /// A compile pass is starting. In watch mode every rebuild begins with
    /// this event.
    CompileStarted,
    /// A compile pass finished.
    Done(std::result::Result<BuildStats, EngineFailure>),
}

/// Sender side of a session's event channel.
pub type CompilerEvents = mpsc::UnboundedSender<CompilerEvent>;

/// A running watch-mode build.
pub trait Watching: Send {
    /// Stop watching. The returned future completes once no further
    /// rebuilds will start.
    fn close(self: Box<Self>) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// Trait abstracting the bundler.
///
/// Both methods are called synchronously from the request handler and must
/// not block; the actual compile happens in the background and is reported
/// through `events`. An `Err` means the engine could not be started at all.
pub trait BundlerEngine: Send + Sync {
    /// Single build pass. Emits `CompileStarted` then exactly one `Done`.
    fn run(&self, options: EngineOptions, events: CompilerEvents) -> Result<()>;

    /// Persistent build: emits `CompileStarted` + `Done` for the initial
    /// build and again for every rebuild until the handle is closed. Passes
    /// may overlap, but their `Done`s arrive in the order they started.
    fn watch(
        &self,
        options: EngineOptions,
        watch_options: WatchOptions,
        events: CompilerEvents,
    ) -> Result<Box<dyn Watching>>;
}
