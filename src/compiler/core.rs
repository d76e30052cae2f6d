// src/compiler/core.rs

//! Pure session state machine.
//!
//! [`SessionCore`] consumes [`SessionEvent`]s for one input file and
//! produces:
//! - registry updates and deferred settlements (synchronous, no IO)
//! - a list of commands describing what the async shell should do next
//!
//! The shell (`compiler::session::SessionRuntime`) owns the engine channel,
//! the watcher handle and task spawning. The core has no channels to drain
//! and never awaits, so it can be unit tested without a runtime.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::compiler::event_handlers::{
    handle_close, handle_compile_started, handle_done, handle_engine_stopped, BuildCycle,
    BuildTarget, SessionStep,
};
use crate::compiler::SessionEvent;
use crate::errors::BuildFailure;
use crate::registry::BundleRegistry;
use crate::types::{BuildMode, BundlePromise, BundleState};

#[derive(Debug)]
pub struct SessionCore {
    target: BuildTarget,
    mode: BuildMode,
    registry: BundleRegistry,
    cycle: BuildCycle,
}

impl SessionCore {
    /// A session with a fresh pending cycle. Nothing is published until
    /// [`SessionCore::publish`] is called.
    pub fn new(
        file_path: PathBuf,
        output_path: PathBuf,
        mode: BuildMode,
        registry: BundleRegistry,
    ) -> Self {
        Self {
            target: BuildTarget {
                file_path,
                output_path,
            },
            mode,
            registry,
            cycle: BuildCycle::new(),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.target.file_path
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    pub fn state(&self) -> BundleState {
        self.cycle.state
    }

    /// Promise of the cycle this session is currently building or last built.
    pub fn current_promise(&self) -> BundlePromise {
        self.cycle.deferred.promise()
    }

    /// Register the current cycle under the file path.
    pub fn publish(&self) {
        self.registry
            .publish(&self.target.file_path, self.current_promise());
    }

    /// Undo [`SessionCore::publish`] after the engine refused to start.
    pub fn withdraw(&mut self) {
        self.registry
            .evict_if_current(&self.target.file_path, &self.current_promise());
        self.cycle.state = BundleState::Closed;
    }

    /// Handle a single event, updating state and returning the commands for
    /// the shell.
    pub fn step(&mut self, event: SessionEvent) -> SessionStep {
        match event {
            SessionEvent::CompileStarted => {
                handle_compile_started(&self.target, &mut self.cycle, &self.registry, self.mode)
            }
            SessionEvent::Done(result) => handle_done(&self.target, &mut self.cycle, result),
            SessionEvent::EngineStopped => handle_engine_stopped(&self.target, &mut self.cycle),
            SessionEvent::CloseRequested => {
                handle_close(&self.target, &mut self.cycle, &self.registry, self.mode)
            }
        }
    }
}

impl Drop for SessionCore {
    fn drop(&mut self) {
        if self
            .cycle
            .deferred
            .reject(BuildFailure::abandoned(&self.target.file_path))
        {
            debug!(file = %self.target.file_path.display(), "session dropped with a pending build");
        }
    }
}
