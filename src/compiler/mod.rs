// src/compiler/mod.rs

//! Compiler sessions: one engine invocation for one input file.
//!
//! A session reacts to:
//! - engine events (compile started, compile finished)
//! - the engine's event channel closing
//! - the file event being closed
//!
//! The pure state machine lives in [`core`]; the async shell that drains the
//! engine channel, stops watchers and spawns rerun notifiers is implemented
//! in [`session`]. Error message cleanup lives in [`diagnostics`].

use crate::exec::{BuildStats, CompilerEvent, EngineFailure};

/// Events flowing into a session's core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The engine is starting a compile pass.
    CompileStarted,
    /// The engine finished a compile pass.
    Done(Result<BuildStats, EngineFailure>),
    /// The engine dropped its event sender.
    EngineStopped,
    /// The file event was closed (or every handle to it was dropped).
    CloseRequested,
}

impl From<CompilerEvent> for SessionEvent {
    fn from(event: CompilerEvent) -> Self {
        match event {
            CompilerEvent::CompileStarted => SessionEvent::CompileStarted,
            CompilerEvent::Done(result) => SessionEvent::Done(result),
        }
    }
}

pub mod core;
pub mod diagnostics;
pub mod event_handlers;
pub mod session;

pub use self::core::SessionCore;
pub use diagnostics::{cleanse_error, compilation_message};
pub use event_handlers::{SessionCommand, SessionStep};
pub use session::{start_session, SessionRuntime};
