// src/errors.rs

//! Crate-wide error types.
//!
//! Two families live here:
//! - [`BundlewatchError`]: fatal errors returned synchronously (bad config,
//!   IO, an engine that refuses to start). These never travel through a
//!   bundle promise.
//! - [`BuildFailure`]: the cloneable rejection value shared by every waiter
//!   on a bundle promise.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BundlewatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Engine failed to start for {path:?}: {message}")]
    EngineStart { path: PathBuf, message: String },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BundlewatchError>;

/// Where a rejected build came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The engine itself failed before producing statistics.
    Engine,
    /// The engine produced statistics that report compilation errors.
    Compilation,
    /// The file event was closed while the cycle was still pending.
    Closed,
    /// The deferred result was dropped without ever being settled.
    Abandoned,
}

/// A rejected bundle, tagged with the input it belongs to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BuildFailure {
    pub file_path: PathBuf,
    pub message: String,
    pub kind: FailureKind,
}

impl BuildFailure {
    pub fn new(file_path: impl Into<PathBuf>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            message: message.into(),
            kind,
        }
    }

    pub fn engine(file_path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(file_path, FailureKind::Engine, message)
    }

    pub fn compilation(file_path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(file_path, FailureKind::Compilation, message)
    }

    pub fn closed(file_path: impl Into<PathBuf>) -> Self {
        Self::new(
            file_path,
            FailureKind::Closed,
            "bundle session was closed before the build finished",
        )
    }

    pub fn abandoned(file_path: impl Into<PathBuf>) -> Self {
        Self::new(file_path, FailureKind::Abandoned, ABANDONED_MESSAGE)
    }
}

const ABANDONED_MESSAGE: &str = "bundle result was dropped before it was settled";

/// Only reachable for a deferred dropped outside a session; sessions reject
/// their pending cycle with [`BuildFailure::abandoned`] when they go away.
impl From<crate::deferred::Abandoned> for BuildFailure {
    fn from(_: crate::deferred::Abandoned) -> Self {
        Self::abandoned(PathBuf::new())
    }
}
