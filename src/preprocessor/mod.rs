// src/preprocessor/mod.rs

//! Public entry point: turn a file event into a bundle promise.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::compiler::start_session;
use crate::config::{
    default_engine_options, resolve_build, DefaultOptions, PreprocessorOptions, WatchOptions,
};
use crate::errors::Result;
use crate::exec::BundlerEngine;
use crate::registry::BundleRegistry;
use crate::types::BundlePromise;

pub mod file_event;

pub use file_event::FileEvent;

/// Bundles files on request and keeps watched bundles up to date.
///
/// One preprocessor owns one registry; every session it starts shares it.
pub struct Preprocessor {
    options: PreprocessorOptions,
    engine: Arc<dyn BundlerEngine>,
    registry: BundleRegistry,
    handle_lock: Mutex<()>,
}

impl fmt::Debug for Preprocessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preprocessor")
            .field("options", &self.options)
            .field("bundles", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl Preprocessor {
    pub fn new(options: PreprocessorOptions, engine: Arc<dyn BundlerEngine>) -> Self {
        Self::with_registry(options, engine, BundleRegistry::new())
    }

    /// Use an existing registry, e.g. one shared with another preprocessor.
    pub fn with_registry(
        options: PreprocessorOptions,
        engine: Arc<dyn BundlerEngine>,
        registry: BundleRegistry,
    ) -> Self {
        debug!(?options, "creating preprocessor");
        Self {
            options,
            engine,
            registry,
            handle_lock: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &BundleRegistry {
        &self.registry
    }

    /// Return the promise for `file`'s bundle, starting a build if none is
    /// cached.
    ///
    /// A cached promise (pending or settled) is returned as is, with the
    /// same identity, and no engine work is started. Configuration errors
    /// and an engine that refuses to start are returned as `Err`; build
    /// failures only ever arrive through the promise.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn handle(&self, file: &FileEvent) -> Result<BundlePromise> {
        let path = file.file_path();
        let _guard = self
            .handle_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(cached) = self.registry.lookup(path) {
            debug!(file = %path.display(), promise = cached.id(), "already have a bundle");
            return Ok(cached);
        }

        debug!(
            file = %path.display(),
            output = %file.output_path().display(),
            watch = file.should_watch(),
            "processing file"
        );

        let build = resolve_build(&self.options, path, file.output_path())?;
        let started = start_session(self.engine.as_ref(), file, build, &self.registry)?;

        Ok(self.registry.lookup(path).unwrap_or(started))
    }

    /// The built-in options, rebuilt on every call.
    pub fn default_options() -> DefaultOptions {
        DefaultOptions {
            engine_options: default_engine_options(),
            watch_options: WatchOptions::default(),
        }
    }

    /// Forget every cached bundle. Running sessions are not stopped.
    pub fn reset(&self) {
        self.registry.reset();
    }
}
