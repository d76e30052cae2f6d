// src/watch/mod.rs

//! File watching for the process-backed engine.
//!
//! This module is responsible for:
//! - Compiling `watch_options.ignored` glob patterns.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - Content hashing, so saves that don't change a file don't rebuild it.
//!
//! It knows nothing about bundles or the registry; it only turns filesystem
//! changes into a stream of changed paths.

pub mod hash;
pub mod patterns;
pub mod watcher;

pub use hash::{compute_file_hash, ContentCache};
pub use patterns::{watch_roots, IgnoreSet, DEFAULT_IGNORED};
pub use watcher::{spawn_watcher, WatcherHandle};
