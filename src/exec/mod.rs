// src/exec/mod.rs

//! Bundler execution layer.
//!
//! - [`backend`] defines the `BundlerEngine` trait, the events engines emit
//!   and the `BuildStats` they report.
//! - [`build_runner`] runs a single bundler process and turns its output
//!   into statistics.
//! - [`command`] provides `CommandEngine`, the production engine, including
//!   its watch-mode rebuild loop.

pub mod backend;
pub mod build_runner;
pub mod command;

pub use backend::{
    BuildStats, BundlerEngine, CompilerEvent, CompilerEvents, EngineFailure, Watching,
};
pub use command::CommandEngine;
