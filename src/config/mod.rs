// src/config/mod.rs

//! Configuration for the preprocessor.
//!
//! - `model.rs`: the TOML-backed option types.
//! - `loader.rs`: reading an options file from disk.
//! - `validate.rs`: pattern and entry checks.
//! - `resolve.rs`: defaults, required overrides, merging and entry/output
//!   wiring for a single file.

pub mod loader;
pub mod model;
pub mod resolve;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{
    CommandSection, DefaultOptions, EngineOptions, LoaderUse, ModuleOptions, OutputOptions,
    PreprocessorOptions, RuleSet, WatchOptions,
};
pub use resolve::{
    default_engine_options, merge_engine_options, required_overrides, resolve_build,
    resolve_output_path, ResolvedBuild,
};
pub use validate::{validate_engine_options, validate_options, validate_watch_options};
