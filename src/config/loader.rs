// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::PreprocessorOptions;
use crate::config::validate::validate_options;
use crate::errors::Result;

/// Load preprocessor options from a TOML file without validating them.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<PreprocessorOptions> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let options: PreprocessorOptions = toml::from_str(&contents)?;

    Ok(options)
}

/// Load options from `path` and validate patterns and entries.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PreprocessorOptions> {
    let options = load_from_path(&path)?;
    validate_options(&options)?;
    Ok(options)
}

/// Like [`load_and_validate`], but a missing file yields default options.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<PreprocessorOptions> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(?path, "no options file found; using defaults");
        return Ok(PreprocessorOptions::default());
    }
    load_and_validate(path)
}

/// `Bundlewatch.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Bundlewatch.toml")
}
