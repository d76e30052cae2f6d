// src/config/validate.rs

use globset::Glob;
use regex::Regex;

use crate::config::model::{EngineOptions, PreprocessorOptions, WatchOptions};
use crate::errors::{BundlewatchError, Result};

/// Validate a whole options file.
pub fn validate_options(options: &PreprocessorOptions) -> Result<()> {
    if let Some(engine) = &options.engine_options {
        validate_engine_options(engine)?;
    }
    if let Some(watch) = &options.watch_options {
        validate_watch_options(watch)?;
    }
    validate_additional_entries(options)?;
    validate_command(options)?;
    Ok(())
}

/// Every rule's `test` and `exclude` must be a valid regex.
pub fn validate_engine_options(engine: &EngineOptions) -> Result<()> {
    for (idx, rule) in engine.module.rules.iter().enumerate() {
        Regex::new(&rule.test).map_err(|e| {
            BundlewatchError::InvalidPattern(format!(
                "module.rules[{idx}].test {:?}: {e}",
                rule.test
            ))
        })?;
        for exclude in &rule.exclude {
            Regex::new(exclude).map_err(|e| {
                BundlewatchError::InvalidPattern(format!(
                    "module.rules[{idx}].exclude {exclude:?}: {e}"
                ))
            })?;
        }
        for loader in &rule.loaders {
            if loader.loader.trim().is_empty() {
                return Err(BundlewatchError::ConfigError(format!(
                    "module.rules[{idx}] has a loader with an empty name"
                )));
            }
        }
    }
    Ok(())
}

pub fn validate_watch_options(watch: &WatchOptions) -> Result<()> {
    for pattern in &watch.ignored {
        Glob::new(pattern).map_err(|e| {
            BundlewatchError::InvalidPattern(format!("watch_options.ignored {pattern:?}: {e}"))
        })?;
    }
    Ok(())
}

fn validate_additional_entries(options: &PreprocessorOptions) -> Result<()> {
    if options
        .additional_entries
        .iter()
        .any(|entry| entry.as_os_str().is_empty())
    {
        return Err(BundlewatchError::ConfigError(
            "additional_entries must not contain empty paths".to_string(),
        ));
    }
    Ok(())
}

fn validate_command(options: &PreprocessorOptions) -> Result<()> {
    if let Some(command) = &options.command {
        if command.program.trim().is_empty() {
            return Err(BundlewatchError::ConfigError(
                "[command].program must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}
