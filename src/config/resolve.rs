// src/config/resolve.rs

//! Turns caller options into the concrete engine configuration for one file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{
    EngineOptions, LoaderUse, ModuleOptions, OutputOptions, PreprocessorOptions, RuleSet,
    WatchOptions,
};
use crate::config::validate::validate_engine_options;
use crate::errors::{BundlewatchError, Result};

/// Everything the compiler session needs to build one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBuild {
    pub engine_options: EngineOptions,
    pub watch_options: WatchOptions,
    pub output_path: PathBuf,
}

/// Built-in engine options used when the caller supplies none.
///
/// Built on every call, and only when the caller supplies no engine options.
pub fn default_engine_options() -> EngineOptions {
    debug!("loading default engine options");

    let mut preset = toml::Table::new();
    preset.insert(
        "presets".to_string(),
        toml::Value::Array(vec![toml::Value::String("@babel/preset-env".to_string())]),
    );

    EngineOptions {
        module: ModuleOptions {
            rules: vec![RuleSet {
                test: r"\.jsx?$".to_string(),
                exclude: vec!["node_modules".to_string()],
                loaders: vec![LoaderUse {
                    loader: "babel-loader".to_string(),
                    options: preset,
                }],
            }],
            ..ModuleOptions::default()
        },
        ..EngineOptions::default()
    }
}

/// Overrides applied on top of every configuration: inline source maps and
/// the typed-script rule.
pub fn required_overrides() -> EngineOptions {
    debug!("loading required engine overrides");

    let mut compiler_options = toml::Table::new();
    compiler_options.insert("sourceMap".to_string(), toml::Value::Boolean(true));
    compiler_options.insert("inlineSourceMap".to_string(), toml::Value::Boolean(false));

    let mut ts_options = toml::Table::new();
    ts_options.insert(
        "compilerOptions".to_string(),
        toml::Value::Table(compiler_options),
    );

    EngineOptions {
        devtool: Some("inline-source-map".to_string()),
        module: ModuleOptions {
            rules: vec![RuleSet {
                test: r"\.tsx?$".to_string(),
                exclude: vec!["node_modules".to_string()],
                loaders: vec![LoaderUse {
                    loader: "ts-loader".to_string(),
                    options: ts_options,
                }],
            }],
            ..ModuleOptions::default()
        },
        ..EngineOptions::default()
    }
}

/// Merge `overrides` into `base`.
///
/// - `module.rules` are appended (base rules first).
/// - Scalars and lists set in `overrides` replace those in `base`.
/// - Untyped tables are merged key by key, `overrides` winning.
pub fn merge_engine_options(mut base: EngineOptions, overrides: EngineOptions) -> EngineOptions {
    if overrides.devtool.is_some() {
        base.devtool = overrides.devtool;
    }
    base.module.rules.extend(overrides.module.rules);
    merge_tables(&mut base.module.extra, overrides.module.extra);
    if !overrides.entry.is_empty() {
        base.entry = overrides.entry;
    }
    if overrides.output.is_some() {
        base.output = overrides.output;
    }
    merge_tables(&mut base.extra, overrides.extra);
    base
}

fn merge_tables(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        match value {
            toml::Value::Table(incoming) => match base.get_mut(&key) {
                Some(toml::Value::Table(existing)) => merge_tables(existing, incoming),
                _ => {
                    base.insert(key, toml::Value::Table(incoming));
                }
            },
            other => {
                base.insert(key, other);
            }
        }
    }
}

/// Final bundle location for a requested output path.
///
/// A path whose extension is exactly `js` is kept; anything else gets `.js`
/// appended to the whole path (`spec.ts` becomes `spec.ts.js`).
pub fn resolve_output_path(requested: &Path) -> PathBuf {
    if requested.extension().is_some_and(|ext| ext == "js") {
        return requested.to_path_buf();
    }
    let mut raw: OsString = requested.as_os_str().to_os_string();
    raw.push(".js");
    PathBuf::from(raw)
}

/// Resolve the full build configuration for one input file.
///
/// Errors here are configuration mistakes, not build failures, and are
/// returned to the caller directly.
pub fn resolve_build(
    options: &PreprocessorOptions,
    file_path: &Path,
    requested_output: &Path,
) -> Result<ResolvedBuild> {
    if file_path.as_os_str().is_empty() {
        return Err(BundlewatchError::ConfigError(
            "file path must not be empty".to_string(),
        ));
    }

    let base = match &options.engine_options {
        Some(user) => user.clone(),
        None => default_engine_options(),
    };
    let mut engine_options = merge_engine_options(base, required_overrides());
    validate_engine_options(&engine_options)?;

    let output_path = resolve_output_path(requested_output);
    let output_dir = output_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| {
            BundlewatchError::ConfigError(format!(
                "output path {output_path:?} has no parent directory"
            ))
        })?;
    let filename = output_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            BundlewatchError::ConfigError(format!("output path {output_path:?} has no file name"))
        })?;

    engine_options.entry = std::iter::once(file_path.to_path_buf())
        .chain(options.additional_entries.iter().cloned())
        .collect();
    engine_options.output = Some(OutputOptions {
        path: output_dir.to_path_buf(),
        filename,
    });

    let watch_options = options.watch_options.clone().unwrap_or_default();

    debug!(?engine_options, "resolved engine options");
    debug!(?watch_options, "resolved watch options");

    Ok(ResolvedBuild {
        engine_options,
        watch_options,
        output_path,
    })
}
