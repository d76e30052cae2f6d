// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Caller-supplied preprocessor configuration.
///
/// Read from TOML, e.g.:
///
/// ```toml
/// additional_entries = ["./support/polyfills.js"]
///
/// [engine_options]
/// devtool = "source-map"
///
/// [[engine_options.module.rules]]
/// test = '\.coffee$'
/// exclude = ["node_modules"]
/// use = [{ loader = "coffee-loader" }]
///
/// [watch_options]
/// aggregate_timeout = 200
/// ignored = ["**/fixtures/**"]
/// ```
///
/// Every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreprocessorOptions {
    /// Engine configuration. When absent the built-in default is used.
    #[serde(default, alias = "webpack_options", skip_serializing_if = "Option::is_none")]
    pub engine_options: Option<EngineOptions>,

    /// Passed through to the engine's watch mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch_options: Option<WatchOptions>,

    /// Extra entry points bundled after the primary input, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_entries: Vec<PathBuf>,

    /// How the process-backed engine invokes the bundler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<CommandSection>,
}

/// Engine configuration.
///
/// Only the fields this crate has to reason about are typed; everything else
/// is kept verbatim in `extra` and handed to the engine untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devtool: Option<String>,

    #[serde(default)]
    pub module: ModuleOptions,

    /// Entry files. Always overwritten when a build is resolved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<PathBuf>,

    /// Output location. Always overwritten when a build is resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputOptions>,

    #[serde(flatten)]
    pub extra: toml::Table,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleOptions {
    #[serde(default)]
    pub rules: Vec<RuleSet>,

    #[serde(flatten)]
    pub extra: toml::Table,
}

/// One transform rule: files whose path matches `test` (and none of
/// `exclude`) go through `loaders`, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Regex matched against the module path.
    pub test: String,

    /// Regexes; a match on any of them skips the rule.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    #[serde(default, rename = "use")]
    pub loaders: Vec<LoaderUse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderUse {
    pub loader: String,

    #[serde(default, skip_serializing_if = "toml::Table::is_empty")]
    pub options: toml::Table,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputOptions {
    /// Directory the bundle is written to.
    pub path: PathBuf,
    /// File name of the bundle inside `path`.
    pub filename: String,
}

/// Watch-mode settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchOptions {
    /// Milliseconds to wait after the last change before rebuilding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_timeout: Option<u64>,

    /// Glob patterns for paths whose changes never trigger a rebuild.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignored: Vec<String>,

    #[serde(flatten)]
    pub extra: toml::Table,
}

/// `[command]` section for the process-backed engine.
///
/// `args` may contain `{config}`, `{entry}` and `{output}` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSection {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Snapshot of the defaults, as exposed by
/// [`Preprocessor::default_options`](crate::preprocessor::Preprocessor::default_options).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefaultOptions {
    pub engine_options: EngineOptions,
    pub watch_options: WatchOptions,
}
