#![allow(dead_code)]

use std::path::PathBuf;

use bundlewatch::config::{
    CommandSection, EngineOptions, LoaderUse, PreprocessorOptions, RuleSet, WatchOptions,
};

/// Builder for `PreprocessorOptions` to simplify test setup.
pub struct PreprocessorOptionsBuilder {
    options: PreprocessorOptions,
}

impl PreprocessorOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: PreprocessorOptions::default(),
        }
    }

    pub fn with_engine_options(mut self, engine: EngineOptions) -> Self {
        self.options.engine_options = Some(engine);
        self
    }

    /// Add a caller rule applying `loader` to paths matching `test`.
    pub fn with_rule(mut self, test: &str, loader: &str) -> Self {
        let engine = self.options.engine_options.get_or_insert_with(EngineOptions::default);
        engine.module.rules.push(RuleSet {
            test: test.to_string(),
            exclude: vec![],
            loaders: vec![LoaderUse {
                loader: loader.to_string(),
                options: toml::Table::new(),
            }],
        });
        self
    }

    pub fn with_devtool(mut self, devtool: &str) -> Self {
        let engine = self.options.engine_options.get_or_insert_with(EngineOptions::default);
        engine.devtool = Some(devtool.to_string());
        self
    }

    pub fn with_ignored(mut self, pattern: &str) -> Self {
        let watch = self.options.watch_options.get_or_insert_with(WatchOptions::default);
        watch.ignored.push(pattern.to_string());
        self
    }

    pub fn with_aggregate_timeout(mut self, millis: u64) -> Self {
        let watch = self.options.watch_options.get_or_insert_with(WatchOptions::default);
        watch.aggregate_timeout = Some(millis);
        self
    }

    pub fn with_additional_entry(mut self, path: &str) -> Self {
        self.options.additional_entries.push(PathBuf::from(path));
        self
    }

    /// Shell command line for the process-backed engine.
    pub fn with_command(mut self, program: &str) -> Self {
        self.options.command = Some(CommandSection {
            program: program.to_string(),
            args: vec![],
            env: Default::default(),
        });
        self
    }

    pub fn build(self) -> PreprocessorOptions {
        self.options
    }
}

impl Default for PreprocessorOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
