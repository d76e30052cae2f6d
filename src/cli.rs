// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `bundlewatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "bundlewatch",
    version,
    about = "Bundle a source file and keep the bundle up to date.",
    long_about = None
)]
pub struct CliArgs {
    /// Source file to bundle.
    #[arg(value_name = "FILE", required_unless_present = "print_defaults")]
    pub file: Option<PathBuf>,

    /// Where to write the bundle.
    ///
    /// Default: `dist/<FILE NAME>` next to the source file. A path that does
    /// not end in `.js` gets `.js` appended.
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Keep watching and rebuild on every source change until Ctrl-C.
    #[arg(long, short)]
    pub watch: bool,

    /// Path to the options file (TOML).
    ///
    /// Default: `Bundlewatch.toml` in the current working directory. A
    /// missing default file means built-in options.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BUNDLEWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the built-in default options as TOML and exit.
    #[arg(long)]
    pub print_defaults: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
