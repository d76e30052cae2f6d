// src/lib.rs

pub mod cli;
pub mod compiler;
pub mod config;
pub mod deferred;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod preprocessor;
pub mod registry;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{default_config_path, load_and_validate, load_or_default};
use crate::errors::BuildFailure;
use crate::exec::CommandEngine;
use crate::types::BundlePath;

pub use crate::preprocessor::{FileEvent, Preprocessor};

/// Directory, next to the input, that bundles go to when `--output` is not
/// given.
pub const DEFAULT_OUTPUT_DIR: &str = "dist";

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - options loading
/// - the process-backed engine and the preprocessor
/// - the rerun loop (watch mode)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    if args.print_defaults {
        let defaults = toml::to_string_pretty(&Preprocessor::default_options())
            .context("rendering default options")?;
        print!("{defaults}");
        return Ok(());
    }

    let file = args
        .file
        .as_deref()
        .ok_or_else(|| anyhow!("no input file given"))?;
    let file_path = std::path::absolute(file)
        .with_context(|| format!("resolving input path {}", file.display()))?;

    let options = match &args.config {
        Some(path) => load_and_validate(path)
            .with_context(|| format!("loading options from {}", path.display()))?,
        None => load_or_default(default_config_path())?,
    };
    let command = options.command.clone().ok_or_else(|| {
        anyhow!("options have no [command] section; bundlewatch needs a bundler command to run")
    })?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&file_path));

    let engine = Arc::new(CommandEngine::new(command));
    let preprocessor = Preprocessor::new(options, engine);
    let event = FileEvent::new(file_path, output, args.watch);

    if args.watch {
        watch_until_interrupted(&preprocessor, &event).await?;
    } else {
        let promise = preprocessor.handle(&event)?;
        let result = promise.wait().await;
        event.close().await;
        println!("{}", result?.display());
    }

    Ok(())
}

/// `<dir>/dist/<file name>` for an input at `<dir>/<file name>`.
fn default_output_path(file_path: &Path) -> PathBuf {
    let dir = file_path.parent().unwrap_or_else(|| Path::new("."));
    let name = file_path.file_name().unwrap_or(file_path.as_os_str());
    dir.join(DEFAULT_OUTPUT_DIR).join(name)
}

async fn watch_until_interrupted(preprocessor: &Preprocessor, event: &FileEvent) -> Result<()> {
    let mut reruns = event.subscribe_rerun();
    let mut promise = preprocessor.handle(event)?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            result = promise.wait() => report(result),
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            rerun = reruns.recv() => match rerun {
                Ok(()) => {}
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "coalescing missed reruns"),
                Err(RecvError::Closed) => break,
            },
        }

        promise = preprocessor.handle(event)?;
    }

    info!("shutting down");
    event.close().await;
    Ok(())
}

fn report(result: std::result::Result<BundlePath, BuildFailure>) {
    match result {
        Ok(bundle) => println!("{}", bundle.display()),
        Err(failure) => warn!(
            file = %failure.file_path.display(),
            kind = ?failure.kind,
            "build failed:\n{}",
            failure.message
        ),
    }
}
