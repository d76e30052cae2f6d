// src/exec/build_runner.rs

//! One bundler process invocation.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::{CommandSection, EngineOptions};
use crate::exec::backend::{BuildStats, EngineFailure};
use crate::fs::FileSystem;

/// Directory (inside the output directory) holding rendered engine configs.
pub const CONFIG_DIR: &str = ".bundlewatch";

/// Values substituted for `{config}`, `{entry}` and `{output}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholders {
    pub config: PathBuf,
    pub entry: OsString,
    pub output: PathBuf,
}

impl Placeholders {
    pub fn from_options(options: &EngineOptions) -> Result<Self, EngineFailure> {
        let output = options
            .output
            .as_ref()
            .ok_or_else(|| EngineFailure::new("engine options have no output location"))?;
        let entry = std::env::join_paths(&options.entry)
            .map_err(|e| EngineFailure::new(format!("invalid entry path: {e}")))?;

        Ok(Self {
            config: output
                .path
                .join(CONFIG_DIR)
                .join(format!("{}.toml", output.filename)),
            entry,
            output: output.path.join(&output.filename),
        })
    }

    pub fn substitute(&self, template: &str) -> String {
        template
            .replace("{config}", &self.config.to_string_lossy())
            .replace("{entry}", &self.entry.to_string_lossy())
            .replace("{output}", &self.output.to_string_lossy())
    }
}

/// Build the process for one compile.
///
/// Without `args`, `program` is a shell command line (like a task `cmd`);
/// with `args`, it is executed directly.
pub fn build_command(section: &CommandSection, vars: &Placeholders) -> Command {
    let mut cmd = if section.args.is_empty() {
        let line = vars.substitute(&section.program);
        if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(line);
            c
        }
    } else {
        let mut c = Command::new(vars.substitute(&section.program));
        c.args(section.args.iter().map(|arg| vars.substitute(arg)));
        c
    };

    cmd.env("BUNDLEWATCH_CONFIG", &vars.config)
        .env("BUNDLEWATCH_ENTRY", &vars.entry)
        .env("BUNDLEWATCH_OUTPUT", &vars.output)
        .envs(&section.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Delete the engine config rendered by [`run_build`].
pub fn remove_rendered_config(options: &EngineOptions, fs: &dyn FileSystem) {
    let Ok(vars) = Placeholders::from_options(options) else {
        return;
    };
    if let Err(err) = fs.remove_file(&vars.config) {
        debug!(config = %vars.config.display(), error = %err, "could not remove rendered config");
    }
}

/// Split bundler stderr into diagnostics separated by blank lines.
pub fn split_diagnostics(stderr: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in stderr.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                chunks.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        chunks.push(current.join("\n"));
    }
    chunks
}

fn is_warning(diagnostic: &str) -> bool {
    diagnostic
        .get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("warning"))
}

/// Run one compile: render the engine options, start the bundler, and turn
/// its exit status and stderr into [`BuildStats`].
///
/// - Failure to prepare or spawn the process is an [`EngineFailure`].
/// - Exit status 0: warnings are the stderr diagnostics starting with
///   `warning`; everything else on stderr is ignored.
/// - Non-zero exit: every stderr diagnostic is an error.
pub async fn run_build(
    section: &CommandSection,
    options: &EngineOptions,
    fs: &dyn FileSystem,
) -> Result<BuildStats, EngineFailure> {
    let started = Instant::now();
    let vars = Placeholders::from_options(options)?;

    let rendered = toml::to_string(options)
        .map_err(|e| EngineFailure::new(format!("rendering engine options: {e}")))?;
    fs.write(&vars.config, rendered.as_bytes())
        .map_err(|e| EngineFailure::new(format!("{e:#}")))?;

    info!(
        entry = %vars.entry.to_string_lossy(),
        output = %vars.output.display(),
        program = %section.program,
        "starting bundler process"
    );

    let output = build_command(section, &vars)
        .output()
        .await
        .map_err(|e| EngineFailure::new(format!("spawning bundler `{}`: {e}", section.program)))?;

    for line in String::from_utf8_lossy(&output.stdout).lines() {
        debug!(output = %vars.output.display(), "stdout: {}", line);
    }

    let diagnostics = split_diagnostics(&String::from_utf8_lossy(&output.stderr));
    let code = output.status.code().unwrap_or(-1);

    let mut stats = BuildStats {
        duration: started.elapsed(),
        ..BuildStats::default()
    };
    if output.status.success() {
        stats.warnings = diagnostics.into_iter().filter(|d| is_warning(d)).collect();
    } else if diagnostics.is_empty() {
        stats.errors = vec![format!("bundler exited with status {code}")];
    } else {
        stats.errors = diagnostics;
    }

    info!(
        output = %vars.output.display(),
        exit_code = code,
        errors = stats.errors.len(),
        warnings = stats.warnings.len(),
        "bundler process exited"
    );

    Ok(stats)
}
