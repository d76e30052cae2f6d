// src/logging.rs

//! Logging setup for `bundlewatch` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `BUNDLEWATCH_LOG` environment variable, as a level ("debug") or a full
//!    filter directive ("info,bundlewatch::stats=debug")
//! 3. default to `info`
//!
//! Logs are sent to STDERR so that stdout only carries bundle paths.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

/// Environment variable consulted when no `--log-level` is given.
pub const LOG_ENV: &str = "BUNDLEWATCH_LOG";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = build_filter(cli_level, std::env::var(LOG_ENV).ok().as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

fn build_filter(cli_level: Option<LogLevel>, env_value: Option<&str>) -> EnvFilter {
    if let Some(level) = cli_level {
        return level_filter(level_from_log_level(level));
    }

    env_value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| match parse_level_str(s) {
            Some(level) => Some(level_filter(level)),
            None => EnvFilter::try_new(s).ok(),
        })
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn level_filter(level: tracing::Level) -> EnvFilter {
    EnvFilter::new(level.as_str().to_ascii_lowercase())
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_are_case_insensitive() {
        assert_eq!(parse_level_str(" DEBUG "), Some(tracing::Level::DEBUG));
        assert_eq!(parse_level_str("warning"), Some(tracing::Level::WARN));
        assert_eq!(parse_level_str("bundlewatch=debug"), None);
    }

    #[test]
    fn cli_flag_beats_environment() {
        let filter = build_filter(Some(LogLevel::Trace), Some("error"));
        assert_eq!(filter.to_string().to_lowercase(), "trace");
    }

    #[test]
    fn environment_accepts_directives() {
        let filter = build_filter(None, Some("info,bundlewatch::stats=debug"));
        assert!(filter.to_string().contains("bundlewatch::stats=debug"));
    }

    #[test]
    fn falls_back_to_info() {
        assert_eq!(build_filter(None, None).to_string().to_lowercase(), "info");
        assert_eq!(build_filter(None, Some("   ")).to_string().to_lowercase(), "info");
    }
}
