// src/logging.rs

//! Logging setup for `dynatask` using `tracing` + `tracing-subscriber`.
//!
//! Filter, in priority order:
//! 1. `--log-level` CLI flag
//! 2. `DYNATASK_LOG`, either a bare level ("debug") or a full filter
//!    directive ("dynatask::dynamic=trace,info")
//! 3. `info`
//!
//! Logs go to STDERR; stdout only carries the final task tree.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "DYNATASK_LOG";

/// Initialise the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(lvl) => EnvFilter::new(level_from_log_level(lvl).as_str()),
        None => filter_from_env(std::env::var(LOG_ENV).ok().as_deref())?,
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn filter_from_env(value: Option<&str>) -> Result<EnvFilter> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(EnvFilter::new("info"));
    };
    if let Some(level) = parse_level_str(value) {
        return Ok(EnvFilter::new(level.as_str()));
    }
    EnvFilter::try_new(value).with_context(|| format!("invalid {LOG_ENV} filter '{value}'"))
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
    fn bare_levels_are_case_insensitive() {
        assert_eq!(parse_level_str(" Warning "), Some(tracing::Level::WARN));
        assert_eq!(parse_level_str("TRACE"), Some(tracing::Level::TRACE));
        assert_eq!(parse_level_str("loud"), None);
    }

    #[test]
    fn env_accepts_directives() {
        let filter = filter_from_env(Some("dynatask::dynamic=trace,info")).unwrap();
        assert!(filter.to_string().contains("dynatask::dynamic=trace"));
    }

    #[test]
    fn empty_env_defaults_to_info() {
        let filter = filter_from_env(Some("  ")).unwrap();
        assert!(filter.to_string().to_lowercase().contains("info"));
    }
}
