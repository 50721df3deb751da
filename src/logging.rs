// src/logging.rs

//! Logging setup for `jobshell` using `tracing` + `tracing-subscriber`.
//!
//! Filter selection, first match wins:
//! 1. `--log-level` CLI flag (applies to everything)
//! 2. `JOBSHELL_LOG` environment variable, in `EnvFilter` syntax
//!    (e.g. `debug` or `jobshell::jobs=trace,info`)
//! 3. `info`
//!
//! Logs go to STDERR without ANSI colours; stdout carries protocol
//! responses only.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "JOBSHELL_LOG";

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = resolve_filter(cli_level, std::env::var(LOG_ENV_VAR).ok().as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

fn resolve_filter(cli_level: Option<LogLevel>, env_value: Option<&str>) -> EnvFilter {
    if let Some(lvl) = cli_level {
        return EnvFilter::new(directive_for(lvl));
    }
    env_value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn directive_for(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flag_wins_over_env() {
        let filter = resolve_filter(Some(LogLevel::Trace), Some("error"));
        assert_eq!(filter.to_string(), "trace");
    }

    #[test]
    fn env_directives_are_used_when_valid() {
        let filter = resolve_filter(None, Some(" jobshell::jobs=debug "));
        assert_eq!(filter.to_string(), "jobshell::jobs=debug");
    }

    #[test]
    fn falls_back_to_info() {
        assert_eq!(resolve_filter(None, None).to_string(), "info");
        assert_eq!(resolve_filter(None, Some("")).to_string(), "info");
        assert_eq!(resolve_filter(None, Some("jobshell=loudest")).to_string(), "info");
    }
}
