// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `jobshell`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "jobshell",
    version,
    about = "Serve shell command execution (foreground or background jobs) over JSON-RPC on stdio.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Jobshell.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `JOBSHELL_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Default foreground timeout in milliseconds (overrides the config file).
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Parse + validate config, print it, but don't serve or execute anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Execute a single command in the foreground, print the JSON result and
    /// exit with the command's exit code.
    #[arg(long, value_name = "COMMAND", conflicts_with = "dry_run")]
    pub run: Option<String>,
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
