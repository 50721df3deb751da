// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod jobs;
pub mod logging;
pub mod server;
pub mod service;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::BufReader;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_or_default, validate_config};
use crate::service::{ExecuteRequest, ExecuteResult, ShellService};

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading (+ CLI overrides)
/// - the shell service and its job table
/// - either a one-shot `--run`, a `--dry-run` print, or the stdio server
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = args.config.as_ref().map(PathBuf::from);
    let cfg = load_or_default(config_path.as_deref())
        .context("loading configuration")?
        .with_default_timeout_ms(args.timeout_ms);
    validate_config(&cfg)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(0);
    }

    let service = ShellService::new(&cfg.exec);

    if let Some(command) = args.run {
        return run_once(&service, command).await;
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    tokio::select! {
        res = server::serve(service, stdin, stdout) => {
            res.context("serving requests on stdio")?;
        }
        res = tokio::signal::ctrl_c() => {
            res.context("listening for Ctrl+C")?;
            info!("Ctrl+C received; shutting down");
        }
    }

    Ok(0)
}

/// Execute one foreground command and print its result as JSON.
async fn run_once(service: &ShellService, command: String) -> Result<i32> {
    let result = service.execute(ExecuteRequest::foreground(command)).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    match result {
        ExecuteResult::Completed(out) => Ok(out.exit_code),
        ExecuteResult::Background(_) => Ok(0),
    }
}

/// Simple dry-run output: print the effective configuration.
fn print_dry_run(cfg: &ConfigFile) {
    println!("jobshell dry-run");
    println!("  exec.shell = {}", cfg.exec.shell);
    println!("  exec.default_timeout_ms = {}", cfg.exec.default_timeout_ms);
    println!("  exec.grace_period_ms = {}", cfg.exec.grace_period_ms);

    debug!("dry-run complete (no execution)");
}
