// src/service.rs

//! The two caller-facing operations: `execute` and `get_job_status`.
//!
//! [`ShellService`] owns its [`JobTable`] behind an `Arc`. Clones share the
//! table; separate services built with [`ShellService::new`] are isolated,
//! and [`ShellService::with_job_table`] lets several share one explicitly.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::config::ExecSection;
use crate::errors::Result;
use crate::exec::{CommandOutput, ProcessRunner, TimeoutPolicy, run_with_timeout};
use crate::jobs::{BackgroundStart, JobStatus, JobTable, spawn_background};

/// Arguments of an `execute` call, already validated by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteRequest {
    pub command: String,
    /// Foreground deadline in milliseconds; the configured default if absent.
    pub timeout_ms: Option<u64>,
    pub background: bool,
}

impl ExecuteRequest {
    pub fn foreground(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn background(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            background: true,
            ..Self::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Result of a foreground `execute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl From<CommandOutput> for CommandResult {
    fn from(out: CommandOutput) -> Self {
        Self {
            stdout: out.stdout,
            stderr: out.stderr,
            exit_code: out.exit_code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExecuteResult {
    Completed(CommandResult),
    Background(BackgroundStart),
}

#[derive(Debug, Clone)]
pub struct ShellService {
    jobs: Arc<JobTable>,
    runner: ProcessRunner,
    policy: TimeoutPolicy,
}

impl Default for ShellService {
    fn default() -> Self {
        Self::new(&ExecSection::default())
    }
}

impl ShellService {
    /// A service with its own, empty job table.
    pub fn new(exec: &ExecSection) -> Self {
        Self::with_job_table(exec, Arc::new(JobTable::new()))
    }

    pub fn with_job_table(exec: &ExecSection, jobs: Arc<JobTable>) -> Self {
        Self {
            jobs,
            runner: exec.runner(),
            policy: exec.timeout_policy(),
        }
    }

    pub fn jobs(&self) -> &Arc<JobTable> {
        &self.jobs
    }

    /// Run a command. Command failures, spawn failures and timeouts are all
    /// reported inside the result, never as an error.
    pub async fn execute(&self, request: ExecuteRequest) -> ExecuteResult {
        if request.background {
            debug!(cmd = %request.command, "execute in background");
            return ExecuteResult::Background(spawn_background(
                &self.jobs,
                &self.runner,
                &request.command,
            ));
        }

        let policy = match request.timeout_ms {
            Some(ms) => self.policy.with_timeout(Duration::from_millis(ms)),
            None => self.policy,
        };
        debug!(cmd = %request.command, timeout_ms = policy.timeout.as_millis(), "execute in foreground");

        let output = run_with_timeout(&self.runner, &request.command, policy).await;
        ExecuteResult::Completed(output.into())
    }

    /// Current state of a background job.
    ///
    /// Never blocks on the job. Reading a completed job removes it, so the
    /// next call with the same id fails with `JobNotFound`.
    pub fn get_job_status(&self, job_id: &str) -> Result<JobStatus> {
        self.jobs.read_and_maybe_evict(job_id)
    }
}
