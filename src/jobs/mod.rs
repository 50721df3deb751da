// src/jobs/mod.rs

//! Background jobs.
//!
//! - [`table`] is the registry of jobs by id, with read-and-evict semantics.
//! - [`lifecycle`] starts detached processes and relays their events into
//!   the table.
//!
//! A job is `Running` from the moment its process exists and becomes
//! `Completed` exactly once. A shell that fails to start produces a job that
//! is born `Completed`.

pub mod lifecycle;
pub mod table;

use std::time::Instant;

use serde::Serialize;
use tracing::warn;

use crate::exec::{CapturedOutput, FAILURE_EXIT_CODE, ProcessEvent};

pub use lifecycle::{BackgroundStart, spawn_background};
pub use table::JobTable;

/// Opaque job handle handed out to callers.
pub type JobId = String;

/// Lifecycle state of a job (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Running,
    Completed { exit_code: i32 },
}

/// Point-in-time view of a job, as returned by status reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub running: bool,
}

/// One background-executed command.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    command: String,
    pid: Option<u32>,
    output: CapturedOutput,
    state: JobState,
    started_at: Instant,
}

impl Job {
    /// A job whose process is alive.
    pub fn running(id: JobId, command: &str, pid: u32) -> Self {
        Self {
            id,
            command: command.to_string(),
            pid: Some(pid),
            output: CapturedOutput::default(),
            state: JobState::Running,
            started_at: Instant::now(),
        }
    }

    /// A job whose shell never started; complete from birth.
    pub fn spawn_failed(id: JobId, command: &str, error: &str) -> Self {
        let mut output = CapturedOutput::default();
        output.note_stderr(error);
        Self {
            id,
            command: command.to_string(),
            pid: None,
            output,
            state: JobState::Completed {
                exit_code: FAILURE_EXIT_CODE,
            },
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn is_running(&self) -> bool {
        self.state == JobState::Running
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.state {
            JobState::Running => None,
            JobState::Completed { exit_code } => Some(exit_code),
        }
    }

    /// Fold one process event into the job.
    ///
    /// Output arriving after completion and a second terminal event are both
    /// dropped: the exit code is set once and the accumulators freeze with it.
    pub fn apply(&mut self, event: ProcessEvent) {
        if !self.is_running() {
            warn!(job_id = %self.id, ?event, "event for completed job ignored");
            return;
        }
        match event {
            ProcessEvent::Output { stream, data } => self.output.append(stream, &data),
            ProcessEvent::Exited { code } => self.complete(code),
            ProcessEvent::Failed { message } => {
                self.output.note_stderr(&message);
                self.complete(FAILURE_EXIT_CODE);
            }
        }
    }

    fn complete(&mut self, exit_code: i32) {
        self.state = JobState::Completed { exit_code };
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            stdout: self.output.stdout_lossy(),
            stderr: self.output.stderr_lossy(),
            exit_code: self.exit_code(),
            running: self.is_running(),
        }
    }

    #[cfg(test)]
    pub(crate) fn append_for_test(&mut self, stream: crate::exec::OutputStream, data: &[u8]) {
        self.apply(ProcessEvent::Output {
            stream,
            data: data.to_vec(),
        });
    }
}
