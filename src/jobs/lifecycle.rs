// src/jobs/lifecycle.rs

//! Starting background jobs and keeping their table entries current.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{Job, JobId, JobTable};
use crate::exec::{ProcessEvent, ProcessHandle, ProcessRunner, RunningProcess};

/// What a background execute hands back right away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundStart {
    pub job_id: JobId,
    /// `None` when the shell could not be started.
    pub pid: Option<u32>,
}

/// Start `command` detached and register it in `table`.
///
/// Returns without waiting for output. A spawn failure is not returned as an
/// error: it is recorded as an already-completed job with the error text on
/// stderr, so the caller discovers it through the normal status read.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_background(table: &Arc<JobTable>, runner: &ProcessRunner, command: &str) -> BackgroundStart {
    match runner.start(command) {
        Ok(RunningProcess { handle, events }) => {
            let pid = handle.pid();
            let job_id = table.register(|id| Job::running(id, command, pid));
            info!(job_id = %job_id, pid, cmd = %command, "background job started");

            tokio::spawn(relay_events(Arc::clone(table), job_id.clone(), handle, events));

            BackgroundStart {
                job_id,
                pid: Some(pid),
            }
        }
        Err(e) => {
            let message = format!("{e:#}");
            let job_id = table.register(|id| Job::spawn_failed(id, command, &message));
            warn!(job_id = %job_id, cmd = %command, error = %message, "background job failed to start");

            BackgroundStart { job_id, pid: None }
        }
    }
}

/// Fold process events into the job until its terminal event.
///
/// Holds the process handle for the lifetime of the process.
async fn relay_events(
    table: Arc<JobTable>,
    job_id: JobId,
    handle: ProcessHandle,
    mut events: mpsc::UnboundedReceiver<ProcessEvent>,
) {
    let pid = handle.pid();

    loop {
        let event = events.recv().await.unwrap_or_else(|| ProcessEvent::Failed {
            message: "process event stream closed unexpectedly".to_string(),
        });
        let terminal = event.is_terminal();

        let mut finished = None;
        let present = table.update(&job_id, |job| {
            job.apply(event);
            if terminal {
                finished = Some((
                    job.exit_code(),
                    job.started_at().elapsed(),
                    job.command().to_string(),
                ));
            }
        });

        if !present {
            warn!(job_id = %job_id, pid, "job vanished from table before completion");
            return;
        }

        if let Some((exit_code, elapsed, command)) = finished {
            info!(
                job_id = %job_id,
                pid,
                cmd = %command,
                exit_code = ?exit_code,
                elapsed_ms = elapsed.as_millis(),
                "background job completed"
            );
            return;
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn poll_until_done(table: &JobTable, id: &str) -> super::super::JobStatus {
        for _ in 0..200 {
            let status = table.lookup(id).unwrap();
            if !status.running {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("job {id} did not complete");
    }

    #[tokio::test]
    async fn returns_before_command_finishes() {
        let table = Arc::new(JobTable::new());
        let runner = ProcessRunner::default();

        let started = std::time::Instant::now();
        let start = spawn_background(&table, &runner, "sleep 2");
        assert!(started.elapsed() < Duration::from_secs(1));

        assert!(!start.job_id.is_empty());
        assert!(start.pid.is_some_and(|pid| pid > 0));
        assert!(table.lookup(&start.job_id).unwrap().running);
    }

    #[tokio::test]
    async fn output_and_exit_code_land_in_table() {
        let table = Arc::new(JobTable::new());
        let runner = ProcessRunner::default();
        let start = spawn_background(&table, &runner, "echo out; echo err >&2; exit 5");

        let status = poll_until_done(&table, &start.job_id).await;
        assert_eq!(status.stdout, "out\n");
        assert_eq!(status.stderr, "err\n");
        assert_eq!(status.exit_code, Some(5));
    }

    #[tokio::test]
    async fn spawn_failure_becomes_failed_job() {
        let table = Arc::new(JobTable::new());
        let runner = ProcessRunner::new("/nonexistent/jobshell-shell");
        let start = spawn_background(&table, &runner, "echo hi");

        assert_eq!(start.pid, None);
        let status = table.read_and_maybe_evict(&start.job_id).unwrap();
        assert!(!status.running);
        assert_eq!(status.exit_code, Some(crate::exec::FAILURE_EXIT_CODE));
        assert!(status.stderr.contains("spawning shell"));
    }

    #[test]
    fn start_serializes_as_job_id_and_pid() {
        let start = BackgroundStart {
            job_id: "abcd1234".into(),
            pid: Some(77),
        };
        assert_eq!(
            serde_json::to_value(start).unwrap(),
            serde_json::json!({"jobId": "abcd1234", "pid": 77})
        );
    }
}
