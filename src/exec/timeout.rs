// src/exec/timeout.rs

//! Foreground execution bounded by a deadline.
//!
//! On expiry the process group gets SIGTERM, then SIGKILL once the grace
//! period runs out. Any run whose deadline fired reports exit code 124.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use super::output::CapturedOutput;
use super::process::{FAILURE_EXIT_CODE, ProcessEvent, ProcessRunner, RunningProcess};

/// Conventional "command timed out" exit code (as used by `timeout(1)`).
pub const TIMEOUT_EXIT_CODE: i32 = 124;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub timeout: Duration,
    pub grace_period: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl TimeoutPolicy {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Result of a foreground run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
}

impl CommandOutput {
    fn from_captured(output: &CapturedOutput, exit_code: i32, timed_out: bool) -> Self {
        Self {
            stdout: output.stdout_lossy(),
            stderr: output.stderr_lossy(),
            exit_code,
            timed_out,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Terminating,
    Killed,
}

/// Start `command` and wait for it, enforcing `policy`.
///
/// Never fails: a shell that cannot be started yields exit code 1 with the
/// error text on stderr.
pub async fn run_with_timeout(
    runner: &ProcessRunner,
    command: &str,
    policy: TimeoutPolicy,
) -> CommandOutput {
    match runner.start(command) {
        Ok(process) => supervise(process, policy).await,
        Err(e) => {
            warn!(cmd = %command, error = %e, "failed to start foreground command");
            let mut output = CapturedOutput::default();
            output.note_stderr(&format!("{e:#}"));
            CommandOutput::from_captured(&output, FAILURE_EXIT_CODE, false)
        }
    }
}

/// Collect the output of an already-started process until it ends, racing
/// the deadline.
pub async fn supervise(process: RunningProcess, policy: TimeoutPolicy) -> CommandOutput {
    let RunningProcess { handle, mut events } = process;
    let pid = handle.pid();
    let mut output = CapturedOutput::default();
    let mut phase = Phase::Running;

    let deadline = sleep(policy.timeout);
    tokio::pin!(deadline);

    let ending = loop {
        tokio::select! {
            biased;

            event = events.recv() => match event {
                Some(ProcessEvent::Output { stream, data }) => output.append(stream, &data),
                Some(ProcessEvent::Exited { code }) => break Ok(code),
                Some(ProcessEvent::Failed { message }) => break Err(message),
                None => break Err("process event stream closed unexpectedly".to_string()),
            },

            () = &mut deadline, if phase != Phase::Killed => {
                if phase == Phase::Running {
                    info!(pid, timeout_ms = policy.timeout.as_millis(), "command timed out; terminating");
                    handle.terminate();
                    phase = Phase::Terminating;
                    deadline.as_mut().reset(after(policy.grace_period));
                } else {
                    info!(pid, "command survived grace period; killing");
                    handle.kill();
                    phase = Phase::Killed;
                }
            }
        }
    };

    let timed_out = phase != Phase::Running;
    let exit_code = match ending {
        _ if timed_out => {
            output.note_stderr(&format!(
                "Command timed out after {}ms",
                policy.timeout.as_millis()
            ));
            TIMEOUT_EXIT_CODE
        }
        Ok(code) => code,
        Err(message) => {
            warn!(pid, error = %message, "foreground command failed");
            output.note_stderr(&message);
            FAILURE_EXIT_CODE
        }
    };

    debug!(pid, exit_code, timed_out, bytes = output.len(), "foreground command finished");
    CommandOutput::from_captured(&output, exit_code, timed_out)
}

/// `now + wait`, saturating at a deadline that never arrives in practice.
fn after(wait: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait).unwrap_or_else(|| now + FAR_FUTURE)
}

const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);
