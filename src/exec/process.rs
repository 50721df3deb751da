// src/exec/process.rs

//! Shell process runner.
//!
//! A started process is owned by a single supervising Tokio task. Callers get
//! a [`ProcessHandle`] (pid + signal requests) and an ordered stream of
//! [`ProcessEvent`]s. The terminal event is only sent once both output readers
//! have hit EOF and the child has been reaped, so it always comes after the
//! last output chunk.

use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Exit code reported when a process could not be spawned or its pipes failed.
pub const FAILURE_EXIT_CODE: i32 = 1;

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Which output stream a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Events emitted by a running process, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Output { stream: OutputStream, data: Vec<u8> },
    /// The process ended and its output has been fully drained.
    Exited { code: i32 },
    /// Communication with the process failed after a successful spawn.
    Failed { message: String },
}

impl ProcessEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessEvent::Exited { .. } | ProcessEvent::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalRequest {
    Terminate,
    Kill,
}

/// Handle to a running shell process.
///
/// Dropping the handle does not stop the process; background jobs rely on
/// that.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pid: u32,
    signals: mpsc::UnboundedSender<SignalRequest>,
}

impl ProcessHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Ask the process to stop (SIGTERM on unix).
    pub fn terminate(&self) {
        if self.signals.send(SignalRequest::Terminate).is_err() {
            debug!(pid = self.pid, "terminate requested after process exit");
        }
    }

    /// Kill the process outright (SIGKILL).
    pub fn kill(&self) {
        if self.signals.send(SignalRequest::Kill).is_err() {
            debug!(pid = self.pid, "kill requested after process exit");
        }
    }
}

/// A freshly started process: control handle plus its event stream.
#[derive(Debug)]
pub struct RunningProcess {
    pub handle: ProcessHandle,
    pub events: mpsc::UnboundedReceiver<ProcessEvent>,
}

/// Spawns commands through a shell interpreter (`<shell> -c <command>`).
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    shell: String,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(default_shell())
    }
}

impl ProcessRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Start `command` with stdin closed and both output streams piped.
    ///
    /// Errors only when the shell itself cannot be started; a command that
    /// fails inside the shell surfaces as a non-zero `Exited` code instead.
    pub fn start(&self, command: &str) -> Result<RunningProcess> {
        let mut cmd = self.build_command(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning shell '{}' for command", self.shell))?;

        let pid = child
            .id()
            .context("spawned process exited before its pid could be read")?;

        info!(pid, shell = %self.shell, cmd = %command, "started shell process");

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let stdout = child.stdout.take().map(|out| {
            spawn_reader(out, OutputStream::Stdout, event_tx.clone())
        });
        let stderr = child.stderr.take().map(|err| {
            spawn_reader(err, OutputStream::Stderr, event_tx.clone())
        });

        tokio::spawn(supervise(child, pid, stdout, stderr, signal_rx, event_tx));

        Ok(RunningProcess {
            handle: ProcessHandle {
                pid,
                signals: signal_tx,
            },
            events: event_rx,
        })
    }

    fn build_command(&self, command: &str) -> Command {
        let mut c = Command::new(&self.shell);
        if cfg!(windows) && self.shell.eq_ignore_ascii_case("cmd") {
            c.arg("/C").arg(command);
        } else {
            c.arg("-c").arg(command);
        }
        c
    }
}

/// Platform default shell interpreter.
pub fn default_shell() -> String {
    if cfg!(windows) {
        "cmd".to_string()
    } else {
        "sh".to_string()
    }
}

fn spawn_reader<R>(
    mut reader: R,
    stream: OutputStream,
    event_tx: mpsc::UnboundedSender<ProcessEvent>,
) -> JoinHandle<std::io::Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_CHUNK_BYTES];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            // Receiver may be gone; the pipe still has to be drained.
            let _ = event_tx.send(ProcessEvent::Output {
                stream,
                data: buf[..n].to_vec(),
            });
        }
    })
}

/// Owns the child until it is reaped, relaying signal requests, then drains
/// the readers and emits exactly one terminal event.
///
/// Signal requests keep reaching the process group while the readers drain:
/// a reaped shell can leave children behind that still hold the pipes.
async fn supervise(
    mut child: Child,
    pid: u32,
    stdout: Option<JoinHandle<std::io::Result<()>>>,
    stderr: Option<JoinHandle<std::io::Result<()>>>,
    mut signal_rx: mpsc::UnboundedReceiver<SignalRequest>,
    event_tx: mpsc::UnboundedSender<ProcessEvent>,
) {
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(request) = signal_rx.recv() => deliver_signal(&mut child, pid, request),
        }
    };

    let drained = drain_readers(pid, stdout, stderr);
    tokio::pin!(drained);
    let failure = loop {
        tokio::select! {
            failure = &mut drained => break failure,
            Some(request) = signal_rx.recv() => {
                debug!(pid, ?request, "signalling leftover process group members");
                signal_group(pid, request);
            }
        }
    };

    let event = match (status, failure) {
        (Err(e), _) => {
            warn!(pid, error = %e, "failed waiting for process");
            ProcessEvent::Failed {
                message: format!("error waiting for process: {e}"),
            }
        }
        (Ok(_), Some(message)) => ProcessEvent::Failed { message },
        (Ok(status), None) => {
            let code = exit_code_of(status);
            info!(pid, exit_code = code, success = status.success(), "shell process exited");
            ProcessEvent::Exited { code }
        }
    };

    let _ = event_tx.send(event);
}

/// Wait for both readers to hit EOF. Returns the first failure, if any.
async fn drain_readers(
    pid: u32,
    stdout: Option<JoinHandle<std::io::Result<()>>>,
    stderr: Option<JoinHandle<std::io::Result<()>>>,
) -> Option<String> {
    let mut failure = None;
    for (name, reader) in [("stdout", stdout), ("stderr", stderr)] {
        let Some(reader) = reader else { continue };
        match reader.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(pid, stream = name, error = %e, "failed reading process output");
                failure.get_or_insert_with(|| format!("error reading {name}: {e}"));
            }
            Err(e) => {
                warn!(pid, stream = name, error = %e, "output reader task failed");
                failure.get_or_insert_with(|| format!("{name} reader task failed: {e}"));
            }
        }
    }
    failure
}

fn deliver_signal(child: &mut Child, pid: u32, request: SignalRequest) {
    match request {
        SignalRequest::Kill => {
            debug!(pid, "sending SIGKILL to process group");
            if !signal_group(pid, request) {
                if let Err(e) = child.start_kill() {
                    warn!(pid, error = %e, "failed to kill process");
                }
            }
        }
        SignalRequest::Terminate => {
            debug!(pid, "sending SIGTERM to process group");
            if !signal_group(pid, request) && cfg!(not(unix)) {
                // No catchable terminate signal; fall back to an immediate kill.
                if let Err(e) = child.start_kill() {
                    warn!(pid, error = %e, "failed to kill process");
                }
            }
        }
    }
}

/// Signal the whole process group led by the shell, so pipelines and
/// subshells go down with it. Returns false when nothing was sent.
#[cfg(unix)]
fn signal_group(pid: u32, request: SignalRequest) -> bool {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let signal = match request {
        SignalRequest::Terminate => Signal::SIGTERM,
        SignalRequest::Kill => Signal::SIGKILL,
    };
    let Ok(raw) = i32::try_from(pid) else {
        warn!(pid, "pid out of range for signalling");
        return false;
    };
    match killpg(Pid::from_raw(raw), signal) {
        Ok(()) => true,
        Err(e) => {
            warn!(pid, ?signal, error = %e, "failed to signal process group");
            false
        }
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: u32, _request: SignalRequest) -> bool {
    false
}

/// Exit status as a shell would report it: the real code, or `128 + signal`
/// for a signalled child.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    signal_exit_code(status).unwrap_or(-1)
}

#[cfg(unix)]
fn signal_exit_code(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(|sig| 128 + sig)
}

#[cfg(not(unix))]
fn signal_exit_code(_status: ExitStatus) -> Option<i32> {
    None
}
