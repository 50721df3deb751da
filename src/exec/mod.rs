// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running shell commands, using
//! `tokio::process::Command`, and for bounding foreground runs in time.
//!
//! - [`process`] spawns `<shell> -c <command>` and exposes the ordered
//!   output/exit event stream plus terminate/kill requests.
//! - [`output`] holds the per-stream accumulators.
//! - [`timeout`] races a foreground process against its deadline and
//!   escalates SIGTERM → SIGKILL.

pub mod output;
pub mod process;
pub mod timeout;

pub use output::CapturedOutput;
pub use process::{
    FAILURE_EXIT_CODE, OutputStream, ProcessEvent, ProcessHandle, ProcessRunner, RunningProcess,
};
pub use timeout::{CommandOutput, TIMEOUT_EXIT_CODE, TimeoutPolicy, run_with_timeout};
