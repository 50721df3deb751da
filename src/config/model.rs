// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::exec::process::default_shell;
use crate::exec::timeout::{DEFAULT_GRACE_PERIOD, DEFAULT_TIMEOUT};
use crate::exec::{ProcessRunner, TimeoutPolicy};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [exec]
/// default_timeout_ms = 5000
/// grace_period_ms = 1000
/// shell = "sh"
/// ```
///
/// Every section and key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    /// Process execution settings from `[exec]`.
    #[serde(default)]
    pub exec: ExecSection,
}

/// `[exec]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecSection {
    /// Deadline for foreground commands that don't pass their own `timeout`.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Time between SIGTERM and SIGKILL once a deadline has passed.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Shell interpreter invoked as `<shell> -c <command>`.
    #[serde(default = "default_shell")]
    pub shell: String,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT.as_millis() as u64
}

fn default_grace_period_ms() -> u64 {
    DEFAULT_GRACE_PERIOD.as_millis() as u64
}

impl Default for ExecSection {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            grace_period_ms: default_grace_period_ms(),
            shell: default_shell(),
        }
    }
}

impl ExecSection {
    pub fn timeout_policy(&self) -> TimeoutPolicy {
        TimeoutPolicy {
            timeout: Duration::from_millis(self.default_timeout_ms),
            grace_period: Duration::from_millis(self.grace_period_ms),
        }
    }

    pub fn runner(&self) -> ProcessRunner {
        ProcessRunner::new(self.shell.clone())
    }
}

/// Validated configuration. Build it from a [`RawConfigFile`] via `TryFrom`.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    pub exec: ExecSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(exec: ExecSection) -> Self {
        Self { exec }
    }

    /// Apply a `--timeout-ms` style override of the default deadline.
    pub fn with_default_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        if let Some(ms) = timeout_ms {
            self.exec.default_timeout_ms = ms;
        }
        self
    }
}
