#![allow(dead_code)]

use jobshell::config::{ConfigFile, ExecSection, RawConfigFile};
use jobshell::service::ShellService;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                exec: ExecSection::default(),
            },
        }
    }

    pub fn default_timeout_ms(mut self, ms: u64) -> Self {
        self.config.exec.default_timeout_ms = ms;
        self
    }

    pub fn grace_period_ms(mut self, ms: u64) -> Self {
        self.config.exec.grace_period_ms = ms;
        self
    }

    pub fn shell(mut self, shell: &str) -> Self {
        self.config.exec.shell = shell.to_string();
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    /// Shortcut: a service with its own job table using this config.
    pub fn service(self) -> ShellService {
        ShellService::new(&self.build().exec)
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
