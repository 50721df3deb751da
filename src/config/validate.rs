// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{JobshellError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::JobshellError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.exec))
    }
}

/// Re-check an already built config, e.g. after CLI overrides were applied.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    validate_raw_config(&RawConfigFile {
        exec: cfg.exec.clone(),
    })
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_timeouts(cfg)?;
    validate_shell(cfg)?;
    Ok(())
}

fn validate_timeouts(cfg: &RawConfigFile) -> Result<()> {
    if cfg.exec.default_timeout_ms == 0 {
        return Err(JobshellError::ConfigError(
            "[exec].default_timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_shell(cfg: &RawConfigFile) -> Result<()> {
    if cfg.exec.shell.trim().is_empty() {
        return Err(JobshellError::ConfigError(
            "[exec].shell must not be empty".to_string(),
        ));
    }
    Ok(())
}
