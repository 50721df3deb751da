// tests/config_loading.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;
use jobshell::config::{ConfigFile, load_and_validate, load_or_default, validate_config};
use jobshell::errors::JobshellError;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn test_empty_file_uses_defaults() {
    let file = config_file("");
    let cfg = load_and_validate(file.path()).unwrap();

    let policy = cfg.exec.timeout_policy();
    assert_eq!(policy.timeout, Duration::from_millis(5000));
    assert_eq!(policy.grace_period, Duration::from_millis(1000));
    assert_eq!(cfg.exec.shell, "sh");
}

#[test]
fn test_exec_section_overrides() {
    let file = config_file(
        r#"
[exec]
default_timeout_ms = 250
grace_period_ms = 50
shell = "/bin/bash"
"#,
    );
    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.exec.default_timeout_ms, 250);
    assert_eq!(cfg.exec.grace_period_ms, 50);
    assert_eq!(cfg.exec.runner().shell(), "/bin/bash");
}

#[test]
fn test_zero_timeout_returns_config_error() {
    let file = config_file(
        r#"
[exec]
default_timeout_ms = 0
"#,
    );

    match load_and_validate(file.path()) {
        Err(JobshellError::ConfigError(msg)) => {
            assert!(msg.contains("default_timeout_ms"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_blank_shell_returns_config_error() {
    let file = config_file(
        r#"
[exec]
shell = "  "
"#,
    );
    assert!(matches!(
        load_and_validate(file.path()),
        Err(JobshellError::ConfigError(msg)) if msg.contains("shell")
    ));
}

#[test]
fn test_unknown_keys_are_rejected() {
    let file = config_file(
        r#"
[exec]
default_timeout = 10
"#,
    );
    assert!(matches!(
        load_and_validate(file.path()),
        Err(JobshellError::TomlError(_))
    ));
}

#[test]
fn test_explicit_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(matches!(
        load_or_default(Some(&missing)),
        Err(JobshellError::IoError(_))
    ));
}

#[test]
fn test_cli_override_is_revalidated() {
    let cfg = ConfigFile::default().with_default_timeout_ms(Some(0));
    assert!(validate_config(&cfg).is_err());

    let cfg = ConfigFile::default().with_default_timeout_ms(Some(1500));
    validate_config(&cfg).unwrap();
    assert_eq!(cfg.exec.timeout_policy().timeout, Duration::from_millis(1500));

    let cfg = ConfigFile::default().with_default_timeout_ms(None);
    assert_eq!(cfg.exec.default_timeout_ms, 5000);
}
