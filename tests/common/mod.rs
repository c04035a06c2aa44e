//! Common test utilities and fixtures

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;

/// Environment variables the runner reads; cleared so the host cannot leak in
const RUNNER_ENV: &[&str] = &[
    "TASK_URI",
    "TOKEN",
    "RUST_LOG",
    "CLOSURE_RUNNER_CONFIG",
    "CLOSURE_RUNNER_SKIP_EXECUTION",
    "CLOSURE_RUNNER_TRUST_BUNDLE",
    "CLOSURE_RUNNER_AUTH_HEADER",
    "CLOSURE_RUNNER_INTERPRETER",
    "CLOSURE_RUNNER_INTERPRETER_ARGS",
    "CLOSURE_RUNNER_SCRIPT_DIR",
    "CLOSURE_RUNNER_SCRIPT_EXTENSION",
    "CLOSURE_RUNNER_RESULT_FILE",
    "CLOSURE_RUNNER_LOG_LEVEL",
    "CLOSURE_RUNNER_LOG_FILE",
    "CLOSURE_RUNNER_LOG_JSON",
];

/// Command for the closure-runner binary with a clean environment
pub fn runner_cmd() -> Command {
    let mut cmd = Command::cargo_bin("closure-runner").unwrap();
    for var in RUNNER_ENV {
        cmd.env_remove(var);
    }
    cmd
}

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

pub fn valid_config_fixture() -> PathBuf {
    fixture_path("valid_config.toml")
}

pub fn invalid_config_fixture() -> PathBuf {
    fixture_path("invalid_config.toml")
}

/// Write a runner config pointing the interpreter at `sh <driver>`
///
/// The driver script is written next to the config; closure sources land in
/// `<dir>/user_scripts`.
pub fn write_shell_config(dir: &Path, driver: &str) -> PathBuf {
    let driver_path = dir.join("driver.sh");
    fs::write(&driver_path, driver).unwrap();

    let config_path = dir.join("closure-runner.toml");
    let config = format!(
        r#"
[transport]
trust_bundle = "{bundle}"

[runner]
interpreter = "sh"
interpreter_args = ["{driver}"]
script_dir = "{scripts}"
"#,
        bundle = dir.join("missing-trust.pem").display(),
        driver = driver_path.display(),
        scripts = dir.join("user_scripts").display(),
    );
    fs::write(&config_path, config).unwrap();
    config_path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_exist() {
        assert!(valid_config_fixture().exists());
        assert!(invalid_config_fixture().exists());
        assert!(fixture_path("trust.pem").exists());
    }
}
