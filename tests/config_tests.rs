//! Configuration system tests
//!
//! Tests configuration loading, validation, and environment overrides
//! through the `config` subcommands

mod common;

use std::fs;
use std::path::PathBuf;

use common::runner_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Test fixture for configuration testing
struct ConfigFixture {
    _temp_dir: TempDir,
    config_path: PathBuf,
}

impl ConfigFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        Self {
            _temp_dir: temp_dir,
            config_path,
        }
    }

    fn write_config(&self, content: &str) {
        fs::write(&self.config_path, content).unwrap();
    }

    fn path(&self) -> &str {
        self.config_path.to_str().unwrap()
    }
}

// ─────────────────────────────────────────────────────────────────
// Valid Configuration Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_empty_sections_use_defaults() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[task]\n\n[transport]\n\n[runner]\n\n[logging]\n");

    runner_cmd()
        .args(["config", "show", "--config", fixture.path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("/usr/bin/powershell"))
        .stdout(predicate::str::contains("/app/trust.pem"))
        .stdout(predicate::str::contains("output.txt"));
}

#[test]
fn test_full_config() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[task]
uri = "https://coordinator:8282/resources/closures/abc"
skip_execution = true

[transport]
trust_bundle = "/etc/ssl/coordinator.pem"
auth_header = "x-custom-token"

[runner]
interpreter = "/usr/bin/pwsh"
interpreter_args = ["-NoProfile", "-file", "wrapper.ps1"]
script_dir = "/srv/scripts"
script_extension = "psm1"
result_file = "result.json"

[logging]
level = "trace"
max_files = 2
json_format = true
"#,
    );

    runner_cmd()
        .args(["config", "show", "--config", fixture.path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://coordinator:8282/resources/closures/abc"))
        .stdout(predicate::str::contains("skip_execution = true"))
        .stdout(predicate::str::contains("x-custom-token"))
        .stdout(predicate::str::contains("-NoProfile"))
        .stdout(predicate::str::contains("psm1"))
        .stdout(predicate::str::contains("result.json"));
}

// ─────────────────────────────────────────────────────────────────
// Invalid Configuration Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_invalid_log_level() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[logging]\nlevel = \"loud\"\n");

    runner_cmd()
        .args(["config", "validate", "--config", fixture.path()])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("Invalid log level"));
}

#[test]
fn test_empty_interpreter() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[runner]\ninterpreter = \"\"\n");

    runner_cmd()
        .args(["config", "validate", "--config", fixture.path()])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("Interpreter cannot be empty"));
}

#[test]
fn test_malformed_toml() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[runner\ninterpreter = ");

    runner_cmd()
        .args(["config", "validate", "--config", fixture.path()])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("Failed to parse configuration"));
}

// ─────────────────────────────────────────────────────────────────
// Config Init Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_config_init_creates_valid_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("new_config.toml");

    runner_cmd()
        .args(["config", "init", "--path"])
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration file created"));

    assert!(config_path.exists());

    runner_cmd()
        .args(["config", "validate", "--config"])
        .arg(&config_path)
        .assert()
        .success();
}

#[test]
fn test_config_init_refuses_overwrite() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[task]\n");

    runner_cmd()
        .args(["config", "init", "--path", fixture.path()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_config_init_force_overwrite() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[runner]\ninterpreter = \"old-interpreter\"\n");

    runner_cmd()
        .args(["config", "init", "--path", fixture.path(), "--force"])
        .assert()
        .success();

    let content = fs::read_to_string(fixture.path()).unwrap();
    assert!(!content.contains("old-interpreter"));
}

// ─────────────────────────────────────────────────────────────────
// Environment Variable Override Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_env_overrides_file() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[task]
uri = "http://file.example.com/resources/closures/a"

[runner]
interpreter = "/usr/bin/file-interpreter"
"#,
    );

    runner_cmd()
        .args(["config", "show", "--config", fixture.path()])
        .env("TASK_URI", "http://env.example.com/resources/closures/b")
        .env("CLOSURE_RUNNER_INTERPRETER", "/usr/bin/env-interpreter")
        .env("CLOSURE_RUNNER_INTERPRETER_ARGS", "-NoLogo -file env.ps1")
        .assert()
        .success()
        .stdout(predicate::str::contains("http://env.example.com/resources/closures/b"))
        .stdout(predicate::str::contains("/usr/bin/env-interpreter"))
        .stdout(predicate::str::contains("-NoLogo"))
        .stdout(predicate::str::contains("file-interpreter").not());
}

#[test]
fn test_env_invalid_task_uri_fails_validation() {
    runner_cmd()
        .args(["config", "validate"])
        .env("TASK_URI", "ftp://coordinator/resources/closures/a")
        .assert()
        .code(10);
}

// ─────────────────────────────────────────────────────────────────
// Path Expansion Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_tilde_expansion() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[transport]
trust_bundle = "~/certs/trust.pem"

[runner]
script_dir = "~/closure/user_scripts"
"#,
    );

    let output = runner_cmd()
        .args(["config", "show", "--config", fixture.path()])
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    assert!(!stdout.contains("\"~/"));
    assert!(stdout.contains("closure/user_scripts"));
}
