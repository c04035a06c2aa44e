//! End-to-end runs of the binary against a mock coordinator
//!
//! The interpreter is `sh` driving a small script, so these only run on unix.

#![cfg(unix)]

mod common;

use std::fs;

use common::{runner_cmd, write_shell_config};
use mockito::{Matcher, Server};
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;

const TASK_PATH: &str = "/resources/closures/c1";
const DESCRIPTION_PATH: &str = "/resources/closure-descriptions/d1";

fn serve_task(server: &mut Server) -> mockito::Mock {
    server
        .mock("GET", TASK_PATH)
        .match_header("x-xenon-auth-token", "tok")
        .with_status(200)
        .with_body(
            json!({
                "closureSemaphore": "sem-42",
                "inputs": {"name": "world"},
                "descriptionLink": DESCRIPTION_PATH
            })
            .to_string(),
        )
        .create()
}

fn serve_description(server: &mut Server, description: serde_json::Value) -> mockito::Mock {
    server
        .mock("GET", DESCRIPTION_PATH)
        .match_header("x-xenon-auth-token", "tok")
        .with_status(200)
        .with_body(description.to_string())
        .create()
}

fn patch(server: &mut Server, body: serde_json::Value, hits: usize) -> mockito::Mock {
    server
        .mock("PATCH", TASK_PATH)
        .match_header("x-xenon-auth-token", "tok")
        .match_body(Matcher::PartialJson(body))
        .with_status(200)
        .expect(hits)
        .create()
}

#[test]
fn test_successful_run_reports_outputs() {
    let mut server = Server::new();
    let dir = TempDir::new().unwrap();
    let config = write_shell_config(
        dir.path(),
        r#"while [ $# -gt 0 ]; do
  if [ "$1" = "-handler_name" ]; then echo "handler=$2"; fi
  shift
done
printf '{"greeting": "hello world"}' > output.txt
"#,
    );

    let _task = serve_task(&mut server);
    let _description = serve_description(
        &mut server,
        json!({
            "name": "greet",
            "entrypoint": "index.greet",
            "outputNames": ["greeting"],
            "source": "function greet { 'hello' }"
        }),
    );
    let started = patch(&mut server, json!({"state": "STARTED", "closureSemaphore": "sem-42"}), 1);
    let finished = patch(
        &mut server,
        json!({
            "state": "FINISHED",
            "closureSemaphore": "sem-42",
            "outputs": {"greeting": "hello world"}
        }),
        1,
    );

    runner_cmd()
        .current_dir(dir.path())
        .args(["run", "--config"])
        .arg(&config)
        .env("TASK_URI", format!("{}{}", server.url(), TASK_PATH))
        .env("TOKEN", "tok")
        .assert()
        .success()
        .stdout(predicate::str::contains("Script run logs:"))
        .stdout(predicate::str::contains("handler=greet"))
        .stdout(predicate::str::contains("Script run state: FINISHED"))
        .stdout(predicate::str::contains("Script run completed at:"));

    let script = fs::read_to_string(dir.path().join("user_scripts").join("index.ps1")).unwrap();
    assert_eq!(script, "function greet { 'hello' }");
    assert!(dir.path().join("output.txt").exists());
    assert!(!dir.path().join("user_scripts").join("output.txt").exists());
    started.assert();
    finished.assert();
}

#[test]
fn test_interpreter_stderr_reports_failed_and_exits_1() {
    let mut server = Server::new();
    let dir = TempDir::new().unwrap();
    let config = write_shell_config(dir.path(), "echo 'cmdlet not found' >&2\n");

    let _task = serve_task(&mut server);
    let _description = serve_description(
        &mut server,
        json!({"name": "greet", "outputNames": [], "source": "greet"}),
    );
    let _started = patch(&mut server, json!({"state": "STARTED"}), 1);
    let failed = patch(
        &mut server,
        json!({
            "state": "FAILED",
            "closureSemaphore": "sem-42",
            "errorMsg": "cmdlet not found\n"
        }),
        1,
    );

    runner_cmd()
        .current_dir(dir.path())
        .args(["run", "--config"])
        .arg(&config)
        .env("TASK_URI", format!("{}{}", server.url(), TASK_PATH))
        .env("TOKEN", "tok")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Script run failed with: cmdlet not found"));

    failed.assert();
}

#[test]
fn test_task_fetch_failure_exits_1_without_reports() {
    let mut server = Server::new();
    let dir = TempDir::new().unwrap();
    let config = write_shell_config(dir.path(), "true\n");

    let _task = server.mock("GET", TASK_PATH).with_status(500).create();
    let patches = server.mock("PATCH", TASK_PATH).expect(0).create();

    runner_cmd()
        .current_dir(dir.path())
        .args(["run", "--config"])
        .arg(&config)
        .env("TASK_URI", format!("{}{}", server.url(), TASK_PATH))
        .env("TOKEN", "tok")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("returned 500"));

    patches.assert();
}

#[test]
fn test_zip_source_is_extracted_before_running() {
    use std::io::{Cursor, Write};

    let mut archive = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut archive);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("index.ps1", options).unwrap();
        zip.write_all(b"function greet { helper }").unwrap();
        zip.start_file("modules/helper.ps1", options).unwrap();
        zip.write_all(b"function helper { 'hi' }").unwrap();
        zip.finish().unwrap();
    }

    let mut server = Server::new();
    let dir = TempDir::new().unwrap();
    let config = write_shell_config(dir.path(), "test -f user_scripts/modules/helper.ps1 || echo 'helper missing' >&2\n");

    let source_url = format!("{}/sources/greet.zip", server.url());
    let _task = serve_task(&mut server);
    let _source = server
        .mock("GET", "/sources/greet.zip")
        .match_header("x-xenon-auth-token", Matcher::Missing)
        .with_status(200)
        .with_header("content-type", "application/zip")
        .with_body(archive.into_inner())
        .create();
    let _description = serve_description(
        &mut server,
        json!({
            "name": "greet",
            "outputNames": [],
            "sourceURL": source_url
        }),
    );
    let _started = patch(&mut server, json!({"state": "STARTED"}), 1);
    let finished = patch(&mut server, json!({"state": "FINISHED", "outputs": {}}), 1);

    runner_cmd()
        .current_dir(dir.path())
        .args(["run", "--config"])
        .arg(&config)
        .env("TASK_URI", format!("{}{}", server.url(), TASK_PATH))
        .env("TOKEN", "tok")
        .assert()
        .success();

    let scripts = dir.path().join("user_scripts");
    assert!(scripts.join("index.ps1").exists());
    assert!(scripts.join("modules").join("helper.ps1").exists());
    finished.assert();
}

#[test]
fn test_skip_execution_omits_started() {
    let mut server = Server::new();
    let dir = TempDir::new().unwrap();
    let config = write_shell_config(dir.path(), "true\n");

    let _task = serve_task(&mut server);
    let _description = serve_description(
        &mut server,
        json!({"name": "greet", "outputNames": [], "source": ""}),
    );
    let started = patch(&mut server, json!({"state": "STARTED"}), 0);
    let finished = patch(&mut server, json!({"state": "FINISHED"}), 1);

    runner_cmd()
        .current_dir(dir.path())
        .args(["run", "--skip-execution", "--config"])
        .arg(&config)
        .env("TASK_URI", format!("{}{}", server.url(), TASK_PATH))
        .env("TOKEN", "tok")
        .assert()
        .success();

    started.assert();
    finished.assert();
}
