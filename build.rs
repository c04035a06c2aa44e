//! Build script for closure-runner
//!
//! Embeds the git revision, build time, target and profile so `version` can
//! report exactly what is deployed in a runner image.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");

    let git_hash = git(&["rev-parse", "--short=8", "HEAD"]);
    let git_branch = git(&["rev-parse", "--abbrev-ref", "HEAD"]);
    let build_timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=CLOSURE_RUNNER_GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=CLOSURE_RUNNER_GIT_BRANCH={}", git_branch);
    println!("cargo:rustc-env=CLOSURE_RUNNER_BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=CLOSURE_RUNNER_TARGET={}", target);
    println!("cargo:rustc-env=CLOSURE_RUNNER_PROFILE={}", profile);
}

/// Trimmed stdout of a git command, or "unknown" outside a checkout
fn git(args: &[&str]) -> String {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
