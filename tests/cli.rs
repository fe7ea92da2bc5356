//! CLI subprocess tests.
//!
//! These cover argument handling only: every case here must fail before the
//! container engine is contacted, so `DOCKER_HOST` points at a closed port
//! and the state file at a scratch directory.

use std::path::Path;
use std::process::{Command, Output};

fn runner(scratch: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mongo-runner"));
    cmd.env("DOCKER_HOST", "tcp://127.0.0.1:9")
        .env("HOME", scratch)
        .env("MONGO_RUNNER_STATE_FILE", scratch.join("state.json"))
        .env("RUST_LOG", "info")
        .current_dir(scratch);
    cmd
}

fn run(args: &[&str]) -> (Output, tempfile::TempDir) {
    let scratch = tempfile::tempdir().unwrap();
    let output = runner(scratch.path()).args(args).output().unwrap();
    (output, scratch)
}

fn assert_no_engine_activity(output: &Output, scratch: &Path) {
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        !stderr.contains("Building image") && !stderr.contains("Starting mongo"),
        "engine work attempted: {stderr}"
    );
    assert!(output.stdout.is_empty(), "unexpected stdout");
    assert!(!scratch.join("state.json").exists());
    assert!(!scratch.join(".mongo-runner").exists());
}

#[test]
fn no_arguments_is_a_usage_error() {
    let (output, scratch) = run(&[]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("<VERSION>"), "stderr: {stderr}");
    assert!(stderr.contains("Usage"), "stderr: {stderr}");
    assert_no_engine_activity(&output, scratch.path());
}

#[test]
fn missing_topology_is_a_usage_error() {
    let (output, scratch) = run(&["4.4.6"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("<TOPOLOGY>"), "stderr: {stderr}");
    assert_no_engine_activity(&output, scratch.path());
}

// Unknown topologies are rejected like missing arguments: same exit code,
// message on stderr.
#[test]
fn unknown_topology_exits_with_usage_code() {
    let (output, scratch) = run(&["4.4.6", "sharded"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown topology `sharded`"), "stderr: {stderr}");
    assert_no_engine_activity(&output, scratch.path());
}

#[test]
fn topology_match_is_case_sensitive() {
    let (output, scratch) = run(&["4.4.6", "Standalone"]);
    assert_eq!(output.status.code(), Some(2));
    assert_no_engine_activity(&output, scratch.path());
}

#[test]
fn help_describes_both_arguments() {
    let (output, _scratch) = run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("<VERSION>"));
    assert!(stdout.contains("replicaset"));
}

#[test]
fn invalid_settings_fail_before_engine() {
    let scratch = tempfile::tempdir().unwrap();
    std::fs::write(
        scratch.path().join("mongo-runner.toml"),
        "record_launches = \"sometimes\"\n",
    )
    .unwrap();
    let output = runner(scratch.path())
        .args(["4.4.6", "standalone"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load configuration"), "stderr: {stderr}");
    assert_no_engine_activity(&output, scratch.path());
}
