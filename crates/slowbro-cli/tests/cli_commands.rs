// crates/slowbro-cli/tests/cli_commands.rs
// ============================================================================
// Module: CLI Command Tests
// Description: Integration tests for config validation and run argument checks.
// Purpose: Ensure the binary fails closed with one stderr line before any remote call.
// Dependencies: slowbro-cli binary, tempfile
// ============================================================================
//! ## Overview
//! Runs the `slowbro` binary in a scratch directory so no ambient
//! `slowbro.toml` is picked up. None of these cases reach a remote service.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use tempfile::TempDir;
use tempfile::tempdir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn slowbro_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_slowbro"))
}

fn slowbro(dir: &Path, args: &[&str]) -> Output {
    Command::new(slowbro_bin())
        .args(args)
        .current_dir(dir)
        .env_remove("SLOWBRO_CONFIG")
        .output()
        .expect("run slowbro")
}

fn scratch_with_config(contents: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("slowbro.toml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

fn stderr_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stderr).lines().map(str::to_string).collect()
}

// ============================================================================
// SECTION: Config Validate
// ============================================================================

#[test]
fn config_validate_accepts_valid_file() {
    let (dir, path) = scratch_with_config("[server]\nbind = \"127.0.0.1:9090\"\n");
    let output = slowbro(dir.path(), &["config", "validate", "--config", path.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("configuration is valid"));
}

#[test]
fn config_validate_without_file_uses_defaults() {
    let dir = tempdir().unwrap();
    let output = slowbro(dir.path(), &["config", "validate"]);
    assert!(output.status.success());
}

#[test]
fn config_validate_names_invalid_key() {
    let (dir, path) = scratch_with_config("[orchestrator]\npoll_interval_ms = 5\n");
    let output = slowbro(dir.path(), &["config", "validate", "--config", path.to_str().unwrap()]);
    assert!(!output.status.success());
    let lines = stderr_lines(&output);
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert!(lines[0].contains("orchestrator.poll_interval_ms"));
}

#[test]
fn config_validate_rejects_missing_explicit_file() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    let output =
        slowbro(dir.path(), &["config", "validate", "--config", missing.to_str().unwrap()]);
    assert!(!output.status.success());
    assert_eq!(stderr_lines(&output).len(), 1);
}

// ============================================================================
// SECTION: Run Arguments
// ============================================================================

#[test]
fn run_rejects_zero_sample_window() {
    let dir = tempdir().unwrap();
    let output = slowbro(dir.path(), &["run", "--instance", "db1", "--sample-seconds", "0"]);
    assert!(!output.status.success());
    let lines = stderr_lines(&output);
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert!(lines[0].starts_with("invalid run arguments"));
    assert!(output.stdout.is_empty());
}

#[test]
fn run_rejects_window_above_configured_cap() {
    let (dir, path) = scratch_with_config("[orchestrator]\nmax_sample_seconds = 30\n");
    let output = slowbro(
        dir.path(),
        &[
            "run",
            "--instance",
            "db1",
            "--sample-seconds",
            "31",
            "--config",
            path.to_str().unwrap(),
        ],
    );
    assert!(!output.status.success());
    assert!(stderr_lines(&output)[0].contains("30"));
}

#[test]
fn run_rejects_unknown_log_output() {
    let dir = tempdir().unwrap();
    let output = slowbro(
        dir.path(),
        &["run", "--instance", "db1", "--sample-seconds", "5", "--log-output", "SYSLOG"],
    );
    assert!(!output.status.success());
    assert!(stderr_lines(&output)[0].contains("SYSLOG"));
}

#[test]
fn run_rejects_invalid_instance_identifier() {
    let dir = tempdir().unwrap();
    let output =
        slowbro(dir.path(), &["run", "--instance", "db_1!", "--sample-seconds", "5"]);
    assert!(!output.status.success());
    assert!(stderr_lines(&output)[0].contains("identifier"));
}
