//! File loading tests for slowbro-config.
// crates/slowbro-config/tests/load_validation.rs
// =============================================================================
// Module: Config Loading Tests
// Description: Validate file size, encoding, parse, and path limits on load.
// Purpose: Ensure config files are read fail-closed with hard limits.
// =============================================================================

use std::fs;
use std::path::PathBuf;

use slowbro_config::ConfigError;
use slowbro_config::SlowbroConfig;
use slowbro_core::EventOutcome;
use slowbro_core::InstanceId;
use slowbro_core::RunEvent;
use slowbro_core::RunStage;

mod common;

use common::assert_invalid;

type TestResult = Result<(), String>;

#[test]
fn load_reads_explicit_file() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("slowbro.toml");
    fs::write(
        &path,
        "[server]\nbind = \"0.0.0.0:9090\"\n\n[orchestrator]\nmax_sample_seconds = 60\n",
    )
    .map_err(|err| err.to_string())?;
    let config = SlowbroConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    if config.server.bind != "0.0.0.0:9090" || config.orchestrator.max_sample_seconds != 60 {
        return Err(format!("file values not applied: {config:?}"));
    }
    if config.orchestrator.poll_interval_ms != 2_000 {
        return Err("unset keys should keep defaults".to_string());
    }
    Ok(())
}

#[test]
fn missing_explicit_file_is_io_error() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("absent.toml");
    match SlowbroConfig::load(Some(&path)) {
        Err(ConfigError::Io(_)) => Ok(()),
        other => Err(format!("expected io error, got {other:?}")),
    }
}

#[test]
fn oversized_file_is_rejected() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("big.toml");
    let padding = format!("# {}\n", "x".repeat(1024 * 1024));
    fs::write(&path, padding).map_err(|err| err.to_string())?;
    assert_invalid(SlowbroConfig::load(Some(&path)), "config file exceeds size limit")
}

#[test]
fn non_utf8_file_is_rejected() -> TestResult {
    assert_invalid(
        SlowbroConfig::from_bytes(&[0x5b, 0xff, 0xfe, 0x5d]),
        "config file must be utf-8",
    )
}

#[test]
fn malformed_toml_is_parse_error() -> TestResult {
    match SlowbroConfig::from_bytes(b"[server\nbind = 1") {
        Err(ConfigError::Parse(_)) => Ok(()),
        other => Err(format!("expected parse error, got {other:?}")),
    }
}

#[test]
fn wrong_value_type_is_parse_error() -> TestResult {
    match SlowbroConfig::from_bytes(b"[orchestrator]\npoll_interval_ms = \"fast\"\n") {
        Err(ConfigError::Parse(_)) => Ok(()),
        other => Err(format!("expected parse error, got {other:?}")),
    }
}

#[test]
fn invalid_values_fail_on_load() -> TestResult {
    assert_invalid(
        SlowbroConfig::from_bytes(b"[orchestrator]\npoll_interval_ms = 10\n"),
        "orchestrator.poll_interval_ms must be between 100 and 60000",
    )
}

#[test]
fn long_path_component_is_rejected() -> TestResult {
    let path = PathBuf::from(format!("/tmp/{}.toml", "c".repeat(300)));
    assert_invalid(SlowbroConfig::load(Some(&path)), "config path component too long")
}

#[test]
fn long_total_path_is_rejected() -> TestResult {
    let segment = "d".repeat(200);
    let path: PathBuf = std::iter::repeat_n(segment.as_str(), 25).collect();
    assert_invalid(SlowbroConfig::load(Some(&path)), "config path exceeds max length")
}

#[test]
fn file_audit_sink_appends_json_lines() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let audit_path = dir.path().join("audit.jsonl");
    let config_path = dir.path().join("slowbro.toml");
    fs::write(
        &config_path,
        format!("[audit]\nsink = \"file\"\npath = {:?}\n", audit_path.display().to_string()),
    )
    .map_err(|err| err.to_string())?;
    let config = SlowbroConfig::load(Some(&config_path)).map_err(|err| err.to_string())?;
    let sink = config.audit.build_sink().map_err(|err| err.to_string())?;
    let instance = InstanceId::new("db1").map_err(|err| err.to_string())?;
    sink.record(&RunEvent::new(&instance, RunStage::Inspect, EventOutcome::Started));
    sink.record(&RunEvent::new(&instance, RunStage::Inspect, EventOutcome::Ok));
    let written = fs::read_to_string(&audit_path).map_err(|err| err.to_string())?;
    let lines: Vec<&str> = written.lines().collect();
    if lines.len() != 2 || !lines.iter().all(|line| line.contains("\"slowbro_run\"")) {
        return Err(format!("unexpected audit output: {written}"));
    }
    Ok(())
}

#[test]
fn none_sink_builds_without_path() -> TestResult {
    let config = SlowbroConfig::from_bytes(b"[audit]\nsink = \"none\"\n")
        .map_err(|err| err.to_string())?;
    config.audit.build_sink().map(|_| ()).map_err(|err| err.to_string())
}
