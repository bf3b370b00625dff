//! Config defaults and section validation tests for slowbro-config.
// crates/slowbro-config/tests/config_defaults.rs
// =============================================================================
// Module: Config Defaults and Section Validation Tests
// Description: Validate default values and per-section invariants.
// Purpose: Ensure an empty config is usable and bad values name their key.
// =============================================================================

use std::time::Duration;

use slowbro_config::AuditSinkKind;
use slowbro_core::ParameterGroupName;

mod common;

use common::assert_invalid;
use common::minimal_config;

type TestResult = Result<(), String>;

#[test]
fn default_config_validates() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    Ok(())
}

#[test]
fn defaults_match_documented_values() -> TestResult {
    let config = minimal_config().map_err(|err| err.to_string())?;
    if config.server.bind != "127.0.0.1:8080" || config.server.max_body_bytes != 16_384 {
        return Err(format!("unexpected server defaults: {:?}", config.server));
    }
    if config.server.allowed_origin != "http://localhost:3000" {
        return Err("unexpected allowed_origin default".to_string());
    }
    let orchestrator = &config.orchestrator;
    if orchestrator.poll_interval_ms != 2_000
        || orchestrator.settle_delay_ms != 5_000
        || orchestrator.max_poll_attempts != 450
        || orchestrator.mutation_retries != 3
        || orchestrator.max_sample_seconds != 900
    {
        return Err(format!("unexpected orchestrator defaults: {orchestrator:?}"));
    }
    if orchestrator.dedicated_group_prefix != "slowbro" {
        return Err("unexpected dedicated_group_prefix default".to_string());
    }
    if config.rds.log_file_name != "slowquery/mysql-slowquery.log"
        || config.rds.max_log_bytes != 64 * 1024 * 1024
        || config.rds.endpoint.is_some()
    {
        return Err(format!("unexpected rds defaults: {:?}", config.rds));
    }
    if config.digest.tool_path != "pt-query-digest"
        || !config.digest.auto_download
        || config.digest.interpreter != "perl"
        || config.digest.timeout() != Duration::from_secs(300)
        || config.digest.archive_dir.is_some()
    {
        return Err(format!("unexpected digest defaults: {:?}", config.digest));
    }
    if config.audit.sink != AuditSinkKind::Stderr {
        return Err("audit sink should default to stderr".to_string());
    }
    Ok(())
}

#[test]
fn orchestrator_config_carries_section_values() -> TestResult {
    let config = common::config_from_toml(
        r#"
[orchestrator]
poll_interval_ms = 250
settle_delay_ms = 0
max_poll_attempts = 12
mutation_retries = 1
default_parameter_groups = ["default.mysql8.0", " default.aurora-mysql5.7 "]
dedicated_group_prefix = "diag"
"#,
    )
    .map_err(|err| err.to_string())?;
    let converted = config.orchestrator_config();
    if converted.convergence.poll_interval != Duration::from_millis(250)
        || converted.convergence.settle_delay != Duration::ZERO
        || converted.convergence.max_attempts != 12
    {
        return Err(format!("unexpected convergence policy: {:?}", converted.convergence));
    }
    if converted.mutation_retries != 1 || converted.dedicated_group_prefix != "diag" {
        return Err("retry budget or prefix not carried".to_string());
    }
    let aurora =
        ParameterGroupName::new("default.aurora-mysql5.7").map_err(|err| err.to_string())?;
    let mysql = ParameterGroupName::new("default.mysql5.7").map_err(|err| err.to_string())?;
    if !converted.is_default_group(&aurora) || converted.is_default_group(&mysql) {
        return Err(format!(
            "unexpected default groups: {:?}",
            converted.default_parameter_groups
        ));
    }
    Ok(())
}

#[test]
fn default_orchestrator_config_protects_mysql_defaults() -> TestResult {
    let config = minimal_config().map_err(|err| err.to_string())?;
    let converted = config.orchestrator_config();
    for name in ["default.mysql5.6", "default.mysql5.7", "default.mysql8.0"] {
        let group = ParameterGroupName::new(name).map_err(|err| err.to_string())?;
        if !converted.is_default_group(&group) {
            return Err(format!("{name} should be protected"));
        }
    }
    Ok(())
}

#[test]
fn server_bind_must_parse() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.server.bind = "localhost".to_string();
    assert_invalid(config.validate(), "server.bind")
}

#[test]
fn server_origin_must_be_http_or_wildcard() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.server.allowed_origin = "*".to_string();
    config.validate().map_err(|err| err.to_string())?;
    config.server.allowed_origin = "ftp://example.com".to_string();
    assert_invalid(config.validate(), "server.allowed_origin")
}

#[test]
fn server_body_limit_is_bounded() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.server.max_body_bytes = 0;
    assert_invalid(config.validate(), "server.max_body_bytes")?;
    config.server.max_body_bytes = 2 * 1024 * 1024;
    assert_invalid(config.validate(), "server.max_body_bytes")
}

#[test]
fn poll_interval_is_bounded() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.orchestrator.poll_interval_ms = 99;
    assert_invalid(
        config.validate(),
        "orchestrator.poll_interval_ms must be between 100 and 60000",
    )?;
    config.orchestrator.poll_interval_ms = 60_001;
    assert_invalid(config.validate(), "orchestrator.poll_interval_ms")
}

#[test]
fn poll_cap_and_retries_are_bounded() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.orchestrator.max_poll_attempts = 0;
    assert_invalid(config.validate(), "orchestrator.max_poll_attempts")?;
    config.orchestrator.max_poll_attempts = 450;
    config.orchestrator.mutation_retries = 11;
    assert_invalid(config.validate(), "orchestrator.mutation_retries")?;
    config.orchestrator.mutation_retries = 0;
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn sample_bound_must_be_positive() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.orchestrator.max_sample_seconds = 0;
    assert_invalid(config.validate(), "orchestrator.max_sample_seconds")
}

#[test]
fn protected_group_names_are_validated() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.orchestrator.default_parameter_groups.push("has space".to_string());
    assert_invalid(config.validate(), "orchestrator.default_parameter_groups")
}

#[test]
fn dedicated_prefix_follows_group_naming() -> TestResult {
    for prefix in ["", "9lives", "trailing-", "under_score"] {
        let mut config = minimal_config().map_err(|err| err.to_string())?;
        config.orchestrator.dedicated_group_prefix = prefix.to_string();
        assert_invalid(config.validate(), "orchestrator.dedicated_group_prefix")?;
    }
    Ok(())
}

#[test]
fn rds_limits_are_enforced() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.rds.log_file_name = "  ".to_string();
    assert_invalid(config.validate(), "rds.log_file_name must be non-empty")?;
    config.rds.log_file_name = "slowquery/mysql-slowquery.log".to_string();
    config.rds.max_log_bytes = 0;
    assert_invalid(config.validate(), "rds.max_log_bytes")?;
    config.rds.max_log_bytes = 1024;
    config.rds.endpoint = Some("localhost:4566".to_string());
    assert_invalid(config.validate(), "rds.endpoint")?;
    config.rds.endpoint = Some("http://localhost:4566".to_string());
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn digest_download_url_checked_only_when_downloading() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.digest.download_url = "not a url".to_string();
    assert_invalid(config.validate(), "digest.download_url")?;
    config.digest.auto_download = false;
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn digest_timeout_and_paths_are_checked() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.digest.timeout_seconds = 0;
    assert_invalid(config.validate(), "digest.timeout_seconds")?;
    config.digest.timeout_seconds = 30;
    config.digest.archive_dir = Some(format!("/tmp/{}", "a".repeat(300)));
    assert_invalid(config.validate(), "digest.archive_dir path component too long")
}

#[test]
fn file_audit_sink_requires_path() -> TestResult {
    let mut config = common::config_from_toml("[audit]\nsink = \"file\"\n")
        .map_err(|err| err.to_string())?;
    assert_invalid(config.validate(), "audit.path is required")?;
    config.audit.path = Some("/var/log/slowbro/audit.jsonl".to_string());
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn unknown_sink_kind_fails_to_parse() -> TestResult {
    match common::config_from_toml("[audit]\nsink = \"syslog\"\n") {
        Ok(_) => Err("syslog sink should not parse".to_string()),
        Err(_) => Ok(()),
    }
}
