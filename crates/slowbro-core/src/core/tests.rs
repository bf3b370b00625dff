// crates/slowbro-core/src/core/tests.rs
// ============================================================================
// Module: Core Type Unit Tests
// Description: Unit tests for identifiers, families, and logging settings.
// Purpose: Validate construction boundaries of the core data model.
// Dependencies: slowbro-core
// ============================================================================

//! ## Overview
//! Exercises identifier validation, family derivation, dedicated group naming,
//! and the parameter rendering of slow-query settings.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

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
    reason = "Test-only assertions."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use super::EngineFamily;
use super::IdentifierError;
use super::InstanceId;
use super::InstanceSnapshot;
use super::LogOutput;
use super::PARAM_LOG_OUTPUT;
use super::PARAM_LONG_QUERY_TIME;
use super::PARAM_SLOW_QUERY_LOG;
use super::ParameterGroupName;
use super::SettingsError;
use super::SlowQuerySettings;
use super::parse_toggle;

// ============================================================================
// SECTION: Identifiers
// ============================================================================

#[test]
fn instance_id_trims_and_rejects_bad_characters() {
    assert_eq!(InstanceId::new("  db1 ").unwrap().as_str(), "db1");
    assert_eq!(InstanceId::new("   "), Err(IdentifierError::Empty("instance identifier")));
    assert!(matches!(
        InstanceId::new("db_1"),
        Err(IdentifierError::InvalidCharacter { ch: '_', .. })
    ));
    assert!(matches!(InstanceId::new("a".repeat(64)), Err(IdentifierError::TooLong { .. })));
}

#[test]
fn instance_id_ignores_caller_casing() {
    let upper = InstanceId::new("DB1").unwrap();
    let lower = InstanceId::new("db1").unwrap();
    assert_eq!(upper, lower);
    assert_eq!(upper.as_str(), "db1");
    let family = EngineFamily::derive("mysql", "5.7.34").unwrap();
    assert_eq!(
        ParameterGroupName::dedicated("slowbro", &upper, &family),
        ParameterGroupName::dedicated("slowbro", &lower, &family)
    );
}

#[test]
fn instance_id_deserializes_through_validation() {
    let id: InstanceId = serde_json::from_str("\"db-7\"").unwrap();
    assert_eq!(id.as_str(), "db-7");
    assert!(serde_json::from_str::<InstanceId>("\"bad id\"").is_err());
}

#[test]
fn parameter_group_name_rejects_whitespace() {
    assert!(ParameterGroupName::new("custom-prod").is_ok());
    assert!(ParameterGroupName::new("").is_err());
    assert!(ParameterGroupName::new("custom prod").is_err());
}

#[test]
fn engine_family_uses_major_and_minor() {
    assert_eq!(EngineFamily::derive("mysql", "5.7.34").unwrap().as_str(), "mysql5.7");
    assert_eq!(EngineFamily::derive("mysql", "8.0.35").unwrap().as_str(), "mysql8.0");
    assert_eq!(EngineFamily::derive("mariadb", "10.11.5").unwrap().as_str(), "mariadb10.11");
    assert_eq!(EngineFamily::derive("postgres", "16").unwrap().as_str(), "postgres16");
    assert!(EngineFamily::derive("mysql", "").is_err());
    assert!(EngineFamily::derive("", "5.7").is_err());
}

#[test]
fn dedicated_group_name_is_scoped_to_instance_and_family() {
    let family = EngineFamily::derive("mysql", "5.7.34").unwrap();
    let first = ParameterGroupName::dedicated("slowbro", &InstanceId::new("db1").unwrap(), &family);
    let second =
        ParameterGroupName::dedicated("slowbro", &InstanceId::new("db2").unwrap(), &family);
    assert_eq!(first.as_str(), "slowbro-db1-mysql5-7");
    assert_ne!(first, second);
}

#[test]
fn dedicated_group_name_starts_with_letter() {
    let family = EngineFamily::derive("mysql", "8.0.1").unwrap();
    let name = ParameterGroupName::dedicated("--", &InstanceId::new("9db").unwrap(), &family);
    assert_eq!(name.as_str(), "g9db-mysql8-0");
}

#[test]
fn snapshot_convergence_tracks_both_statuses() {
    let snapshot = InstanceSnapshot::new(
        InstanceId::new("db1").unwrap(),
        "mysql",
        "5.7.34",
        ParameterGroupName::new("default.mysql5.7").unwrap(),
        "available",
        "in-sync",
    )
    .unwrap();
    assert!(snapshot.is_converged());
    assert_eq!(snapshot.family.as_str(), "mysql5.7");

    let modifying = InstanceSnapshot {
        status: "modifying".to_string(),
        ..snapshot.clone()
    };
    assert!(!modifying.is_converged());
    let applying = InstanceSnapshot {
        parameter_apply_status: "applying".to_string(),
        ..snapshot.clone()
    };
    assert!(!applying.is_converged());
    let pending_reboot = InstanceSnapshot {
        parameter_apply_status: "pending-reboot".to_string(),
        ..snapshot
    };
    assert!(pending_reboot.is_converged());
}

// ============================================================================
// SECTION: Settings
// ============================================================================

#[test]
fn settings_render_three_parameters() {
    let settings = SlowQuerySettings::new(true, "2", LogOutput::File).unwrap();
    let parameters = settings.to_parameters();
    assert_eq!(parameters.len(), 3);
    assert_eq!(parameters[PARAM_SLOW_QUERY_LOG], "1");
    assert_eq!(parameters[PARAM_LONG_QUERY_TIME], "2");
    assert_eq!(parameters[PARAM_LOG_OUTPUT], "FILE");

    let off = settings.disabled().to_parameters();
    assert_eq!(off[PARAM_SLOW_QUERY_LOG], "0");
    assert_eq!(off[PARAM_LONG_QUERY_TIME], "2");
}

#[test]
fn capture_all_logs_every_query_to_file() {
    let parameters = SlowQuerySettings::capture_all().to_parameters();
    assert_eq!(parameters[PARAM_SLOW_QUERY_LOG], "1");
    assert_eq!(parameters[PARAM_LONG_QUERY_TIME], "0");
    assert_eq!(parameters[PARAM_LOG_OUTPUT], "FILE");
}

#[test]
fn long_query_time_must_be_non_negative_decimal() {
    assert!(SlowQuerySettings::new(false, "0.5", LogOutput::Table).is_ok());
    assert_eq!(
        SlowQuerySettings::new(false, "-1", LogOutput::File),
        Err(SettingsError::LongQueryTime("-1".to_string()))
    );
    assert!(SlowQuerySettings::new(false, "NaN", LogOutput::File).is_err());
    assert!(SlowQuerySettings::new(false, "abc", LogOutput::File).is_err());
}

#[test]
fn long_query_time_is_plain_decimal_within_engine_range() {
    assert!(SlowQuerySettings::new(false, "10", LogOutput::File).is_ok());
    assert!(SlowQuerySettings::new(false, "31536000", LogOutput::File).is_ok());
    assert!(SlowQuerySettings::new(false, " 0.000001 ", LogOutput::File).is_ok());
    for rejected in ["1e3", "+2", "99999999999", "31536000.5", ".5", "5.", "1.2.3", "inf"] {
        assert_eq!(
            SlowQuerySettings::new(false, rejected, LogOutput::File),
            Err(SettingsError::LongQueryTime(rejected.to_string())),
            "{rejected} should be rejected"
        );
    }
}

#[test]
fn toggle_and_log_output_parse_operator_input() {
    assert_eq!(parse_toggle("ON"), Ok(true));
    assert_eq!(parse_toggle("false"), Ok(false));
    assert_eq!(parse_toggle("0"), Ok(false));
    assert!(parse_toggle("maybe").is_err());
    assert_eq!("file".parse::<LogOutput>(), Ok(LogOutput::File));
    assert_eq!("TABLE".parse::<LogOutput>(), Ok(LogOutput::Table));
    assert!("syslog".parse::<LogOutput>().is_err());
}
