// crates/slowbro-rds/src/tests.rs
// ============================================================================
// Module: RDS Adapter Unit Tests
// Description: Unit tests for fault classification and response mapping.
// Purpose: Validate how RDS responses become snapshots and fault kinds.
// Dependencies: slowbro-rds, aws-sdk-rds
// ============================================================================

//! ## Overview
//! Exercises error-code classification, SDK failure mapping, snapshot
//! construction from described instances, and the bounded log buffer.

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

use std::collections::BTreeMap;

use aws_sdk_rds::error::ErrorMetadata;
use aws_sdk_rds::error::SdkError;
use aws_sdk_rds::operation::describe_db_instances::DescribeDBInstancesError;
use aws_sdk_rds::types::ApplyMethod;
use aws_sdk_rds::types::DbInstance;
use aws_sdk_rds::types::DbParameterGroupStatus;
use slowbro_core::FaultKind;
use slowbro_core::InstanceId;
use slowbro_core::RemoteOperation;

use crate::classify::classify_code;
use crate::classify::classify_sdk_error;
use crate::classify::snapshot_from_instance;
use crate::client::LogAccumulator;
use crate::client::RdsSettings;
use crate::client::immediate_parameters;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn described(group: Option<&str>, version: Option<&str>) -> DbInstance {
    let mut builder = DbInstance::builder()
        .db_instance_identifier("db1")
        .engine("mysql")
        .db_instance_status("available");
    if let Some(version) = version {
        builder = builder.engine_version(version);
    }
    if let Some(group) = group {
        builder = builder.db_parameter_groups(
            DbParameterGroupStatus::builder()
                .db_parameter_group_name(group)
                .parameter_apply_status("in-sync")
                .build(),
        );
    }
    builder.build()
}

// ============================================================================
// SECTION: Classification
// ============================================================================

#[test]
fn error_codes_map_to_fault_kinds() {
    assert_eq!(classify_code(Some("DBInstanceNotFound")), FaultKind::NotFound);
    assert_eq!(classify_code(Some("DBParameterGroupNotFound")), FaultKind::NotFound);
    assert_eq!(classify_code(Some("DBParameterGroupAlreadyExists")), FaultKind::AlreadyExists);
    assert_eq!(classify_code(Some("DBParameterGroupQuotaExceeded")), FaultKind::QuotaExceeded);
    assert_eq!(classify_code(Some("InvalidDBInstanceState")), FaultKind::InvalidState);
    assert_eq!(classify_code(Some("InvalidDBParameterGroupState")), FaultKind::InvalidState);
    assert_eq!(classify_code(Some("Throttling")), FaultKind::Transient);
    assert_eq!(classify_code(Some("AccessDenied")), FaultKind::Other);
    assert_eq!(classify_code(None), FaultKind::Other);
}

#[test]
fn service_errors_use_their_code() {
    let metadata = ErrorMetadata::builder().code("DBInstanceNotFound").message("gone").build();
    let err: SdkError<DescribeDBInstancesError, ()> =
        SdkError::service_error(DescribeDBInstancesError::generic(metadata), ());
    let classified = classify_sdk_error(RemoteOperation::DescribeInstance, &err);
    assert_eq!(classified.kind, FaultKind::NotFound);
    assert_eq!(classified.operation, RemoteOperation::DescribeInstance);
}

#[test]
fn timeouts_are_transient() {
    let err: SdkError<DescribeDBInstancesError, ()> = SdkError::timeout_error("deadline elapsed");
    let classified = classify_sdk_error(RemoteOperation::DescribeInstance, &err);
    assert_eq!(classified.kind, FaultKind::Transient);
}

// ============================================================================
// SECTION: Snapshot Mapping
// ============================================================================

#[test]
fn described_instance_becomes_snapshot() {
    let requested = InstanceId::new("db1").unwrap();
    let snapshot =
        snapshot_from_instance(&requested, &described(Some("default.mysql5.7"), Some("5.7.34")))
            .unwrap();
    assert_eq!(snapshot.instance_id, requested);
    assert_eq!(snapshot.parameter_group.as_str(), "default.mysql5.7");
    assert_eq!(snapshot.family.as_str(), "mysql5.7");
    assert!(snapshot.is_converged());
}

#[test]
fn missing_group_is_invalid_snapshot() {
    let requested = InstanceId::new("db1").unwrap();
    let err = snapshot_from_instance(&requested, &described(None, Some("5.7.34"))).unwrap_err();
    assert_eq!(err.kind, FaultKind::Other);
    assert!(err.message.contains("invalid snapshot"));
}

#[test]
fn empty_engine_version_is_invalid_snapshot() {
    let requested = InstanceId::new("db1").unwrap();
    let err =
        snapshot_from_instance(&requested, &described(Some("custom"), Some(""))).unwrap_err();
    assert!(err.message.contains("invalid snapshot"));
    let err = snapshot_from_instance(&requested, &described(Some("custom"), None)).unwrap_err();
    assert!(err.message.contains("missing engine version"));
}

// ============================================================================
// SECTION: Requests
// ============================================================================

#[test]
fn parameters_are_written_with_immediate_apply() {
    let mut values = BTreeMap::new();
    values.insert("long_query_time".to_string(), "0".to_string());
    values.insert("slow_query_log".to_string(), "1".to_string());
    let parameters = immediate_parameters(&values);
    assert_eq!(parameters.len(), 2);
    assert_eq!(parameters[0].parameter_name(), Some("long_query_time"));
    assert_eq!(parameters[1].parameter_value(), Some("1"));
    assert!(parameters.iter().all(|p| p.apply_method() == Some(&ApplyMethod::Immediate)));
}

#[test]
fn log_buffer_enforces_its_bound() {
    let mut log = LogAccumulator::new(8);
    log.push("abcd").unwrap();
    log.push("efgh").unwrap();
    let err = log.push("i").unwrap_err();
    assert_eq!(err.operation, RemoteOperation::DownloadLog);
    assert!(err.message.contains("exceeds 8 bytes"));
}

#[test]
fn settings_default_to_mysql_slow_log() {
    let settings = RdsSettings::default();
    assert_eq!(settings.log_file_name, "slowquery/mysql-slowquery.log");
    assert_eq!(settings.max_log_bytes, 64 * 1024 * 1024);
    assert!(settings.endpoint.is_none());
}
