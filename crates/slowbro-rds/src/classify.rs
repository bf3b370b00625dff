// crates/slowbro-rds/src/classify.rs
// ============================================================================
// Module: RDS Fault Classification
// Description: Maps RDS error codes and SDK failures to fault kinds.
// Purpose: Give the orchestrator a provider-neutral view of remote faults.
// Dependencies: slowbro-core, aws-sdk-rds
// ============================================================================

//! ## Overview
//! Service errors are classified by their error code. Failures that never
//! reached a service response (timeouts, dispatch failures, unparseable
//! responses) are transient.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::error::Error;
use std::fmt;

use aws_sdk_rds::error::DisplayErrorContext;
use aws_sdk_rds::error::ProvideErrorMetadata;
use aws_sdk_rds::error::SdkError;
use aws_sdk_rds::types::DbInstance;
use slowbro_core::FaultKind;
use slowbro_core::InstanceId;
use slowbro_core::InstanceSnapshot;
use slowbro_core::ParameterGroupName;
use slowbro_core::RemoteError;
use slowbro_core::RemoteOperation;

// ============================================================================
// SECTION: Codes
// ============================================================================

/// Codes meaning the instance, group, or log file does not exist.
const NOT_FOUND_CODES: &[&str] = &[
    "DBInstanceNotFound",
    "DBInstanceNotFoundFault",
    "DBParameterGroupNotFound",
    "DBParameterGroupNotFoundFault",
    "DBLogFileNotFoundFault",
];

/// Codes meaning the group already exists.
const ALREADY_EXISTS_CODES: &[&str] =
    &["DBParameterGroupAlreadyExists", "DBParameterGroupAlreadyExistsFault"];

/// Codes meaning the account quota is exhausted.
const QUOTA_CODES: &[&str] =
    &["DBParameterGroupQuotaExceeded", "DBParameterGroupQuotaExceededFault"];

/// Codes meaning the target is mid-transition.
const INVALID_STATE_CODES: &[&str] = &[
    "InvalidDBInstanceState",
    "InvalidDBInstanceStateFault",
    "InvalidDBParameterGroupState",
    "InvalidDBParameterGroupStateFault",
];

/// Codes for throttling and service-side faults.
const TRANSIENT_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
    "RequestThrottled",
    "ServiceUnavailable",
    "InternalFailure",
    "InternalError",
    "RequestTimeout",
];

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Maps an RDS error code to a fault kind. Unknown or missing codes are `Other`.
#[must_use]
pub fn classify_code(code: Option<&str>) -> FaultKind {
    let Some(code) = code else {
        return FaultKind::Other;
    };
    if NOT_FOUND_CODES.contains(&code) {
        FaultKind::NotFound
    } else if ALREADY_EXISTS_CODES.contains(&code) {
        FaultKind::AlreadyExists
    } else if QUOTA_CODES.contains(&code) {
        FaultKind::QuotaExceeded
    } else if INVALID_STATE_CODES.contains(&code) {
        FaultKind::InvalidState
    } else if TRANSIENT_CODES.contains(&code) {
        FaultKind::Transient
    } else {
        FaultKind::Other
    }
}

/// Converts an SDK failure into a classified remote error.
pub(crate) fn classify_sdk_error<E, R>(
    operation: RemoteOperation,
    err: &SdkError<E, R>,
) -> RemoteError
where
    E: ProvideErrorMetadata + Error + 'static,
    R: fmt::Debug,
{
    let kind = match err {
        SdkError::ServiceError(service) => classify_code(service.err().code()),
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            FaultKind::Transient
        }
        _ => FaultKind::Other,
    };
    RemoteError::new(operation, kind, DisplayErrorContext(err).to_string())
}

// ============================================================================
// SECTION: Snapshot Mapping
// ============================================================================

/// Builds an instance snapshot from a described instance.
///
/// The first parameter group membership is treated as the attached group.
///
/// # Errors
///
/// Returns a `DescribeInstance` [`RemoteError`] classified `Other` when a
/// field the orchestrator depends on is missing or malformed.
pub(crate) fn snapshot_from_instance(
    requested: &InstanceId,
    instance: &DbInstance,
) -> Result<InstanceSnapshot, RemoteError> {
    let invalid = |detail: &str| {
        RemoteError::new(
            RemoteOperation::DescribeInstance,
            FaultKind::Other,
            format!("invalid snapshot for {requested}: {detail}"),
        )
    };
    let instance_id = match instance.db_instance_identifier() {
        Some(id) => InstanceId::new(id).map_err(|err| invalid(&err.to_string()))?,
        None => requested.clone(),
    };
    let engine = instance.engine().ok_or_else(|| invalid("missing engine"))?;
    let engine_version =
        instance.engine_version().ok_or_else(|| invalid("missing engine version"))?;
    let status = instance.db_instance_status().ok_or_else(|| invalid("missing status"))?;
    let membership =
        instance.db_parameter_groups().first().ok_or_else(|| invalid("no parameter group"))?;
    let group_name = membership
        .db_parameter_group_name()
        .ok_or_else(|| invalid("missing parameter group name"))?;
    let parameter_group =
        ParameterGroupName::new(group_name).map_err(|err| invalid(&err.to_string()))?;
    let apply_status = membership
        .parameter_apply_status()
        .ok_or_else(|| invalid("missing parameter apply status"))?;
    InstanceSnapshot::new(
        instance_id,
        engine,
        engine_version,
        parameter_group,
        status,
        apply_status,
    )
    .map_err(|err| invalid(&err.to_string()))
}
