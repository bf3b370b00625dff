// crates/slowbro-rds/src/client.rs
// ============================================================================
// Module: RDS Control Plane
// Description: RDS API client implementing the orchestrator boundaries.
// Purpose: Translate orchestrator calls into RDS requests.
// Dependencies: slowbro-core, aws-config, aws-sdk-rds
// ============================================================================

//! ## Overview
//! One [`RdsControlPlane`] serves one run. The client is built from the job's
//! [`RemoteContext`] (profile and region) plus an optional endpoint override.
//! Mutating calls never wait; convergence is the orchestrator's concern.
//!
//! # Invariants
//! - Parameter writes send every value in one request with immediate apply.
//! - Log downloads never buffer more than `max_log_bytes`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_rds::Client;
use aws_sdk_rds::types::ApplyMethod;
use aws_sdk_rds::types::Parameter;
use slowbro_core::EngineFamily;
use slowbro_core::FaultKind;
use slowbro_core::GroupCreated;
use slowbro_core::InstanceId;
use slowbro_core::InstanceSnapshot;
use slowbro_core::InstanceStateReader;
use slowbro_core::ParameterGroupManager;
use slowbro_core::ParameterGroupName;
use slowbro_core::RemoteContext;
use slowbro_core::RemoteError;
use slowbro_core::RemoteOperation;
use slowbro_core::SlowLogSource;

use crate::classify::classify_sdk_error;
use crate::classify::snapshot_from_instance;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default slow-query log file name on MySQL instances.
pub const DEFAULT_LOG_FILE_NAME: &str = "slowquery/mysql-slowquery.log";
/// Default bound on downloaded log bytes.
pub const DEFAULT_MAX_LOG_BYTES: u64 = 64 * 1024 * 1024;
/// Marker that starts a log download at the beginning of the file.
const INITIAL_LOG_MARKER: &str = "0";
/// Description attached to dedicated groups.
const GROUP_DESCRIPTION: &str = "slowbro slow-query diagnostics";

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Adapter settings that do not vary per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdsSettings {
    /// Slow-query log file name on the instance.
    pub log_file_name: String,
    /// Upper bound on downloaded log bytes.
    pub max_log_bytes: u64,
    /// Optional endpoint override for the RDS API.
    pub endpoint: Option<String>,
}

impl Default for RdsSettings {
    fn default() -> Self {
        Self {
            log_file_name: DEFAULT_LOG_FILE_NAME.to_string(),
            max_log_bytes: DEFAULT_MAX_LOG_BYTES,
            endpoint: None,
        }
    }
}

// ============================================================================
// SECTION: Control Plane
// ============================================================================

/// RDS-backed implementation of the orchestrator's remote boundaries.
#[derive(Debug, Clone)]
pub struct RdsControlPlane {
    /// RDS API client.
    client: Client,
    /// Adapter settings.
    settings: RdsSettings,
}

impl RdsControlPlane {
    /// Builds a client from the shared AWS configuration chain.
    pub async fn connect(settings: RdsSettings, context: &RemoteContext) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(profile) = &context.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = &context.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared_config = loader.load().await;
        Self::from_client(Client::new(&shared_config), settings)
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn from_client(client: Client, settings: RdsSettings) -> Self {
        Self {
            client,
            settings,
        }
    }

    /// Returns the adapter settings.
    #[must_use]
    pub const fn settings(&self) -> &RdsSettings {
        &self.settings
    }
}

#[async_trait]
impl InstanceStateReader for RdsControlPlane {
    async fn fetch(&self, instance_id: &InstanceId) -> Result<InstanceSnapshot, RemoteError> {
        let output = self
            .client
            .describe_db_instances()
            .db_instance_identifier(instance_id.as_str())
            .send()
            .await
            .map_err(|err| classify_sdk_error(RemoteOperation::DescribeInstance, &err))?;
        let instance = output.db_instances().first().ok_or_else(|| {
            RemoteError::new(
                RemoteOperation::DescribeInstance,
                FaultKind::NotFound,
                format!("instance {instance_id} not found"),
            )
        })?;
        snapshot_from_instance(instance_id, instance)
    }
}

#[async_trait]
impl ParameterGroupManager for RdsControlPlane {
    async fn create_group(
        &self,
        name: &ParameterGroupName,
        family: &EngineFamily,
    ) -> Result<GroupCreated, RemoteError> {
        let result = self
            .client
            .create_db_parameter_group()
            .db_parameter_group_name(name.as_str())
            .db_parameter_group_family(family.as_str())
            .description(GROUP_DESCRIPTION)
            .send()
            .await;
        match result {
            Ok(_) => Ok(GroupCreated::Created),
            Err(err) => {
                let err = classify_sdk_error(RemoteOperation::CreateGroup, &err);
                if err.kind == FaultKind::AlreadyExists {
                    Ok(GroupCreated::AlreadyExists)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn attach_group(
        &self,
        instance_id: &InstanceId,
        name: &ParameterGroupName,
    ) -> Result<(), RemoteError> {
        self.client
            .modify_db_instance()
            .db_instance_identifier(instance_id.as_str())
            .db_parameter_group_name(name.as_str())
            .apply_immediately(true)
            .send()
            .await
            .map_err(|err| classify_sdk_error(RemoteOperation::AttachGroup, &err))?;
        Ok(())
    }

    async fn set_parameters(
        &self,
        name: &ParameterGroupName,
        values: &BTreeMap<String, String>,
    ) -> Result<(), RemoteError> {
        self.client
            .modify_db_parameter_group()
            .db_parameter_group_name(name.as_str())
            .set_parameters(Some(immediate_parameters(values)))
            .send()
            .await
            .map_err(|err| classify_sdk_error(RemoteOperation::SetParameters, &err))?;
        Ok(())
    }

    async fn delete_group(&self, name: &ParameterGroupName) -> Result<(), RemoteError> {
        self.client
            .delete_db_parameter_group()
            .db_parameter_group_name(name.as_str())
            .send()
            .await
            .map_err(|err| classify_sdk_error(RemoteOperation::DeleteGroup, &err))?;
        Ok(())
    }
}

#[async_trait]
impl SlowLogSource for RdsControlPlane {
    async fn fetch_slow_log(&self, instance_id: &InstanceId) -> Result<Vec<u8>, RemoteError> {
        let mut log = LogAccumulator::new(self.settings.max_log_bytes);
        let mut marker = INITIAL_LOG_MARKER.to_string();
        loop {
            let page = self
                .client
                .download_db_log_file_portion()
                .db_instance_identifier(instance_id.as_str())
                .log_file_name(&self.settings.log_file_name)
                .marker(&marker)
                .send()
                .await
                .map_err(|err| classify_sdk_error(RemoteOperation::DownloadLog, &err))?;
            log.push(page.log_file_data().unwrap_or_default())?;
            if !page.additional_data_pending().unwrap_or(false) {
                break;
            }
            match page.marker() {
                Some(next) if next != marker => next.clone_into(&mut marker),
                _ => {
                    return Err(RemoteError::new(
                        RemoteOperation::DownloadLog,
                        FaultKind::Other,
                        "log download reported pending data without advancing its marker",
                    ));
                }
            }
        }
        Ok(log.into_bytes())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the parameter list for one immediate-apply write.
pub(crate) fn immediate_parameters(values: &BTreeMap<String, String>) -> Vec<Parameter> {
    values
        .iter()
        .map(|(name, value)| {
            Parameter::builder()
                .parameter_name(name)
                .parameter_value(value)
                .apply_method(ApplyMethod::Immediate)
                .build()
        })
        .collect()
}

/// Bounded buffer for paged log downloads.
#[derive(Debug)]
pub(crate) struct LogAccumulator {
    /// Bytes collected so far.
    bytes: Vec<u8>,
    /// Upper bound on collected bytes.
    limit: u64,
}

impl LogAccumulator {
    /// Creates an empty buffer with the given bound.
    pub(crate) const fn new(limit: u64) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
        }
    }

    /// Appends one page.
    ///
    /// # Errors
    ///
    /// Returns a `DownloadLog` [`RemoteError`] when the bound would be exceeded.
    pub(crate) fn push(&mut self, page: &str) -> Result<(), RemoteError> {
        let total = u64::try_from(self.bytes.len().saturating_add(page.len())).unwrap_or(u64::MAX);
        if total > self.limit {
            return Err(RemoteError::new(
                RemoteOperation::DownloadLog,
                FaultKind::Other,
                format!("slow-query log exceeds {} bytes", self.limit),
            ));
        }
        self.bytes.extend_from_slice(page.as_bytes());
        Ok(())
    }

    /// Returns the collected bytes.
    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
