// crates/slowbro-core/src/runtime/memory.rs
// ============================================================================
// Module: Slowbro In-Memory Control Plane
// Description: Simulated database control plane for tests and dry runs.
// Purpose: Exercise the orchestrator without a remote service.
// Dependencies: crate::{core, interfaces}, async-trait
// ============================================================================

//! ## Overview
//! [`InMemoryControlPlane`] implements every remote boundary the orchestrator
//! uses. Each call is appended to a journal, outcomes can be scripted per
//! operation, and convergence is simulated: after a mutation the affected
//! instance reports `modifying` (attach) or `applying` (parameter write) for a
//! configurable number of fetches. Mutations issued while an instance is still
//! converging are rejected with `InvalidState`, mirroring the remote service.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;

use crate::core::APPLY_STATUS_APPLYING;
use crate::core::APPLY_STATUS_IN_SYNC;
use crate::core::EngineFamily;
use crate::core::FaultKind;
use crate::core::InstanceId;
use crate::core::InstanceSnapshot;
use crate::core::ParameterGroupName;
use crate::core::RemoteError;
use crate::core::RemoteOperation;
use crate::core::STATUS_AVAILABLE;
use crate::core::STATUS_MODIFYING;
use crate::interfaces::GroupCreated;
use crate::interfaces::InstanceStateReader;
use crate::interfaces::ParameterGroupManager;
use crate::interfaces::SlowLogSource;

// ============================================================================
// SECTION: Journal
// ============================================================================

/// One call observed by the in-memory control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    /// Snapshot fetch.
    Fetch {
        /// Target instance.
        instance_id: String,
    },
    /// Group creation.
    CreateGroup {
        /// Requested group name.
        name: String,
        /// Requested family.
        family: String,
    },
    /// Group attachment.
    AttachGroup {
        /// Target instance.
        instance_id: String,
        /// Requested group.
        name: String,
    },
    /// Parameter write.
    SetParameters {
        /// Target group.
        name: String,
        /// Written values.
        values: BTreeMap<String, String>,
    },
    /// Group deletion.
    DeleteGroup {
        /// Target group.
        name: String,
    },
    /// Log download.
    DownloadLog {
        /// Target instance.
        instance_id: String,
    },
}

impl RemoteCall {
    /// Returns true for calls that change remote state.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::CreateGroup { .. }
                | Self::AttachGroup { .. }
                | Self::SetParameters { .. }
                | Self::DeleteGroup { .. }
        )
    }
}

// ============================================================================
// SECTION: State
// ============================================================================

/// Simulated parameter group.
#[derive(Debug, Clone)]
struct MemoryGroup {
    /// Group family.
    family: String,
    /// Whether the group is a read-only service default.
    read_only: bool,
    /// Current parameter values.
    parameters: BTreeMap<String, String>,
}

/// Simulated instance.
#[derive(Debug, Clone)]
struct MemoryInstance {
    /// Engine name.
    engine: String,
    /// Engine version.
    engine_version: String,
    /// Attached group.
    parameter_group: String,
    /// Fetches remaining that report `modifying`.
    modifying_polls: u32,
    /// Fetches remaining that report `applying`.
    applying_polls: u32,
}

impl MemoryInstance {
    /// Returns true while a simulated change is still converging.
    const fn is_busy(&self) -> bool {
        self.modifying_polls > 0 || self.applying_polls > 0
    }
}

/// Mutable control plane state.
#[derive(Debug, Default)]
struct MemoryState {
    /// Instances keyed by identifier.
    instances: BTreeMap<String, MemoryInstance>,
    /// Groups keyed by name.
    groups: BTreeMap<String, MemoryGroup>,
    /// Log contents keyed by instance.
    logs: BTreeMap<String, Vec<u8>>,
    /// Scripted outcomes consumed in order per operation; `None` passes.
    faults: BTreeMap<&'static str, VecDeque<Option<FaultKind>>>,
    /// Call journal.
    journal: Vec<RemoteCall>,
    /// Fetches a change takes to converge.
    convergence_polls: u32,
}

impl MemoryState {
    /// Pops a scripted fault for `operation`, if any.
    fn scripted_fault(&mut self, operation: RemoteOperation) -> Option<RemoteError> {
        let kind = self.faults.get_mut(operation.as_str())?.pop_front()??;
        Some(RemoteError::new(operation, kind, format!("scripted {kind} fault")))
    }

    /// Returns the instance or a `NotFound` error.
    fn instance_mut(
        &mut self,
        operation: RemoteOperation,
        instance_id: &str,
    ) -> Result<&mut MemoryInstance, RemoteError> {
        self.instances.get_mut(instance_id).ok_or_else(|| {
            RemoteError::new(
                operation,
                FaultKind::NotFound,
                format!("instance {instance_id} not found"),
            )
        })
    }
}

// ============================================================================
// SECTION: Control Plane
// ============================================================================

/// In-memory control plane with a call journal and scripted faults.
#[derive(Debug)]
pub struct InMemoryControlPlane {
    /// Shared simulated state.
    state: Mutex<MemoryState>,
}

impl Default for InMemoryControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryControlPlane {
    /// Creates an empty control plane where each change is observed in flight
    /// by exactly one fetch.
    #[must_use]
    pub fn new() -> Self {
        Self::with_convergence_polls(1)
    }

    /// Creates an empty control plane where each change is observed in flight
    /// by `polls` fetches.
    #[must_use]
    pub fn with_convergence_polls(polls: u32) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                convergence_polls: polls,
                ..MemoryState::default()
            }),
        }
    }

    /// Locks the state, mapping poisoning to a remote error.
    fn lock(&self, operation: RemoteOperation) -> Result<MutexGuard<'_, MemoryState>, RemoteError> {
        self.state.lock().map_err(|_| {
            RemoteError::new(operation, FaultKind::Other, "control plane state mutex poisoned")
        })
    }

    /// Runs `f` against the state, returning `default` if the lock is poisoned.
    fn inspect<T>(&self, default: T, f: impl FnOnce(&mut MemoryState) -> T) -> T {
        self.state.lock().map_or(default, |mut guard| f(&mut guard))
    }

    /// Registers a writable parameter group.
    pub fn add_group(&self, name: &str, family: &str) {
        self.insert_group(name, family, false);
    }

    /// Registers a read-only service default group.
    pub fn add_default_group(&self, name: &str, family: &str) {
        self.insert_group(name, family, true);
    }

    /// Inserts a group.
    fn insert_group(&self, name: &str, family: &str, read_only: bool) {
        self.inspect((), |state| {
            state.groups.insert(
                name.to_string(),
                MemoryGroup {
                    family: family.to_string(),
                    read_only,
                    parameters: BTreeMap::new(),
                },
            );
        });
    }

    /// Registers an instance attached to `group`.
    pub fn add_instance(&self, instance_id: &str, engine: &str, engine_version: &str, group: &str) {
        self.inspect((), |state| {
            state.instances.insert(
                instance_id.to_string(),
                MemoryInstance {
                    engine: engine.to_string(),
                    engine_version: engine_version.to_string(),
                    parameter_group: group.to_string(),
                    modifying_polls: 0,
                    applying_polls: 0,
                },
            );
        });
    }

    /// Sets the slow-query log contents for an instance.
    pub fn set_log(&self, instance_id: &str, bytes: impl Into<Vec<u8>>) {
        self.inspect((), |state| {
            state.logs.insert(instance_id.to_string(), bytes.into());
        });
    }

    /// Sets a parameter value on a group directly, bypassing the journal.
    pub fn seed_parameter(&self, group: &str, name: &str, value: &str) {
        self.inspect((), |state| {
            if let Some(group) = state.groups.get_mut(group) {
                group.parameters.insert(name.to_string(), value.to_string());
            }
        });
    }

    /// Makes the next unscripted call of `operation` fail with `kind`.
    /// Scripted outcomes are consumed in order.
    pub fn fail_next(&self, operation: RemoteOperation, kind: FaultKind) {
        self.script(operation, Some(kind));
    }

    /// Lets the next unscripted call of `operation` behave normally.
    pub fn pass_next(&self, operation: RemoteOperation) {
        self.script(operation, None);
    }

    /// Queues a scripted outcome.
    fn script(&self, operation: RemoteOperation, outcome: Option<FaultKind>) {
        self.inspect((), |state| {
            state.faults.entry(operation.as_str()).or_default().push_back(outcome);
        });
    }

    /// Keeps the instance reporting `modifying` indefinitely.
    pub fn hold_modifying(&self, instance_id: &str) {
        self.inspect((), |state| {
            if let Some(instance) = state.instances.get_mut(instance_id) {
                instance.modifying_polls = u32::MAX;
            }
        });
    }

    /// Returns a copy of the call journal.
    #[must_use]
    pub fn journal(&self) -> Vec<RemoteCall> {
        self.inspect(Vec::new(), |state| state.journal.clone())
    }

    /// Returns the journaled calls that change remote state.
    #[must_use]
    pub fn mutations(&self) -> Vec<RemoteCall> {
        self.journal().into_iter().filter(RemoteCall::is_mutation).collect()
    }

    /// Returns the group currently attached to an instance.
    #[must_use]
    pub fn attached_group(&self, instance_id: &str) -> Option<String> {
        self.inspect(None, |state| {
            state.instances.get(instance_id).map(|instance| instance.parameter_group.clone())
        })
    }

    /// Returns true when a group exists.
    #[must_use]
    pub fn group_exists(&self, name: &str) -> bool {
        self.inspect(false, |state| state.groups.contains_key(name))
    }

    /// Returns the current parameters of a group.
    #[must_use]
    pub fn group_parameters(&self, name: &str) -> Option<BTreeMap<String, String>> {
        self.inspect(None, |state| state.groups.get(name).map(|group| group.parameters.clone()))
    }

    /// Returns the family a group was created for.
    #[must_use]
    pub fn group_family(&self, name: &str) -> Option<String> {
        self.inspect(None, |state| state.groups.get(name).map(|group| group.family.clone()))
    }

    /// Returns the names of all groups.
    #[must_use]
    pub fn group_names(&self) -> Vec<String> {
        self.inspect(Vec::new(), |state| state.groups.keys().cloned().collect())
    }
}

#[async_trait]
impl InstanceStateReader for InMemoryControlPlane {
    async fn fetch(&self, instance_id: &InstanceId) -> Result<InstanceSnapshot, RemoteError> {
        let operation = RemoteOperation::DescribeInstance;
        let mut state = self.lock(operation)?;
        state.journal.push(RemoteCall::Fetch {
            instance_id: instance_id.to_string(),
        });
        if let Some(err) = state.scripted_fault(operation) {
            return Err(err);
        }
        let instance = state.instance_mut(operation, instance_id.as_str())?;
        let status = if instance.modifying_polls > 0 { STATUS_MODIFYING } else { STATUS_AVAILABLE };
        let apply_status =
            if instance.applying_polls > 0 { APPLY_STATUS_APPLYING } else { APPLY_STATUS_IN_SYNC };
        instance.modifying_polls = instance.modifying_polls.saturating_sub(1);
        instance.applying_polls = instance.applying_polls.saturating_sub(1);
        let group = ParameterGroupName::new(instance.parameter_group.clone())
            .map_err(|err| RemoteError::new(operation, FaultKind::Other, err.to_string()))?;
        InstanceSnapshot::new(
            instance_id.clone(),
            instance.engine.clone(),
            instance.engine_version.clone(),
            group,
            status,
            apply_status,
        )
        .map_err(|err| RemoteError::new(operation, FaultKind::Other, err.to_string()))
    }
}

#[async_trait]
impl ParameterGroupManager for InMemoryControlPlane {
    async fn create_group(
        &self,
        name: &ParameterGroupName,
        family: &EngineFamily,
    ) -> Result<GroupCreated, RemoteError> {
        let operation = RemoteOperation::CreateGroup;
        let mut state = self.lock(operation)?;
        state.journal.push(RemoteCall::CreateGroup {
            name: name.to_string(),
            family: family.to_string(),
        });
        if let Some(err) = state.scripted_fault(operation) {
            return Err(err);
        }
        if state.groups.contains_key(name.as_str()) {
            return Ok(GroupCreated::AlreadyExists);
        }
        state.groups.insert(
            name.to_string(),
            MemoryGroup {
                family: family.to_string(),
                read_only: false,
                parameters: BTreeMap::new(),
            },
        );
        Ok(GroupCreated::Created)
    }

    async fn attach_group(
        &self,
        instance_id: &InstanceId,
        name: &ParameterGroupName,
    ) -> Result<(), RemoteError> {
        let operation = RemoteOperation::AttachGroup;
        let mut state = self.lock(operation)?;
        state.journal.push(RemoteCall::AttachGroup {
            instance_id: instance_id.to_string(),
            name: name.to_string(),
        });
        if let Some(err) = state.scripted_fault(operation) {
            return Err(err);
        }
        if !state.groups.contains_key(name.as_str()) {
            return Err(RemoteError::new(
                operation,
                FaultKind::NotFound,
                format!("parameter group {name} not found"),
            ));
        }
        let polls = state.convergence_polls;
        let instance = state.instance_mut(operation, instance_id.as_str())?;
        if instance.is_busy() {
            return Err(RemoteError::new(
                operation,
                FaultKind::InvalidState,
                format!("instance {instance_id} is not available for modification"),
            ));
        }
        instance.parameter_group = name.to_string();
        instance.modifying_polls = polls;
        Ok(())
    }

    async fn set_parameters(
        &self,
        name: &ParameterGroupName,
        values: &BTreeMap<String, String>,
    ) -> Result<(), RemoteError> {
        let operation = RemoteOperation::SetParameters;
        let mut state = self.lock(operation)?;
        state.journal.push(RemoteCall::SetParameters {
            name: name.to_string(),
            values: values.clone(),
        });
        if let Some(err) = state.scripted_fault(operation) {
            return Err(err);
        }
        let polls = state.convergence_polls;
        let busy = state
            .instances
            .values()
            .any(|instance| instance.parameter_group == name.as_str() && instance.is_busy());
        let group = state.groups.get_mut(name.as_str()).ok_or_else(|| {
            RemoteError::new(
                operation,
                FaultKind::NotFound,
                format!("parameter group {name} not found"),
            )
        })?;
        if group.read_only {
            return Err(RemoteError::new(
                operation,
                FaultKind::Other,
                format!("default parameter group {name} cannot be modified"),
            ));
        }
        if busy {
            return Err(RemoteError::new(
                operation,
                FaultKind::InvalidState,
                format!("parameter group {name} is still applying"),
            ));
        }
        group.parameters.extend(values.iter().map(|(key, value)| (key.clone(), value.clone())));
        for instance in state.instances.values_mut() {
            if instance.parameter_group == name.as_str() {
                instance.applying_polls = polls;
            }
        }
        Ok(())
    }

    async fn delete_group(&self, name: &ParameterGroupName) -> Result<(), RemoteError> {
        let operation = RemoteOperation::DeleteGroup;
        let mut state = self.lock(operation)?;
        state.journal.push(RemoteCall::DeleteGroup {
            name: name.to_string(),
        });
        if let Some(err) = state.scripted_fault(operation) {
            return Err(err);
        }
        if state.instances.values().any(|instance| instance.parameter_group == name.as_str()) {
            return Err(RemoteError::new(
                operation,
                FaultKind::InvalidState,
                format!("parameter group {name} is still in use"),
            ));
        }
        match state.groups.remove(name.as_str()) {
            Some(_) => Ok(()),
            None => Err(RemoteError::new(
                operation,
                FaultKind::NotFound,
                format!("parameter group {name} not found"),
            )),
        }
    }
}

#[async_trait]
impl SlowLogSource for InMemoryControlPlane {
    async fn fetch_slow_log(&self, instance_id: &InstanceId) -> Result<Vec<u8>, RemoteError> {
        let operation = RemoteOperation::DownloadLog;
        let mut state = self.lock(operation)?;
        state.journal.push(RemoteCall::DownloadLog {
            instance_id: instance_id.to_string(),
        });
        if let Some(err) = state.scripted_fault(operation) {
            return Err(err);
        }
        state.instance_mut(operation, instance_id.as_str())?;
        Ok(state.logs.get(instance_id.as_str()).cloned().unwrap_or_default())
    }
}
