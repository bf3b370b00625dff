// crates/slowbro-cli/src/wiring.rs
// ============================================================================
// Module: Production Wiring
// Description: Assembles RDS and digest collaborators from configuration.
// Purpose: Build one orchestrator per remote context for serve and run.
// Dependencies: slowbro-config, slowbro-core, slowbro-digest, slowbro-rds
// ============================================================================

//! ## Overview
//! The digest producer is shared across runs so the tool is installed once;
//! the RDS client is rebuilt per remote context because credentials and
//! region come from the request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use slowbro_config::DigestConfig;
use slowbro_config::RdsConfig;
use slowbro_config::SlowbroConfig;
use slowbro_core::Diagnostician;
use slowbro_core::DigestError;
use slowbro_core::OrchestratorConfig;
use slowbro_core::RemoteContext;
use slowbro_core::RunAuditSink;
use slowbro_core::SlowQueryOrchestrator;
use slowbro_digest::PtQueryDigest;
use slowbro_digest::PtQueryDigestConfig;
use slowbro_rds::RdsControlPlane;
use slowbro_rds::RdsSettings;
use slowbro_server::DiagnosticianFactory;

// ============================================================================
// SECTION: Conversions
// ============================================================================

/// Maps the digest config section to producer settings.
#[must_use]
pub fn digest_config(config: &DigestConfig) -> PtQueryDigestConfig {
    PtQueryDigestConfig {
        tool_path: PathBuf::from(config.tool_path.trim()),
        download_url: config.download_url.trim().to_string(),
        auto_download: config.auto_download,
        interpreter: config.interpreter.trim().to_string(),
        archive_dir: config.archive_dir.as_deref().map(|dir| PathBuf::from(dir.trim())),
        timeout: config.timeout(),
    }
}

/// Maps the RDS config section to adapter settings.
#[must_use]
pub fn rds_settings(config: &RdsConfig) -> RdsSettings {
    RdsSettings {
        log_file_name: config.log_file_name.trim().to_string(),
        max_log_bytes: config.max_log_bytes,
        endpoint: config.endpoint.as_deref().map(|endpoint| endpoint.trim().to_string()),
    }
}

/// Returns true when `bind` accepts connections from other hosts.
#[must_use]
pub const fn network_exposed(bind: SocketAddr) -> bool {
    !bind.ip().is_loopback()
}

// ============================================================================
// SECTION: Factory
// ============================================================================

/// Diagnostician factory backed by RDS and `pt-query-digest`.
pub struct RdsDiagnosticianFactory {
    /// RDS adapter settings.
    rds: RdsSettings,
    /// Shared digest producer.
    digest: Arc<PtQueryDigest>,
    /// Orchestrator tuning.
    orchestrator: OrchestratorConfig,
    /// Run audit sink.
    audit: Arc<dyn RunAuditSink>,
}

impl RdsDiagnosticianFactory {
    /// Builds the factory from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError`] when the digest producer cannot be created.
    pub fn from_config(
        config: &SlowbroConfig,
        audit: Arc<dyn RunAuditSink>,
    ) -> Result<Self, DigestError> {
        Ok(Self {
            rds: rds_settings(&config.rds),
            digest: Arc::new(PtQueryDigest::new(digest_config(&config.digest))?),
            orchestrator: config.orchestrator_config(),
            audit,
        })
    }

    /// Returns the orchestrator tuning.
    #[must_use]
    pub const fn orchestrator(&self) -> &OrchestratorConfig {
        &self.orchestrator
    }
}

#[async_trait]
impl DiagnosticianFactory for RdsDiagnosticianFactory {
    async fn diagnostician(&self, context: &RemoteContext) -> Arc<dyn Diagnostician> {
        let plane = Arc::new(RdsControlPlane::connect(self.rds.clone(), context).await);
        Arc::new(
            SlowQueryOrchestrator::new(
                Arc::clone(&plane),
                Arc::clone(&plane),
                plane,
                Arc::clone(&self.digest),
                self.orchestrator.clone(),
            )
            .with_audit(Arc::clone(&self.audit)),
        )
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
