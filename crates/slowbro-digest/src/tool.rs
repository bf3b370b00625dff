// crates/slowbro-digest/src/tool.rs
// ============================================================================
// Module: pt-query-digest Producer
// Description: Runs the analysis tool over a slow-query log.
// Purpose: Produce deterministic digest text for the orchestrator.
// Dependencies: slowbro-core, reqwest, tempfile, tokio
// ============================================================================

//! ## Overview
//! The log is written to a private temporary directory and the tool is run
//! as `{interpreter} {tool} --no-version-check --report-format <sections>
//! {log}`. Only sections derived from the log contents are requested, so
//! identical bytes yield identical text.
//!
//! # Invariants
//! - The tool is installed at most once at a time per producer.
//! - A run that exceeds the timeout is killed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use reqwest::Client;
use slowbro_core::DigestError;
use slowbro_core::DigestProducer;
use slowbro_core::InstanceId;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::install::download_tool;
use crate::install::install_tool;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Report sections that depend only on the log contents.
pub const REPORT_FORMAT: &str = "header,profile,query_report,prepared";
/// Name of the log file inside the scratch directory.
const LOG_FILE_NAME: &str = "slowquery.log";
/// Bytes of tool stderr carried into an error message.
const MAX_STDERR_DETAIL: usize = 512;
/// Timeout for the tool download request.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// SECTION: Config
// ============================================================================

/// Analysis tool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtQueryDigestConfig {
    /// Local path of the tool.
    pub tool_path: PathBuf,
    /// Download location used when the tool is missing.
    pub download_url: String,
    /// Whether a missing tool is downloaded.
    pub auto_download: bool,
    /// Interpreter that runs the tool.
    pub interpreter: String,
    /// Directory where raw logs and digests are archived, if any.
    pub archive_dir: Option<PathBuf>,
    /// Upper bound on one tool run.
    pub timeout: Duration,
}

// ============================================================================
// SECTION: Producer
// ============================================================================

/// Digest producer backed by `pt-query-digest`.
#[derive(Debug)]
pub struct PtQueryDigest {
    /// Tool settings.
    config: PtQueryDigestConfig,
    /// HTTP client for tool downloads.
    client: Client,
    /// Serializes tool installation.
    install_lock: Mutex<()>,
}

impl PtQueryDigest {
    /// Creates a producer.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::Unavailable`] when the HTTP client cannot be built.
    pub fn new(config: PtQueryDigestConfig) -> Result<Self, DigestError> {
        let client = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|err| DigestError::Unavailable(err.to_string()))?;
        Ok(Self {
            config,
            client,
            install_lock: Mutex::new(()),
        })
    }

    /// Returns the tool settings.
    #[must_use]
    pub const fn config(&self) -> &PtQueryDigestConfig {
        &self.config
    }

    /// Ensures the tool exists at its configured path.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::Unavailable`] when the tool is missing and cannot
    /// be downloaded.
    pub async fn ensure_tool(&self) -> Result<PathBuf, DigestError> {
        let target = self.config.tool_path.clone();
        if target.is_file() {
            return Ok(target);
        }
        let _guard = self.install_lock.lock().await;
        if target.is_file() {
            return Ok(target);
        }
        if !self.config.auto_download {
            return Err(DigestError::Unavailable(format!(
                "{} not found and auto download is disabled",
                target.display()
            )));
        }
        let body = download_tool(&self.client, &self.config.download_url).await?;
        tokio::task::spawn_blocking(move || install_tool(&target, &body))
            .await
            .map_err(|err| DigestError::Unavailable(format!("install task failed: {err}")))?
    }

    /// Runs the tool over a log file and returns its stdout.
    async fn run_tool(&self, tool: &Path, log_path: &Path) -> Result<String, DigestError> {
        let mut command = Command::new(&self.config.interpreter);
        command
            .arg(tool)
            .arg("--no-version-check")
            .arg("--report-format")
            .arg(REPORT_FORMAT)
            .arg(log_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let output = tokio::time::timeout(self.config.timeout, command.output())
            .await
            .map_err(|_| {
                DigestError::Failed(format!(
                    "timed out after {} ms",
                    self.config.timeout.as_millis()
                ))
            })?
            .map_err(|err| {
                DigestError::Failed(format!("could not run {}: {err}", self.config.interpreter))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail: String = stderr.trim().chars().take(MAX_STDERR_DETAIL).collect();
            return Err(DigestError::Failed(format!("{}: {detail}", output.status)));
        }
        String::from_utf8(output.stdout)
            .map_err(|_| DigestError::Failed("output is not utf-8".to_string()))
    }
}

#[async_trait]
impl DigestProducer for PtQueryDigest {
    async fn digest(&self, instance_id: &InstanceId, log: &[u8]) -> Result<String, DigestError> {
        let tool = self.ensure_tool().await?;
        let scratch = tempfile::tempdir()
            .map_err(|err| DigestError::Failed(format!("scratch directory: {err}")))?;
        let log_path = scratch.path().join(LOG_FILE_NAME);
        tokio::fs::write(&log_path, log)
            .await
            .map_err(|err| DigestError::Failed(format!("writing log copy: {err}")))?;
        let digest = self.run_tool(&tool, &log_path).await?;
        if let Some(dir) = &self.config.archive_dir {
            archive(dir, instance_id, log, &digest).await?;
        }
        Ok(digest)
    }
}

// ============================================================================
// SECTION: Archive
// ============================================================================

/// Writes the raw log and digest into the archive directory.
async fn archive(
    dir: &Path,
    instance_id: &InstanceId,
    log: &[u8],
    digest: &str,
) -> Result<(), DigestError> {
    let io_err = |err: std::io::Error| {
        DigestError::Failed(format!("archiving to {} failed: {err}", dir.display()))
    };
    let stamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
    let prefix = format!("{instance_id}-{stamp}");
    tokio::fs::write(dir.join(format!("{prefix}-slowquery.log")), log)
        .await
        .map_err(io_err)?;
    tokio::fs::write(dir.join(format!("{prefix}-digest.txt")), digest)
        .await
        .map_err(io_err)?;
    Ok(())
}
