// crates/slowbro-config/src/config.rs
// ============================================================================
// Module: Slowbro Configuration
// Description: Configuration loading and validation for slowbro.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: slowbro-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section has built-in defaults, so an absent `slowbro.toml` in the
//! working directory yields a usable config. An explicitly named file that is
//! missing or invalid fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use slowbro_core::ConvergencePolicy;
use slowbro_core::FileRunAuditSink;
use slowbro_core::NoopRunAuditSink;
use slowbro_core::OrchestratorConfig;
use slowbro_core::ParameterGroupName;
use slowbro_core::RunAuditSink;
use slowbro_core::StderrRunAuditSink;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "slowbro.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "SLOWBRO_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;

/// Default HTTP bind address.
const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Default CORS origin.
const DEFAULT_ALLOWED_ORIGIN: &str = "http://localhost:3000";
/// Default request body limit.
const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024;
/// Upper bound for the request body limit.
const MAX_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Default poll interval in milliseconds.
const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
/// Poll interval bounds in milliseconds.
const MIN_POLL_INTERVAL_MS: u64 = 100;
/// Poll interval upper bound in milliseconds.
const MAX_POLL_INTERVAL_MS: u64 = 60_000;
/// Default settle delay in milliseconds.
const DEFAULT_SETTLE_DELAY_MS: u64 = 5_000;
/// Settle delay upper bound in milliseconds.
const MAX_SETTLE_DELAY_MS: u64 = 300_000;
/// Default poll cap.
const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 450;
/// Poll cap upper bound.
const MAX_MAX_POLL_ATTEMPTS: u32 = 100_000;
/// Default mutation re-issue budget.
const DEFAULT_MUTATION_RETRIES: u32 = 3;
/// Mutation re-issue budget upper bound.
const MAX_MUTATION_RETRIES: u32 = 10;
/// Default upper bound for a requested sample window.
const DEFAULT_MAX_SAMPLE_SECONDS: u64 = 900;
/// Hard ceiling for the sample window bound.
const MAX_MAX_SAMPLE_SECONDS: u64 = 86_400;
/// Default dedicated group prefix.
const DEFAULT_DEDICATED_GROUP_PREFIX: &str = "slowbro";
/// Maximum dedicated group prefix length.
const MAX_PREFIX_LENGTH: usize = 64;

/// Default slow-query log file name on the instance.
const DEFAULT_LOG_FILE_NAME: &str = "slowquery/mysql-slowquery.log";
/// Default bound on downloaded log bytes.
const DEFAULT_MAX_LOG_BYTES: u64 = 64 * 1024 * 1024;
/// Upper bound on downloaded log bytes.
const MAX_MAX_LOG_BYTES: u64 = 1024 * 1024 * 1024;

/// Default analysis tool path.
const DEFAULT_TOOL_PATH: &str = "pt-query-digest";
/// Default analysis tool download location.
const DEFAULT_DOWNLOAD_URL: &str = "https://www.percona.com/get/pt-query-digest";
/// Default analysis tool interpreter.
const DEFAULT_INTERPRETER: &str = "perl";
/// Default analysis timeout in seconds.
const DEFAULT_DIGEST_TIMEOUT_SECONDS: u64 = 300;
/// Analysis timeout upper bound in seconds.
const MAX_DIGEST_TIMEOUT_SECONDS: u64 = 3_600;

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Slowbro configuration root.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlowbroConfig {
    /// HTTP adapter configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Orchestrator timing and safety configuration.
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
    /// RDS adapter configuration.
    #[serde(default)]
    pub rds: RdsConfig,
    /// Analysis tool configuration.
    #[serde(default)]
    pub digest: DigestConfig,
    /// Run audit sink configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl SlowbroConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order is the explicit `path`, then `SLOWBRO_CONFIG`, then
    /// `slowbro.toml` in the working directory. Only the last may be absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (resolved, explicit) = resolve_path(path)?;
        validate_path(&resolved)?;
        if !explicit && !resolved.exists() {
            let mut config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Parses and validates configuration from raw file bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the content is oversized, not utf-8,
    /// malformed, or invalid.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.orchestrator.validate()?;
        self.rds.validate()?;
        self.digest.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Converts the orchestrator section into the core orchestrator config.
    #[must_use]
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            convergence: self.orchestrator.convergence_policy(),
            mutation_retries: self.orchestrator.mutation_retries,
            default_parameter_groups: self
                .orchestrator
                .default_parameter_groups
                .iter()
                .map(|name| name.trim().to_string())
                .collect::<BTreeSet<_>>(),
            dedicated_group_prefix: self.orchestrator.dedicated_group_prefix.clone(),
        }
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP adapter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Value of the `Access-Control-Allow-Origin` response header.
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_origin: default_allowed_origin(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bind address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind.trim().parse().map_err(|_| {
            ConfigError::Invalid(format!("server.bind is not a socket address: {}", self.bind))
        })
    }

    /// Validates the server section.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        let origin = self.allowed_origin.trim();
        if origin != "*" && !is_http_url(origin) {
            return Err(ConfigError::Invalid(
                "server.allowed_origin must be * or an http(s) origin".to_string(),
            ));
        }
        if self.max_body_bytes == 0 || self.max_body_bytes > MAX_MAX_BODY_BYTES {
            return Err(ConfigError::Invalid(format!(
                "server.max_body_bytes must be between 1 and {MAX_MAX_BODY_BYTES}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Orchestrator timing and safety configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorSettings {
    /// Delay between convergence polls in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Delay after a mutation before the first poll in milliseconds.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Maximum polls before an instance is reported stuck.
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    /// Re-issues allowed for a rejected attach or parameter write.
    #[serde(default = "default_mutation_retries")]
    pub mutation_retries: u32,
    /// Largest sample window a request may ask for.
    #[serde(default = "default_max_sample_seconds")]
    pub max_sample_seconds: u64,
    /// Parameter groups that must never be written.
    #[serde(default = "default_parameter_groups")]
    pub default_parameter_groups: Vec<String>,
    /// Prefix for dedicated group names.
    #[serde(default = "default_dedicated_group_prefix")]
    pub dedicated_group_prefix: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            mutation_retries: default_mutation_retries(),
            max_sample_seconds: default_max_sample_seconds(),
            default_parameter_groups: default_parameter_groups(),
            dedicated_group_prefix: default_dedicated_group_prefix(),
        }
    }
}

impl OrchestratorSettings {
    /// Returns the convergence policy described by this section.
    #[must_use]
    pub const fn convergence_policy(&self) -> ConvergencePolicy {
        ConvergencePolicy {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_poll_attempts,
        }
    }

    /// Validates the orchestrator section.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            return Err(ConfigError::Invalid(format!(
                "orchestrator.poll_interval_ms must be between {MIN_POLL_INTERVAL_MS} and \
                 {MAX_POLL_INTERVAL_MS}"
            )));
        }
        if self.settle_delay_ms > MAX_SETTLE_DELAY_MS {
            return Err(ConfigError::Invalid(format!(
                "orchestrator.settle_delay_ms must be at most {MAX_SETTLE_DELAY_MS}"
            )));
        }
        if self.max_poll_attempts == 0 || self.max_poll_attempts > MAX_MAX_POLL_ATTEMPTS {
            return Err(ConfigError::Invalid(format!(
                "orchestrator.max_poll_attempts must be between 1 and {MAX_MAX_POLL_ATTEMPTS}"
            )));
        }
        if self.mutation_retries > MAX_MUTATION_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "orchestrator.mutation_retries must be at most {MAX_MUTATION_RETRIES}"
            )));
        }
        if self.max_sample_seconds == 0 || self.max_sample_seconds > MAX_MAX_SAMPLE_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "orchestrator.max_sample_seconds must be between 1 and {MAX_MAX_SAMPLE_SECONDS}"
            )));
        }
        for name in &self.default_parameter_groups {
            ParameterGroupName::new(name.trim()).map_err(|err| {
                ConfigError::Invalid(format!("orchestrator.default_parameter_groups: {err}"))
            })?;
        }
        validate_prefix(&self.dedicated_group_prefix)
    }
}

/// Validates the dedicated group prefix.
fn validate_prefix(prefix: &str) -> Result<(), ConfigError> {
    let valid_chars = prefix.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-');
    let starts_with_letter = prefix.chars().next().is_some_and(|ch| ch.is_ascii_alphabetic());
    if prefix.is_empty()
        || prefix.len() > MAX_PREFIX_LENGTH
        || !valid_chars
        || !starts_with_letter
        || prefix.ends_with('-')
    {
        return Err(ConfigError::Invalid(format!(
            "orchestrator.dedicated_group_prefix must be 1-{MAX_PREFIX_LENGTH} letters, digits, \
             or hyphens starting with a letter"
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: RDS
// ============================================================================

/// RDS adapter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RdsConfig {
    /// Slow-query log file name on the instance.
    #[serde(default = "default_log_file_name")]
    pub log_file_name: String,
    /// Upper bound on downloaded log bytes.
    #[serde(default = "default_max_log_bytes")]
    pub max_log_bytes: u64,
    /// Optional endpoint override for the RDS API.
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for RdsConfig {
    fn default() -> Self {
        Self {
            log_file_name: default_log_file_name(),
            max_log_bytes: default_max_log_bytes(),
            endpoint: None,
        }
    }
}

impl RdsConfig {
    /// Validates the RDS section.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("rds.log_file_name", &self.log_file_name)?;
        if self.max_log_bytes == 0 || self.max_log_bytes > MAX_MAX_LOG_BYTES {
            return Err(ConfigError::Invalid(format!(
                "rds.max_log_bytes must be between 1 and {MAX_MAX_LOG_BYTES}"
            )));
        }
        if let Some(endpoint) = &self.endpoint
            && !is_http_url(endpoint.trim())
        {
            return Err(ConfigError::Invalid("rds.endpoint must be an http(s) url".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Digest
// ============================================================================

/// Analysis tool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DigestConfig {
    /// Local path of the analysis tool.
    #[serde(default = "default_tool_path")]
    pub tool_path: String,
    /// Download location used when the tool is missing.
    #[serde(default = "default_download_url")]
    pub download_url: String,
    /// Whether a missing tool is downloaded.
    #[serde(default = "default_true")]
    pub auto_download: bool,
    /// Interpreter that runs the tool.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Optional directory where raw logs and digests are archived.
    #[serde(default)]
    pub archive_dir: Option<String>,
    /// Analysis timeout in seconds.
    #[serde(default = "default_digest_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            tool_path: default_tool_path(),
            download_url: default_download_url(),
            auto_download: true,
            interpreter: default_interpreter(),
            archive_dir: None,
            timeout_seconds: default_digest_timeout_seconds(),
        }
    }
}

impl DigestConfig {
    /// Returns the analysis timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Validates the digest section.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("digest.tool_path", &self.tool_path)?;
        validate_path_string("digest.interpreter", &self.interpreter)?;
        if self.auto_download && !is_http_url(self.download_url.trim()) {
            return Err(ConfigError::Invalid(
                "digest.download_url must be an http(s) url".to_string(),
            ));
        }
        if let Some(dir) = &self.archive_dir {
            validate_path_string("digest.archive_dir", dir)?;
        }
        if self.timeout_seconds == 0 || self.timeout_seconds > MAX_DIGEST_TIMEOUT_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "digest.timeout_seconds must be between 1 and {MAX_DIGEST_TIMEOUT_SECONDS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Run audit sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Events are discarded.
    None,
}

/// Run audit sink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// Sink selection.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Audit log path for the file sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit file cannot be opened.
    pub fn build_sink(&self) -> Result<Arc<dyn RunAuditSink>, ConfigError> {
        match self.sink {
            AuditSinkKind::Stderr => Ok(Arc::new(StderrRunAuditSink)),
            AuditSinkKind::None => Ok(Arc::new(NoopRunAuditSink)),
            AuditSinkKind::File => {
                let path = self.path.as_deref().map(str::trim).ok_or_else(|| {
                    ConfigError::Invalid("audit.path is required for the file sink".to_string())
                })?;
                let sink = FileRunAuditSink::new(Path::new(path))
                    .map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
        }
    }

    /// Validates the audit section.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, None) => Err(ConfigError::Invalid(
                "audit.path is required for the file sink".to_string(),
            )),
            (_, Some(path)) => validate_path_string("audit.path", path),
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O errors while reading config.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing errors.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
///
/// The flag reports whether the path was named explicitly.
fn resolve_path(path: Option<&Path>) -> Result<(PathBuf, bool), ConfigError> {
    if let Some(path) = path {
        return Ok((path.to_path_buf(), true));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok((PathBuf::from(env_path), true));
    }
    Ok((PathBuf::from(DEFAULT_CONFIG_NAME), false))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Returns true for an `http://` or `https://` URL with a host part.
fn is_http_url(value: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| value.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty()))
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default CORS origin.
fn default_allowed_origin() -> String {
    DEFAULT_ALLOWED_ORIGIN.to_string()
}

/// Default request body limit.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default poll interval.
const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

/// Default settle delay.
const fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

/// Default poll cap.
const fn default_max_poll_attempts() -> u32 {
    DEFAULT_MAX_POLL_ATTEMPTS
}

/// Default mutation re-issue budget.
const fn default_mutation_retries() -> u32 {
    DEFAULT_MUTATION_RETRIES
}

/// Default sample window bound.
const fn default_max_sample_seconds() -> u64 {
    DEFAULT_MAX_SAMPLE_SECONDS
}

/// Default protected parameter groups.
fn default_parameter_groups() -> Vec<String> {
    slowbro_core::DEFAULT_PARAMETER_GROUPS.iter().map(|name| (*name).to_string()).collect()
}

/// Default dedicated group prefix.
fn default_dedicated_group_prefix() -> String {
    DEFAULT_DEDICATED_GROUP_PREFIX.to_string()
}

/// Default log file name.
fn default_log_file_name() -> String {
    DEFAULT_LOG_FILE_NAME.to_string()
}

/// Default log download bound.
const fn default_max_log_bytes() -> u64 {
    DEFAULT_MAX_LOG_BYTES
}

/// Default tool path.
fn default_tool_path() -> String {
    DEFAULT_TOOL_PATH.to_string()
}

/// Default tool download URL.
fn default_download_url() -> String {
    DEFAULT_DOWNLOAD_URL.to_string()
}

/// Default tool interpreter.
fn default_interpreter() -> String {
    DEFAULT_INTERPRETER.to_string()
}

/// Default analysis timeout.
const fn default_digest_timeout_seconds() -> u64 {
    DEFAULT_DIGEST_TIMEOUT_SECONDS
}

/// Serde helper for boolean defaults that start enabled.
const fn default_true() -> bool {
    true
}
