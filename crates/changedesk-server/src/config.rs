// crates/changedesk-server/src/config.rs
// ============================================================================
// Module: Server Configuration
// Description: Configuration loading and validation for the Changedesk server.
// Purpose: Provide strict, fail-closed config parsing with environment overrides.
// Dependencies: changedesk-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size limits, then the
//! documented environment variables override individual fields (`S3_BUCKET`,
//! `SQS_QUEUE_URL`, `TYPEFORM_API_TOKEN`, `TYPEFORM_WEBHOOK_SECRET`, region,
//! log level, dry-run). Missing or invalid configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use changedesk_core::CustomerCode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "changedesk.toml";
/// Environment variable used to override the config path.
const CONFIG_ENV_VAR: &str = "CHANGEDESK_CONFIG";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Default bucket backing the single-bucket layout.
const DEFAULT_BUCKET: &str = "4cm-prod-ccoe-change-management-metadata";
/// Default bind address for the HTTP facade.
const DEFAULT_BIND: &str = "0.0.0.0:8080";
/// Default maximum request body size.
const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
/// Default maximum inflight requests.
const DEFAULT_MAX_INFLIGHT: usize = 256;
/// Default per-customer fan-out concurrency.
const DEFAULT_FANOUT_CONCURRENCY: i64 = 4;
/// Default approver contact list.
const DEFAULT_APPROVER_LIST: &str = "ccoe-approvers";
/// Default survey service endpoint.
const DEFAULT_SURVEY_BASE_URL: &str = "https://api.typeform.com";
/// Maximum number of configured customers.
const MAX_CUSTOMER_ENTRIES: usize = 1_024;

/// Environment override for the storage bucket.
const ENV_BUCKET: &str = "S3_BUCKET";
/// Environment override for the AWS region.
const ENV_REGION: &str = "AWS_REGION";
/// Environment override for the notification queue URL.
const ENV_QUEUE_URL: &str = "SQS_QUEUE_URL";
/// Environment override for the survey API token.
const ENV_SURVEY_TOKEN: &str = "TYPEFORM_API_TOKEN";
/// Environment override for the survey webhook secret.
const ENV_WEBHOOK_SECRET: &str = "TYPEFORM_WEBHOOK_SECRET";
/// Environment override for the log level.
const ENV_LOG_LEVEL: &str = "CHANGEDESK_LOG_LEVEL";
/// Environment override for the dry-run flag.
const ENV_DRY_RUN: &str = "CHANGEDESK_DRY_RUN";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config read failed: {0}")]
    Read(String),
    /// Config file could not be parsed.
    #[error("config parse failed: {0}")]
    Parse(String),
    /// Config failed validation.
    #[error("config invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Durable S3 storage.
    #[default]
    S3,
    /// In-memory storage for local development and tests.
    Memory,
}

/// Server (HTTP facade) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Maximum inflight requests.
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            max_inflight: default_max_inflight(),
        }
    }
}

/// Object storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Bucket name.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// AWS region.
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint URL (S3-compatible stores).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Force path-style addressing.
    #[serde(default)]
    pub force_path_style: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            bucket: default_bucket(),
            region: None,
            endpoint: None,
            force_path_style: false,
        }
    }
}

/// Identity-gateway trust configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Email domains permitted to perform change-management actions.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    /// Addresses granted the admin role.
    #[serde(default)]
    pub admin_users: Vec<String>,
}

/// Outbound mail configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Verified sender address; empty disables real delivery.
    #[serde(default)]
    pub sender: String,
    /// Approver contact list for submission notifications.
    #[serde(default = "default_approver_list")]
    pub approver_list: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sender: String::new(),
            approver_list: default_approver_list(),
        }
    }
}

/// Meeting service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeetingConfig {
    /// Service base URL; empty disables real scheduling.
    #[serde(default)]
    pub base_url: String,
    /// Service bearer token.
    #[serde(default)]
    pub token: String,
    /// Organizer address stamped on scheduled meetings.
    #[serde(default)]
    pub organizer: String,
}

/// Survey service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SurveyConfig {
    /// Service base URL.
    #[serde(default = "default_survey_base_url")]
    pub base_url: String,
    /// API token; empty disables real provisioning.
    #[serde(default)]
    pub api_token: String,
    /// Shared webhook secret.
    #[serde(default)]
    pub webhook_secret: String,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            base_url: default_survey_base_url(),
            api_token: String::new(),
            webhook_secret: String::new(),
        }
    }
}

/// Notification queue configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueConfig {
    /// Queue URL; unset disables publication.
    #[serde(default)]
    pub queue_url: Option<String>,
}

/// Fan-out configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FanoutConfig {
    /// Maximum per-customer concurrency; `<= 0` means one worker per customer.
    #[serde(default = "default_fanout_concurrency")]
    pub max_concurrency: i64,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_fanout_concurrency(),
        }
    }
}

/// Audit log configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Optional audit log file path (stderr when unset).
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangedeskConfig {
    /// HTTP facade settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Object storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Identity trust settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Outbound mail settings.
    #[serde(default)]
    pub mail: MailConfig,
    /// Meeting service settings.
    #[serde(default)]
    pub meetings: MeetingConfig,
    /// Survey service settings.
    #[serde(default)]
    pub survey: SurveyConfig,
    /// Notification queue settings.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Fan-out settings.
    #[serde(default)]
    pub fanout: FanoutConfig,
    /// Audit log settings.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Customer directory: code to friendly name.
    #[serde(default)]
    pub customers: BTreeMap<String, String>,
    /// Log level label.
    #[serde(default)]
    pub log_level: Option<String>,
    /// When set, outbound side effects log and no-op.
    #[serde(default)]
    pub dry_run: bool,
}

impl ChangedeskConfig {
    /// Loads configuration from the resolved path plus environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable, oversized,
    /// unparsable, or invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_config_path(path);
        let mut config = if resolved.exists() {
            let metadata =
                fs::metadata(&resolved).map_err(|err| ConfigError::Read(err.to_string()))?;
            if metadata.len() > MAX_CONFIG_FILE_SIZE as u64 {
                return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
            }
            let raw =
                fs::read_to_string(&resolved).map_err(|err| ConfigError::Read(err.to_string()))?;
            toml::from_str(&raw).map_err(|err| ConfigError::Parse(err.to_string()))?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Applies the documented environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(bucket) = env::var(ENV_BUCKET)
            && !bucket.trim().is_empty()
        {
            self.storage.bucket = bucket;
        }
        if let Ok(region) = env::var(ENV_REGION)
            && !region.trim().is_empty()
        {
            self.storage.region = Some(region);
        }
        if let Ok(queue_url) = env::var(ENV_QUEUE_URL)
            && !queue_url.trim().is_empty()
        {
            self.queue.queue_url = Some(queue_url);
        }
        if let Ok(token) = env::var(ENV_SURVEY_TOKEN)
            && !token.trim().is_empty()
        {
            self.survey.api_token = token;
        }
        if let Ok(secret) = env::var(ENV_WEBHOOK_SECRET)
            && !secret.trim().is_empty()
        {
            self.survey.webhook_secret = secret;
        }
        if let Ok(level) = env::var(ENV_LOG_LEVEL)
            && !level.trim().is_empty()
        {
            self.log_level = Some(level);
        }
        if let Ok(dry_run) = env::var(ENV_DRY_RUN) {
            self.dry_run = matches!(dry_run.trim(), "1" | "true" | "yes");
        }
    }

    /// Validates the configuration, failing closed on defects.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on the first defect found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.bucket must be set".to_string()));
        }
        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind must be set".to_string()));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("server.max_body_bytes must be positive".to_string()));
        }
        if self.server.max_inflight == 0 {
            return Err(ConfigError::Invalid("server.max_inflight must be positive".to_string()));
        }
        if self.customers.len() > MAX_CUSTOMER_ENTRIES {
            return Err(ConfigError::Invalid(format!(
                "customers exceeds {MAX_CUSTOMER_ENTRIES} entries"
            )));
        }
        for code in self.customers.keys() {
            CustomerCode::parse(code).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        }
        for domain in &self.auth.allowed_domains {
            if domain.trim().is_empty() || domain.contains('@') {
                return Err(ConfigError::Invalid(format!(
                    "auth.allowed_domains entry invalid: {domain}"
                )));
            }
        }
        Ok(())
    }

    /// Returns the customer directory as parsed codes with display names.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a code does not parse; `validate`
    /// catches this earlier in normal flow.
    pub fn customer_directory(&self) -> Result<BTreeMap<CustomerCode, String>, ConfigError> {
        let mut directory = BTreeMap::new();
        for (code, name) in &self.customers {
            let parsed =
                CustomerCode::parse(code).map_err(|err| ConfigError::Invalid(err.to_string()))?;
            directory.insert(parsed, name.clone());
        }
        Ok(directory)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the CLI argument or environment default.
fn resolve_config_path(path: Option<&Path>) -> PathBuf {
    if let Some(path) = path {
        return path.to_path_buf();
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR)
        && !env_path.trim().is_empty()
    {
        return PathBuf::from(env_path);
    }
    PathBuf::from(DEFAULT_CONFIG_NAME)
}

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default maximum body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default maximum inflight requests.
const fn default_max_inflight() -> usize {
    DEFAULT_MAX_INFLIGHT
}

/// Default bucket name.
fn default_bucket() -> String {
    DEFAULT_BUCKET.to_string()
}

/// Default approver contact list.
fn default_approver_list() -> String {
    DEFAULT_APPROVER_LIST.to_string()
}

/// Default survey service endpoint.
fn default_survey_base_url() -> String {
    DEFAULT_SURVEY_BASE_URL.to_string()
}

/// Default `true` for serde defaults.
const fn default_true() -> bool {
    true
}

/// Default fan-out concurrency.
const fn default_fanout_concurrency() -> i64 {
    DEFAULT_FANOUT_CONCURRENCY
}

#[cfg(test)]
mod tests;
