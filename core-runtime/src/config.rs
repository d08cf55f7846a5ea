//! # Migration Configuration
//!
//! Settings for a recording migration run, built either in code through
//! [`MigrationConfigBuilder`] or loaded from a TOML document.
//!
//! ## Overview
//!
//! Construction always ends in [`MigrationConfig::validate`], so a config that
//! reaches the engine has credentials, a default folder, a usable retry
//! ceiling and a non-zero rate limit.
//!
//! ## Usage
//!
//! ### Builder
//!
//! ```ignore
//! use core_runtime::config::MigrationConfig;
//!
//! let config = MigrationConfig::builder()
//!     .destination_server("video.example.edu")
//!     .destination_client("client-id", "client-secret")
//!     .destination_account("svc-migrate", "hunter2")
//!     .default_folder("f-overflow", "Unmapped Recordings")
//!     .controlled_stop_time("23:00:00")
//!     .build()?;
//! ```
//!
//! ### TOML
//!
//! ```toml
//! downloads_dir = "./downloads"
//! data_dir = "./data"
//!
//! [destination]
//! server = "video.example.edu"
//! client_id = "client-id"
//! client_secret = "client-secret"
//! username = "svc-migrate"
//! password = "hunter2"
//! default_folder_id = "f-overflow"
//! default_folder_name = "Unmapped Recordings"
//!
//! [source]
//! base_url = "https://collab.example.com/collab/api/csa"
//! key = "collab-key"
//! secret = "collab-secret"
//!
//! [policy]
//! delete_source_recordings = true
//!
//! [schedule]
//! scheduled_run = true
//! controlled_stop_time = "23:00:00"
//! ```

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the persisted course-label to folder-id document inside `data_dir`.
pub const FOLDER_MAPPING_FILE: &str = "courseLabel_folderId_pairs.json";

// ============================================================================
// Sections
// ============================================================================

/// Destination platform endpoint and resource-owner credentials.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DestinationSettings {
    /// Host name, without scheme (`video.example.edu`)
    pub server: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    /// Overflow folder receiving recordings whose course has no folder
    pub default_folder_id: String,
    #[serde(default)]
    pub default_folder_name: String,
}

impl DestinationSettings {
    pub fn base_url(&self) -> String {
        if self.server.starts_with("http://") || self.server.starts_with("https://") {
            self.server.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", self.server.trim_end_matches('/'))
        }
    }
}

impl fmt::Debug for DestinationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationSettings")
            .field("server", &self.server)
            .field("client_id", &"[REDACTED]")
            .field("client_secret", &"[REDACTED]")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("default_folder_id", &self.default_folder_id)
            .field("default_folder_name", &self.default_folder_name)
            .finish()
    }
}

/// Source platform REST endpoint and the key pair used for its JWT grant.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SourceSettings {
    /// Full API root, e.g. `https://collab.example.com/collab/api/csa`
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub secret: String,
}

impl SourceSettings {
    /// Source deletion is only possible with an endpoint and a key pair.
    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
            && !self.key.trim().is_empty()
            && !self.secret.trim().is_empty()
    }
}

impl fmt::Debug for SourceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSettings")
            .field("base_url", &self.base_url)
            .field("key", &self.key)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// What gets deleted once a recording is confirmed on the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeletionPolicy {
    pub delete_local_recordings: bool,
    pub delete_source_recordings: bool,
    /// Also delete source recordings that landed in the overflow folder
    pub delete_unmapped_source_recordings: bool,
}

impl Default for DeletionPolicy {
    fn default() -> Self {
        Self {
            delete_local_recordings: true,
            delete_source_recordings: false,
            delete_unmapped_source_recordings: false,
        }
    }
}

impl DeletionPolicy {
    /// Whether a recording confirmed in `folder_id` may be deleted at the source.
    pub fn allows_source_delete(&self, folder_id: &str, default_folder_id: &str) -> bool {
        if !self.delete_source_recordings {
            return false;
        }
        folder_id != default_folder_id || self.delete_unmapped_source_recordings
    }
}

/// Consistency waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Destination processing lag absorbed after uploads and between checks
    pub processing_wait_secs: u64,
    /// Pause before the supervisor restarts a failed run
    pub restart_cooldown_secs: u64,
    /// Sweep rounds wait `processing_wait * sweep_wait_multiplier`
    pub sweep_wait_multiplier: u32,
    /// A failed upload waits `processing_wait * failed_upload_wait_multiplier`
    /// before the partial object is searched for
    pub failed_upload_wait_multiplier: u32,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            processing_wait_secs: 50,
            restart_cooldown_secs: 3600,
            sweep_wait_multiplier: 4,
            failed_upload_wait_multiplier: 2,
        }
    }
}

impl TimingSettings {
    pub fn processing_wait(&self) -> Duration {
        Duration::from_secs(self.processing_wait_secs)
    }

    pub fn sweep_wait(&self) -> Duration {
        self.processing_wait() * self.sweep_wait_multiplier
    }

    pub fn failed_upload_wait(&self) -> Duration {
        self.processing_wait() * self.failed_upload_wait_multiplier
    }

    pub fn restart_cooldown(&self) -> Duration {
        Duration::from_secs(self.restart_cooldown_secs)
    }
}

/// Batch-window cutoff for scheduled runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub scheduled_run: bool,
    pub controlled_stop_time: NaiveTime,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            scheduled_run: true,
            controlled_stop_time: NaiveTime::from_hms_opt(23, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// Ceiling and backoffs for the destination's transient-fault handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Hard ceiling on attempts for one logical call, all fault classes included
    pub max_attempts: u32,
    pub throttle_backoff_secs: u64,
    pub server_error_backoff_secs: u64,
    /// Consecutive 401s tolerated before the credential is considered broken
    pub max_auth_refreshes: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            throttle_backoff_secs: 10,
            server_error_backoff_secs: 50,
            max_auth_refreshes: 5,
        }
    }
}

/// Sliding-window limit for search-style destination endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub max_calls: u32,
    pub period_millis: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_calls: 5,
            period_millis: 1000,
        }
    }
}

impl RateLimitSettings {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_millis)
    }
}

// ============================================================================
// MigrationConfig
// ============================================================================

/// Complete configuration of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub destination: DestinationSettings,
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub policy: DeletionPolicy,
    #[serde(default)]
    pub timing: TimingSettings,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    /// Bounded re-discover / re-delete rounds at the end of a run
    #[serde(default = "default_sweep_rounds")]
    pub sweep_rounds: u32,
    /// Supervisor restarts after fatal errors; unbounded when unset
    #[serde(default)]
    pub max_restarts: Option<u32>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_sweep_rounds() -> u32 {
    2
}

impl MigrationConfig {
    pub fn builder() -> MigrationConfigBuilder {
        MigrationConfigBuilder::default()
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MigrationConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid configuration file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {:?}: {}", path, e)))?;
        Self::from_toml_str(&content)
    }

    /// Location of the persisted folder mapping document.
    pub fn folder_mapping_path(&self) -> PathBuf {
        self.data_dir.join(FOLDER_MAPPING_FILE)
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("destination.server", &self.destination.server),
            ("destination.client_id", &self.destination.client_id),
            ("destination.client_secret", &self.destination.client_secret),
            ("destination.username", &self.destination.username),
            ("destination.password", &self.destination.password),
            ("destination.default_folder_id", &self.destination.default_folder_id),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} must not be empty", name)));
            }
        }

        if self.policy.delete_source_recordings && !self.source.is_configured() {
            return Err(Error::Config(
                "source.base_url, source.key and source.secret are required when source deletion is enabled"
                    .to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.rate_limit.max_calls == 0 || self.rate_limit.period_millis == 0 {
            return Err(Error::Config(
                "rate_limit.max_calls and rate_limit.period_millis must be non-zero".to_string(),
            ));
        }

        if self.downloads_dir.as_os_str().is_empty() || self.data_dir.as_os_str().is_empty() {
            return Err(Error::Config(
                "downloads_dir and data_dir must be set".to_string(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Fail-fast builder for [`MigrationConfig`].
#[derive(Debug, Default)]
pub struct MigrationConfigBuilder {
    destination: DestinationSettings,
    source: SourceSettings,
    downloads_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    policy: DeletionPolicy,
    timing: TimingSettings,
    schedule: ScheduleSettings,
    stop_time: Option<String>,
    retry: RetrySettings,
    rate_limit: RateLimitSettings,
    sweep_rounds: Option<u32>,
    max_restarts: Option<u32>,
    logging: LoggingConfig,
}

impl MigrationConfigBuilder {
    pub fn destination_server(mut self, server: impl Into<String>) -> Self {
        self.destination.server = server.into();
        self
    }

    pub fn destination_client(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.destination.client_id = client_id.into();
        self.destination.client_secret = client_secret.into();
        self
    }

    pub fn destination_account(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.destination.username = username.into();
        self.destination.password = password.into();
        self
    }

    pub fn default_folder(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.destination.default_folder_id = id.into();
        self.destination.default_folder_name = name.into();
        self
    }

    pub fn source_base_url(mut self, url: impl Into<String>) -> Self {
        self.source.base_url = url.into();
        self
    }

    pub fn source_credentials(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.source.key = key.into();
        self.source.secret = secret.into();
        self
    }

    pub fn downloads_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.downloads_dir = Some(path.into());
        self
    }

    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    pub fn policy(mut self, policy: DeletionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn timing(mut self, timing: TimingSettings) -> Self {
        self.timing = timing;
        self
    }

    pub fn scheduled_run(mut self, enabled: bool) -> Self {
        self.schedule.scheduled_run = enabled;
        self
    }

    /// Cutoff as `HH:MM:SS`; parsed in [`build`](Self::build).
    pub fn controlled_stop_time(mut self, time: impl Into<String>) -> Self {
        self.stop_time = Some(time.into());
        self
    }

    pub fn retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    pub fn rate_limit(mut self, max_calls: u32, period: Duration) -> Self {
        self.rate_limit = RateLimitSettings {
            max_calls,
            period_millis: period.as_millis() as u64,
        };
        self
    }

    pub fn sweep_rounds(mut self, rounds: u32) -> Self {
        self.sweep_rounds = Some(rounds);
        self
    }

    pub fn max_restarts(mut self, restarts: u32) -> Self {
        self.max_restarts = Some(restarts);
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    pub fn build(self) -> Result<MigrationConfig> {
        let mut schedule = self.schedule;
        if let Some(raw) = &self.stop_time {
            schedule.controlled_stop_time = NaiveTime::parse_from_str(raw, "%H:%M:%S")
                .map_err(|e| {
                    Error::Config(format!("Invalid controlled stop time '{}': {}", raw, e))
                })?;
        }

        let config = MigrationConfig {
            destination: self.destination,
            source: self.source,
            downloads_dir: self.downloads_dir.unwrap_or_else(default_downloads_dir),
            data_dir: self.data_dir.unwrap_or_else(default_data_dir),
            policy: self.policy,
            timing: self.timing,
            schedule,
            retry: self.retry,
            rate_limit: self.rate_limit,
            sweep_rounds: self.sweep_rounds.unwrap_or_else(default_sweep_rounds),
            max_restarts: self.max_restarts,
            logging: self.logging,
        };

        config.validate()?;
        Ok(config)
    }
}
