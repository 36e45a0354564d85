//! Configuration settings for binar-sync.
//!
//! Settings are loaded from `~/.binar-sync/config.yaml`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::args::OutputFormat;
use crate::config::Paths;
use crate::error::SyncError;
use crate::features::sync::{ConflictStrategy, RetryPolicy};
use crate::remote::UpdateMethod;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// Remote API settings.
    pub remote: RemoteConfig,
    /// Sync engine settings.
    pub sync: SyncConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default output format.
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
    /// Color output setting.
    #[serde(default = "default_color")]
    pub color: ColorSetting,
}

/// Color output setting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColorSetting {
    /// Auto-detect based on terminal.
    #[default]
    Auto,
    /// Always use colors.
    Always,
    /// Never use colors.
    Never,
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the backend, without the `/api` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request deadline; exceeding it classifies as a timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// HTTP method used for update operations.
    #[serde(default)]
    pub update_method: UpdateMethod,
    /// Bearer token forwarded to the backend.
    #[serde(default)]
    pub auth_token: Option<String>,
}

/// Sync engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Delivery attempts per operation within one pass for timeout/server errors.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,
    /// Upper bound on the retry delay.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Multiplier applied to the delay after each retry.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Periodic sync interval in seconds (0 disables the timer).
    #[serde(default = "default_periodic_interval")]
    pub periodic_interval_secs: u64,
    /// Connectivity probe interval in seconds.
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,
    /// How confirmed updates merge with newer local edits.
    #[serde(default)]
    pub conflict_strategy: ConflictStrategy,
    /// Canceled operations older than this are purged by `cleanup`.
    #[serde(default = "default_canceled_retention")]
    pub canceled_retention_hours: i64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions for serde
const fn default_output_format() -> OutputFormat {
    OutputFormat::Pretty
}

const fn default_color() -> ColorSetting {
    ColorSetting::Auto
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

const fn default_request_timeout_ms() -> u64 {
    15_000
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_backoff_initial_ms() -> u64 {
    2_000
}

const fn default_backoff_max_ms() -> u64 {
    30_000
}

const fn default_backoff_factor() -> f64 {
    2.0
}

const fn default_periodic_interval() -> u64 {
    30
}

const fn default_probe_interval() -> u64 {
    10
}

const fn default_canceled_retention() -> i64 {
    24
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: default_output_format(),
            color: default_color(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            update_method: UpdateMethod::default(),
            auth_token: None,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            backoff_factor: default_backoff_factor(),
            periodic_interval_secs: default_periodic_interval(),
            probe_interval_secs: default_probe_interval(),
            conflict_strategy: ConflictStrategy::default(),
            canceled_retention_hours: default_canceled_retention(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl RemoteConfig {
    /// Request deadline as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl SyncConfig {
    /// Build the retry policy described by these settings.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.backoff_initial_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms),
            factor: self.backoff_factor,
        }
    }

    /// Periodic timer interval, if enabled.
    #[must_use]
    pub const fn periodic_interval(&self) -> Option<Duration> {
        if self.periodic_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.periodic_interval_secs))
        }
    }

    #[must_use]
    pub const fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self, SyncError> {
        let paths = Paths::new()?;
        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, SyncError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        serde_yaml::from_str(&contents).map_err(|e| {
            SyncError::Config(format!(
                "Failed to parse config file {}: {e}",
                path.display()
            ))
        })
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save_to_path(&self, path: &std::path::Path) -> Result<(), SyncError> {
        let contents = serde_yaml::to_string(self)
            .map_err(|e| SyncError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, contents).map_err(|e| {
            SyncError::Config(format!(
                "Failed to write config file {}: {e}",
                path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.general.default_output, OutputFormat::Pretty);
        assert_eq!(config.general.color, ColorSetting::Auto);
        assert_eq!(config.remote.base_url, "http://localhost:5000");
        assert_eq!(config.remote.update_method, UpdateMethod::Patch);
        assert_eq!(config.sync.max_attempts, 3);
        assert_eq!(config.sync.conflict_strategy, ConflictStrategy::Merge);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_retry_policy_from_config() {
        let mut config = SyncConfig::default();
        config.max_attempts = 0;

        let policy = config.retry_policy();
        // Zero would mean never sending anything
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.initial_delay, Duration::from_secs(2));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_periodic_interval_disabled() {
        let mut config = SyncConfig::default();
        assert_eq!(config.periodic_interval(), Some(Duration::from_secs(30)));

        config.periodic_interval_secs = 0;
        assert_eq!(config.periodic_interval(), None);
    }

    #[test]
    fn test_load_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let config = Config::load_from_path(&config_path).unwrap();
        assert_eq!(config.sync.max_attempts, 3);
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut config = Config::default();
        config.remote.base_url = "https://binar.example.com".to_string();
        config.sync.max_attempts = 5;

        config.save_to_path(&config_path).unwrap();
        let loaded = Config::load_from_path(&config_path).unwrap();

        assert_eq!(loaded.remote.base_url, "https://binar.example.com");
        assert_eq!(loaded.sync.max_attempts, 5);
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let partial_yaml = r"
sync:
  max_attempts: 7
  conflict_strategy: server_wins
remote:
  update_method: put
";
        std::fs::write(&config_path, partial_yaml).unwrap();

        let config = Config::load_from_path(&config_path).unwrap();

        assert_eq!(config.sync.max_attempts, 7);
        assert_eq!(config.sync.conflict_strategy, ConflictStrategy::ServerWins);
        assert_eq!(config.remote.update_method, UpdateMethod::Put);
        // Defaults fill the gaps
        assert_eq!(config.sync.backoff_initial_ms, 2_000);
        assert_eq!(config.remote.request_timeout_ms, 15_000);
    }

    #[test]
    fn test_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "sync: [not, a, map]").unwrap();

        let err = Config::load_from_path(&config_path).unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }
}
