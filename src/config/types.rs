use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::access::{CallerIdentity, UserPolicy};
use crate::carrier::CarrierPolicy;

/// Root configuration for blockd
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Where the block list and settings live
    #[serde(default)]
    pub store: StoreConfig,

    /// Platform-level policy
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Carrier configuration
    #[serde(default)]
    pub carrier: CarrierConfig,

    /// Emergency number list
    #[serde(default)]
    pub emergency: EmergencyConfig,

    /// Identity the CLI presents; defaults to the service's own process
    #[serde(default)]
    pub identity: Option<CallerIdentity>,

    /// Logging
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Automatic backup after block list changes
    #[serde(default)]
    pub backup: BackupConfig,
}

/// Backup configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackupConfig {
    /// File rewritten whenever a command changes the block list.
    /// Absent disables automatic backup.
    pub path: Option<PathBuf>,
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Volatile, for development and tests
    Memory,
    /// Durable fjall keyspace
    #[default]
    Fjall,
}

/// Store configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Data directory (fjall only). Relative paths resolve against the
    /// working directory; absent means the platform data directory.
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: None,
        }
    }

    pub fn fjall(path: impl AsRef<Path>) -> Self {
        Self {
            backend: StorageBackend::Fjall,
            path: Some(path.as_ref().to_path_buf()),
        }
    }
}

/// Platform configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// Default region for numbers dialed without '+'
    #[serde(default = "default_region")]
    pub region: String,

    /// Ceiling on the carrier's blocking-disabled duration
    #[serde(default = "default_max_blocking_disabled", with = "humantime_serde")]
    pub max_blocking_disabled_duration: Duration,

    /// Admit the service's own process as a caller
    #[serde(default = "default_true")]
    pub allow_self_call: bool,

    /// Which users may manage the block list
    #[serde(default)]
    pub users: UserPolicy,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            max_blocking_disabled_duration: default_max_blocking_disabled(),
            allow_self_call: true,
            users: UserPolicy::default(),
        }
    }
}

fn default_region() -> String {
    "US".to_string()
}

fn default_max_blocking_disabled() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

fn default_true() -> bool {
    true
}

/// Carrier configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CarrierConfig {
    /// Active carrier values; absent means the carrier supplied none
    #[serde(default)]
    pub active: Option<CarrierPolicy>,

    /// Platform defaults
    #[serde(default)]
    pub defaults: CarrierPolicy,
}

/// Emergency number configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmergencyConfig {
    /// Whether emergency lookup is available at all
    #[serde(default = "default_true")]
    pub supported: bool,

    /// Numbers that are never blocked
    #[serde(default = "default_emergency_numbers")]
    pub numbers: Vec<String>,
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        Self {
            supported: true,
            numbers: default_emergency_numbers(),
        }
    }
}

fn default_emergency_numbers() -> Vec<String> {
    ["112", "911", "999", "000", "110", "119"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON lines instead of pretty output
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Humantime serde support module
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
