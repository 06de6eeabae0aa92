//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service paths
    #[serde(default)]
    pub service: RawServiceConfig,

    #[serde(default)]
    pub secret: RawSecretConfig,

    #[serde(default)]
    pub challenge: RawChallengeConfig,

    #[serde(default)]
    pub timer: RawTimerConfig,

    #[serde(default)]
    pub notifications: RawNotificationConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket path
    pub socket_path: Option<PathBuf>,

    /// Log directory
    pub log_dir: Option<PathBuf>,

    /// Data directory for the store
    pub data_dir: Option<PathBuf>,
}

/// Secret length rules
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSecretConfig {
    /// Minimum length when the secret is first created
    pub min_length_setup: Option<usize>,

    /// Minimum length when the secret is replaced
    pub min_length_change: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawChallengeConfig {
    /// Seconds an unanswered challenge stays open; 0 never times out
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTimerConfig {
    /// Quick-timer presets
    pub presets_minutes: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawNotificationConfig {
    /// Deliver guardian alerts (enabled, disabled, expired, secret changed)
    pub enabled: Option<bool>,
}
