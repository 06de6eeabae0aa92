//! Validated settings

use crate::schema::{RawConfig, RawServiceConfig};
use kidmode_util::{default_data_dir, default_log_dir, default_socket_path};
use std::path::PathBuf;
use std::time::Duration;

/// Minimum secret length at first-run setup
pub const DEFAULT_MIN_LENGTH_SETUP: usize = 4;

/// Minimum secret length when the secret is replaced
pub const DEFAULT_MIN_LENGTH_CHANGE: usize = 6;

/// Unanswered challenges close after this long
pub const DEFAULT_CHALLENGE_TIMEOUT: Duration = Duration::from_secs(120);

/// Quick-timer presets, in minutes
pub const DEFAULT_TIMER_PRESETS: [u32; 4] = [15, 30, 60, 120];

/// Validated settings ready for use by the service and the core
#[derive(Debug, Clone)]
pub struct Settings {
    pub service: ServiceConfig,
    pub secret: SecretRules,
    /// None means challenges never time out
    pub challenge_timeout: Option<Duration>,
    pub timer: TimerConfig,
    pub notifications_enabled: bool,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let secret = SecretRules {
            min_length_setup: raw
                .secret
                .min_length_setup
                .unwrap_or(DEFAULT_MIN_LENGTH_SETUP),
            min_length_change: raw
                .secret
                .min_length_change
                .unwrap_or(DEFAULT_MIN_LENGTH_CHANGE),
        };

        // 0 means never, absent means the default
        let challenge_timeout = match raw.challenge.timeout_seconds {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(DEFAULT_CHALLENGE_TIMEOUT),
        };

        let timer = TimerConfig {
            presets_minutes: raw
                .timer
                .presets_minutes
                .unwrap_or_else(|| DEFAULT_TIMER_PRESETS.to_vec()),
        };

        Self {
            service: ServiceConfig::from_raw(raw.service),
            secret,
            challenge_timeout,
            timer,
            notifications_enabled: raw.notifications.enabled.unwrap_or(true),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            secret: SecretRules::default(),
            challenge_timeout: Some(DEFAULT_CHALLENGE_TIMEOUT),
            timer: TimerConfig::default(),
            notifications_enabled: true,
        }
    }
}

/// Service paths
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub log_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            socket_path: raw.socket_path.unwrap_or_else(default_socket_path),
            log_dir: raw.log_dir.unwrap_or_else(default_log_dir),
            data_dir: raw.data_dir.unwrap_or_else(default_data_dir),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            log_dir: default_log_dir(),
            data_dir: default_data_dir(),
        }
    }
}

/// Minimum secret lengths, in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretRules {
    pub min_length_setup: usize,
    pub min_length_change: usize,
}

impl Default for SecretRules {
    fn default() -> Self {
        Self {
            min_length_setup: DEFAULT_MIN_LENGTH_SETUP,
            min_length_change: DEFAULT_MIN_LENGTH_CHANGE,
        }
    }
}

/// Quick-timer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerConfig {
    pub presets_minutes: Vec<u32>,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            presets_minutes: DEFAULT_TIMER_PRESETS.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_config;

    #[test]
    fn explicit_values_override_defaults() {
        let settings = parse_config(
            r#"
            config_version = 1

            [service]
            socket_path = "/tmp/custom.sock"

            [secret]
            min_length_change = 10

            [challenge]
            timeout_seconds = 45

            [timer]
            presets_minutes = [5, 45]
        "#,
        )
        .unwrap();

        assert_eq!(settings.service.socket_path, PathBuf::from("/tmp/custom.sock"));
        assert_eq!(settings.secret.min_length_setup, DEFAULT_MIN_LENGTH_SETUP);
        assert_eq!(settings.secret.min_length_change, 10);
        assert_eq!(settings.challenge_timeout, Some(Duration::from_secs(45)));
        assert_eq!(settings.timer.presets_minutes, vec![5, 45]);
    }

    #[test]
    fn zero_timeout_disables_challenge_expiry() {
        let settings = parse_config("config_version = 1\n[challenge]\ntimeout_seconds = 0\n").unwrap();
        assert!(settings.challenge_timeout.is_none());
    }
}
