//! Configuration validation

use crate::schema::RawConfig;
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Timer preset must be at least one minute")]
    ZeroPreset,

    #[error("Duplicate timer preset: {0} minutes")]
    DuplicatePreset(u32),

    #[error("Timer presets list is empty")]
    NoPresets,

    #[error("Secret minimum length for {which} must be at least 1")]
    ZeroSecretLength { which: &'static str },
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(presets) = &config.timer.presets_minutes {
        errors.extend(validate_presets(presets));
    }

    if config.secret.min_length_setup == Some(0) {
        errors.push(ValidationError::ZeroSecretLength { which: "setup" });
    }
    if config.secret.min_length_change == Some(0) {
        errors.push(ValidationError::ZeroSecretLength { which: "change" });
    }

    errors
}

fn validate_presets(presets: &[u32]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if presets.is_empty() {
        errors.push(ValidationError::NoPresets);
    }

    let mut seen = HashSet::new();
    for &minutes in presets {
        if minutes == 0 {
            errors.push(ValidationError::ZeroPreset);
        } else if !seen.insert(minutes) {
            errors.push(ValidationError::DuplicatePreset(minutes));
        }
    }

    errors
}
