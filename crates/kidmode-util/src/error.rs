//! Error types for kidmode

use thiserror::Error;

/// Core error type for kidmode operations
#[derive(Debug, Error)]
pub enum KidModeError {
    #[error("A challenge is already pending")]
    AlreadyPending,

    #[error("No challenge is pending")]
    NoPendingChallenge,

    #[error("Invalid timer: {0} minutes")]
    InvalidTimer(i64),

    #[error("Invalid secret: {0}")]
    InvalidSecret(String),

    #[error("No secret has been configured yet")]
    SecretNotConfigured,

    #[error("A secret is already configured")]
    SecretAlreadyConfigured,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl KidModeError {
    pub fn invalid_secret(msg: impl Into<String>) -> Self {
        Self::InvalidSecret(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn ipc(msg: impl Into<String>) -> Self {
        Self::IpcError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, KidModeError>;
