//! Capability traits

use kidmode_api::Notification;
use std::time::Duration;
use thiserror::Error;

use crate::TimerToken;

/// Errors from capability implementations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Schedule failed: {0}")]
    ScheduleFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// Periodic timer facility
///
/// A scheduled token fires every `period` until cancelled. Implementations
/// deliver fired tokens back to whoever owns the core; the core itself only
/// schedules and cancels.
pub trait Scheduler: Send + Sync {
    /// Start firing `token` every `period`, first firing one period from now
    fn schedule(&self, token: TimerToken, period: Duration) -> HostResult<()>;

    /// Stop firing `token`. Cancelling an unknown token is a no-op.
    fn cancel(&self, token: TimerToken) -> HostResult<()>;

    /// Check if the scheduler is healthy
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Receiver of user-facing notifications
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}
