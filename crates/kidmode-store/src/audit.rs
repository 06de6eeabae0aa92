//! Audit event types

use chrono::{DateTime, Local};
use kidmode_api::TransitionTag;
use kidmode_util::ChallengeId;
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// First-run secret setup completed
    SecretConfigured,

    /// Guardian secret replaced after an approved challenge
    SecretChanged,

    /// A transition request opened a challenge
    ChallengeOpened {
        challenge_id: ChallengeId,
        kind: TransitionTag,
    },

    /// Challenge dismissed without a decision
    ChallengeCancelled { challenge_id: ChallengeId },

    /// Challenge left unanswered for too long
    ChallengeTimedOut { challenge_id: ChallengeId },

    /// Wrong secret submitted
    CredentialDenied {
        challenge_id: ChallengeId,
        attempts_left: u32,
    },

    /// Attempts exhausted, challenge closed
    LockedOut { challenge_id: ChallengeId },

    /// Kid Mode enabled, optionally with a countdown
    KidModeEnabled { timer_seconds: Option<u64> },

    /// Kid Mode disabled by the guardian
    KidModeDisabled,

    /// Approved transition whose precondition no longer held
    TransitionSkipped {
        challenge_id: ChallengeId,
        kind: TransitionTag,
    },

    /// Countdown reached zero
    TimerExpired,

    /// Client connected
    ClientConnected {
        client_id: String,
        uid: Option<u32>,
    },

    /// Client disconnected
    ClientDisconnected { client_id: String },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: Local::now(),
            event,
        }
    }
}
