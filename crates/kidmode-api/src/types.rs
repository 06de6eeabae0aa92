//! Shared types for the kidmode API

use chrono::{DateTime, Local};
use kidmode_util::{ChallengeId, Secret};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The Kid Mode session.
///
/// Invariants: `running` implies `restricted`, and a non-zero
/// `remaining_seconds` implies `running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    /// Whether the device is marked as access-limited
    pub restricted: bool,
    /// Authoritative countdown value; zero when no timer runs
    pub remaining_seconds: u64,
    /// Whether a countdown is running
    pub running: bool,
}

impl Session {
    /// State at process start, and after any disable or expiry
    pub const INITIAL: Session = Session {
        restricted: false,
        remaining_seconds: 0,
        running: false,
    };

    pub fn is_consistent(&self) -> bool {
        (!self.running || self.restricted) && (self.remaining_seconds == 0 || self.running)
    }
}

/// A state change a client can ask for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionKind {
    /// Restrict without a time limit
    Enable,
    /// Lift the restriction and stop any countdown
    Disable,
    /// Restrict for a bounded number of minutes
    EnableWithTimer { minutes: i64 },
    /// Replace the guardian secret once the current one is presented
    ChangeSecret { new_secret: Secret },
}

impl TransitionKind {
    pub fn tag(&self) -> TransitionTag {
        match self {
            TransitionKind::Enable => TransitionTag::Enable,
            TransitionKind::Disable => TransitionTag::Disable,
            TransitionKind::EnableWithTimer { .. } => TransitionTag::EnableWithTimer,
            TransitionKind::ChangeSecret { .. } => TransitionTag::ChangeSecret,
        }
    }

    pub fn timer_minutes(&self) -> Option<i64> {
        match self {
            TransitionKind::EnableWithTimer { minutes } => Some(*minutes),
            _ => None,
        }
    }
}

/// Transition kind without its payload, safe to log and display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionTag {
    Enable,
    Disable,
    EnableWithTimer,
    ChangeSecret,
}

impl fmt::Display for TransitionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self {
            TransitionTag::Enable => "enable Kid Mode",
            TransitionTag::Disable => "disable Kid Mode",
            TransitionTag::EnableWithTimer => "enable Kid Mode with timer",
            TransitionTag::ChangeSecret => "change password",
        };
        f.write_str(action)
    }
}

/// Open challenge, as shown to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingView {
    pub challenge_id: ChallengeId,
    pub kind: TransitionTag,
    pub timer_minutes: Option<i64>,
    pub opened_at: DateTime<Local>,
    pub attempts_left: u32,
}

/// Everything a client needs to render the panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub session: Session,
    pub pending: Option<PendingView>,
    pub secret_configured: bool,
}

/// User-facing notifications emitted by the core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// Kid Mode turned on. `timer_seconds` is set for timed sessions.
    Enabled { timer_seconds: Option<u64> },
    /// Kid Mode turned off by the guardian
    Disabled,
    /// A timed session ran out
    Expired,
    /// Wrong secret; the challenge stays open
    Denied { attempts_left: u32 },
    /// Too many wrong secrets; the challenge was closed
    LockedOut,
    /// The guardian secret was replaced
    SecretChanged,
    /// An unanswered challenge was closed
    ChallengeTimedOut,
}

impl Notification {
    /// Guardian alerts can be muted through settings; challenge feedback cannot.
    pub fn is_guardian_alert(&self) -> bool {
        matches!(
            self,
            Notification::Enabled { .. }
                | Notification::Disabled
                | Notification::Expired
                | Notification::SecretChanged
        )
    }
}

/// Result of submitting a credential to an open challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Secret accepted. `applied` is false when the transition's
    /// precondition no longer held and nothing changed.
    Approved { kind: TransitionTag, applied: bool },
    /// Secret rejected; the challenge remains open
    Denied { attempts_left: u32 },
    /// Secret rejected for the last time; the challenge was closed
    LockedOut,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub ready: bool,
    pub store_ok: bool,
    pub secret_configured: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_session_is_consistent() {
        assert!(Session::INITIAL.is_consistent());
        assert_eq!(Session::default(), Session::INITIAL);
    }

    #[test]
    fn inconsistent_sessions_detected() {
        let running_unrestricted = Session {
            restricted: false,
            remaining_seconds: 10,
            running: true,
        };
        assert!(!running_unrestricted.is_consistent());

        let remaining_without_running = Session {
            restricted: true,
            remaining_seconds: 10,
            running: false,
        };
        assert!(!remaining_without_running.is_consistent());
    }

    #[test]
    fn transition_kind_serialization() {
        let kind = TransitionKind::EnableWithTimer { minutes: 30 };
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("enable_with_timer"));

        let parsed: TransitionKind = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, kind);
        assert_eq!(parsed.timer_minutes(), Some(30));
    }

    #[test]
    fn change_secret_debug_is_redacted() {
        let kind = TransitionKind::ChangeSecret {
            new_secret: Secret::new("swordfish"),
        };
        assert!(!format!("{:?}", kind).contains("swordfish"));
        assert_eq!(kind.tag(), TransitionTag::ChangeSecret);
    }

    #[test]
    fn guardian_alerts() {
        assert!(Notification::Expired.is_guardian_alert());
        assert!(Notification::Enabled { timer_seconds: None }.is_guardian_alert());
        assert!(!Notification::Denied { attempts_left: 2 }.is_guardian_alert());
        assert!(!Notification::LockedOut.is_guardian_alert());
        assert!(!Notification::ChallengeTimedOut.is_guardian_alert());
    }
}
