//! Command types for the kidmode protocol

use kidmode_util::{ClientId, Secret};
use serde::{Deserialize, Serialize};

use crate::{HealthStatus, SessionView, SubmitOutcome, TransitionKind, TransitionTag, API_VERSION};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    pub api_version: u32,
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    pub api_version: u32,
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    AlreadyPending,
    NoPendingChallenge,
    InvalidTimer,
    InvalidSecret,
    SecretNotConfigured,
    SecretAlreadyConfigured,
    RateLimited,
    InvalidRequest,
    InternalError,
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Get the session and any open challenge
    GetSession,

    /// First-run secret creation
    SetupSecret { secret: Secret, confirmation: Secret },

    /// Open a challenge for a transition
    RequestTransition { kind: TransitionKind },

    /// Open a challenge for replacing the secret
    ChangeSecret {
        new_secret: Secret,
        confirmation: Secret,
    },

    /// Answer the open challenge
    SubmitCredential { candidate: Secret },

    /// Close the open challenge without applying it
    CancelChallenge,

    /// Quick-timer presets, in minutes
    GetTimerPresets,

    /// Subscribe to events (returns immediately, events stream separately)
    SubscribeEvents,

    UnsubscribeEvents,

    GetHealth,

    /// Ping for keepalive
    Ping,
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    Session(SessionView),
    SecretConfigured,
    ChallengeOpened { kind: TransitionTag },
    Submitted(SubmitOutcome),
    ChallengeCancelled {
        /// False when there was nothing to cancel
        was_pending: bool,
    },
    TimerPresets { minutes: Vec<u32> },
    Subscribed { client_id: ClientId },
    Unsubscribed,
    Health(HealthStatus),
    Pong,
}

/// Client connection info (set by IPC layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: ClientId,
    /// Unix UID if available
    pub uid: Option<u32>,
}

impl ClientInfo {
    pub fn new() -> Self {
        Self {
            client_id: ClientId::new(),
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Session;

    #[test]
    fn request_serialization() {
        let req = Request::new(
            7,
            Command::RequestTransition {
                kind: TransitionKind::EnableWithTimer { minutes: 15 },
            },
        );
        let json = serde_json::to_string(&req).unwrap();
        let parsed: Request = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.request_id, 7);
        assert!(matches!(
            parsed.command,
            Command::RequestTransition {
                kind: TransitionKind::EnableWithTimer { minutes: 15 }
            }
        ));
    }

    #[test]
    fn response_serialization() {
        let resp = Response::success(
            1,
            ResponsePayload::Session(SessionView {
                session: Session::INITIAL,
                pending: None,
                secret_configured: true,
            }),
        );

        let json = serde_json::to_string(&resp).unwrap();
        let parsed: Response = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.request_id, 1);
        assert!(matches!(
            parsed.result,
            ResponseResult::Ok(ResponsePayload::Session(_))
        ));
    }

    #[test]
    fn error_code_wire_format() {
        let resp = Response::error(3, ErrorInfo::new(ErrorCode::AlreadyPending, "busy"));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("already_pending"));
    }

    #[test]
    fn submit_command_accepts_plain_string() {
        let json = r#"{"request_id":2,"api_version":1,"command":{"type":"submit_credential","candidate":"abcd"}}"#;
        let parsed: Request = serde_json::from_str(json).unwrap();
        match parsed.command {
            Command::SubmitCredential { candidate } => assert!(candidate.matches("abcd")),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
