//! Event types for kidmoded -> client streaming

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{Notification, SessionView, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: kidmode_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Session or challenge changed, including every countdown tick
    SessionChanged(SessionView),

    /// Something the UI should surface as a toast or banner
    Notification(Notification),

    /// Service is shutting down
    Shutdown,
}
