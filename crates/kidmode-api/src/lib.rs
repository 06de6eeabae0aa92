//! Protocol types for kidmode
//!
//! This crate defines the stable API between kidmoded and its clients:
//! - The session model and transition kinds shared with the core
//! - Commands (requests from clients) and responses
//! - Events (service -> clients), including user-facing notifications
//! - Versioning

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
