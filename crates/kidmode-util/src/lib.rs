//! Shared utilities for kidmode
//!
//! This crate provides:
//! - ID types (ChallengeId, ClientId)
//! - The redacting `Secret` wrapper
//! - Time utilities (monotonic time, countdown formatting)
//! - Error types
//! - Rate limiting helpers
//! - Default paths for socket, config, data, and log directories

mod error;
mod ids;
mod paths;
mod rate_limit;
mod secret;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
pub use secret::*;
pub use time::*;
