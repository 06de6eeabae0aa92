//! Access-gated session state machine for kidmoded
//!
//! This crate is the heart of kidmoded, containing:
//! - Session state (restricted / running / remaining seconds) and its transitions
//! - Credential gate with a three-strike lockout
//! - Countdown engine guarded by generation tokens
//! - Request arbiter: every change goes through exactly one open challenge

mod arbiter;
mod countdown;
mod gate;
mod session;

pub use arbiter::*;
pub use countdown::*;
pub use gate::*;
pub use session::*;
