//! kidmoded service internals
//!
//! The binary in `main.rs` parses arguments, sets up logging and hands a
//! [`Service`] its settings. Everything else lives here so the integration
//! tests can run the real service against a temporary socket.

mod dispatch;
mod notifier;
mod service;

pub use dispatch::*;
pub use notifier::*;
pub use service::*;
