//! Capability interfaces for the kidmode core
//!
//! The core never touches clocks or sockets directly. It asks a
//! [`Scheduler`] for a periodic tick and reports user-facing events to a
//! [`NotificationSink`]. This crate defines those traits, a tokio-backed
//! scheduler for the service, and deterministic mocks for tests.

mod handle;
mod mock;
mod tokio_scheduler;
mod traits;

pub use handle::*;
pub use mock::*;
pub use tokio_scheduler::*;
pub use traits::*;
