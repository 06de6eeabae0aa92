//! Timer generation token

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one run of the countdown
///
/// Each start of the countdown mints a token with a fresh epoch. A fired
/// tick carries the token it was scheduled with, so ticks belonging to a
/// superseded run can be recognised and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerToken(u64);

impl TimerToken {
    pub fn new(epoch: u64) -> Self {
        Self(epoch)
    }

    pub fn epoch(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}
