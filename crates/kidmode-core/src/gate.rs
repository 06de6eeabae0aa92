//! Credential gate

use kidmode_store::Store;
use kidmode_util::{Result, Secret};
use std::sync::Arc;
use tracing::debug;

/// Wrong submissions allowed per challenge
pub const MAX_ATTEMPTS: u32 = 3;

/// Verdict on one submitted credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    Approved,
    Denied { attempts_left: u32 },
    LockedOut,
}

/// Verifies candidates against the stored secret and counts failures
///
/// The failure counter belongs to the currently open challenge. It resets
/// on approval, on lockout, and whenever the arbiter closes a challenge.
pub struct CredentialGate {
    store: Arc<dyn Store>,
    failures: u32,
}

impl CredentialGate {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store, failures: 0 }
    }

    pub fn is_configured(&self) -> Result<bool> {
        Ok(self.store.has_secret()?)
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn attempts_left(&self) -> u32 {
        MAX_ATTEMPTS.saturating_sub(self.failures)
    }

    /// Check a candidate. A store failure is returned as an error and does
    /// not count as an attempt.
    pub fn check(&mut self, candidate: &str) -> Result<GateVerdict> {
        if self.store.verify_secret(candidate)? {
            self.failures = 0;
            return Ok(GateVerdict::Approved);
        }

        self.failures += 1;
        debug!(failures = self.failures, "Credential rejected");

        if self.failures >= MAX_ATTEMPTS {
            self.failures = 0;
            Ok(GateVerdict::LockedOut)
        } else {
            Ok(GateVerdict::Denied {
                attempts_left: self.attempts_left(),
            })
        }
    }

    /// Replace the secret unconditionally
    pub fn set_secret(&mut self, secret: &Secret) -> Result<()> {
        self.store.set_secret(secret)?;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }
}
