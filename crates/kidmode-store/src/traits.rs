//! Store trait definitions

use kidmode_util::Secret;

use crate::{AuditEvent, StoreResult};

/// Main store trait
pub trait Store: Send + Sync {
    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Guardian secret

    /// Whether a guardian secret has been set up
    fn has_secret(&self) -> StoreResult<bool>;

    /// Compare a candidate against the stored secret.
    /// Returns false when no secret is configured.
    fn verify_secret(&self, candidate: &str) -> StoreResult<bool>;

    /// Store a new guardian secret, replacing any existing one
    fn set_secret(&self, secret: &Secret) -> StoreResult<()>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
