//! Guardian secret wrapper
//!
//! The secret travels through commands, pending requests and the store, so
//! it is wrapped in a type whose `Debug` and `Display` output never shows the
//! value. Only `expose()` hands out the cleartext.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A guardian-chosen secret
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Cleartext value, for the store and the verification boundary only
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Length in characters (not bytes)
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Exact, case-sensitive comparison with no normalization.
    ///
    /// This is a plain equality check, not a constant-time or hashed
    /// comparison. The panel has no remote attacker model.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0 == candidate
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
