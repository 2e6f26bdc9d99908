//! Public records exchanged with callers.

use serde::Serialize;

use crate::policy::{SecurityLevel, SecurityStrategyName};

/// A username/password pair. The service is supplied alongside it.
#[derive(Clone, PartialEq, Eq, Serialize, uniffi::Record)]
pub struct Credential {
    /// Account name; unique within a service.
    pub username: String,
    /// Secret, UTF-8 text.
    pub password: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Write options. At most one of the two fields may be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, uniffi::Record)]
pub struct CredentialOptions {
    /// Protection level to apply.
    #[uniffi(default = None)]
    pub security_level: Option<SecurityLevel>,
    /// Named strategy to apply.
    #[uniffi(default = None)]
    pub strategy: Option<SecurityStrategyName>,
}

/// Outcome of a [`crate::CredentialStore::reconcile`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, uniffi::Record)]
pub struct ReconcileReport {
    /// Usernames whose missing index record was recreated.
    pub restored: Vec<String>,
    /// Usernames whose index record had no credential and was removed.
    pub pruned: Vec<String>,
}

impl ReconcileReport {
    /// Whether the pass changed anything.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.restored.is_empty() && self.pruned.is_empty()
    }
}
