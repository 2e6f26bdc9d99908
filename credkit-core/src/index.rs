//! Per-service account index.
//!
//! Vaults gated by an authentication challenge cannot enumerate their items
//! without prompting, so every credential write also records the username in
//! a parallel, ungated service. Listing reads only that service.

use crate::policy::SecurityLevel;
use crate::vault::{VaultAdapter, VaultOutcome, VaultQuery};

/// Suffix appended to a service name to form its index service.
pub const INDEX_SERVICE_SUFFIX: &str = ".credkit-index";

/// Returns the index service for `service`.
#[must_use]
pub fn index_service(service: &str) -> String {
    format!("{service}{INDEX_SERVICE_SUFFIX}")
}

/// Username registry stored beside the credentials of each service.
///
/// Records carry the username as their payload and the weakest protection
/// level, so they can be read on a locked device without a prompt.
#[derive(Debug, Clone)]
pub struct AccountIndex {
    vault: VaultAdapter,
}

impl AccountIndex {
    /// Creates an index over `vault`.
    #[must_use]
    pub const fn new(vault: VaultAdapter) -> Self {
        Self { vault }
    }

    /// Records `username` under `service`. Recording twice is a no-op.
    pub fn add(&self, service: &str, username: &str) -> VaultOutcome<()> {
        let index = index_service(service);
        let access_control = SecurityLevel::L1Encrypted.access_control();
        match self.vault.query_one(VaultQuery::existence(&index, username)) {
            VaultOutcome::NotFound => {
                self.vault
                    .add(&index, username, username.as_bytes(), access_control)
            }
            VaultOutcome::Ok(_) => {
                self.vault
                    .update(&index, username, username.as_bytes(), access_control)
            }
            VaultOutcome::InteractionNotAllowed => VaultOutcome::InteractionNotAllowed,
            VaultOutcome::OtherFailure(detail) => VaultOutcome::OtherFailure(detail),
        }
    }

    /// Forgets `username`. Removing an absent record succeeds.
    pub fn remove(&self, service: &str, username: &str) -> VaultOutcome<()> {
        self.vault
            .delete(&index_service(service), Some(username))
            .or_absent()
    }

    /// Forgets every username of `service`.
    pub fn remove_all(&self, service: &str) -> VaultOutcome<()> {
        self.vault.delete(&index_service(service), None).or_absent()
    }

    /// Lists recorded usernames in vault enumeration order.
    ///
    /// A service with no records yields an empty list, not `NotFound`.
    pub fn list(&self, service: &str) -> VaultOutcome<Vec<String>> {
        match self.vault.query(VaultQuery::enumerate(&index_service(service))) {
            VaultOutcome::NotFound => VaultOutcome::Ok(Vec::new()),
            outcome => outcome.map(|items| {
                let mut names: Vec<String> = Vec::with_capacity(items.len());
                for item in items {
                    if !names.contains(&item.username) {
                        names.push(item.username);
                    }
                }
                names
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::vault::memory::VaultOperation;
    use crate::vault::{InMemoryVault, VaultError};

    fn index() -> (Arc<InMemoryVault>, AccountIndex) {
        let vault = Arc::new(InMemoryVault::new());
        let index = AccountIndex::new(VaultAdapter::new(vault.clone()));
        (vault, index)
    }

    #[test]
    fn test_add_is_idempotent() {
        let (vault, index) = index();
        assert_eq!(index.add("bank", "alice"), VaultOutcome::Ok(()));
        assert_eq!(index.add("bank", "alice"), VaultOutcome::Ok(()));
        assert_eq!(index.list("bank"), VaultOutcome::Ok(vec!["alice".to_string()]));
        assert!(vault.contains("bank.credkit-index", "alice"));
        assert!(!vault.contains("bank", "alice"));
    }

    #[test]
    fn test_list_empty_service() {
        let (_, index) = index();
        assert_eq!(index.list("bank"), VaultOutcome::Ok(vec![]));
    }

    #[test]
    fn test_list_preserves_order() {
        let (_, index) = index();
        for name in ["bob", "alice", "carol"] {
            assert_eq!(index.add("bank", name), VaultOutcome::Ok(()));
        }
        assert_eq!(
            index.list("bank"),
            VaultOutcome::Ok(vec![
                "bob".to_string(),
                "alice".to_string(),
                "carol".to_string()
            ])
        );
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (_, index) = index();
        assert_eq!(index.remove("bank", "alice"), VaultOutcome::Ok(()));
        index.add("bank", "alice");
        index.add("bank", "bob");
        assert_eq!(index.remove("bank", "alice"), VaultOutcome::Ok(()));
        assert_eq!(index.list("bank"), VaultOutcome::Ok(vec!["bob".to_string()]));
        assert_eq!(index.remove_all("bank"), VaultOutcome::Ok(()));
        assert_eq!(index.remove_all("bank"), VaultOutcome::Ok(()));
        assert_eq!(index.list("bank"), VaultOutcome::Ok(vec![]));
    }

    #[test]
    fn test_index_readable_while_locked() {
        let (vault, index) = index();
        index.add("bank", "alice");
        vault.set_locked(true);
        assert_eq!(index.list("bank"), VaultOutcome::Ok(vec!["alice".to_string()]));
    }

    #[test]
    fn test_failures_propagate() {
        let (vault, index) = index();
        vault.fail_next(VaultOperation::Query, VaultError::native(-26275, "decode"));
        assert!(matches!(index.list("bank"), VaultOutcome::OtherFailure(_)));
    }
}
