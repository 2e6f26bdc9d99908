//! In-memory vault for tests and host-less embedding.
//!
//! Secrets are held in process memory and zeroized on removal. There is no
//! encryption at rest; use a platform vault in production. The vault can
//! simulate the conditions a real keystore produces (a locked device, a
//! denied challenge, a biometric enrollment change) and inject failures.

// Allow certain clippy lints for test-oriented code
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::significant_drop_tightening)]

use std::sync::{Mutex, MutexGuard};

use zeroize::Zeroizing;

use crate::policy::{AccessControl, Accessibility};

use super::error::{status, VaultError, VaultResult};
use super::traits::{Vault, VaultItem, VaultQuery};

/// How a simulated user answers an authentication challenge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChallengeResponse {
    /// The user authenticates.
    #[default]
    Approve,
    /// The user dismisses the prompt.
    Cancel,
    /// Authentication fails.
    Fail,
}

/// Vault primitive, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultOperation {
    /// [`Vault::query`]
    Query,
    /// [`Vault::add`]
    Add,
    /// [`Vault::update`]
    Update,
    /// [`Vault::delete`]
    Delete,
}

struct StoredItem {
    service: String,
    username: String,
    secret: Zeroizing<Vec<u8>>,
    access_control: AccessControl,
    enrollment: u64,
}

impl StoredItem {
    fn matches(&self, service: &str, username: Option<&str>) -> bool {
        self.service == service && username.is_none_or(|u| self.username == u)
    }
}

#[derive(Default)]
struct MemoryState {
    // Insertion order is enumeration order.
    items: Vec<StoredItem>,
    locked: bool,
    challenge: ChallengeResponse,
    enrollment: u64,
    // (operation, calls until it fires, error)
    failures: Vec<(VaultOperation, usize, VaultError)>,
    operations: usize,
}

impl MemoryState {
    fn begin(&mut self, op: VaultOperation) -> VaultResult<()> {
        self.operations += 1;
        for entry in self.failures.iter_mut().filter(|(o, ..)| *o == op) {
            entry.1 = entry.1.saturating_sub(1);
        }
        if let Some(pos) = self
            .failures
            .iter()
            .position(|(o, remaining, _)| *o == op && *remaining == 0)
        {
            return Err(self.failures.remove(pos).2);
        }
        Ok(())
    }

    fn writable(&self, access_control: &AccessControl) -> VaultResult<()> {
        if self.locked && access_control.accessibility != Accessibility::AfterFirstUnlock {
            return Err(VaultError::InteractionNotAllowed);
        }
        Ok(())
    }

    fn readable(&self, item: &StoredItem) -> VaultResult<()> {
        self.writable(&item.access_control)?;
        if item.access_control.invalidated_by_enrollment_change && item.enrollment != self.enrollment
        {
            return Err(VaultError::InteractionNotAllowed);
        }
        Ok(())
    }

    fn challenge(&self) -> VaultResult<()> {
        match self.challenge {
            ChallengeResponse::Approve => Ok(()),
            ChallengeResponse::Cancel => Err(VaultError::native(
                status::USER_CANCELED,
                "User canceled the operation.",
            )),
            ChallengeResponse::Fail => Err(VaultError::native(
                status::AUTH_FAILED,
                "The user name or passphrase you entered is not correct.",
            )),
        }
    }
}

/// A [`Vault`] kept in process memory.
#[derive(Default)]
pub struct InMemoryVault {
    state: Mutex<MemoryState>,
}

impl std::fmt::Debug for InMemoryVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryVault").finish_non_exhaustive()
    }
}

impl InMemoryVault {
    /// Creates an empty, unlocked vault that approves every challenge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the device locking or unlocking.
    ///
    /// While locked, only [`Accessibility::AfterFirstUnlock`] items can be
    /// read or written.
    pub fn set_locked(&self, locked: bool) {
        self.state.lock().unwrap().locked = locked;
    }

    /// Sets how subsequent authentication challenges are answered.
    pub fn set_challenge_response(&self, response: ChallengeResponse) {
        self.state.lock().unwrap().challenge = response;
    }

    /// Simulates enrolling or removing a biometric.
    ///
    /// Items written with `invalidated_by_enrollment_change` become
    /// permanently unreadable.
    pub fn change_biometric_enrollment(&self) {
        self.state.lock().unwrap().enrollment += 1;
    }

    /// Makes the next call to `op` fail with `error`.
    pub fn fail_next(&self, op: VaultOperation, error: VaultError) {
        self.fail_on(op, 1, error);
    }

    /// Makes the `nth` upcoming call to `op` (1-based) fail with `error`.
    pub fn fail_on(&self, op: VaultOperation, nth: usize, error: VaultError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((op, nth.max(1), error));
    }

    /// Number of primitives invoked so far.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.state.lock().unwrap().operations
    }

    /// Whether an item exists, bypassing every gate.
    #[must_use]
    pub fn contains(&self, service: &str, username: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .items
            .iter()
            .any(|item| item.matches(service, Some(username)))
    }

    /// Access control an item was written with, bypassing every gate.
    #[must_use]
    pub fn access_control_of(&self, service: &str, username: &str) -> Option<AccessControl> {
        self.state
            .lock()
            .unwrap()
            .items
            .iter()
            .find(|item| item.matches(service, Some(username)))
            .map(|item| item.access_control)
    }

    /// Total number of stored items across all services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    /// Whether the vault holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn guard(&self) -> VaultResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| VaultError::native(-1, format!("vault mutex poisoned: {e}")))
    }
}

impl Vault for InMemoryVault {
    fn query(&self, query: VaultQuery) -> VaultResult<Vec<VaultItem>> {
        let mut state = self.guard()?;
        state.begin(VaultOperation::Query)?;

        let matches: Vec<&StoredItem> = state
            .items
            .iter()
            .filter(|item| item.matches(&query.service, query.username.as_deref()))
            .collect();
        if matches.is_empty() {
            return Err(VaultError::ItemNotFound);
        }

        // Enumerating attributes reports every item, closed gates included.
        if query.username.is_some() || query.return_secret {
            for item in &matches {
                state.readable(item)?;
            }
        }

        let gated = matches
            .iter()
            .any(|item| item.access_control.requires_challenge());
        if query.return_secret && gated {
            if !query.allow_interaction {
                return Err(VaultError::InteractionNotAllowed);
            }
            state.challenge()?;
        }

        Ok(matches
            .into_iter()
            .map(|item| VaultItem {
                service: item.service.clone(),
                username: item.username.clone(),
                secret: query.return_secret.then(|| item.secret.to_vec()),
                access_control: Some(item.access_control),
            })
            .collect())
    }

    fn add(
        &self,
        service: String,
        username: String,
        secret: Vec<u8>,
        access_control: AccessControl,
    ) -> VaultResult<()> {
        let mut state = self.guard()?;
        state.begin(VaultOperation::Add)?;

        if state
            .items
            .iter()
            .any(|item| item.matches(&service, Some(&username)))
        {
            return Err(VaultError::native(
                status::DUPLICATE_ITEM,
                "The specified item already exists in the keychain.",
            ));
        }
        state.writable(&access_control)?;

        let enrollment = state.enrollment;
        state.items.push(StoredItem {
            service,
            username,
            secret: Zeroizing::new(secret),
            access_control,
            enrollment,
        });
        Ok(())
    }

    fn update(
        &self,
        service: String,
        username: String,
        secret: Vec<u8>,
        access_control: AccessControl,
    ) -> VaultResult<()> {
        let mut state = self.guard()?;
        state.begin(VaultOperation::Update)?;

        let pos = state
            .items
            .iter()
            .position(|item| item.matches(&service, Some(&username)))
            .ok_or(VaultError::ItemNotFound)?;
        state.readable(&state.items[pos])?;
        state.writable(&access_control)?;

        let enrollment = state.enrollment;
        let item = &mut state.items[pos];
        item.secret = Zeroizing::new(secret);
        item.access_control = access_control;
        item.enrollment = enrollment;
        Ok(())
    }

    fn delete(&self, service: String, username: Option<String>) -> VaultResult<()> {
        let mut state = self.guard()?;
        state.begin(VaultOperation::Delete)?;

        let before = state.items.len();
        state
            .items
            .retain(|item| !item.matches(&service, username.as_deref()));
        if state.items.len() == before {
            return Err(VaultError::ItemNotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::SecurityLevel;

    fn put(vault: &InMemoryVault, username: &str, level: SecurityLevel) {
        vault
            .add(
                "bank".to_string(),
                username.to_string(),
                b"pw".to_vec(),
                level.access_control(),
            )
            .unwrap();
    }

    #[test]
    fn test_enumeration_follows_insertion_order() {
        let vault = InMemoryVault::new();
        for name in ["carol", "alice", "bob"] {
            put(&vault, name, SecurityLevel::L1Encrypted);
        }
        let names: Vec<_> = vault
            .query(VaultQuery::enumerate("bank"))
            .unwrap()
            .into_iter()
            .map(|item| item.username)
            .collect();
        assert_eq!(names, vec!["carol", "alice", "bob"]);
    }

    #[test]
    fn test_duplicate_add_is_native_status() {
        let vault = InMemoryVault::new();
        put(&vault, "alice", SecurityLevel::L1Encrypted);
        let err = vault
            .add(
                "bank".to_string(),
                "alice".to_string(),
                b"x".to_vec(),
                SecurityLevel::L1Encrypted.access_control(),
            )
            .unwrap_err();
        assert!(matches!(err, VaultError::Native { status: -25299, .. }));
    }

    #[test]
    fn test_locked_device_hides_unlocked_only_items() {
        let vault = InMemoryVault::new();
        put(&vault, "alice", SecurityLevel::L2DeviceUnlocked);
        put(&vault, "bob", SecurityLevel::L1Encrypted);
        vault.set_locked(true);

        assert_eq!(
            vault.query(VaultQuery::existence("bank", "alice")),
            Err(VaultError::InteractionNotAllowed)
        );
        assert!(vault.query(VaultQuery::secret("bank", "bob")).is_ok());

        let usernames: Vec<String> = vault
            .query(VaultQuery::enumerate("bank"))
            .unwrap()
            .into_iter()
            .map(|item| item.username)
            .collect();
        assert_eq!(usernames, vec!["alice", "bob"]);
    }

    #[test]
    fn test_gated_secret_requires_interaction() {
        let vault = InMemoryVault::new();
        put(&vault, "alice", SecurityLevel::L3UserPresence);

        assert!(vault.query(VaultQuery::existence("bank", "alice")).is_ok());

        let mut silent = VaultQuery::secret("bank", "alice");
        silent.allow_interaction = false;
        assert_eq!(vault.query(silent), Err(VaultError::InteractionNotAllowed));

        vault.set_challenge_response(ChallengeResponse::Cancel);
        assert!(matches!(
            vault.query(VaultQuery::secret("bank", "alice")),
            Err(VaultError::Native { status: -128, .. })
        ));

        vault.set_challenge_response(ChallengeResponse::Approve);
        let items = vault.query(VaultQuery::secret("bank", "alice")).unwrap();
        assert_eq!(items[0].secret.as_deref(), Some(b"pw".as_slice()));
    }

    #[test]
    fn test_enrollment_change_invalidates_bound_items() {
        let vault = InMemoryVault::new();
        put(&vault, "alice", SecurityLevel::L5BiometricEncrypted);
        put(&vault, "bob", SecurityLevel::L4Biometrics);
        vault.change_biometric_enrollment();

        assert_eq!(
            vault.query(VaultQuery::existence("bank", "alice")),
            Err(VaultError::InteractionNotAllowed)
        );
        assert!(vault.query(VaultQuery::existence("bank", "bob")).is_ok());
        assert!(vault.delete("bank".to_string(), Some("alice".to_string())).is_ok());
    }

    #[test]
    fn test_injected_failure_fires_once() {
        let vault = InMemoryVault::new();
        vault.fail_next(VaultOperation::Add, VaultError::native(-34, "disk full"));
        assert!(vault
            .add(
                "bank".to_string(),
                "alice".to_string(),
                vec![],
                SecurityLevel::L1Encrypted.access_control(),
            )
            .is_err());
        put(&vault, "alice", SecurityLevel::L1Encrypted);
        assert_eq!(vault.operation_count(), 2);

        vault.fail_on(VaultOperation::Delete, 2, VaultError::native(-34, "disk full"));
        assert_eq!(
            vault.delete("bank".to_string(), Some("nobody".to_string())),
            Err(VaultError::ItemNotFound)
        );
        assert!(matches!(
            vault.delete("bank".to_string(), Some("alice".to_string())),
            Err(VaultError::Native { status: -34, .. })
        ));
        assert!(vault.contains("bank", "alice"));
    }

    #[test]
    fn test_delete_missing_and_service_wide() {
        let vault = InMemoryVault::new();
        assert_eq!(
            vault.delete("bank".to_string(), None),
            Err(VaultError::ItemNotFound)
        );
        put(&vault, "alice", SecurityLevel::L1Encrypted);
        put(&vault, "bob", SecurityLevel::L1Encrypted);
        vault
            .add(
                "mail".to_string(),
                "alice".to_string(),
                vec![],
                SecurityLevel::L1Encrypted.access_control(),
            )
            .unwrap();
        vault.delete("bank".to_string(), None).unwrap();
        assert_eq!(vault.len(), 1);
        assert!(vault.contains("mail", "alice"));
    }
}
