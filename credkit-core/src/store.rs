//! The credential store.
//!
//! Writes follow a small state machine driven by a non-interactive existence
//! probe:
//!
//! - `NotFound`: add the credential, then record it in the account index.
//! - `Ok`: update in place, then upsert the index record.
//! - `InteractionNotAllowed`: the existing entry is gated and cannot be
//!   inspected, so it is deleted together with its index record and the write
//!   proceeds as `NotFound`. The last write wins.
//! - `OtherFailure`: surfaced immediately.
//!
//! The two vault writes of each branch are not transactional. When the index
//! write of a fresh insert fails, the credential just added is deleted again.
//! Other partial failures (an index delete, or a failed rollback) can still
//! leave drift behind; [`CredentialStore::reconcile`] repairs it on demand.

use std::sync::Arc;

use log::{debug, warn};
use zeroize::Zeroizing;

use crate::capability::{BiometricSensors, DeviceCapabilities, SensorProbe};
use crate::error::{CredentialError, CredentialResult};
use crate::index::{AccountIndex, INDEX_SERVICE_SUFFIX};
use crate::policy::{AccessControl, ProtectionPolicy, SecurityLevel, SecurityStrategy};
use crate::types::{Credential, CredentialOptions, ReconcileReport};
use crate::vault::{Vault, VaultAdapter, VaultOutcome, VaultQuery};

/// Secure storage of username/password pairs grouped by service.
///
/// Every operation may block on the vault (and on the user, for gated
/// reads). Call it from a background thread.
#[derive(uniffi::Object)]
pub struct CredentialStore {
    vault: VaultAdapter,
    index: AccountIndex,
    probe: Arc<dyn SensorProbe>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("vault", &self.vault)
            .finish_non_exhaustive()
    }
}

fn require(parameter: &str, value: &str) -> CredentialResult<()> {
    if value.is_empty() {
        return Err(CredentialError::params(parameter, "must not be empty"));
    }
    Ok(())
}

fn require_service(service: &str) -> CredentialResult<()> {
    require("service", service)?;
    if service.ends_with(INDEX_SERVICE_SUFFIX) {
        return Err(CredentialError::params(
            "service",
            format!("names ending in '{INDEX_SERVICE_SUFFIX}' are reserved"),
        ));
    }
    Ok(())
}

impl CredentialStore {
    /// Stores `credential` under `service`, replacing any existing password.
    ///
    /// Absent options store at [`SecurityLevel::L1Encrypted`].
    ///
    /// # Errors
    ///
    /// - [`CredentialError::Params`] for an empty service or username, or
    ///   when both a level and a strategy are given. The vault is not touched.
    /// - [`CredentialError::Unavailable`] when the device cannot enforce the
    ///   requested policy. The vault is not touched.
    /// - [`CredentialError::NoData`] when the entry vanished between the
    ///   existence probe and the update.
    /// - [`CredentialError::Unknown`] for any other vault failure.
    pub fn set(
        &self,
        service: &str,
        credential: &Credential,
        options: Option<&CredentialOptions>,
    ) -> CredentialResult<()> {
        require_service(service)?;
        require("credential.username", &credential.username)?;
        let policy = ProtectionPolicy::from_options(options)?;

        if !self.probe.probe().supports(policy) {
            return Err(CredentialError::Unavailable(format!(
                "{policy} needs {} which this device cannot enforce",
                policy.level()
            )));
        }

        let username = credential.username.as_str();
        let secret = Zeroizing::new(credential.password.as_bytes().to_vec());
        let access_control = policy.resolve();
        debug!("storing credential for {service}/{username} with {policy}");

        match self.vault.query_one(VaultQuery::existence(service, username)) {
            VaultOutcome::NotFound => self.insert(service, username, &secret, access_control),
            VaultOutcome::Ok(_) => self.overwrite(service, username, &secret, access_control),
            VaultOutcome::InteractionNotAllowed => {
                warn!("existing credential for {service}/{username} is gated, replacing it");
                self.remove(service, username)?;
                self.insert(service, username, &secret, access_control)
            }
            VaultOutcome::OtherFailure(detail) => Err(CredentialError::Unknown(detail)),
        }
    }

    fn insert(
        &self,
        service: &str,
        username: &str,
        secret: &[u8],
        access_control: AccessControl,
    ) -> CredentialResult<()> {
        match self.vault.add(service, username, secret, access_control) {
            VaultOutcome::Ok(()) => {}
            VaultOutcome::InteractionNotAllowed => {
                return Err(CredentialError::FailedToAccess(format!(
                    "vault refused to write {service}/{username}"
                )));
            }
            outcome => outcome.settle(&format!("{service}/{username}"))?,
        }
        debug!("added {service}/{username}");
        let indexed = self
            .index
            .add(service, username)
            .settle(&format!("index record for {service}/{username}"));
        if indexed.is_err() {
            // A credential without an index record would be invisible to `list`.
            match self
                .vault
                .delete(service, Some(username))
                .or_absent()
                .settle(&format!("{service}/{username}"))
            {
                Ok(()) => warn!("rolled back {service}/{username} after index write failure"),
                Err(e) => warn!("failed to roll back {service}/{username}: {e}"),
            }
        }
        indexed
    }

    fn overwrite(
        &self,
        service: &str,
        username: &str,
        secret: &[u8],
        access_control: AccessControl,
    ) -> CredentialResult<()> {
        match self.vault.update(service, username, secret, access_control) {
            VaultOutcome::Ok(()) => {}
            VaultOutcome::NotFound => {
                return Err(CredentialError::NoData(format!(
                    "{service}/{username} was removed while being updated"
                )));
            }
            VaultOutcome::InteractionNotAllowed => {
                return Err(CredentialError::FailedToAccess(format!(
                    "vault refused to update {service}/{username}"
                )));
            }
            VaultOutcome::OtherFailure(detail) => return Err(CredentialError::Unknown(detail)),
        }
        debug!("updated {service}/{username}");
        self.index
            .add(service, username)
            .settle(&format!("index record for {service}/{username}"))
    }

    /// Reads the credential stored under `service` for `username`.
    ///
    /// May present the authentication challenge the entry was written with.
    ///
    /// # Errors
    ///
    /// - [`CredentialError::NoData`] when nothing is stored.
    /// - [`CredentialError::FailedToAccess`] when the challenge failed or was
    ///   cancelled.
    /// - [`CredentialError::Unknown`] when the stored secret is missing or not
    ///   UTF-8, or for any other vault failure.
    pub fn get(&self, service: &str, username: &str) -> CredentialResult<Credential> {
        require_service(service)?;
        require("username", username)?;

        let item = self
            .vault
            .query_one(VaultQuery::secret(service, username))
            .settle(&format!("{service}/{username}"))?;
        let secret = item
            .secret
            .ok_or_else(|| CredentialError::Unknown("vault returned no secret".to_string()))?;
        let password = String::from_utf8(secret).map_err(|e| {
            // Zeroize the undecodable bytes before dropping them.
            drop(Zeroizing::new(e.into_bytes()));
            CredentialError::Unknown("stored secret is not valid UTF-8".to_string())
        })?;

        Ok(Credential {
            username: username.to_string(),
            password,
        })
    }

    /// Lists the usernames stored under `service`.
    ///
    /// Reads only the account index, so no challenge is ever presented.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Params`] for an empty service, or the
    /// classified vault failure.
    pub fn list(&self, service: &str) -> CredentialResult<Vec<String>> {
        require_service(service)?;
        self.index
            .list(service)
            .settle(&format!("account index of {service}"))
    }

    /// Removes one credential and its index record. Removing an absent
    /// credential succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Params`] for empty input, or the
    /// classified vault failure.
    pub fn remove(&self, service: &str, username: &str) -> CredentialResult<()> {
        require_service(service)?;
        require("username", username)?;
        let subject = format!("{service}/{username}");

        self.vault
            .delete(service, Some(username))
            .or_absent()
            .settle(&subject)?;
        self.index.remove(service, username).settle(&subject)?;
        debug!("removed {subject}");
        Ok(())
    }

    /// Removes every credential of `service` and its index.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Params`] for an empty service, or the
    /// classified vault failure.
    pub fn remove_all(&self, service: &str) -> CredentialResult<()> {
        require_service(service)?;

        self.vault.delete(service, None).or_absent().settle(service)?;
        self.index.remove_all(service).settle(service)?;
        debug!("removed every credential of {service}");
        Ok(())
    }

    /// Current capability snapshot from the sensor probe.
    #[must_use]
    pub fn capabilities(&self) -> DeviceCapabilities {
        self.probe.probe()
    }

    /// Realigns the account index of `service` with its credentials.
    ///
    /// Credentials are the source of truth: missing index records are
    /// recreated and orphaned ones deleted. Entries are enumerated by
    /// attributes only, so a locked device or a changed biometric enrollment
    /// does not hide them.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Params`] for an empty service, or the
    /// classified vault failure. A failure part-way leaves the repairs made
    /// so far in place.
    pub fn reconcile(&self, service: &str) -> CredentialResult<ReconcileReport> {
        require_service(service)?;

        let stored: Vec<String> = match self.vault.query(VaultQuery::enumerate(service)) {
            VaultOutcome::NotFound => Vec::new(),
            outcome => outcome
                .map(|items| items.into_iter().map(|item| item.username).collect())
                .settle(service)?,
        };
        let indexed = self.list(service)?;

        let mut report = ReconcileReport::default();
        for username in stored.iter().filter(|u| !indexed.contains(u)) {
            self.index
                .add(service, username)
                .settle(&format!("index record for {service}/{username}"))?;
            report.restored.push(username.clone());
        }
        for username in indexed.iter().filter(|u| !stored.contains(u)) {
            self.index
                .remove(service, username)
                .settle(&format!("index record for {service}/{username}"))?;
            report.pruned.push(username.clone());
        }

        if !report.is_clean() {
            warn!(
                "repaired account index of {service}: restored {}, pruned {}",
                report.restored.len(),
                report.pruned.len()
            );
        }
        Ok(report)
    }
}

#[uniffi::export]
impl CredentialStore {
    /// Creates a store over a host vault and capability probe.
    #[uniffi::constructor]
    pub fn new(vault: Arc<dyn Vault>, probe: Arc<dyn SensorProbe>) -> Self {
        let vault = VaultAdapter::new(vault);
        Self {
            index: AccountIndex::new(vault.clone()),
            vault,
            probe,
        }
    }

    /// Stores a credential. See [`CredentialStore::set`].
    ///
    /// # Errors
    ///
    /// See [`CredentialStore::set`].
    #[allow(clippy::needless_pass_by_value)]
    pub fn set_credential(
        &self,
        service: String,
        credential: Credential,
        options: Option<CredentialOptions>,
    ) -> Result<(), CredentialError> {
        self.set(&service, &credential, options.as_ref())
    }

    /// Reads a credential. See [`CredentialStore::get`].
    ///
    /// # Errors
    ///
    /// See [`CredentialStore::get`].
    #[allow(clippy::needless_pass_by_value)]
    pub fn get_credential(
        &self,
        service: String,
        username: String,
    ) -> Result<Credential, CredentialError> {
        self.get(&service, &username)
    }

    /// Lists usernames. See [`CredentialStore::list`].
    ///
    /// # Errors
    ///
    /// See [`CredentialStore::list`].
    #[allow(clippy::needless_pass_by_value)]
    pub fn get_usernames(&self, service: String) -> Result<Vec<String>, CredentialError> {
        self.list(&service)
    }

    /// Removes a credential. See [`CredentialStore::remove`].
    ///
    /// # Errors
    ///
    /// See [`CredentialStore::remove`].
    #[allow(clippy::needless_pass_by_value)]
    pub fn remove_credential(
        &self,
        service: String,
        username: String,
    ) -> Result<(), CredentialError> {
        self.remove(&service, &username)
    }

    /// Removes every credential of a service. See [`CredentialStore::remove_all`].
    ///
    /// # Errors
    ///
    /// See [`CredentialStore::remove_all`].
    #[allow(clippy::needless_pass_by_value)]
    pub fn remove_credentials(&self, service: String) -> Result<(), CredentialError> {
        self.remove_all(&service)
    }

    /// Repairs the account index. See [`CredentialStore::reconcile`].
    ///
    /// # Errors
    ///
    /// See [`CredentialStore::reconcile`].
    #[allow(clippy::needless_pass_by_value)]
    pub fn reconcile_accounts(&self, service: String) -> Result<ReconcileReport, CredentialError> {
        self.reconcile(&service)
    }

    /// Strategies the device can enforce right now, strongest first.
    /// `Standard` is always present.
    pub fn available_security_strategies(&self) -> Vec<SecurityStrategy> {
        self.capabilities().available_strategies()
    }

    /// Levels the device can enforce right now, strongest first.
    pub fn available_security_levels(&self) -> Vec<SecurityLevel> {
        self.capabilities().available_levels()
    }

    /// The strongest level the device can enforce right now.
    pub fn maximum_security_level(&self) -> SecurityLevel {
        self.capabilities().maximum_level()
    }

    /// Whether the device can enforce `level` right now.
    pub fn can_use_security_level(&self, level: SecurityLevel) -> bool {
        self.capabilities().supports_level(level)
    }

    /// Biometric sensor hardware on the device.
    pub fn supported_biometric_sensors(&self) -> BiometricSensors {
        self.capabilities().sensors
    }
}
