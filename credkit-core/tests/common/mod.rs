#![allow(dead_code)]

//! Common test utilities shared across integration tests.

use std::sync::{Arc, Mutex};

use credkit_core::vault::{status, InMemoryVault, Vault, VaultError, VaultItem, VaultQuery};
use credkit_core::{AccessControl, CredentialStore, DeviceCapabilities, SensorProbe};

/// Probe whose snapshot can be changed mid-test.
pub struct MutableProbe {
    caps: Mutex<DeviceCapabilities>,
}

impl MutableProbe {
    pub fn new(caps: DeviceCapabilities) -> Self {
        Self {
            caps: Mutex::new(caps),
        }
    }

    pub fn set(&self, caps: DeviceCapabilities) {
        *self.caps.lock().unwrap() = caps;
    }
}

impl SensorProbe for MutableProbe {
    fn probe(&self) -> DeviceCapabilities {
        *self.caps.lock().unwrap()
    }
}

/// Wraps an [`InMemoryVault`] and reports failures the way Keychain Services
/// does: as raw `OSStatus` codes instead of dedicated variants.
pub struct KeychainStyleVault {
    pub inner: Arc<InMemoryVault>,
}

fn as_os_status(error: VaultError) -> VaultError {
    match error {
        VaultError::ItemNotFound => {
            VaultError::native(status::ITEM_NOT_FOUND, "The specified item could not be found.")
        }
        VaultError::InteractionNotAllowed => VaultError::native(
            status::INTERACTION_NOT_ALLOWED,
            "User interaction is not allowed.",
        ),
        other => other,
    }
}

impl Vault for KeychainStyleVault {
    fn query(&self, query: VaultQuery) -> Result<Vec<VaultItem>, VaultError> {
        self.inner.query(query).map_err(as_os_status)
    }

    fn add(
        &self,
        service: String,
        username: String,
        secret: Vec<u8>,
        access_control: AccessControl,
    ) -> Result<(), VaultError> {
        self.inner
            .add(service, username, secret, access_control)
            .map_err(as_os_status)
    }

    fn update(
        &self,
        service: String,
        username: String,
        secret: Vec<u8>,
        access_control: AccessControl,
    ) -> Result<(), VaultError> {
        self.inner
            .update(service, username, secret, access_control)
            .map_err(as_os_status)
    }

    fn delete(&self, service: String, username: Option<String>) -> Result<(), VaultError> {
        self.inner.delete(service, username).map_err(as_os_status)
    }
}

pub struct Harness {
    pub vault: Arc<InMemoryVault>,
    pub probe: Arc<MutableProbe>,
    pub store: Arc<CredentialStore>,
}

/// A store over an in-memory vault on a fully secured device.
pub fn harness() -> Harness {
    harness_with(DeviceCapabilities::fully_secured())
}

pub fn harness_with(caps: DeviceCapabilities) -> Harness {
    let vault = Arc::new(InMemoryVault::new());
    let probe = Arc::new(MutableProbe::new(caps));
    let store = Arc::new(CredentialStore::new(vault.clone(), probe.clone()));
    Harness {
        vault,
        probe,
        store,
    }
}

/// A store whose vault speaks in `OSStatus` codes.
pub fn keychain_harness() -> Harness {
    let vault = Arc::new(InMemoryVault::new());
    let probe = Arc::new(MutableProbe::new(DeviceCapabilities::fully_secured()));
    let keychain = Arc::new(KeychainStyleVault {
        inner: vault.clone(),
    });
    let store = Arc::new(CredentialStore::new(keychain, probe.clone()));
    Harness {
        vault,
        probe,
        store,
    }
}
