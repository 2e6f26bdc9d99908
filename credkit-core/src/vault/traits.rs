//! The vault interface implemented by the host platform.

use crate::policy::AccessControl;

use super::error::VaultResult;

/// Lookup parameters for [`Vault::query`].
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct VaultQuery {
    /// Service to search.
    pub service: String,
    /// Restrict to one username; `None` enumerates the whole service.
    pub username: Option<String>,
    /// Return secret bytes, not just attributes.
    pub return_secret: bool,
    /// Allow the vault to present an authentication challenge.
    ///
    /// When `false`, an item whose gate would require interaction must be
    /// reported as [`super::VaultError::InteractionNotAllowed`].
    pub allow_interaction: bool,
}

impl VaultQuery {
    /// Attributes-only, non-interactive lookup of one item.
    pub fn existence(service: &str, username: &str) -> Self {
        Self {
            service: service.to_string(),
            username: Some(username.to_string()),
            return_secret: false,
            allow_interaction: false,
        }
    }

    /// Secret-returning lookup of one item; may prompt the user.
    pub fn secret(service: &str, username: &str) -> Self {
        Self {
            service: service.to_string(),
            username: Some(username.to_string()),
            return_secret: true,
            allow_interaction: true,
        }
    }

    /// Attributes-only, non-interactive enumeration of a service.
    ///
    /// Hosts must list every item of the service, including items whose
    /// accessibility or enrollment gate is currently closed.
    pub fn enumerate(service: &str) -> Self {
        Self {
            service: service.to_string(),
            username: None,
            return_secret: false,
            allow_interaction: false,
        }
    }
}

/// An item returned by [`Vault::query`].
#[derive(Clone, PartialEq, Eq, uniffi::Record)]
pub struct VaultItem {
    /// Service the item belongs to.
    pub service: String,
    /// Username of the item.
    pub username: String,
    /// Secret bytes, present only when requested.
    pub secret: Option<Vec<u8>>,
    /// Access control the item was written with, when the vault reports it.
    pub access_control: Option<AccessControl>,
}

impl std::fmt::Debug for VaultItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultItem")
            .field("service", &self.service)
            .field("username", &self.username)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("access_control", &self.access_control)
            .finish()
    }
}

/// Secure key/value storage keyed by `(service, username)`.
///
/// Implemented by the host over Keychain Services, Android Keystore, or any
/// equivalent. Every call may block on an authentication challenge; the
/// store never calls a vault from a latency-sensitive context on its own
/// behalf, so hosts must dispatch store calls off their UI thread.
///
/// Implementations must distinguish "no such item"
/// ([`super::VaultError::ItemNotFound`]) from "item exists but its gate
/// cannot be satisfied now" ([`super::VaultError::InteractionNotAllowed`]).
/// Any other status may be reported as [`super::VaultError::Native`].
#[uniffi::export(with_foreign)]
pub trait Vault: Send + Sync {
    /// Returns the items matching `query`, in enumeration order.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing matches or an item cannot be read.
    fn query(&self, query: VaultQuery) -> VaultResult<Vec<VaultItem>>;

    /// Stores a new item.
    ///
    /// # Errors
    ///
    /// Returns an error if the item already exists or cannot be written.
    fn add(
        &self,
        service: String,
        username: String,
        secret: Vec<u8>,
        access_control: AccessControl,
    ) -> VaultResult<()>;

    /// Replaces the secret and access control of an existing item.
    ///
    /// # Errors
    ///
    /// Returns an error if the item does not exist or cannot be written.
    fn update(
        &self,
        service: String,
        username: String,
        secret: Vec<u8>,
        access_control: AccessControl,
    ) -> VaultResult<()>;

    /// Deletes one item, or every item of the service when `username` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing matched or the delete failed.
    fn delete(&self, service: String, username: Option<String>) -> VaultResult<()>;
}
