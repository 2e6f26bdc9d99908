//! Typed wrapper collapsing vault statuses into four outcomes.

use std::sync::Arc;

use crate::error::{CredentialError, CredentialResult};
use crate::policy::AccessControl;

use super::error::{status, VaultError, VaultResult};
use super::traits::{Vault, VaultItem, VaultQuery};

/// Uniform result of a vault primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultOutcome<T> {
    /// The primitive succeeded.
    Ok(T),
    /// No matching item exists.
    NotFound,
    /// The item exists but cannot be read or authenticated against right now.
    InteractionNotAllowed,
    /// Any other failure, with the native status description.
    OtherFailure(String),
}

impl<T> VaultOutcome<T> {
    /// Applies `f` to the success value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> VaultOutcome<U> {
        match self {
            Self::Ok(value) => VaultOutcome::Ok(f(value)),
            Self::NotFound => VaultOutcome::NotFound,
            Self::InteractionNotAllowed => VaultOutcome::InteractionNotAllowed,
            Self::OtherFailure(detail) => VaultOutcome::OtherFailure(detail),
        }
    }

    /// Converts to a store result, naming `subject` in the error message.
    ///
    /// # Errors
    ///
    /// `NotFound` becomes [`CredentialError::NoData`], `InteractionNotAllowed`
    /// becomes [`CredentialError::FailedToAccess`], and `OtherFailure` becomes
    /// [`CredentialError::Unknown`] carrying the native description.
    pub fn settle(self, subject: &str) -> CredentialResult<T> {
        match self {
            Self::Ok(value) => Ok(value),
            Self::NotFound => Err(CredentialError::NoData(format!("nothing stored for {subject}"))),
            Self::InteractionNotAllowed => Err(CredentialError::FailedToAccess(format!(
                "could not authenticate access to {subject}"
            ))),
            Self::OtherFailure(detail) => Err(CredentialError::Unknown(detail)),
        }
    }
}

impl VaultOutcome<()> {
    /// Treats `NotFound` as success, for deletes.
    #[must_use]
    pub fn or_absent(self) -> Self {
        match self {
            Self::NotFound => Self::Ok(()),
            other => other,
        }
    }
}

impl<T> From<VaultResult<T>> for VaultOutcome<T> {
    fn from(result: VaultResult<T>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(error) => classify(error),
        }
    }
}

fn classify<T>(error: VaultError) -> VaultOutcome<T> {
    match error {
        VaultError::ItemNotFound => VaultOutcome::NotFound,
        VaultError::InteractionNotAllowed => VaultOutcome::InteractionNotAllowed,
        VaultError::Native { status, description } => match status {
            status::ITEM_NOT_FOUND => VaultOutcome::NotFound,
            status::INTERACTION_NOT_ALLOWED | status::AUTH_FAILED | status::USER_CANCELED => {
                VaultOutcome::InteractionNotAllowed
            }
            _ => VaultOutcome::OtherFailure(format!("{description} (OSStatus {status})")),
        },
        VaultError::UnexpectedUniFFICallbackError(reason) => {
            VaultOutcome::OtherFailure(format!("vault callback failed: {reason}"))
        }
    }
}

/// Typed access to a [`Vault`].
#[derive(Clone)]
pub struct VaultAdapter {
    vault: Arc<dyn Vault>,
}

impl std::fmt::Debug for VaultAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultAdapter").finish_non_exhaustive()
    }
}

impl VaultAdapter {
    /// Wraps a vault.
    #[must_use]
    pub fn new(vault: Arc<dyn Vault>) -> Self {
        Self { vault }
    }

    /// Runs a query. A query matching nothing is `NotFound`.
    pub fn query(&self, query: VaultQuery) -> VaultOutcome<Vec<VaultItem>> {
        match VaultOutcome::from(self.vault.query(query)) {
            VaultOutcome::Ok(items) if items.is_empty() => VaultOutcome::NotFound,
            outcome => outcome,
        }
    }

    /// Runs a single-item query and returns the first match.
    pub fn query_one(&self, query: VaultQuery) -> VaultOutcome<VaultItem> {
        match self.query(query) {
            VaultOutcome::Ok(items) => items
                .into_iter()
                .next()
                .map_or(VaultOutcome::NotFound, VaultOutcome::Ok),
            VaultOutcome::NotFound => VaultOutcome::NotFound,
            VaultOutcome::InteractionNotAllowed => VaultOutcome::InteractionNotAllowed,
            VaultOutcome::OtherFailure(detail) => VaultOutcome::OtherFailure(detail),
        }
    }

    /// Adds a new item.
    pub fn add(
        &self,
        service: &str,
        username: &str,
        secret: &[u8],
        access_control: AccessControl,
    ) -> VaultOutcome<()> {
        self.vault
            .add(
                service.to_string(),
                username.to_string(),
                secret.to_vec(),
                access_control,
            )
            .into()
    }

    /// Updates an existing item.
    pub fn update(
        &self,
        service: &str,
        username: &str,
        secret: &[u8],
        access_control: AccessControl,
    ) -> VaultOutcome<()> {
        self.vault
            .update(
                service.to_string(),
                username.to_string(),
                secret.to_vec(),
                access_control,
            )
            .into()
    }

    /// Deletes one item, or the whole service when `username` is `None`.
    pub fn delete(&self, service: &str, username: Option<&str>) -> VaultOutcome<()> {
        self.vault
            .delete(service.to_string(), username.map(str::to_string))
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::vault::memory::{InMemoryVault, VaultOperation};

    #[test]
    fn test_native_statuses_collapse() {
        let outcome: VaultOutcome<()> =
            Err(VaultError::native(status::ITEM_NOT_FOUND, "errSecItemNotFound")).into();
        assert_eq!(outcome, VaultOutcome::NotFound);

        for code in [
            status::INTERACTION_NOT_ALLOWED,
            status::AUTH_FAILED,
            status::USER_CANCELED,
        ] {
            let outcome: VaultOutcome<()> = Err(VaultError::native(code, "denied")).into();
            assert_eq!(outcome, VaultOutcome::InteractionNotAllowed);
        }

        let outcome: VaultOutcome<()> =
            Err(VaultError::native(status::DUPLICATE_ITEM, "errSecDuplicateItem")).into();
        assert_eq!(
            outcome,
            VaultOutcome::OtherFailure("errSecDuplicateItem (OSStatus -25299)".to_string())
        );
    }

    #[test]
    fn test_callback_errors_are_other_failures() {
        let outcome: VaultOutcome<()> =
            Err(VaultError::UnexpectedUniFFICallbackError("panic".to_string())).into();
        assert!(matches!(outcome, VaultOutcome::OtherFailure(detail) if detail.contains("panic")));
    }

    #[test]
    fn test_empty_query_is_not_found() {
        let adapter = VaultAdapter::new(Arc::new(InMemoryVault::new()));
        assert_eq!(
            adapter.query(VaultQuery::enumerate("bank")),
            VaultOutcome::NotFound
        );
        assert_eq!(
            adapter.query_one(VaultQuery::existence("bank", "alice")),
            VaultOutcome::NotFound
        );
    }

    #[test]
    fn test_settle_maps_to_codes() {
        let err = VaultOutcome::<()>::NotFound.settle("bank/alice").unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoData);
        let err = VaultOutcome::<()>::InteractionNotAllowed
            .settle("bank/alice")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::FailedToAccess);
        let err = VaultOutcome::<()>::OtherFailure("disk full".to_string())
            .settle("bank/alice")
            .unwrap_err();
        assert_eq!(err, CredentialError::Unknown("disk full".to_string()));
    }

    #[test]
    fn test_delete_absent_is_ok_when_idempotent() {
        let vault = Arc::new(InMemoryVault::new());
        let adapter = VaultAdapter::new(vault.clone());
        assert_eq!(adapter.delete("bank", Some("alice")), VaultOutcome::NotFound);
        assert_eq!(adapter.delete("bank", Some("alice")).or_absent(), VaultOutcome::Ok(()));

        vault.fail_next(VaultOperation::Delete, VaultError::native(-34, "errSecDiskFull"));
        assert!(matches!(
            adapter.delete("bank", None).or_absent(),
            VaultOutcome::OtherFailure(_)
        ));
    }
}
