//! Errors raised by vault implementations.

use thiserror::Error;

/// Result type for vault primitives.
pub type VaultResult<T> = Result<T, VaultError>;

/// Keychain `OSStatus` values the adapter understands.
///
/// Android and other backends either raise the dedicated [`VaultError`]
/// variants or reuse these codes in [`VaultError::Native`].
pub mod status {
    /// `errSecUserCanceled`
    pub const USER_CANCELED: i32 = -128;
    /// `errSecAuthFailed`
    pub const AUTH_FAILED: i32 = -25293;
    /// `errSecDuplicateItem`
    pub const DUPLICATE_ITEM: i32 = -25299;
    /// `errSecItemNotFound`
    pub const ITEM_NOT_FOUND: i32 = -25300;
    /// `errSecInteractionNotAllowed`
    pub const INTERACTION_NOT_ALLOWED: i32 = -25308;
}

/// Failure reported by a [`super::Vault`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error, uniffi::Error)]
pub enum VaultError {
    /// No item matches the query.
    #[error("item not found")]
    ItemNotFound,

    /// The item exists but its access-control gate cannot be satisfied now.
    #[error("interaction not allowed")]
    InteractionNotAllowed,

    /// Any other platform status.
    #[error("{description} (status {status})")]
    Native {
        /// Platform status code.
        status: i32,
        /// Human-readable description of the status.
        description: String,
    },

    /// Unexpected `UniFFI` callback error.
    #[error("unexpected uniffi callback error: {0}")]
    UnexpectedUniFFICallbackError(String),
}

impl VaultError {
    /// Creates a [`VaultError::Native`] error.
    pub fn native<S: Into<String>>(status: i32, description: S) -> Self {
        Self::Native {
            status,
            description: description.into(),
        }
    }
}

impl From<uniffi::UnexpectedUniFFICallbackError> for VaultError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedUniFFICallbackError(error.reason)
    }
}
