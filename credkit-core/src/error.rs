//! Error types for credential store operations.

use serde::Serialize;
use thiserror::Error;

/// Result type for credential store operations.
pub type CredentialResult<T> = Result<T, CredentialError>;

/// Closed set of failure codes reported across the bridge.
///
/// Serialized in camelCase (`failedToAccess`, `noData`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, uniffi::Enum)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    /// The entry exists but the authentication challenge failed or was cancelled.
    FailedToAccess,
    /// The requested entry does not exist.
    NoData,
    /// The device cannot currently satisfy the requested protection level.
    Unavailable,
    /// The caller violated the request contract.
    Params,
    /// Any other vault failure.
    Unknown,
}

impl ErrorCode {
    /// Returns the wire name of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FailedToAccess => "failedToAccess",
            Self::NoData => "noData",
            Self::Unavailable => "unavailable",
            Self::Params => "params",
            Self::Unknown => "unknown",
        }
    }
}

/// Errors returned by the credential store.
///
/// Each variant maps to exactly one [`ErrorCode`]. Vault statuses never reach
/// this type unclassified; see [`crate::vault::VaultAdapter`].
#[derive(Debug, Clone, PartialEq, Eq, Error, uniffi::Error)]
pub enum CredentialError {
    /// The authentication challenge guarding the entry failed or was cancelled.
    #[error("failed to access credential: {0}")]
    FailedToAccess(String),

    /// The requested credential does not exist.
    #[error("no data: {0}")]
    NoData(String),

    /// The requested protection level cannot be satisfied on this device.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// A required field is missing or invalid.
    #[error("invalid parameter '{parameter}': {reason}")]
    Params {
        /// Name of the offending field.
        parameter: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The vault reported a failure that is not otherwise classified.
    #[error("vault failure: {0}")]
    Unknown(String),
}

impl CredentialError {
    /// Creates a [`CredentialError::Params`] error.
    pub fn params<P: Into<String>, R: Into<String>>(parameter: P, reason: R) -> Self {
        Self::Params {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Returns the wire code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::FailedToAccess(_) => ErrorCode::FailedToAccess,
            Self::NoData(_) => ErrorCode::NoData,
            Self::Unavailable(_) => ErrorCode::Unavailable,
            Self::Params { .. } => ErrorCode::Params,
            Self::Unknown(_) => ErrorCode::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_serialize_camel_case() {
        let json = serde_json::to_string(&ErrorCode::FailedToAccess).unwrap();
        assert_eq!(json, "\"failedToAccess\"");
        let json = serde_json::to_string(&ErrorCode::NoData).unwrap();
        assert_eq!(json, "\"noData\"");
        assert_eq!(ErrorCode::Params.as_str(), "params");
    }

    #[test]
    fn test_error_display_and_code() {
        let err = CredentialError::params("service", "must not be empty");
        assert_eq!(err.code(), ErrorCode::Params);
        assert!(err.to_string().contains("service"));

        let err = CredentialError::Unknown("errSecDecode (OSStatus -26275)".to_string());
        assert_eq!(err.code(), ErrorCode::Unknown);
        assert!(err.to_string().contains("-26275"));
    }
}
