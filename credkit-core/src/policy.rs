//! Protection levels, strategies, and their vault access-control mapping.
//!
//! A [`SecurityLevel`] or [`SecurityStrategyName`] is what an application
//! chooses; an [`AccessControl`] is what the vault enforces. The mapping
//! between them is pure: [`ProtectionPolicy::resolve`] never consults device
//! state. Whether the device can actually satisfy a policy is answered
//! separately by [`crate::capability`].

use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::{CredentialError, CredentialResult};
use crate::types::CredentialOptions;

/// Seconds a successful user-presence challenge stays valid for a gated entry.
///
/// Platform keystores reject a zero duration for time-bound keys, so gated
/// strategies use a short non-zero window.
pub const USER_PRESENCE_VALIDITY_SECS: u32 = 100;

/// Ordered protection levels, weakest first.
///
/// `Ord` follows strength, so `L5BiometricEncrypted > L1Encrypted`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    uniffi::Enum,
)]
pub enum SecurityLevel {
    /// Encrypted at rest; readable by the app while the device is locked.
    #[strum(serialize = "L1_Encrypted")]
    L1Encrypted,
    /// The device must be unlocked to read the credential.
    #[strum(serialize = "L2_DeviceUnlocked")]
    L2DeviceUnlocked,
    /// A passcode or biometric challenge precedes every read.
    #[strum(serialize = "L3_UserPresence")]
    L3UserPresence,
    /// A biometric challenge precedes every read.
    #[strum(serialize = "L4_Biometrics")]
    L4Biometrics,
    /// Key material is bound to the current biometric enrollment.
    #[strum(serialize = "L5_BiometricEncrypted")]
    L5BiometricEncrypted,
}

impl SecurityLevel {
    /// Numeric rank used on the wire (1 = weakest, 5 = strongest).
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::L1Encrypted => 1,
            Self::L2DeviceUnlocked => 2,
            Self::L3UserPresence => 3,
            Self::L4Biometrics => 4,
            Self::L5BiometricEncrypted => 5,
        }
    }

    /// Looks a level up by its numeric rank.
    #[must_use]
    pub fn from_rank(rank: u8) -> Option<Self> {
        Self::iter().find(|level| level.rank() == rank)
    }

    /// Parses a level from its wire name (`L3_UserPresence`) or rank (`3`).
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Params`] for anything else.
    pub fn parse(name: &str) -> CredentialResult<Self> {
        if let Ok(level) = Self::from_str(name) {
            return Ok(level);
        }
        name.parse::<u8>()
            .ok()
            .and_then(Self::from_rank)
            .ok_or_else(|| {
                CredentialError::params("securityLevel", format!("unrecognized level '{name}'"))
            })
    }

    /// Returns the vault access control enforcing this level.
    #[must_use]
    pub const fn access_control(self) -> AccessControl {
        match self {
            Self::L1Encrypted => AccessControl::unguarded(Accessibility::AfterFirstUnlock),
            Self::L2DeviceUnlocked => AccessControl::unguarded(Accessibility::WhenUnlocked),
            Self::L3UserPresence => AccessControl {
                accessibility: Accessibility::WhenPasscodeSetThisDeviceOnly,
                authentication: Authentication::UserPresence,
                passcode_fallback: true,
                invalidated_by_enrollment_change: false,
                authentication_validity_secs: USER_PRESENCE_VALIDITY_SECS,
            },
            Self::L4Biometrics => AccessControl {
                accessibility: Accessibility::WhenPasscodeSetThisDeviceOnly,
                authentication: Authentication::BiometryAny,
                passcode_fallback: true,
                invalidated_by_enrollment_change: false,
                authentication_validity_secs: 0,
            },
            Self::L5BiometricEncrypted => AccessControl {
                accessibility: Accessibility::WhenPasscodeSetThisDeviceOnly,
                authentication: Authentication::BiometryCurrentSet,
                passcode_fallback: false,
                invalidated_by_enrollment_change: true,
                authentication_validity_secs: 0,
            },
        }
    }
}

impl Serialize for SecurityLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.rank())
    }
}

/// Named strategies, weakest first.
///
/// A strategy pairs a [`SecurityLevel`] with whether a biometric factor is
/// involved, which lets two strategies share a level but differ in the
/// authenticator they demand.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    uniffi::Enum,
)]
pub enum SecurityStrategyName {
    /// Encrypted at rest, no challenge.
    Standard,
    /// Encrypted at rest with an app-level biometric check before reveal.
    StandardPlusBioCheck,
    /// Device credential (PIN, pattern, passcode) challenge.
    PinUserPresence,
    /// Strong (class 3) biometric challenge.
    StrongUserPresence,
}

impl SecurityStrategyName {
    /// Parses a strategy from its wire name.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Params`] for unrecognized names.
    pub fn parse(name: &str) -> CredentialResult<Self> {
        Self::from_str(name).map_err(|_| {
            CredentialError::params("strategy", format!("unrecognized strategy '{name}'"))
        })
    }

    /// Returns the full strategy description.
    #[must_use]
    pub const fn strategy(self) -> SecurityStrategy {
        let (level, biometrics) = match self {
            Self::Standard => (SecurityLevel::L1Encrypted, false),
            Self::StandardPlusBioCheck => (SecurityLevel::L1Encrypted, true),
            Self::PinUserPresence => (SecurityLevel::L3UserPresence, false),
            Self::StrongUserPresence => (SecurityLevel::L3UserPresence, true),
        };
        SecurityStrategy {
            name: self,
            level,
            biometrics,
        }
    }

    /// Returns the vault access control enforcing this strategy.
    #[must_use]
    pub const fn access_control(self) -> AccessControl {
        match self {
            Self::Standard => SecurityLevel::L1Encrypted.access_control(),
            Self::StandardPlusBioCheck => AccessControl {
                accessibility: Accessibility::AfterFirstUnlock,
                authentication: Authentication::BiometryAny,
                passcode_fallback: false,
                invalidated_by_enrollment_change: false,
                authentication_validity_secs: 0,
            },
            Self::PinUserPresence => AccessControl {
                accessibility: Accessibility::WhenPasscodeSetThisDeviceOnly,
                authentication: Authentication::DevicePasscode,
                passcode_fallback: false,
                invalidated_by_enrollment_change: false,
                authentication_validity_secs: USER_PRESENCE_VALIDITY_SECS,
            },
            Self::StrongUserPresence => AccessControl {
                accessibility: Accessibility::WhenPasscodeSetThisDeviceOnly,
                authentication: Authentication::BiometryAny,
                passcode_fallback: false,
                invalidated_by_enrollment_change: false,
                authentication_validity_secs: USER_PRESENCE_VALIDITY_SECS,
            },
        }
    }
}

/// A strategy as reported to callers: `{ name, level, biometrics }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, uniffi::Record)]
pub struct SecurityStrategy {
    /// Strategy name.
    pub name: SecurityStrategyName,
    /// Level the strategy provides.
    pub level: SecurityLevel,
    /// Whether a biometric factor is involved.
    pub biometrics: bool,
}

/// When the vault allows the entry to be read at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, uniffi::Enum)]
pub enum Accessibility {
    /// Readable once the device has been unlocked after boot.
    AfterFirstUnlock,
    /// Readable only while the device is unlocked.
    WhenUnlocked,
    /// Readable only while unlocked on a device with a passcode; not migrated.
    WhenPasscodeSetThisDeviceOnly,
}

/// Which challenge gates a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, uniffi::Enum)]
pub enum Authentication {
    /// No challenge.
    None,
    /// Device passcode only.
    DevicePasscode,
    /// Passcode or any enrolled biometric.
    UserPresence,
    /// Any enrolled biometric.
    BiometryAny,
    /// Biometrics enrolled at write time; invalid after enrollment changes.
    BiometryCurrentSet,
}

/// Access-control configuration handed to the vault on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, uniffi::Record)]
#[serde(rename_all = "camelCase")]
pub struct AccessControl {
    /// When the entry is readable.
    pub accessibility: Accessibility,
    /// Challenge gating reads.
    pub authentication: Authentication,
    /// Whether a biometric challenge may fall back to the passcode.
    pub passcode_fallback: bool,
    /// Whether the entry becomes unreadable when biometric enrollment changes.
    pub invalidated_by_enrollment_change: bool,
    /// Seconds a passed challenge remains valid; 0 means every read.
    pub authentication_validity_secs: u32,
}

impl AccessControl {
    const fn unguarded(accessibility: Accessibility) -> Self {
        Self {
            accessibility,
            authentication: Authentication::None,
            passcode_fallback: false,
            invalidated_by_enrollment_change: false,
            authentication_validity_secs: 0,
        }
    }

    /// Whether reading the entry requires an interactive challenge.
    #[must_use]
    pub const fn requires_challenge(&self) -> bool {
        !matches!(self.authentication, Authentication::None)
    }
}

/// An application-chosen policy: a level or a named strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtectionPolicy {
    /// A protection level.
    Level(SecurityLevel),
    /// A named strategy.
    Strategy(SecurityStrategyName),
}

impl Default for ProtectionPolicy {
    fn default() -> Self {
        Self::Level(SecurityLevel::L1Encrypted)
    }
}

impl ProtectionPolicy {
    /// Builds the policy from write options. Absent options select
    /// [`SecurityLevel::L1Encrypted`].
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Params`] when both a level and a strategy
    /// are supplied.
    pub fn from_options(options: Option<&CredentialOptions>) -> CredentialResult<Self> {
        match options.map(|o| (o.security_level, o.strategy)) {
            None | Some((None, None)) => Ok(Self::default()),
            Some((Some(level), None)) => Ok(Self::Level(level)),
            Some((None, Some(strategy))) => Ok(Self::Strategy(strategy)),
            Some((Some(_), Some(_))) => Err(CredentialError::params(
                "options",
                "securityLevel and strategy are mutually exclusive",
            )),
        }
    }

    /// Parses a level or strategy name.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Params`] when the name is neither.
    pub fn parse(name: &str) -> CredentialResult<Self> {
        SecurityLevel::parse(name)
            .map(Self::Level)
            .or_else(|_| SecurityStrategyName::parse(name).map(Self::Strategy))
            .map_err(|_| {
                CredentialError::params(
                    "options",
                    format!("'{name}' is neither a security level nor a strategy"),
                )
            })
    }

    /// The level this policy provides.
    #[must_use]
    pub const fn level(self) -> SecurityLevel {
        match self {
            Self::Level(level) => level,
            Self::Strategy(name) => name.strategy().level,
        }
    }

    /// Maps the policy to the vault access control.
    #[must_use]
    pub const fn resolve(self) -> AccessControl {
        match self {
            Self::Level(level) => level.access_control(),
            Self::Strategy(name) => name.access_control(),
        }
    }
}

impl std::fmt::Display for ProtectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Level(level) => write!(f, "{level}"),
            Self::Strategy(name) => write!(f, "{name}"),
        }
    }
}

/// Resolves a level or strategy name to its access control.
///
/// # Errors
///
/// Returns [`CredentialError::Params`] for unrecognized names; there is no
/// fallback level.
#[uniffi::export]
#[allow(clippy::needless_pass_by_value)]
pub fn resolve_access_control(name: String) -> Result<AccessControl, CredentialError> {
    ProtectionPolicy::parse(&name).map(ProtectionPolicy::resolve)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::error::ErrorCode;

    #[test_case("L1_Encrypted", Accessibility::AfterFirstUnlock, Authentication::None ; "encrypted")]
    #[test_case("L2_DeviceUnlocked", Accessibility::WhenUnlocked, Authentication::None ; "device unlocked")]
    #[test_case("L3_UserPresence", Accessibility::WhenPasscodeSetThisDeviceOnly, Authentication::UserPresence ; "user presence")]
    #[test_case("L4_Biometrics", Accessibility::WhenPasscodeSetThisDeviceOnly, Authentication::BiometryAny ; "biometrics")]
    #[test_case("L5_BiometricEncrypted", Accessibility::WhenPasscodeSetThisDeviceOnly, Authentication::BiometryCurrentSet ; "biometric encrypted")]
    fn test_level_mapping(name: &str, accessibility: Accessibility, authentication: Authentication) {
        let control = resolve_access_control(name.to_string()).unwrap();
        assert_eq!(control.accessibility, accessibility);
        assert_eq!(control.authentication, authentication);
    }

    #[test]
    fn test_biometric_encrypted_is_enrollment_bound() {
        let control = SecurityLevel::L5BiometricEncrypted.access_control();
        assert!(control.invalidated_by_enrollment_change);
        assert!(!control.passcode_fallback);

        let control = SecurityLevel::L4Biometrics.access_control();
        assert!(!control.invalidated_by_enrollment_change);
        assert!(control.passcode_fallback);
    }

    #[test]
    fn test_user_presence_has_grace_window() {
        let control = SecurityLevel::L3UserPresence.access_control();
        assert_eq!(control.authentication_validity_secs, USER_PRESENCE_VALIDITY_SECS);
        assert!(control.requires_challenge());
        assert!(!SecurityLevel::L2DeviceUnlocked.access_control().requires_challenge());
    }

    #[test]
    fn test_levels_are_ordered_by_strength() {
        let levels: Vec<_> = SecurityLevel::iter().collect();
        assert!(levels.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(levels.first(), Some(&SecurityLevel::L1Encrypted));
        assert_eq!(levels.last(), Some(&SecurityLevel::L5BiometricEncrypted));
        assert!(SecurityStrategyName::StrongUserPresence > SecurityStrategyName::PinUserPresence);
        assert!(SecurityStrategyName::StandardPlusBioCheck > SecurityStrategyName::Standard);
    }

    #[test_case("3", SecurityLevel::L3UserPresence ; "rank")]
    #[test_case("L4_Biometrics", SecurityLevel::L4Biometrics ; "name")]
    fn test_level_parse(input: &str, expected: SecurityLevel) {
        assert_eq!(SecurityLevel::parse(input).unwrap(), expected);
    }

    #[test_case("L9_Quantum" ; "unknown name")]
    #[test_case("0" ; "rank zero")]
    #[test_case("6" ; "rank out of range")]
    #[test_case("" ; "empty")]
    #[test_case("standard" ; "wrong case strategy")]
    fn test_unrecognized_name_is_params(input: &str) {
        let err = resolve_access_control(input.to_string()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Params);
    }

    #[test]
    fn test_strategy_resolution() {
        let policy = ProtectionPolicy::parse("PinUserPresence").unwrap();
        assert_eq!(policy, ProtectionPolicy::Strategy(SecurityStrategyName::PinUserPresence));
        assert_eq!(policy.level(), SecurityLevel::L3UserPresence);
        assert_eq!(policy.resolve().authentication, Authentication::DevicePasscode);

        let standard = SecurityStrategyName::Standard.access_control();
        assert_eq!(standard, SecurityLevel::L1Encrypted.access_control());
    }

    #[test]
    fn test_policy_from_options() {
        assert_eq!(
            ProtectionPolicy::from_options(None).unwrap(),
            ProtectionPolicy::Level(SecurityLevel::L1Encrypted)
        );

        let options = CredentialOptions {
            security_level: Some(SecurityLevel::L2DeviceUnlocked),
            strategy: None,
        };
        assert_eq!(
            ProtectionPolicy::from_options(Some(&options)).unwrap(),
            ProtectionPolicy::Level(SecurityLevel::L2DeviceUnlocked)
        );

        let both = CredentialOptions {
            security_level: Some(SecurityLevel::L2DeviceUnlocked),
            strategy: Some(SecurityStrategyName::Standard),
        };
        let err = ProtectionPolicy::from_options(Some(&both)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Params);
    }

    #[test]
    fn test_level_serializes_as_rank() {
        let strategy = SecurityStrategyName::StrongUserPresence.strategy();
        let json = serde_json::to_value(strategy).unwrap();
        assert_eq!(json["name"], "StrongUserPresence");
        assert_eq!(json["level"], 3);
        assert_eq!(json["biometrics"], true);
    }
}
