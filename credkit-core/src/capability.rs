//! Device capability queries.
//!
//! The host probes the platform (lock screen, biometric enrollment, sensor
//! hardware) through a [`SensorProbe`] and hands back a [`DeviceCapabilities`]
//! snapshot. Everything else in this module is a pure function of that
//! snapshot, so capability decisions can be tested with fixtures instead of
//! real device state.

use serde::Serialize;
use strum::IntoEnumIterator;

use crate::policy::{ProtectionPolicy, SecurityLevel, SecurityStrategy, SecurityStrategyName};

/// Biometric sensor hardware advertised by the device.
///
/// Not every platform reports sensors, and enrollment is tracked separately
/// in [`DeviceCapabilities`]; treat this as informational.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, uniffi::Record)]
pub struct BiometricSensors {
    /// Face recognition hardware.
    pub face: bool,
    /// Fingerprint reader.
    pub fingerprint: bool,
    /// Iris scanner.
    pub iris: bool,
}

/// Snapshot of the device's authentication support.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, uniffi::Record)]
pub struct DeviceCapabilities {
    /// A passcode, PIN, or pattern is configured.
    pub device_secure: bool,
    /// Strong (class 3) biometrics are enrolled and usable.
    pub strong_biometrics: bool,
    /// Weak (class 2) biometrics are enrolled and usable.
    pub weak_biometrics: bool,
    /// Sensor hardware present on the device.
    pub sensors: BiometricSensors,
}

/// Platform capability probe, implemented by the host application.
#[uniffi::export(with_foreign)]
pub trait SensorProbe: Send + Sync {
    /// Returns the current capability snapshot.
    ///
    /// Called on every write and capability query; enrollment may change
    /// during the application's lifetime.
    fn probe(&self) -> DeviceCapabilities;
}

/// A probe that always reports the same snapshot.
#[derive(Debug, Clone, Copy)]
pub struct StaticSensorProbe(pub DeviceCapabilities);

impl SensorProbe for StaticSensorProbe {
    fn probe(&self) -> DeviceCapabilities {
        self.0
    }
}

impl DeviceCapabilities {
    /// A device with a passcode and strong biometrics enrolled.
    #[must_use]
    pub const fn fully_secured() -> Self {
        Self {
            device_secure: true,
            strong_biometrics: true,
            weak_biometrics: true,
            sensors: BiometricSensors {
                face: false,
                fingerprint: true,
                iris: false,
            },
        }
    }

    /// A device with a passcode and no biometrics.
    #[must_use]
    pub const fn passcode_only() -> Self {
        Self {
            device_secure: true,
            strong_biometrics: false,
            weak_biometrics: false,
            sensors: BiometricSensors {
                face: false,
                fingerprint: false,
                iris: false,
            },
        }
    }

    const fn any_biometrics(&self) -> bool {
        self.strong_biometrics || self.weak_biometrics
    }

    /// Whether the device can currently enforce `level`.
    #[must_use]
    pub const fn supports_level(&self, level: SecurityLevel) -> bool {
        match level {
            SecurityLevel::L1Encrypted | SecurityLevel::L2DeviceUnlocked => true,
            SecurityLevel::L3UserPresence => self.device_secure,
            SecurityLevel::L4Biometrics => self.device_secure && self.any_biometrics(),
            SecurityLevel::L5BiometricEncrypted => self.device_secure && self.strong_biometrics,
        }
    }

    /// Whether the device can currently enforce strategy `name`.
    #[must_use]
    pub const fn supports_strategy(&self, name: SecurityStrategyName) -> bool {
        match name {
            SecurityStrategyName::Standard => true,
            SecurityStrategyName::StandardPlusBioCheck => self.any_biometrics(),
            SecurityStrategyName::PinUserPresence => self.device_secure,
            SecurityStrategyName::StrongUserPresence => {
                self.device_secure && self.strong_biometrics
            }
        }
    }

    /// Whether the device can currently enforce `policy`.
    #[must_use]
    pub const fn supports(&self, policy: ProtectionPolicy) -> bool {
        match policy {
            ProtectionPolicy::Level(level) => self.supports_level(level),
            ProtectionPolicy::Strategy(name) => self.supports_strategy(name),
        }
    }

    /// Satisfiable levels, strongest first.
    #[must_use]
    pub fn available_levels(&self) -> Vec<SecurityLevel> {
        SecurityLevel::iter()
            .rev()
            .filter(|level| self.supports_level(*level))
            .collect()
    }

    /// Satisfiable strategies, strongest first.
    #[must_use]
    pub fn available_strategies(&self) -> Vec<SecurityStrategy> {
        SecurityStrategyName::iter()
            .rev()
            .filter(|name| self.supports_strategy(*name))
            .map(SecurityStrategyName::strategy)
            .collect()
    }

    /// The strongest satisfiable level.
    #[must_use]
    pub fn maximum_level(&self) -> SecurityLevel {
        // L1 is always satisfiable.
        self.available_levels()
            .first()
            .copied()
            .unwrap_or(SecurityLevel::L1Encrypted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insecure_device_only_offers_unguarded_levels() {
        let caps = DeviceCapabilities::default();
        assert_eq!(
            caps.available_levels(),
            vec![SecurityLevel::L2DeviceUnlocked, SecurityLevel::L1Encrypted]
        );
        assert_eq!(caps.maximum_level(), SecurityLevel::L2DeviceUnlocked);

        let names: Vec<_> = caps.available_strategies().iter().map(|s| s.name).collect();
        assert_eq!(names, vec![SecurityStrategyName::Standard]);
    }

    #[test]
    fn test_passcode_device_tops_out_at_user_presence() {
        let caps = DeviceCapabilities::passcode_only();
        assert_eq!(caps.maximum_level(), SecurityLevel::L3UserPresence);
        assert!(!caps.supports_level(SecurityLevel::L4Biometrics));

        let names: Vec<_> = caps.available_strategies().iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![SecurityStrategyName::PinUserPresence, SecurityStrategyName::Standard]
        );
    }

    #[test]
    fn test_weak_biometrics_do_not_unlock_biometric_encryption() {
        let caps = DeviceCapabilities {
            device_secure: true,
            strong_biometrics: false,
            weak_biometrics: true,
            sensors: BiometricSensors {
                face: true,
                ..BiometricSensors::default()
            },
        };
        assert_eq!(caps.maximum_level(), SecurityLevel::L4Biometrics);
        assert!(!caps.supports_level(SecurityLevel::L5BiometricEncrypted));
        assert!(caps.supports_strategy(SecurityStrategyName::StandardPlusBioCheck));
        assert!(!caps.supports_strategy(SecurityStrategyName::StrongUserPresence));
    }

    #[test]
    fn test_fully_secured_device_lists_everything_strongest_first() {
        let caps = DeviceCapabilities::fully_secured();
        assert_eq!(caps.maximum_level(), SecurityLevel::L5BiometricEncrypted);
        assert_eq!(caps.available_levels().len(), 5);

        let strategies = caps.available_strategies();
        let names: Vec<_> = strategies.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                SecurityStrategyName::StrongUserPresence,
                SecurityStrategyName::PinUserPresence,
                SecurityStrategyName::StandardPlusBioCheck,
                SecurityStrategyName::Standard,
            ]
        );
        assert!(strategies[0].biometrics);
        assert!(!strategies[1].biometrics);
    }

    #[test]
    fn test_static_probe_returns_snapshot() {
        let probe = StaticSensorProbe(DeviceCapabilities::passcode_only());
        assert_eq!(probe.probe(), DeviceCapabilities::passcode_only());
    }
}
