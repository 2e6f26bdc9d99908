//! `credkit-core` stores username/password credentials in a platform vault
//! (Keychain, Android Keystore, ...) behind a protection policy chosen per
//! credential.
//!
//! The host supplies a [`vault::Vault`] and a [`SensorProbe`]; the crate
//! supplies the policy mapping, the account index used for prompt-free
//! listing, and the write state machine in [`CredentialStore`].
//! [`CredentialBridge`] exposes the same operations as JSON envelopes for
//! plugin-style transports.

mod error;
pub use error::*;

pub mod capability;
pub use capability::{BiometricSensors, DeviceCapabilities, SensorProbe, StaticSensorProbe};

pub mod policy;
pub use policy::{
    resolve_access_control, AccessControl, Accessibility, Authentication, ProtectionPolicy,
    SecurityLevel, SecurityStrategy, SecurityStrategyName,
};

mod types;
pub use types::*;

pub mod vault;

pub mod index;
pub use index::AccountIndex;

mod store;
pub use store::CredentialStore;

pub mod bridge;
pub use bridge::{CredentialBridge, Response};

pub mod logger;

uniffi::setup_scaffolding!("credkit_core");
