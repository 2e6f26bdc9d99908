//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use credkit_core::{BiometricSensors, DeviceCapabilities};

/// CredKit developer CLI: store and inspect credentials in a local encrypted vault.
#[derive(Parser, Debug)]
#[command(name = "credkit", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the vault and its key.
    #[arg(long, env = "CREDKIT_HOME", global = true)]
    pub home: Option<PathBuf>,

    /// Log CredKit debug output to stderr.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub device: DeviceArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Simulated device authentication profile.
#[derive(Args, Debug, Clone)]
pub struct DeviceArgs {
    /// The device has a passcode configured (default).
    #[arg(long, global = true, overrides_with = "no_passcode")]
    pub passcode: bool,

    /// The device has no passcode configured.
    #[arg(long, global = true, overrides_with = "passcode")]
    pub no_passcode: bool,

    /// Enrolled biometric class.
    #[arg(long, global = true, value_enum, env = "CREDKIT_BIOMETRICS", default_value_t = BiometricClass::None)]
    pub biometrics: BiometricClass,

    /// Biometric sensor hardware, comma separated.
    #[arg(long, global = true, value_enum, value_delimiter = ',')]
    pub sensors: Vec<Sensor>,
}

/// Biometric enrollment strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BiometricClass {
    /// Nothing enrolled.
    None,
    /// Class 2 (convenience) biometrics.
    Weak,
    /// Class 3 biometrics.
    Strong,
}

/// Biometric sensor kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Sensor {
    /// Face recognition.
    Face,
    /// Fingerprint reader.
    Fingerprint,
    /// Iris scanner.
    Iris,
}

impl DeviceArgs {
    /// Builds the capability snapshot the flags describe.
    pub fn capabilities(&self) -> DeviceCapabilities {
        let device_secure = self.passcode || !self.no_passcode;
        // Biometrics cannot be enrolled without a passcode.
        let enrolled = if device_secure {
            self.biometrics
        } else {
            BiometricClass::None
        };
        DeviceCapabilities {
            device_secure,
            strong_biometrics: enrolled == BiometricClass::Strong,
            weak_biometrics: enrolled != BiometricClass::None,
            sensors: BiometricSensors {
                face: self.sensors.contains(&Sensor::Face),
                fingerprint: self.sensors.contains(&Sensor::Fingerprint),
                iris: self.sensors.contains(&Sensor::Iris),
            },
        }
    }
}

/// Subcommands. Each prints a JSON response envelope.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store a credential, replacing any existing password.
    Set {
        /// Service the credential belongs to.
        service: String,
        /// Account name.
        username: String,
        /// Password to store.
        #[arg(long, env = "CREDKIT_PASSWORD", hide_env_values = true)]
        password: String,
        /// Protection level, by name (`L3_UserPresence`) or rank (`3`).
        #[arg(long, conflicts_with = "strategy")]
        level: Option<String>,
        /// Named protection strategy (`PinUserPresence`, ...).
        #[arg(long)]
        strategy: Option<String>,
    },

    /// Print a stored credential.
    Get {
        /// Service the credential belongs to.
        service: String,
        /// Account name.
        username: String,
    },

    /// List the usernames stored for a service.
    List {
        /// Service to list.
        service: String,
    },

    /// Remove one credential.
    Remove {
        /// Service the credential belongs to.
        service: String,
        /// Account name.
        username: String,
    },

    /// Remove every credential of a service.
    RemoveAll {
        /// Service to clear.
        service: String,
    },

    /// Show the strategies the device profile supports, strongest first.
    Strategies,

    /// Show the strongest level the device profile supports.
    MaxLevel,

    /// Show the biometric sensors of the device profile.
    Sensors,

    /// Rebuild the account index of a service from its stored credentials.
    Reconcile {
        /// Service to repair.
        service: String,
    },

    /// Send a raw bridge request, e.g. `call getUsernames '{"service":"bank"}'`.
    Call {
        /// Bridge method name.
        method: String,
        /// JSON request body.
        #[arg(default_value = "{}")]
        payload: String,
    },
}
