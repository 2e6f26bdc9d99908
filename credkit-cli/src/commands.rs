//! Command execution.

use std::path::PathBuf;
use std::sync::Arc;

use credkit_core::{
    Credential, CredentialBridge, CredentialOptions, CredentialResult, CredentialStore, Response,
    SecurityLevel, SecurityStrategyName, StaticSensorProbe,
};
use eyre::{eyre, WrapErr};
use serde::Serialize;

use crate::cli::{Cli, Command};
use crate::file_vault::FileVault;

fn vault_dir(home: Option<PathBuf>) -> eyre::Result<PathBuf> {
    home.or_else(|| dirs::data_dir().map(|dir| dir.join("credkit")))
        .ok_or_else(|| eyre!("no data directory on this platform; pass --home or set CREDKIT_HOME"))
}

fn options(level: Option<&str>, strategy: Option<&str>) -> CredentialResult<CredentialOptions> {
    Ok(CredentialOptions {
        security_level: level.map(SecurityLevel::parse).transpose()?,
        strategy: strategy.map(SecurityStrategyName::parse).transpose()?,
    })
}

fn emit<T: Serialize>(response: &Response<T>) -> eyre::Result<bool> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(response.is_success())
}

/// Runs the parsed command. Returns whether the operation succeeded.
///
/// # Errors
///
/// Returns an error if the vault cannot be opened or output cannot be written.
pub fn execute(cli: Cli) -> eyre::Result<bool> {
    let dir = vault_dir(cli.home)?;
    let vault = FileVault::open(&dir)
        .wrap_err_with(|| format!("failed to open vault at {}", dir.display()))?;
    let caps = cli.device.capabilities();
    tracing::debug!(dir = %dir.display(), ?caps, "opened vault");

    let store = Arc::new(CredentialStore::new(
        Arc::new(vault),
        Arc::new(StaticSensorProbe(caps)),
    ));

    match cli.command {
        Command::Set {
            service,
            username,
            password,
            level,
            strategy,
        } => {
            let credential = Credential { username, password };
            let result = options(level.as_deref(), strategy.as_deref())
                .and_then(|options| store.set(&service, &credential, Some(&options)));
            emit(&Response::void(result))
        }
        Command::Get { service, username } => emit(&Response::value(store.get(&service, &username))),
        Command::List { service } => emit(&Response::value(store.list(&service))),
        Command::Remove { service, username } => {
            emit(&Response::void(store.remove(&service, &username)))
        }
        Command::RemoveAll { service } => emit(&Response::void(store.remove_all(&service))),
        Command::Strategies => emit(&Response::value(Ok(store.available_security_strategies()))),
        Command::MaxLevel => emit(&Response::value(Ok(store.maximum_security_level()))),
        Command::Sensors => emit(&Response::value(Ok(store.supported_biometric_sensors()))),
        Command::Reconcile { service } => {
            let result = store.reconcile(&service);
            if let Ok(report) = &result {
                if !report.is_clean() {
                    tracing::info!(
                        restored = report.restored.len(),
                        pruned = report.pruned.len(),
                        "account index repaired"
                    );
                }
            }
            emit(&Response::value(result))
        }
        Command::Call { method, payload } => {
            let bridge = CredentialBridge::new(store);
            let response = bridge.dispatch(&method, &payload);
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(response["success"].as_bool().unwrap_or(false))
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn run(home: &std::path::Path, args: &[&str]) -> bool {
        let mut argv = vec!["credkit", "--home", home.to_str().expect("utf-8 path")];
        argv.extend_from_slice(args);
        execute(Cli::try_parse_from(argv).expect("parse")).expect("execute")
    }

    #[test]
    fn test_set_get_remove_cycle() {
        let home = tempfile::tempdir().expect("tempdir");
        assert!(run(home.path(), &["set", "bank", "alice", "--password", "s3cr3t"]));
        assert!(run(home.path(), &["get", "bank", "alice"]));
        assert!(run(home.path(), &["list", "bank"]));
        assert!(run(home.path(), &["remove", "bank", "alice"]));
        assert!(!run(home.path(), &["get", "bank", "alice"]));
        assert!(run(home.path(), &["remove-all", "bank"]));
    }

    #[test]
    fn test_unavailable_level_fails() {
        let home = tempfile::tempdir().expect("tempdir");
        assert!(!run(
            home.path(),
            &["set", "bank", "alice", "--password", "pw", "--level", "L5_BiometricEncrypted"]
        ));
        assert!(run(
            home.path(),
            &[
                "--biometrics",
                "strong",
                "set",
                "bank",
                "alice",
                "--password",
                "pw",
                "--level",
                "5"
            ]
        ));
    }

    #[test]
    fn test_bad_level_name_fails() {
        let home = tempfile::tempdir().expect("tempdir");
        assert!(!run(
            home.path(),
            &["set", "bank", "alice", "--password", "pw", "--level", "L9"]
        ));
    }

    #[test]
    fn test_raw_bridge_call() {
        let home = tempfile::tempdir().expect("tempdir");
        assert!(run(
            home.path(),
            &[
                "call",
                "setCredential",
                r#"{"service":"bank","credential":{"username":"alice","password":"pw"}}"#
            ]
        ));
        assert!(run(home.path(), &["call", "getUsernames", r#"{"service":"bank"}"#]));
        assert!(!run(home.path(), &["call", "explode"]));
        assert!(run(home.path(), &["reconcile", "bank"]));
    }
}
