//! `credkit` developer CLI.
//!
//! Drives the credential store against an encrypted vault on disk, with a
//! device authentication profile taken from flags. Output is the same JSON
//! envelope the bridge produces.

mod cli;
mod commands;
mod file_vault;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; --verbose enables CredKit debug output.
    let default_filter = if cli.verbose {
        "credkit=debug,credkit_core=debug"
    } else {
        "credkit=warn,credkit_core=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if !commands::execute(cli)? {
        std::process::exit(1);
    }
    Ok(())
}
