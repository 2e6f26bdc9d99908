//! Vault abstraction.
//!
//! The host supplies a [`Vault`] over its platform keystore. The store only
//! talks to it through [`VaultAdapter`], which collapses platform statuses
//! into the four [`VaultOutcome`]s the upsert logic branches on.

mod adapter;
mod error;
pub mod memory;
mod traits;

pub use adapter::{VaultAdapter, VaultOutcome};
pub use error::{status, VaultError, VaultResult};
pub use memory::InMemoryVault;
pub use traits::{Vault, VaultItem, VaultQuery};
