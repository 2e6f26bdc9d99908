//! Distribution crate for CredKit.
//!
//! Re-exports [`credkit_core`] and its `UniFFI` scaffolding so a single
//! library can be built for Swift and Kotlin binding generation.

pub use credkit_core::*;

credkit_core::uniffi_reexport_scaffolding!();
