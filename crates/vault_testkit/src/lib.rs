//! # Vault Testkit
//!
//! Test utilities for the vault.
//!
//! This crate provides:
//! - Fixture trees for the common scenarios
//! - Property-based generators for well-formed trees and mutation sequences
//! - A structural invariant checker for flat states
//!
//! ## Usage
//!
//! ```rust
//! use vault_testkit::prelude::*;
//!
//! let vault = scenarios::loaded_scenario();
//! assert!(check(vault.state()).is_empty());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod invariants;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::invariants::*;
}

pub use fixtures::*;
pub use generators::*;
pub use invariants::*;
