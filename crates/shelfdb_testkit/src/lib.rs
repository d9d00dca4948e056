//! # shelfdb Testkit
//!
//! Test utilities for shelfdb.
//!
//! This crate provides:
//! - A temporary accounts environment with a controllable provider registry
//!   and failure-injecting book databases
//! - Property-based test generators using proptest
//! - Helpers that lay out on-disk states left behind by older releases or
//!   interrupted writes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shelfdb_testkit::prelude::*;
//!
//! #[test]
//! fn creates_account() {
//!     let env = TestAccounts::new();
//!     let db = env.open().unwrap();
//!     db.create_account(provider("urn:lib", 10)).unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
