//! # embedoc testkit
//!
//! Test utilities for embedoc.
//!
//! This crate provides:
//! - Fixtures pairing a bridge with an in-memory engine and a temp directory
//! - Release auditing against the engine's allocation counters
//! - Property-based generators for host object graphs
//! - Test logging setup
//!
//! ## Usage
//!
//! ```rust
//! use embedoc_testkit::prelude::*;
//!
//! with_test_db(|db| {
//!     let users = db.create_collection("users").unwrap();
//!     users.insert_object(&host_object(serde_json::json!({"name": "a"}))).unwrap();
//!     assert_eq!(users.count().unwrap(), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
