//! # embedoc bridge
//!
//! Host-facing adapter over the embedoc engine ABI.
//!
//! A garbage-collected host sees engine resources as wrapper objects and
//! plain data. This crate provides:
//!
//! - **Handle lifetime**: every engine resource is owned by an
//!   [`ExternalHandle`] and released exactly once, explicitly or when the
//!   last reference drops
//! - **Typed wrappers**: [`Value`], [`Document`], [`Array`], [`ObjectId`],
//!   [`UtcDateTime`], [`Cursor`], [`Database`] and [`Collection`]
//! - **Conversion**: host object graphs ([`HostObject`], [`HostValue`]) to
//!   engine documents and back, with an explicit numeric policy
//! - **Errors**: one [`BridgeError`] type carrying the engine's last error
//!
//! ## Example
//!
//! ```rust
//! use embedoc_bridge::prelude::*;
//! use embedoc_engine::MemoryEngine;
//! use std::rc::Rc;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let bridge = Bridge::new(Rc::new(MemoryEngine::new()));
//! let db = bridge.open(dir.path().join("app.db")).unwrap();
//!
//! let users = db.create_collection("users").unwrap();
//! users
//!     .insert_object(&HostObject::new().with("name", "a").with("age", 3))
//!     .unwrap();
//!
//! let filter = bridge.to_document(&HostObject::new().with("name", "a")).unwrap();
//! let cursor = users.find(Some(&filter)).unwrap();
//! assert_eq!(cursor.step().unwrap(), CursorState::HasRow);
//! let row = cursor.get().unwrap().unwrap().get_document().unwrap();
//! assert_eq!(row.get("age").unwrap().unwrap().get_int64().unwrap(), 3);
//! assert_eq!(cursor.step().unwrap(), CursorState::Exhausted);
//!
//! db.close();
//! ```
//!
//! ## Threading
//!
//! Handles are `Rc`-based and therefore confined to the thread that created
//! them. The engine behind a bridge may itself be shared.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod array;
mod bridge;
mod codec;
mod config;
mod cursor;
mod database;
mod datetime;
mod document;
mod error;
mod host;
mod object_id;
mod registry;
mod transaction;
mod value;

pub use array::Array;
pub use bridge::Bridge;
pub use codec::{classify_number, NumberClass, MAX_SAFE_INTEGER};
pub use config::{BridgeConfig, DEFAULT_MAX_DEPTH};
pub use cursor::{Cursor, CursorState, Rows};
pub use database::{Collection, Database};
pub use datetime::UtcDateTime;
pub use document::{Document, DocumentIter};
pub use error::{BridgeError, BridgeResult, ErrorCode, HostErrorClass};
pub use host::{HostObject, HostValue};
pub use object_id::ObjectId;
pub use registry::{
    ExternalHandle, HandleState, HandleWrapper, RegistryStats, ResourceRegistry, WeakHandle,
};
pub use value::Value;

/// Everything needed for typical use, including the [`HandleWrapper`] trait.
pub mod prelude {
    pub use crate::{
        Array, Bridge, BridgeConfig, BridgeError, BridgeResult, Collection, Cursor, CursorState,
        Database, Document, HandleWrapper, HostObject, HostValue, ObjectId, UtcDateTime, Value,
    };
    pub use embedoc_engine::TransactionMode;
}
