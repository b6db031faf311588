//! # embedoc engine
//!
//! The flat, opaque-handle ABI of an embedded document engine, and an
//! in-memory reference engine implementing it.
//!
//! Engines are **opaque resource factories**: values, documents, arrays,
//! object ids, timestamps, document iterators, cursors and databases are all
//! handed out as [`RawHandle`] tokens that only the engine can interpret.
//! Each handle is owned by the caller and released exactly once through the
//! free function of its [`ResourceKind`].
//!
//! ## Available engines
//!
//! - [`MemoryEngine`] - in-memory engine that counts every allocation and free
//!
//! ## Example
//!
//! ```rust
//! use embedoc_engine::{Engine, MemoryEngine, ValueTag};
//!
//! let engine = MemoryEngine::new();
//! let doc = engine.make_document().unwrap();
//! let value = engine.make_bool(true).unwrap();
//! engine.document_set(doc, c"ok", value);
//! engine.free_value(value);
//!
//! let wrapped = engine.document_into_value(doc).unwrap();
//! assert_eq!(engine.value_type(wrapped), ValueTag::Document.code());
//! engine.free_value(wrapped);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod memory;
mod types;

pub use engine::Engine;
pub use error::{clear_last_error, last_error, set_last_error, EngineStatus, StatusCode};
pub use memory::{
    object_id_hex, EngineConfig, EngineDoc, EngineStats, EngineValue, MemoryEngine,
    ObjectIdBytes, OBJECT_ID_LEN,
};
pub use types::{cursor_state, RawHandle, ResourceKind, TransactionMode, ValueTag};
