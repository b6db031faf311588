//! Internal error type of the in-memory engine.

use crate::error::EngineStatus;
use crate::types::ResourceKind;
use std::io;
use thiserror::Error;

/// Result type for in-memory engine internals.
pub(crate) type MemoryResult<T> = Result<T, MemoryError>;

/// Failures raised inside the in-memory engine before they are flattened
/// into an [`EngineStatus`] and the last-error message.
#[derive(Debug, Error)]
pub(crate) enum MemoryError {
    /// The handle was never issued or was already freed.
    #[error("invalid handle {token:#x}")]
    InvalidHandle {
        /// Raw token of the handle.
        token: u64,
    },

    /// The handle refers to a resource of another kind.
    #[error("expected a {expected} handle, got a {actual} handle")]
    WrongKind {
        /// Kind the call needed.
        expected: ResourceKind,
        /// Kind found behind the handle.
        actual: ResourceKind,
    },

    /// A value was read with the wrong accessor.
    #[error("type mismatch: expected {expected}, actual {actual}")]
    TypeMismatch {
        /// Tag name the accessor needed.
        expected: &'static str,
        /// Tag name of the value.
        actual: &'static str,
    },

    /// Invalid argument.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// Collection does not exist.
    #[error("collection not found: {name}")]
    CollectionNotFound {
        /// Name of the collection.
        name: String,
    },

    /// Collection already exists.
    #[error("collection already exists: {name}")]
    CollectionExists {
        /// Name of the collection.
        name: String,
    },

    /// A document with the same `_id` is already stored.
    #[error("data exists (pkey = {pkey})")]
    DuplicateKey {
        /// Rendered primary key.
        pkey: String,
    },

    /// The database was closed.
    #[error("database is closed")]
    DatabaseClosed,

    /// The database is already open through another handle.
    #[error("database is locked: {path}")]
    DatabaseLocked {
        /// Path of the database.
        path: String,
    },

    /// Transaction state does not allow the operation.
    #[error("transaction error: {message}")]
    Transaction {
        /// Description of the problem.
        message: String,
    },

    /// Resource limit reached.
    #[error("out of memory: resource limit of {limit} reached")]
    OutOfMemory {
        /// Configured limit.
        limit: usize,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl MemoryError {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub(crate) fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    pub(crate) fn collection_not_found(name: impl Into<String>) -> Self {
        Self::CollectionNotFound { name: name.into() }
    }

    /// Status code reported through the ABI for this error.
    pub(crate) fn status(&self) -> EngineStatus {
        match self {
            MemoryError::InvalidHandle { .. } | MemoryError::WrongKind { .. } => {
                EngineStatus::InvalidHandle
            }
            MemoryError::TypeMismatch { .. } => EngineStatus::TypeMismatch,
            MemoryError::InvalidArgument { .. } => EngineStatus::InvalidArgument,
            MemoryError::CollectionNotFound { .. } => EngineStatus::NotFound,
            MemoryError::CollectionExists { .. } | MemoryError::DuplicateKey { .. } => {
                EngineStatus::Conflict
            }
            MemoryError::DatabaseClosed => EngineStatus::Closed,
            MemoryError::DatabaseLocked { .. } => EngineStatus::Locked,
            MemoryError::Transaction { .. } => EngineStatus::Transaction,
            MemoryError::OutOfMemory { .. } => EngineStatus::OutOfMemory,
            MemoryError::Io(_) => EngineStatus::IoError,
        }
    }
}
