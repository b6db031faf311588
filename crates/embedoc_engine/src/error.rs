//! Status codes and the last-error channel.

use std::cell::RefCell;

/// Result code returned by fallible engine calls.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Operation succeeded.
    Ok = 0,
    /// Generic error.
    Error = 1,
    /// Invalid argument.
    InvalidArgument = 2,
    /// Collection or entry not found.
    NotFound = 3,
    /// Duplicate key or already-existing collection.
    Conflict = 4,
    /// Database is closed.
    Closed = 5,
    /// Database is locked by another handle.
    Locked = 6,
    /// Value accessed with the wrong type.
    TypeMismatch = 7,
    /// I/O error.
    IoError = 8,
    /// Out of memory.
    OutOfMemory = 9,
    /// Handle is unknown or of the wrong kind.
    InvalidHandle = 10,
    /// Transaction state does not allow the operation.
    Transaction = 11,
}

impl EngineStatus {
    /// Returns true if the status indicates success.
    pub fn is_ok(self) -> bool {
        self == EngineStatus::Ok
    }

    /// Returns true if the status indicates an error.
    pub fn is_err(self) -> bool {
        self != EngineStatus::Ok
    }
}

/// Status code type for C compatibility.
pub type StatusCode = i32;

impl From<EngineStatus> for StatusCode {
    fn from(status: EngineStatus) -> Self {
        status as StatusCode
    }
}

impl From<StatusCode> for EngineStatus {
    fn from(code: StatusCode) -> Self {
        match code {
            0 => EngineStatus::Ok,
            2 => EngineStatus::InvalidArgument,
            3 => EngineStatus::NotFound,
            4 => EngineStatus::Conflict,
            5 => EngineStatus::Closed,
            6 => EngineStatus::Locked,
            7 => EngineStatus::TypeMismatch,
            8 => EngineStatus::IoError,
            9 => EngineStatus::OutOfMemory,
            10 => EngineStatus::InvalidHandle,
            11 => EngineStatus::Transaction,
            _ => EngineStatus::Error,
        }
    }
}

// Last error message of the calling thread.
thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Sets the last error message.
pub fn set_last_error(message: impl Into<String>) {
    let msg = message.into();
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some(msg);
    });
}

/// Clears the last error.
pub fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Returns the last error message recorded on this thread, if any.
///
/// The message is overwritten by the next failing call and cleared by the
/// next fallible call, so it must be read right after the failure.
pub fn last_error() -> Option<String> {
    LAST_ERROR.with(|e| e.borrow().clone())
}
