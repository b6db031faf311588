//! Engine ABI trait definition.

use crate::error::EngineStatus;
use crate::types::RawHandle;
use std::ffi::CStr;

/// The flat, opaque-handle ABI of an embedded document engine.
///
/// Engines are **opaque resource factories**. Every resource they create is
/// returned as a [`RawHandle`] that only the engine can interpret. Callers own
/// the handles they receive and must release each one exactly once with the
/// free function of its kind (`free_value`, `free_document`, ..., `close` for
/// databases).
///
/// # Failure reporting
///
/// Fallible calls report failure through an [`EngineStatus`] other than
/// [`EngineStatus::Ok`], or by returning `None` where a new handle was
/// expected. The human-readable reason is then available from
/// [`Engine::last_error_message`] until the next fallible call on the same
/// thread overwrites or clears it.
///
/// # Ownership
///
/// - Calls that take a handle *borrow* it unless documented otherwise; the
///   engine copies whatever it keeps.
/// - `document_into_value` and `array_into_value` *consume* their argument
///   on success. The consumed handle must not be freed or used again.
/// - Accessors that produce handles (`document_get`, `value_get_array`,
///   `cursor_current`, ...) return fresh copies owned by the caller.
///
/// # Implementors
///
/// - [`crate::MemoryEngine`] - in-memory reference engine
pub trait Engine: Send + Sync {
    /// Returns the engine version string.
    fn version(&self) -> String;

    /// Returns the message of the last failed call on this thread.
    fn last_error_message(&self) -> Option<String>;

    // ------------------------------------------------------------------
    // Database
    // ------------------------------------------------------------------

    /// Opens the database stored at `path`.
    fn open(&self, path: &CStr) -> Option<RawHandle>;

    /// Closes a database and releases its handle.
    fn close(&self, db: RawHandle);

    /// Creates a collection.
    fn create_collection(&self, db: RawHandle, name: &CStr) -> EngineStatus;

    /// Counts the documents of a collection.
    fn count(&self, db: RawHandle, name: &CStr, out_count: &mut i64) -> EngineStatus;

    /// Inserts a copy of `doc` into a collection.
    fn insert(&self, db: RawHandle, name: &CStr, doc: RawHandle) -> EngineStatus;

    /// Runs a query and returns a cursor positioned before the first row.
    ///
    /// A `filter` of `None` matches every document.
    fn find(
        &self,
        db: RawHandle,
        name: &CStr,
        filter: Option<RawHandle>,
        out_cursor: &mut Option<RawHandle>,
    ) -> EngineStatus;

    /// Updates matching documents and reports how many changed.
    fn update(
        &self,
        db: RawHandle,
        name: &CStr,
        filter: Option<RawHandle>,
        update: RawHandle,
        out_updated: &mut i64,
    ) -> EngineStatus;

    /// Deletes matching documents and reports how many were removed.
    fn delete(
        &self,
        db: RawHandle,
        name: &CStr,
        filter: RawHandle,
        out_deleted: &mut i64,
    ) -> EngineStatus;

    /// Deletes every document of a collection.
    fn delete_all(&self, db: RawHandle, name: &CStr, out_deleted: &mut i64) -> EngineStatus;

    /// Starts an explicit transaction.
    fn start_transaction(&self, db: RawHandle, flags: u32) -> EngineStatus;

    /// Commits the active transaction.
    fn commit(&self, db: RawHandle) -> EngineStatus;

    /// Rolls back the active transaction.
    fn rollback(&self, db: RawHandle) -> EngineStatus;

    /// Generates a new object id.
    fn make_object_id(&self, db: RawHandle) -> Option<RawHandle>;

    // ------------------------------------------------------------------
    // Cursor
    // ------------------------------------------------------------------

    /// Advances a cursor by one row.
    fn cursor_step(&self, cursor: RawHandle) -> EngineStatus;

    /// Returns the cursor state code (see [`crate::cursor_state`]), or a
    /// negative number for an invalid handle.
    fn cursor_state(&self, cursor: RawHandle) -> i32;

    /// Returns a copy of the current row, if the cursor has one.
    fn cursor_current(&self, cursor: RawHandle) -> Option<RawHandle>;

    /// Renders a cursor for diagnostics.
    fn cursor_to_string(&self, cursor: RawHandle, out: &mut String) -> EngineStatus;

    /// Releases a cursor.
    fn free_cursor(&self, cursor: RawHandle);

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    /// Creates a null value.
    fn make_null(&self) -> Option<RawHandle>;

    /// Creates an integer value.
    fn make_int(&self, value: i64) -> Option<RawHandle>;

    /// Creates a double value.
    fn make_double(&self, value: f64) -> Option<RawHandle>;

    /// Creates a boolean value.
    fn make_bool(&self, value: bool) -> Option<RawHandle>;

    /// Creates a string value from a null-terminated UTF-8 buffer.
    fn make_string(&self, content: &CStr) -> Option<RawHandle>;

    /// Returns the value's tag code (see [`crate::ValueTag`]), or a negative
    /// number for an invalid handle.
    fn value_type(&self, value: RawHandle) -> i32;

    /// Reads an integer value.
    fn value_get_i64(&self, value: RawHandle, out: &mut i64) -> EngineStatus;

    /// Reads a double value.
    fn value_get_double(&self, value: RawHandle, out: &mut f64) -> EngineStatus;

    /// Reads a boolean value.
    fn value_get_bool(&self, value: RawHandle, out: &mut bool) -> EngineStatus;

    /// Reads a string value.
    fn value_get_string(&self, value: RawHandle, out: &mut String) -> EngineStatus;

    /// Copies the array held by a value.
    fn value_get_array(&self, value: RawHandle, out: &mut Option<RawHandle>) -> EngineStatus;

    /// Copies the document held by a value.
    fn value_get_document(&self, value: RawHandle, out: &mut Option<RawHandle>)
        -> EngineStatus;

    /// Copies the object id held by a value.
    fn value_get_object_id(
        &self,
        value: RawHandle,
        out: &mut Option<RawHandle>,
    ) -> EngineStatus;

    /// Copies the timestamp held by a value.
    fn value_get_utc_datetime(
        &self,
        value: RawHandle,
        out: &mut Option<RawHandle>,
    ) -> EngineStatus;

    /// Releases a value.
    fn free_value(&self, value: RawHandle);

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Creates an empty document.
    fn make_document(&self) -> Option<RawHandle>;

    /// Sets `key` to a copy of `value`, replacing any previous entry in place.
    fn document_set(&self, doc: RawHandle, key: &CStr, value: RawHandle) -> EngineStatus;

    /// Copies the value stored under `key`. `out` stays `None` when absent.
    fn document_get(&self, doc: RawHandle, key: &CStr, out: &mut Option<RawHandle>)
        -> EngineStatus;

    /// Returns the number of entries, or a negative number for an invalid handle.
    fn document_len(&self, doc: RawHandle) -> i64;

    /// Wraps a document into a value, consuming the document.
    fn document_into_value(&self, doc: RawHandle) -> Option<RawHandle>;

    /// Creates an iterator over a snapshot of the document.
    fn document_iter(&self, doc: RawHandle) -> Option<RawHandle>;

    /// Yields the next entry. At the end, returns `Ok` and leaves `out_value`
    /// as `None`.
    fn document_iter_next(
        &self,
        iter: RawHandle,
        out_key: &mut String,
        out_value: &mut Option<RawHandle>,
    ) -> EngineStatus;

    /// Releases a document.
    fn free_document(&self, doc: RawHandle);

    /// Releases a document iterator.
    fn free_document_iter(&self, iter: RawHandle);

    // ------------------------------------------------------------------
    // Arrays
    // ------------------------------------------------------------------

    /// Creates an empty array.
    fn make_array(&self) -> Option<RawHandle>;

    /// Appends a copy of `value`.
    fn array_push(&self, array: RawHandle, value: RawHandle) -> EngineStatus;

    /// Copies the element at `index`. `out` stays `None` when out of range.
    fn array_get(&self, array: RawHandle, index: u32, out: &mut Option<RawHandle>)
        -> EngineStatus;

    /// Returns the number of elements, or a negative number for an invalid handle.
    fn array_len(&self, array: RawHandle) -> i64;

    /// Wraps an array into a value, consuming the array.
    fn array_into_value(&self, array: RawHandle) -> Option<RawHandle>;

    /// Releases an array.
    fn free_array(&self, array: RawHandle);

    // ------------------------------------------------------------------
    // Object ids
    // ------------------------------------------------------------------

    /// Wraps a copy of the object id into a value.
    fn object_id_to_value(&self, oid: RawHandle) -> Option<RawHandle>;

    /// Renders the object id as lowercase hexadecimal.
    fn object_id_to_hex(&self, oid: RawHandle, out: &mut String) -> EngineStatus;

    /// Releases an object id.
    fn free_object_id(&self, oid: RawHandle);

    // ------------------------------------------------------------------
    // Timestamps
    // ------------------------------------------------------------------

    /// Creates a timestamp. A negative `millis` means "now".
    fn make_utc_datetime(&self, millis: i64) -> Option<RawHandle>;

    /// Reads the milliseconds since the Unix epoch.
    fn utc_datetime_millis(&self, dt: RawHandle, out: &mut i64) -> EngineStatus;

    /// Wraps a copy of the timestamp into a value.
    fn utc_datetime_to_value(&self, dt: RawHandle) -> Option<RawHandle>;

    /// Releases a timestamp.
    fn free_utc_datetime(&self, dt: RawHandle);
}
