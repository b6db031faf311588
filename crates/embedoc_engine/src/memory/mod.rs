//! In-memory reference engine.

mod error;
mod store;
mod value;

pub use store::EngineStats;
pub use value::{object_id_hex, EngineDoc, EngineValue, ObjectIdBytes, OBJECT_ID_LEN};

use crate::engine::Engine;
use crate::error::{clear_last_error, last_error, set_last_error, EngineStatus};
use crate::types::{cursor_state, RawHandle, ResourceKind, TransactionMode};
use error::{MemoryError, MemoryResult};
use parking_lot::Mutex;
use std::ffi::CStr;
use store::{now_millis, DocIterState, EngineState, Resource};

/// Configuration of the in-memory engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum byte length of a collection name.
    pub max_collection_name_len: usize,

    /// Maximum number of live resources. Constructors fail with an
    /// out-of-memory error once it is reached (`None` = unlimited).
    pub resource_limit: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_collection_name_len: 255,
            resource_limit: None,
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum collection name length.
    #[must_use]
    pub const fn max_collection_name_len(mut self, len: usize) -> Self {
        self.max_collection_name_len = len;
        self
    }

    /// Sets the live resource limit.
    #[must_use]
    pub const fn resource_limit(mut self, limit: Option<usize>) -> Self {
        self.resource_limit = limit;
        self
    }
}

/// An in-memory document engine.
///
/// Database contents are kept per canonical path for the lifetime of the
/// engine, so closing and reopening a path sees the data committed before
/// close. Opening a path touches the file on disk but never writes to it.
///
/// Every handle is counted: [`MemoryEngine::stats`] reports allocations,
/// frees, consumptions and release protocol violations.
///
/// # Example
///
/// ```rust
/// use embedoc_engine::{Engine, EngineStatus, MemoryEngine};
///
/// let engine = MemoryEngine::new();
/// let value = engine.make_int(42).unwrap();
/// let mut out = 0;
/// assert_eq!(engine.value_get_i64(value, &mut out), EngineStatus::Ok);
/// assert_eq!(out, 42);
/// engine.free_value(value);
/// assert_eq!(engine.stats().live(), 0);
/// ```
#[derive(Debug, Default)]
pub struct MemoryEngine {
    config: EngineConfig,
    state: Mutex<EngineState>,
}

impl MemoryEngine {
    /// Creates an engine with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine with the given configuration.
    #[must_use]
    pub fn with_config(config: EngineConfig) -> Self {
        let state = EngineState::with_resource_limit(config.resource_limit);
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns a snapshot of the allocation counters.
    pub fn stats(&self) -> EngineStats {
        self.state.lock().stats
    }

    /// Number of live resources of one kind.
    pub fn live_of_kind(&self, kind: ResourceKind) -> usize {
        self.state.lock().live_of_kind(kind)
    }

    /// Changes the live resource limit at runtime.
    pub fn set_resource_limit(&self, limit: Option<usize>) {
        self.state.lock().resource_limit = limit;
    }

    fn run<T>(&self, op: impl FnOnce(&mut EngineState) -> MemoryResult<T>) -> Result<T, EngineStatus> {
        clear_last_error();
        let mut state = self.state.lock();
        op(&mut state).map_err(|err| {
            tracing::debug!(error = %err, "engine call failed");
            set_last_error(err.to_string());
            err.status()
        })
    }

    fn status(&self, op: impl FnOnce(&mut EngineState) -> MemoryResult<()>) -> EngineStatus {
        match self.run(op) {
            Ok(()) => EngineStatus::Ok,
            Err(status) => status,
        }
    }

    fn handle(&self, op: impl FnOnce(&mut EngineState) -> MemoryResult<RawHandle>) -> Option<RawHandle> {
        self.run(op).ok()
    }

    fn collection_name<'a>(&self, name: &'a CStr) -> MemoryResult<&'a str> {
        let name = utf8(name)?;
        if name.is_empty() {
            return Err(MemoryError::invalid_argument("collection name is empty"));
        }
        if name.len() > self.config.max_collection_name_len {
            return Err(MemoryError::invalid_argument(format!(
                "collection name exceeds {} bytes",
                self.config.max_collection_name_len
            )));
        }
        if name.starts_with('$') {
            return Err(MemoryError::invalid_argument(format!(
                "collection name cannot start with '$': {name}"
            )));
        }
        Ok(name)
    }
}

fn utf8(s: &CStr) -> MemoryResult<&str> {
    s.to_str()
        .map_err(|_| MemoryError::invalid_argument("string is not valid UTF-8"))
}

fn mismatch(expected: &'static str, actual: &EngineValue) -> MemoryError {
    MemoryError::TypeMismatch {
        expected,
        actual: actual.tag().name(),
    }
}

fn optional_document(state: &EngineState, doc: Option<RawHandle>) -> MemoryResult<Option<EngineDoc>> {
    doc.map(|h| state.document(h).cloned()).transpose()
}

impl Engine for MemoryEngine {
    fn version(&self) -> String {
        format!("embedoc-memory {}", env!("CARGO_PKG_VERSION"))
    }

    fn last_error_message(&self) -> Option<String> {
        last_error()
    }

    fn open(&self, path: &CStr) -> Option<RawHandle> {
        self.handle(|s| s.open(utf8(path)?))
    }

    fn close(&self, db: RawHandle) {
        self.state.lock().close(db);
    }

    fn create_collection(&self, db: RawHandle, name: &CStr) -> EngineStatus {
        self.status(|s| {
            let name = self.collection_name(name)?;
            s.database(db)?.create_collection(name)
        })
    }

    fn count(&self, db: RawHandle, name: &CStr, out_count: &mut i64) -> EngineStatus {
        self.status(|s| {
            let docs = s.database(db)?.collection(utf8(name)?)?;
            *out_count = i64::try_from(docs.len()).unwrap_or(i64::MAX);
            Ok(())
        })
    }

    fn insert(&self, db: RawHandle, name: &CStr, doc: RawHandle) -> EngineStatus {
        self.status(|s| {
            let doc = s.document(doc)?.clone();
            s.database(db)?.insert(utf8(name)?, doc)
        })
    }

    fn find(
        &self,
        db: RawHandle,
        name: &CStr,
        filter: Option<RawHandle>,
        out_cursor: &mut Option<RawHandle>,
    ) -> EngineStatus {
        *out_cursor = None;
        self.status(|s| {
            *out_cursor = Some(s.find(db, utf8(name)?, filter)?);
            Ok(())
        })
    }

    fn update(
        &self,
        db: RawHandle,
        name: &CStr,
        filter: Option<RawHandle>,
        update: RawHandle,
        out_updated: &mut i64,
    ) -> EngineStatus {
        self.status(|s| {
            let filter = optional_document(s, filter)?;
            let update = s.document(update)?.clone();
            *out_updated = s
                .database(db)?
                .update(utf8(name)?, filter.as_ref(), &update)?;
            Ok(())
        })
    }

    fn delete(
        &self,
        db: RawHandle,
        name: &CStr,
        filter: RawHandle,
        out_deleted: &mut i64,
    ) -> EngineStatus {
        self.status(|s| {
            let filter = s.document(filter)?.clone();
            *out_deleted = s.database(db)?.delete(utf8(name)?, &filter)?;
            Ok(())
        })
    }

    fn delete_all(&self, db: RawHandle, name: &CStr, out_deleted: &mut i64) -> EngineStatus {
        self.status(|s| {
            *out_deleted = s.database(db)?.delete_all(utf8(name)?)?;
            Ok(())
        })
    }

    fn start_transaction(&self, db: RawHandle, flags: u32) -> EngineStatus {
        self.status(|s| {
            let mode = TransactionMode::try_from(flags).map_err(|flags| {
                MemoryError::invalid_argument(format!("unknown transaction flags {flags}"))
            })?;
            s.database(db)?.start_transaction(mode)
        })
    }

    fn commit(&self, db: RawHandle) -> EngineStatus {
        self.status(|s| s.database(db)?.commit())
    }

    fn rollback(&self, db: RawHandle) -> EngineStatus {
        self.status(|s| s.database(db)?.rollback())
    }

    fn make_object_id(&self, db: RawHandle) -> Option<RawHandle> {
        self.handle(|s| {
            let oid = s.database(db)?.next_object_id();
            s.alloc(Resource::ObjectId(oid))
        })
    }

    fn cursor_step(&self, cursor: RawHandle) -> EngineStatus {
        self.status(|s| s.step_cursor(cursor))
    }

    fn cursor_state(&self, cursor: RawHandle) -> i32 {
        self.run(|s| Ok(s.cursor(cursor)?.state)).unwrap_or(-1)
    }

    fn cursor_current(&self, cursor: RawHandle) -> Option<RawHandle> {
        self.run(|s| {
            let current = s.cursor(cursor)?.current.clone();
            current
                .map(|doc| s.alloc(Resource::Value(EngineValue::Document(doc))))
                .transpose()
        })
        .ok()
        .flatten()
    }

    fn cursor_to_string(&self, cursor: RawHandle, out: &mut String) -> EngineStatus {
        self.status(|s| {
            let c = s.cursor(cursor)?;
            let state = match c.state {
                cursor_state::INITIAL => "Initial",
                cursor_state::HAS_ROW => "HasRow",
                cursor_state::EXHAUSTED => "Exhausted",
                _ => "Errored",
            };
            *out = format!(
                "Cursor(collection={}, state={state}, position={})",
                c.collection, c.position
            );
            Ok(())
        })
    }

    fn free_cursor(&self, cursor: RawHandle) {
        self.state.lock().free(cursor, ResourceKind::Cursor);
    }

    fn make_null(&self) -> Option<RawHandle> {
        self.handle(|s| s.alloc(Resource::Value(EngineValue::Null)))
    }

    fn make_int(&self, value: i64) -> Option<RawHandle> {
        self.handle(|s| s.alloc(Resource::Value(EngineValue::Int(value))))
    }

    fn make_double(&self, value: f64) -> Option<RawHandle> {
        self.handle(|s| s.alloc(Resource::Value(EngineValue::Double(value))))
    }

    fn make_bool(&self, value: bool) -> Option<RawHandle> {
        self.handle(|s| s.alloc(Resource::Value(EngineValue::Boolean(value))))
    }

    fn make_string(&self, content: &CStr) -> Option<RawHandle> {
        self.handle(|s| {
            let content = utf8(content)?.to_string();
            s.alloc(Resource::Value(EngineValue::String(content)))
        })
    }

    fn value_type(&self, value: RawHandle) -> i32 {
        self.run(|s| Ok(s.value(value)?.tag().code())).unwrap_or(-1)
    }

    fn value_get_i64(&self, value: RawHandle, out: &mut i64) -> EngineStatus {
        self.status(|s| match s.value(value)? {
            EngineValue::Int(i) => {
                *out = *i;
                Ok(())
            }
            other => Err(mismatch("Int", other)),
        })
    }

    fn value_get_double(&self, value: RawHandle, out: &mut f64) -> EngineStatus {
        self.status(|s| match s.value(value)? {
            EngineValue::Double(d) => {
                *out = *d;
                Ok(())
            }
            other => Err(mismatch("Double", other)),
        })
    }

    fn value_get_bool(&self, value: RawHandle, out: &mut bool) -> EngineStatus {
        self.status(|s| match s.value(value)? {
            EngineValue::Boolean(b) => {
                *out = *b;
                Ok(())
            }
            other => Err(mismatch("Boolean", other)),
        })
    }

    fn value_get_string(&self, value: RawHandle, out: &mut String) -> EngineStatus {
        self.status(|s| match s.value(value)? {
            EngineValue::String(text) => {
                out.clone_from(text);
                Ok(())
            }
            other => Err(mismatch("String", other)),
        })
    }

    fn value_get_array(&self, value: RawHandle, out: &mut Option<RawHandle>) -> EngineStatus {
        *out = None;
        self.status(|s| {
            let items = match s.value(value)? {
                EngineValue::Array(items) => items.clone(),
                other => return Err(mismatch("Array", other)),
            };
            *out = Some(s.alloc(Resource::Array(items))?);
            Ok(())
        })
    }

    fn value_get_document(
        &self,
        value: RawHandle,
        out: &mut Option<RawHandle>,
    ) -> EngineStatus {
        *out = None;
        self.status(|s| {
            let doc = match s.value(value)? {
                EngineValue::Document(doc) => doc.clone(),
                other => return Err(mismatch("Document", other)),
            };
            *out = Some(s.alloc(Resource::Document(doc))?);
            Ok(())
        })
    }

    fn value_get_object_id(
        &self,
        value: RawHandle,
        out: &mut Option<RawHandle>,
    ) -> EngineStatus {
        *out = None;
        self.status(|s| {
            let oid = match s.value(value)? {
                EngineValue::ObjectId(oid) => *oid,
                other => return Err(mismatch("ObjectId", other)),
            };
            *out = Some(s.alloc(Resource::ObjectId(oid))?);
            Ok(())
        })
    }

    fn value_get_utc_datetime(
        &self,
        value: RawHandle,
        out: &mut Option<RawHandle>,
    ) -> EngineStatus {
        *out = None;
        self.status(|s| {
            let millis = match s.value(value)? {
                EngineValue::UtcDateTime(ms) => *ms,
                other => return Err(mismatch("UTCDateTime", other)),
            };
            *out = Some(s.alloc(Resource::UtcDateTime(millis))?);
            Ok(())
        })
    }

    fn free_value(&self, value: RawHandle) {
        self.state.lock().free(value, ResourceKind::Value);
    }

    fn make_document(&self) -> Option<RawHandle> {
        self.handle(|s| s.alloc(Resource::Document(EngineDoc::new())))
    }

    fn document_set(&self, doc: RawHandle, key: &CStr, value: RawHandle) -> EngineStatus {
        self.status(|s| {
            let key = utf8(key)?;
            let value = s.value(value)?.clone();
            s.document_mut(doc)?.insert(key, value);
            Ok(())
        })
    }

    fn document_get(
        &self,
        doc: RawHandle,
        key: &CStr,
        out: &mut Option<RawHandle>,
    ) -> EngineStatus {
        *out = None;
        self.status(|s| {
            if let Some(value) = s.document(doc)?.get(utf8(key)?).cloned() {
                *out = Some(s.alloc(Resource::Value(value))?);
            }
            Ok(())
        })
    }

    fn document_len(&self, doc: RawHandle) -> i64 {
        self.run(|s| Ok(i64::try_from(s.document(doc)?.len()).unwrap_or(i64::MAX)))
            .unwrap_or(-1)
    }

    fn document_into_value(&self, doc: RawHandle) -> Option<RawHandle> {
        self.handle(|s| match s.consume(doc, ResourceKind::Document)? {
            Resource::Document(d) => s.alloc(Resource::Value(EngineValue::Document(d))),
            _ => unreachable!("kind checked by consume"),
        })
    }

    fn document_iter(&self, doc: RawHandle) -> Option<RawHandle> {
        self.handle(|s| {
            let entries = s.document(doc)?.entries().to_vec();
            s.alloc(Resource::DocumentIter(DocIterState {
                entries,
                position: 0,
            }))
        })
    }

    fn document_iter_next(
        &self,
        iter: RawHandle,
        out_key: &mut String,
        out_value: &mut Option<RawHandle>,
    ) -> EngineStatus {
        *out_value = None;
        self.status(|s| {
            let it = s.doc_iter_mut(iter)?;
            let Some((key, value)) = it.entries.get(it.position).cloned() else {
                return Ok(());
            };
            let handle = s.alloc(Resource::Value(value))?;
            s.doc_iter_mut(iter)?.position += 1;
            *out_key = key;
            *out_value = Some(handle);
            Ok(())
        })
    }

    fn free_document(&self, doc: RawHandle) {
        self.state.lock().free(doc, ResourceKind::Document);
    }

    fn free_document_iter(&self, iter: RawHandle) {
        self.state.lock().free(iter, ResourceKind::DocumentIter);
    }

    fn make_array(&self) -> Option<RawHandle> {
        self.handle(|s| s.alloc(Resource::Array(Vec::new())))
    }

    fn array_push(&self, array: RawHandle, value: RawHandle) -> EngineStatus {
        self.status(|s| {
            let value = s.value(value)?.clone();
            s.array_mut(array)?.push(value);
            Ok(())
        })
    }

    fn array_get(&self, array: RawHandle, index: u32, out: &mut Option<RawHandle>) -> EngineStatus {
        *out = None;
        self.status(|s| {
            if let Some(item) = s.array(array)?.get(index as usize).cloned() {
                *out = Some(s.alloc(Resource::Value(item))?);
            }
            Ok(())
        })
    }

    fn array_len(&self, array: RawHandle) -> i64 {
        self.run(|s| Ok(i64::try_from(s.array(array)?.len()).unwrap_or(i64::MAX)))
            .unwrap_or(-1)
    }

    fn array_into_value(&self, array: RawHandle) -> Option<RawHandle> {
        self.handle(|s| match s.consume(array, ResourceKind::Array)? {
            Resource::Array(items) => s.alloc(Resource::Value(EngineValue::Array(items))),
            _ => unreachable!("kind checked by consume"),
        })
    }

    fn free_array(&self, array: RawHandle) {
        self.state.lock().free(array, ResourceKind::Array);
    }

    fn object_id_to_value(&self, oid: RawHandle) -> Option<RawHandle> {
        self.handle(|s| {
            let oid = s.object_id(oid)?;
            s.alloc(Resource::Value(EngineValue::ObjectId(oid)))
        })
    }

    fn object_id_to_hex(&self, oid: RawHandle, out: &mut String) -> EngineStatus {
        self.status(|s| {
            *out = object_id_hex(&s.object_id(oid)?);
            Ok(())
        })
    }

    fn free_object_id(&self, oid: RawHandle) {
        self.state.lock().free(oid, ResourceKind::ObjectId);
    }

    fn make_utc_datetime(&self, millis: i64) -> Option<RawHandle> {
        let millis = if millis < 0 { now_millis() } else { millis };
        self.handle(|s| s.alloc(Resource::UtcDateTime(millis)))
    }

    fn utc_datetime_millis(&self, dt: RawHandle, out: &mut i64) -> EngineStatus {
        self.status(|s| {
            *out = s.utc_datetime(dt)?;
            Ok(())
        })
    }

    fn utc_datetime_to_value(&self, dt: RawHandle) -> Option<RawHandle> {
        self.handle(|s| {
            let millis = s.utc_datetime(dt)?;
            s.alloc(Resource::Value(EngineValue::UtcDateTime(millis)))
        })
    }

    fn free_utc_datetime(&self, dt: RawHandle) {
        self.state.lock().free(dt, ResourceKind::UtcDateTime);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use tempfile::TempDir;

    fn cstr(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn open_temp(engine: &MemoryEngine) -> (TempDir, RawHandle) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        let db = engine
            .open(&cstr(path.to_str().unwrap()))
            .expect("open should succeed");
        (dir, db)
    }

    #[test]
    fn wrong_accessor_reports_type_mismatch() {
        let engine = MemoryEngine::new();
        let v = engine.make_string(&cstr("hi")).unwrap();
        let mut out = 0i64;

        assert_eq!(engine.value_get_i64(v, &mut out), EngineStatus::TypeMismatch);
        assert_eq!(
            engine.last_error_message().as_deref(),
            Some("type mismatch: expected Int, actual String")
        );
        assert_eq!(engine.value_type(v), crate::ValueTag::String.code());
        engine.free_value(v);
    }

    #[test]
    fn last_error_is_cleared_by_next_fallible_call() {
        let engine = MemoryEngine::new();
        let v = engine.make_bool(true).unwrap();
        let mut n = 0.0;
        assert!(engine.value_get_double(v, &mut n).is_err());
        assert!(engine.last_error_message().is_some());

        let mut b = false;
        assert!(engine.value_get_bool(v, &mut b).is_ok());
        assert!(b);
        assert!(engine.last_error_message().is_none());
        engine.free_value(v);
    }

    #[test]
    fn document_into_value_consumes_document() {
        let engine = MemoryEngine::new();
        let doc = engine.make_document().unwrap();
        let one = engine.make_int(1).unwrap();
        assert!(engine.document_set(doc, &cstr("a"), one).is_ok());
        engine.free_value(one);

        let value = engine.document_into_value(doc).unwrap();
        assert_eq!(engine.document_len(doc), -1);
        assert_eq!(engine.value_type(value), 0x13);
        engine.free_value(value);

        let stats = engine.stats();
        assert_eq!(stats.consumed, 1);
        assert_eq!(stats.live(), 0);
        assert!(stats.is_clean());
    }

    #[test]
    fn document_iterator_is_fused() {
        let engine = MemoryEngine::new();
        let doc = engine.make_document().unwrap();
        for (key, n) in [("x", 1), ("y", 2)] {
            let v = engine.make_int(n).unwrap();
            engine.document_set(doc, &cstr(key), v);
            engine.free_value(v);
        }
        let iter = engine.document_iter(doc).unwrap();
        let mut keys = Vec::new();
        loop {
            let mut key = String::new();
            let mut value = None;
            assert!(engine.document_iter_next(iter, &mut key, &mut value).is_ok());
            match value {
                Some(v) => {
                    keys.push(key);
                    engine.free_value(v);
                }
                None => break,
            }
        }
        assert_eq!(keys, ["x", "y"]);

        let mut key = String::new();
        let mut value = None;
        assert!(engine.document_iter_next(iter, &mut key, &mut value).is_ok());
        assert!(value.is_none());

        engine.free_document_iter(iter);
        engine.free_document(doc);
        assert_eq!(engine.stats().live(), 0);
    }

    #[test]
    fn insert_find_and_cursor_states() {
        let engine = MemoryEngine::new();
        let (_dir, db) = open_temp(&engine);
        let users = cstr("users");
        assert!(engine.create_collection(db, &users).is_ok());

        let doc = engine.make_document().unwrap();
        let name = engine.make_string(&cstr("a")).unwrap();
        engine.document_set(doc, &cstr("name"), name);
        assert!(engine.insert(db, &users, doc).is_ok());

        let mut count = 0;
        assert!(engine.count(db, &users, &mut count).is_ok());
        assert_eq!(count, 1);

        let mut cursor = None;
        assert!(engine.find(db, &users, Some(doc), &mut cursor).is_ok());
        let cursor = cursor.unwrap();
        assert_eq!(engine.cursor_state(cursor), cursor_state::INITIAL);
        assert!(engine.cursor_current(cursor).is_none());

        assert!(engine.cursor_step(cursor).is_ok());
        assert_eq!(engine.cursor_state(cursor), cursor_state::HAS_ROW);
        let row = engine.cursor_current(cursor).unwrap();
        assert_eq!(engine.value_type(row), 0x13);
        engine.free_value(row);

        let mut text = String::new();
        assert!(engine.cursor_to_string(cursor, &mut text).is_ok());
        assert_eq!(text, "Cursor(collection=users, state=HasRow, position=1)");

        assert!(engine.cursor_step(cursor).is_ok());
        assert_eq!(engine.cursor_state(cursor), cursor_state::EXHAUSTED);
        assert!(engine.cursor_step(cursor).is_ok());
        assert_eq!(engine.cursor_state(cursor), cursor_state::EXHAUSTED);

        engine.free_cursor(cursor);
        engine.free_value(name);
        engine.free_document(doc);
        engine.close(db);
        assert_eq!(engine.stats().live(), 0);
        assert!(engine.stats().is_clean());
    }

    #[test]
    fn cursor_errors_after_database_close() {
        let engine = MemoryEngine::new();
        let (_dir, db) = open_temp(&engine);
        let c = cstr("c");
        engine.create_collection(db, &c);

        let mut cursor = None;
        engine.find(db, &c, None, &mut cursor);
        let cursor = cursor.unwrap();
        engine.close(db);

        assert_eq!(engine.cursor_step(cursor), EngineStatus::Closed);
        assert_eq!(engine.cursor_state(cursor), cursor_state::ERRORED);
        assert!(engine.cursor_step(cursor).is_err());
        engine.free_cursor(cursor);
    }

    #[test]
    fn unknown_collection_is_not_found() {
        let engine = MemoryEngine::new();
        let (_dir, db) = open_temp(&engine);
        let mut count = 0;
        assert_eq!(engine.count(db, &cstr("nope"), &mut count), EngineStatus::NotFound);
        assert_eq!(
            engine.last_error_message().as_deref(),
            Some("collection not found: nope")
        );
        engine.close(db);
    }

    #[test]
    fn second_open_is_locked_and_reopen_sees_data() {
        let engine = MemoryEngine::new();
        let dir = TempDir::new().unwrap();
        let path = cstr(dir.path().join("db").to_str().unwrap());

        let db = engine.open(&path).unwrap();
        assert!(engine.open(&path).is_none());
        assert!(engine
            .last_error_message()
            .is_some_and(|m| m.starts_with("database is locked")));

        engine.create_collection(db, &cstr("c"));
        engine.close(db);

        let db = engine.open(&path).unwrap();
        let mut count = -1;
        assert!(engine.count(db, &cstr("c"), &mut count).is_ok());
        assert_eq!(count, 0);
        engine.close(db);
    }

    #[test]
    fn open_rejects_empty_path_and_directory() {
        let engine = MemoryEngine::new();
        assert!(engine.open(&cstr("")).is_none());
        let dir = TempDir::new().unwrap();
        assert!(engine.open(&cstr(dir.path().to_str().unwrap())).is_none());
    }

    #[test]
    fn transaction_flags_and_rollback() {
        let engine = MemoryEngine::new();
        let (_dir, db) = open_temp(&engine);
        let c = cstr("c");
        engine.create_collection(db, &c);

        assert_eq!(engine.start_transaction(db, 7), EngineStatus::InvalidArgument);
        assert_eq!(engine.commit(db), EngineStatus::Transaction);

        assert!(engine.start_transaction(db, TransactionMode::Write.flags()).is_ok());
        let doc = engine.make_document().unwrap();
        engine.insert(db, &c, doc);
        assert!(engine.rollback(db).is_ok());

        let mut count = -1;
        engine.count(db, &c, &mut count);
        assert_eq!(count, 0);
        engine.free_document(doc);
        engine.close(db);
    }

    #[test]
    fn resource_limit_fails_constructors() {
        let engine = MemoryEngine::with_config(EngineConfig::new().resource_limit(Some(1)));
        let first = engine.make_null().unwrap();
        assert!(engine.make_null().is_none());
        assert_eq!(
            engine.last_error_message().as_deref(),
            Some("out of memory: resource limit of 1 reached")
        );
        engine.free_value(first);
        engine.set_resource_limit(None);
        let v = engine.make_null().unwrap();
        engine.free_value(v);
    }

    #[test]
    fn collection_name_validation() {
        let engine = MemoryEngine::with_config(EngineConfig::new().max_collection_name_len(4));
        let (_dir, db) = open_temp(&engine);
        assert_eq!(engine.create_collection(db, &cstr("")), EngineStatus::InvalidArgument);
        assert_eq!(engine.create_collection(db, &cstr("toolong")), EngineStatus::InvalidArgument);
        assert_eq!(engine.create_collection(db, &cstr("$x")), EngineStatus::InvalidArgument);
        assert!(engine.create_collection(db, &cstr("ok")).is_ok());
        assert_eq!(engine.create_collection(db, &cstr("ok")), EngineStatus::Conflict);
        engine.close(db);
    }

    #[test]
    fn object_ids_are_unique_hex() {
        let engine = MemoryEngine::new();
        let (_dir, db) = open_temp(&engine);
        let a = engine.make_object_id(db).unwrap();
        let b = engine.make_object_id(db).unwrap();
        let (mut ha, mut hb) = (String::new(), String::new());
        engine.object_id_to_hex(a, &mut ha);
        engine.object_id_to_hex(b, &mut hb);
        assert_eq!(ha.len(), 24);
        assert_ne!(ha, hb);
        engine.free_object_id(a);
        engine.free_object_id(b);
        engine.close(db);
    }

    #[test]
    fn utc_datetime_negative_means_now() {
        let engine = MemoryEngine::new();
        let dt = engine.make_utc_datetime(-1).unwrap();
        let mut ms = 0;
        assert!(engine.utc_datetime_millis(dt, &mut ms).is_ok());
        assert!(ms > 0);
        engine.free_utc_datetime(dt);

        let fixed = engine.make_utc_datetime(1_000).unwrap();
        engine.utc_datetime_millis(fixed, &mut ms);
        assert_eq!(ms, 1_000);
        engine.free_utc_datetime(fixed);
    }

    #[test]
    fn misrouted_free_is_counted() {
        let engine = MemoryEngine::new();
        let v = engine.make_null().unwrap();
        engine.free_document(v);
        assert_eq!(engine.stats().misrouted_frees, 1);
        engine.free_value(v);
        engine.free_value(v);
        assert_eq!(engine.stats().double_frees, 1);
        assert_eq!(engine.stats().live(), 0);
    }
}
