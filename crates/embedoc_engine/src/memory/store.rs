//! Resource table and database state of the in-memory engine.

use super::error::{MemoryError, MemoryResult};
use super::value::{EngineDoc, EngineValue, ObjectIdBytes, OBJECT_ID_LEN};
use crate::types::{cursor_state, RawHandle, ResourceKind, TransactionMode};
use std::collections::{BTreeMap, HashMap};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Allocation and release counters of the in-memory engine.
///
/// Every resource ends its life exactly once, either freed or consumed by an
/// `*_into_value` call. Double frees and frees routed to the wrong kind's
/// free function are counted instead of performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Resources handed out.
    pub allocated: u64,
    /// Resources released through their free function.
    pub freed: u64,
    /// Resources consumed by `document_into_value` / `array_into_value`.
    pub consumed: u64,
    /// Free calls on handles that were not live.
    pub double_frees: u64,
    /// Free calls routed to another kind's free function.
    pub misrouted_frees: u64,
}

impl EngineStats {
    /// Number of resources still alive.
    #[must_use]
    pub fn live(&self) -> u64 {
        self.allocated - self.freed - self.consumed
    }

    /// Returns true when no release protocol violation was observed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.double_frees == 0 && self.misrouted_frees == 0
    }
}

/// State of a document iterator.
#[derive(Debug)]
pub(crate) struct DocIterState {
    pub(crate) entries: Vec<(String, EngineValue)>,
    pub(crate) position: usize,
}

/// State of a query cursor.
#[derive(Debug)]
pub(crate) struct CursorRes {
    pub(crate) path: PathBuf,
    pub(crate) session: u64,
    pub(crate) collection: String,
    pub(crate) filter: Option<EngineDoc>,
    pub(crate) position: usize,
    pub(crate) state: i32,
    pub(crate) current: Option<EngineDoc>,
}

/// An open database handle.
#[derive(Debug)]
pub(crate) struct DatabaseRes {
    pub(crate) path: PathBuf,
    pub(crate) session: u64,
}

/// A live resource.
#[derive(Debug)]
pub(crate) enum Resource {
    Value(EngineValue),
    Document(EngineDoc),
    Array(Vec<EngineValue>),
    ObjectId(ObjectIdBytes),
    UtcDateTime(i64),
    DocumentIter(DocIterState),
    Cursor(CursorRes),
    Database(DatabaseRes),
}

impl Resource {
    pub(crate) fn kind(&self) -> ResourceKind {
        match self {
            Resource::Value(_) => ResourceKind::Value,
            Resource::Document(_) => ResourceKind::Document,
            Resource::Array(_) => ResourceKind::Array,
            Resource::ObjectId(_) => ResourceKind::ObjectId,
            Resource::UtcDateTime(_) => ResourceKind::UtcDateTime,
            Resource::DocumentIter(_) => ResourceKind::DocumentIter,
            Resource::Cursor(_) => ResourceKind::Cursor,
            Resource::Database(_) => ResourceKind::Database,
        }
    }
}

type Collections = BTreeMap<String, Vec<EngineDoc>>;

#[derive(Debug)]
struct ActiveTransaction {
    mode: TransactionMode,
    snapshot: Collections,
}

/// Contents of one database path. Outlives the handles that open it.
#[derive(Debug, Default)]
pub(crate) struct DatabaseState {
    collections: Collections,
    transaction: Option<ActiveTransaction>,
    open_session: Option<u64>,
    oid_counter: u32,
}

impl DatabaseState {
    fn ensure_writable(&self) -> MemoryResult<()> {
        match &self.transaction {
            Some(txn) if txn.mode == TransactionMode::Read => Err(MemoryError::transaction(
                "cannot write inside a read-only transaction",
            )),
            _ => Ok(()),
        }
    }

    pub(crate) fn create_collection(&mut self, name: &str) -> MemoryResult<()> {
        self.ensure_writable()?;
        if self.collections.contains_key(name) {
            return Err(MemoryError::CollectionExists {
                name: name.to_string(),
            });
        }
        self.collections.insert(name.to_string(), Vec::new());
        Ok(())
    }

    pub(crate) fn collection(&self, name: &str) -> MemoryResult<&Vec<EngineDoc>> {
        self.collections
            .get(name)
            .ok_or_else(|| MemoryError::collection_not_found(name))
    }

    fn collection_mut(&mut self, name: &str) -> MemoryResult<&mut Vec<EngineDoc>> {
        self.ensure_writable()?;
        self.collections
            .get_mut(name)
            .ok_or_else(|| MemoryError::collection_not_found(name))
    }

    pub(crate) fn next_object_id(&mut self) -> ObjectIdBytes {
        let millis = now_millis().to_be_bytes();
        let counter = self.oid_counter.to_be_bytes();
        self.oid_counter = self.oid_counter.wrapping_add(1);

        let mut oid = [0u8; OBJECT_ID_LEN];
        oid[..8].copy_from_slice(&millis);
        oid[8..].copy_from_slice(&counter);
        oid
    }

    pub(crate) fn insert(&mut self, name: &str, mut doc: EngineDoc) -> MemoryResult<()> {
        self.collection(name)?;
        if doc.get("_id").is_none() {
            let oid = self.next_object_id();
            let mut with_id = EngineDoc::new();
            with_id.insert("_id", EngineValue::ObjectId(oid));
            for (key, value) in doc.entries() {
                with_id.insert(key.clone(), value.clone());
            }
            doc = with_id;
        }

        let docs = self.collection_mut(name)?;
        if let Some(id) = doc.get("_id") {
            if docs
                .iter()
                .any(|existing| existing.get("_id").is_some_and(|e| e.query_eq(id)))
            {
                return Err(MemoryError::DuplicateKey {
                    pkey: id.to_string(),
                });
            }
        }
        docs.push(doc);
        Ok(())
    }

    pub(crate) fn update(
        &mut self,
        name: &str,
        filter: Option<&EngineDoc>,
        update: &EngineDoc,
    ) -> MemoryResult<i64> {
        validate_update(update)?;
        let docs = self.collection_mut(name)?;

        // Apply to copies first so a failing `$inc` leaves the collection untouched.
        let mut updated = docs.clone();
        let mut count = 0i64;
        for doc in &mut updated {
            if filter.map_or(true, |f| doc.matches(f)) {
                apply_update(doc, update)?;
                count += 1;
            }
        }
        *docs = updated;
        Ok(count)
    }

    pub(crate) fn delete(&mut self, name: &str, filter: &EngineDoc) -> MemoryResult<i64> {
        let docs = self.collection_mut(name)?;
        let before = docs.len();
        docs.retain(|doc| !doc.matches(filter));
        Ok(count_i64(before - docs.len()))
    }

    pub(crate) fn delete_all(&mut self, name: &str) -> MemoryResult<i64> {
        let docs = self.collection_mut(name)?;
        let removed = docs.len();
        docs.clear();
        Ok(count_i64(removed))
    }

    pub(crate) fn start_transaction(&mut self, mode: TransactionMode) -> MemoryResult<()> {
        if self.transaction.is_some() {
            return Err(MemoryError::transaction("a transaction is already active"));
        }
        self.transaction = Some(ActiveTransaction {
            mode,
            snapshot: self.collections.clone(),
        });
        Ok(())
    }

    pub(crate) fn commit(&mut self) -> MemoryResult<()> {
        self.transaction
            .take()
            .map(|_| ())
            .ok_or_else(|| MemoryError::transaction("no active transaction to commit"))
    }

    pub(crate) fn rollback(&mut self) -> MemoryResult<()> {
        let txn = self
            .transaction
            .take()
            .ok_or_else(|| MemoryError::transaction("no active transaction to roll back"))?;
        self.collections = txn.snapshot;
        Ok(())
    }

    fn close_session(&mut self) {
        if self.transaction.is_some() {
            tracing::debug!("discarding uncommitted transaction on close");
            // Rollback cannot fail with an active transaction.
            let _ = self.rollback();
        }
        self.open_session = None;
    }
}

fn validate_update(update: &EngineDoc) -> MemoryResult<()> {
    if update.is_empty() {
        return Err(MemoryError::invalid_argument("update document is empty"));
    }
    for (op, arg) in update.entries() {
        match op.as_str() {
            "$set" | "$unset" | "$inc" => {
                let EngineValue::Document(fields) = arg else {
                    return Err(MemoryError::invalid_argument(format!(
                        "argument of {op} must be a document"
                    )));
                };
                if fields.get("_id").is_some() {
                    return Err(MemoryError::invalid_argument(format!(
                        "{op} cannot modify the primary key `_id`"
                    )));
                }
            }
            other if other.starts_with('$') => {
                return Err(MemoryError::invalid_argument(format!(
                    "unknown update operator {other}"
                )));
            }
            field => {
                return Err(MemoryError::invalid_argument(format!(
                    "update document must only contain operators, found field `{field}`"
                )));
            }
        }
    }
    Ok(())
}

fn apply_update(doc: &mut EngineDoc, update: &EngineDoc) -> MemoryResult<()> {
    for (op, arg) in update.entries() {
        let EngineValue::Document(fields) = arg else {
            continue;
        };
        for (key, value) in fields.entries() {
            match op.as_str() {
                "$set" => {
                    doc.insert(key.clone(), value.clone());
                }
                "$unset" => {
                    doc.remove(key);
                }
                "$inc" => {
                    let next = increment(doc.get(key), value)?;
                    doc.insert(key.clone(), next);
                }
                _ => {}
            }
        }
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn increment(current: Option<&EngineValue>, by: &EngineValue) -> MemoryResult<EngineValue> {
    let mismatch = |value: &EngineValue| MemoryError::TypeMismatch {
        expected: "Int or Double",
        actual: value.tag().name(),
    };
    match (current, by) {
        (None, EngineValue::Int(_) | EngineValue::Double(_)) => Ok(by.clone()),
        (Some(EngineValue::Int(a)), EngineValue::Int(b)) => Ok(EngineValue::Int(a.wrapping_add(*b))),
        (Some(EngineValue::Int(a)), EngineValue::Double(b)) => Ok(EngineValue::Double(*a as f64 + b)),
        (Some(EngineValue::Double(a)), EngineValue::Int(b)) => Ok(EngineValue::Double(a + *b as f64)),
        (Some(EngineValue::Double(a)), EngineValue::Double(b)) => Ok(EngineValue::Double(a + b)),
        (Some(EngineValue::Int(_) | EngineValue::Double(_)), other) => Err(mismatch(other)),
        (Some(other), _) | (None, other) => Err(mismatch(other)),
    }
}

fn count_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// The whole mutable state of the in-memory engine.
#[derive(Debug, Default)]
pub(crate) struct EngineState {
    next_token: u64,
    next_session: u64,
    resources: HashMap<u64, Resource>,
    databases: HashMap<PathBuf, DatabaseState>,
    pub(crate) resource_limit: Option<usize>,
    pub(crate) stats: EngineStats,
}

impl EngineState {
    /// Empty state that refuses allocations beyond `limit` live resources.
    pub(crate) fn with_resource_limit(limit: Option<usize>) -> Self {
        Self {
            resource_limit: limit,
            ..Self::default()
        }
    }

    pub(crate) fn alloc(&mut self, resource: Resource) -> MemoryResult<RawHandle> {
        if let Some(limit) = self.resource_limit {
            if self.resources.len() >= limit {
                return Err(MemoryError::OutOfMemory { limit });
            }
        }
        self.next_token += 1;
        let token = self.next_token;
        let kind = resource.kind();
        self.resources.insert(token, resource);
        self.stats.allocated += 1;
        tracing::trace!(token, %kind, "allocated resource");
        // Tokens start at 1, so this never yields the null handle.
        RawHandle::new(token).ok_or(MemoryError::InvalidHandle { token })
    }

    pub(crate) fn get(&self, handle: RawHandle, kind: ResourceKind) -> MemoryResult<&Resource> {
        let token = handle.token();
        let resource = self
            .resources
            .get(&token)
            .ok_or(MemoryError::InvalidHandle { token })?;
        if resource.kind() != kind {
            return Err(MemoryError::WrongKind {
                expected: kind,
                actual: resource.kind(),
            });
        }
        Ok(resource)
    }

    pub(crate) fn get_mut(
        &mut self,
        handle: RawHandle,
        kind: ResourceKind,
    ) -> MemoryResult<&mut Resource> {
        let token = handle.token();
        let resource = self
            .resources
            .get_mut(&token)
            .ok_or(MemoryError::InvalidHandle { token })?;
        if resource.kind() != kind {
            return Err(MemoryError::WrongKind {
                expected: kind,
                actual: resource.kind(),
            });
        }
        Ok(resource)
    }

    /// Releases a resource through the free function of `kind`.
    ///
    /// Violations are counted and logged, never performed.
    pub(crate) fn free(&mut self, handle: RawHandle, kind: ResourceKind) -> Option<Resource> {
        let token = handle.token();
        match self.resources.get(&token).map(Resource::kind) {
            None => {
                self.stats.double_frees += 1;
                tracing::warn!(token, %kind, "free of a handle that is not live");
                None
            }
            Some(actual) if actual != kind => {
                self.stats.misrouted_frees += 1;
                tracing::warn!(token, %kind, %actual, "free routed to the wrong kind");
                None
            }
            Some(_) => {
                self.stats.freed += 1;
                tracing::trace!(token, %kind, "freed resource");
                self.resources.remove(&token)
            }
        }
    }

    /// Removes a resource that is being turned into another one.
    pub(crate) fn consume(&mut self, handle: RawHandle, kind: ResourceKind) -> MemoryResult<Resource> {
        self.get(handle, kind)?;
        self.stats.consumed += 1;
        self.resources
            .remove(&handle.token())
            .ok_or(MemoryError::InvalidHandle {
                token: handle.token(),
            })
    }

    pub(crate) fn live_of_kind(&self, kind: ResourceKind) -> usize {
        self.resources.values().filter(|r| r.kind() == kind).count()
    }

    pub(crate) fn value(&self, handle: RawHandle) -> MemoryResult<&EngineValue> {
        match self.get(handle, ResourceKind::Value)? {
            Resource::Value(v) => Ok(v),
            _ => unreachable!("kind checked by get"),
        }
    }

    pub(crate) fn document(&self, handle: RawHandle) -> MemoryResult<&EngineDoc> {
        match self.get(handle, ResourceKind::Document)? {
            Resource::Document(d) => Ok(d),
            _ => unreachable!("kind checked by get"),
        }
    }

    pub(crate) fn document_mut(&mut self, handle: RawHandle) -> MemoryResult<&mut EngineDoc> {
        match self.get_mut(handle, ResourceKind::Document)? {
            Resource::Document(d) => Ok(d),
            _ => unreachable!("kind checked by get_mut"),
        }
    }

    pub(crate) fn array(&self, handle: RawHandle) -> MemoryResult<&Vec<EngineValue>> {
        match self.get(handle, ResourceKind::Array)? {
            Resource::Array(a) => Ok(a),
            _ => unreachable!("kind checked by get"),
        }
    }

    pub(crate) fn array_mut(&mut self, handle: RawHandle) -> MemoryResult<&mut Vec<EngineValue>> {
        match self.get_mut(handle, ResourceKind::Array)? {
            Resource::Array(a) => Ok(a),
            _ => unreachable!("kind checked by get_mut"),
        }
    }

    pub(crate) fn object_id(&self, handle: RawHandle) -> MemoryResult<ObjectIdBytes> {
        match self.get(handle, ResourceKind::ObjectId)? {
            Resource::ObjectId(oid) => Ok(*oid),
            _ => unreachable!("kind checked by get"),
        }
    }

    pub(crate) fn utc_datetime(&self, handle: RawHandle) -> MemoryResult<i64> {
        match self.get(handle, ResourceKind::UtcDateTime)? {
            Resource::UtcDateTime(ms) => Ok(*ms),
            _ => unreachable!("kind checked by get"),
        }
    }

    pub(crate) fn doc_iter_mut(&mut self, handle: RawHandle) -> MemoryResult<&mut DocIterState> {
        match self.get_mut(handle, ResourceKind::DocumentIter)? {
            Resource::DocumentIter(it) => Ok(it),
            _ => unreachable!("kind checked by get_mut"),
        }
    }

    pub(crate) fn cursor(&self, handle: RawHandle) -> MemoryResult<&CursorRes> {
        match self.get(handle, ResourceKind::Cursor)? {
            Resource::Cursor(c) => Ok(c),
            _ => unreachable!("kind checked by get"),
        }
    }

    fn cursor_mut(&mut self, handle: RawHandle) -> MemoryResult<&mut CursorRes> {
        match self.get_mut(handle, ResourceKind::Cursor)? {
            Resource::Cursor(c) => Ok(c),
            _ => unreachable!("kind checked by get_mut"),
        }
    }

    fn database_res(&self, handle: RawHandle) -> MemoryResult<&DatabaseRes> {
        match self.get(handle, ResourceKind::Database)? {
            Resource::Database(d) => Ok(d),
            _ => unreachable!("kind checked by get"),
        }
    }

    fn session_state(&mut self, path: &Path, session: u64) -> MemoryResult<&mut DatabaseState> {
        match self.databases.get_mut(path) {
            Some(state) if state.open_session == Some(session) => Ok(state),
            _ => Err(MemoryError::DatabaseClosed),
        }
    }

    /// Resolves an open database handle to its state.
    pub(crate) fn database(&mut self, handle: RawHandle) -> MemoryResult<&mut DatabaseState> {
        let (path, session) = {
            let res = self.database_res(handle)?;
            (res.path.clone(), res.session)
        };
        self.session_state(&path, session)
    }

    pub(crate) fn open(&mut self, path: &str) -> MemoryResult<RawHandle> {
        if path.is_empty() {
            return Err(MemoryError::invalid_argument("database path is empty"));
        }
        let path = Path::new(path);
        if path.is_dir() {
            return Err(MemoryError::invalid_argument(format!(
                "database path is a directory: {}",
                path.display()
            )));
        }
        OpenOptions::new().create(true).append(true).open(path)?;
        let key = path.canonicalize()?;

        if self
            .databases
            .get(&key)
            .is_some_and(|state| state.open_session.is_some())
        {
            return Err(MemoryError::DatabaseLocked {
                path: key.display().to_string(),
            });
        }

        self.next_session += 1;
        let session = self.next_session;
        let handle = self.alloc(Resource::Database(DatabaseRes {
            path: key.clone(),
            session,
        }))?;
        self.databases.entry(key.clone()).or_default().open_session = Some(session);
        tracing::debug!(path = %key.display(), session, "opened database");
        Ok(handle)
    }

    pub(crate) fn close(&mut self, handle: RawHandle) {
        if let Some(Resource::Database(res)) = self.free(handle, ResourceKind::Database) {
            if let Some(state) = self.databases.get_mut(&res.path) {
                if state.open_session == Some(res.session) {
                    state.close_session();
                }
            }
            tracing::debug!(path = %res.path.display(), "closed database");
        }
    }

    pub(crate) fn find(
        &mut self,
        db: RawHandle,
        name: &str,
        filter: Option<RawHandle>,
    ) -> MemoryResult<RawHandle> {
        let filter = filter.map(|f| self.document(f).cloned()).transpose()?;
        let (path, session) = {
            let res = self.database_res(db)?;
            (res.path.clone(), res.session)
        };
        self.session_state(&path, session)?.collection(name)?;
        self.alloc(Resource::Cursor(CursorRes {
            path,
            session,
            collection: name.to_string(),
            filter,
            position: 0,
            state: cursor_state::INITIAL,
            current: None,
        }))
    }

    pub(crate) fn step_cursor(&mut self, handle: RawHandle) -> MemoryResult<()> {
        let cursor = self.cursor(handle)?;
        match cursor.state {
            cursor_state::EXHAUSTED => return Ok(()),
            cursor_state::ERRORED => {
                return Err(MemoryError::invalid_argument("cursor is in an error state"))
            }
            _ => {}
        }
        let path = cursor.path.clone();
        let session = cursor.session;
        let collection = cursor.collection.clone();
        let start = cursor.position;
        let filter = cursor.filter.clone();

        let outcome = self.session_state(&path, session).and_then(|state| {
            let docs = state.collection(&collection)?;
            Ok(docs
                .iter()
                .enumerate()
                .skip(start)
                .find(|(_, doc)| filter.as_ref().map_or(true, |f| doc.matches(f)))
                .map(|(idx, doc)| (idx, doc.clone())))
        });

        let cursor = self.cursor_mut(handle)?;
        match outcome {
            Ok(Some((idx, doc))) => {
                cursor.position = idx + 1;
                cursor.current = Some(doc);
                cursor.state = cursor_state::HAS_ROW;
                Ok(())
            }
            Ok(None) => {
                cursor.current = None;
                cursor.state = cursor_state::EXHAUSTED;
                Ok(())
            }
            Err(err) => {
                cursor.current = None;
                cursor.state = cursor_state::ERRORED;
                Err(err)
            }
        }
    }
}
