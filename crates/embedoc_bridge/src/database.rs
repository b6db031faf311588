//! Databases and collections.

use crate::bridge::Bridge;
use crate::cursor::Cursor;
use crate::document::Document;
use crate::error::{BridgeError, BridgeResult};
use crate::host::HostObject;
use crate::object_id::ObjectId;
use crate::registry::{ExternalHandle, HandleWrapper, WeakHandle};
use crate::value::c_string;
use embedoc_engine::{EngineStatus, RawHandle, ResourceKind};
use std::ffi::CString;
use std::path::{Path, PathBuf};

impl Bridge {
    /// Opens the database stored at `path`.
    ///
    /// Opening a path that is already open through this engine fails with
    /// the engine's "database is locked" message.
    pub fn open(&self, path: impl AsRef<Path>) -> BridgeResult<Database> {
        let path = path.as_ref();
        let utf8 = path
            .to_str()
            .ok_or_else(|| BridgeError::type_mismatch("UTF-8 path", "non-UTF-8 path"))?;
        let c_path = c_string(utf8)?;
        let registry = self.registry();
        let handle = registry
            .adopt(registry.engine().open(&c_path), ResourceKind::Database)
            .inspect_err(|err| tracing::debug!(path = %path.display(), error = %err, "open failed"))?;
        tracing::debug!(path = %path.display(), "database opened");
        Ok(Database {
            bridge: self.clone(),
            handle,
            path: path.to_path_buf(),
        })
    }
}

/// An open database.
///
/// Clones share one handle: closing any of them closes the database for all.
/// A database that is dropped without [`close`](Self::close) is closed by
/// its finalizer.
#[derive(Debug, Clone)]
pub struct Database {
    bridge: Bridge,
    handle: ExternalHandle,
    path: PathBuf,
}

impl Database {
    /// Closes the database. Repeated calls are no-ops.
    ///
    /// An uncommitted transaction is rolled back by the engine.
    pub fn close(&self) {
        if self.handle.is_live() {
            tracing::debug!(path = %self.path.display(), "closing database");
        }
        self.handle.release();
    }

    /// Returns true until the database is closed.
    pub fn is_open(&self) -> bool {
        self.handle.is_live()
    }

    /// Path the database was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The bridge that opened this database.
    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// The underlying handle.
    pub fn handle(&self) -> &ExternalHandle {
        &self.handle
    }

    /// Engine version string.
    pub fn version(&self) -> String {
        self.bridge.version()
    }

    pub(crate) fn raw(&self) -> BridgeResult<RawHandle> {
        self.handle.raw()
    }

    /// Returns a collection facade without touching the engine.
    pub fn collection(&self, name: &str) -> BridgeResult<Collection> {
        Ok(Collection {
            bridge: self.bridge.clone(),
            db: self.handle.downgrade(),
            path: self.path.clone(),
            name: name.to_string(),
            c_name: c_string(name)?,
        })
    }

    /// Creates a collection and returns its facade.
    pub fn create_collection(&self, name: &str) -> BridgeResult<Collection> {
        let collection = self.collection(name)?;
        collection.create()?;
        Ok(collection)
    }

    /// Generates a new object id.
    pub fn make_object_id(&self) -> BridgeResult<ObjectId> {
        let registry = self.handle.registry();
        registry
            .adopt(
                registry.engine().make_object_id(self.raw()?),
                ResourceKind::ObjectId,
            )
            .map(ObjectId::wrap_unchecked)
    }
}

/// A named collection of a [`Database`].
///
/// Holds a weak reference to the database handle and the collection name
/// side by side. It does not keep the database alive: once the database is
/// closed, or finalized after the host drops it, every operation fails with
/// `UseAfterRelease`.
#[derive(Debug, Clone)]
pub struct Collection {
    bridge: Bridge,
    db: WeakHandle,
    path: PathBuf,
    name: String,
    c_name: CString,
}

impl Collection {
    /// Collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning database, while it is still reachable.
    pub fn database(&self) -> BridgeResult<Database> {
        Ok(Database {
            bridge: self.bridge.clone(),
            handle: self.db.upgrade()?,
            path: self.path.clone(),
        })
    }

    fn check(&self, call: impl FnOnce(RawHandle) -> EngineStatus) -> BridgeResult<()> {
        let db = self.db.upgrade()?;
        let raw = db.raw()?;
        self.bridge.registry().check(call(raw))
    }

    /// Creates the collection in the engine.
    pub fn create(&self) -> BridgeResult<()> {
        let engine = self.bridge.registry().engine();
        self.check(|db| engine.create_collection(db, &self.c_name))
    }

    /// Number of documents.
    pub fn count(&self) -> BridgeResult<i64> {
        let engine = self.bridge.registry().engine();
        let mut out = 0;
        self.check(|db| engine.count(db, &self.c_name, &mut out))?;
        Ok(out)
    }

    /// Inserts a copy of `doc`. The caller keeps ownership of `doc`.
    pub fn insert(&self, doc: &Document) -> BridgeResult<()> {
        let doc = doc.raw()?;
        let engine = self.bridge.registry().engine();
        self.check(|db| engine.insert(db, &self.c_name, doc))
    }

    /// Converts a host object and inserts it.
    ///
    /// A conversion failure is returned before the engine is called.
    pub fn insert_object(&self, obj: &HostObject) -> BridgeResult<()> {
        let doc = self.bridge.to_document(obj)?;
        self.insert(&doc)
    }

    /// Runs a query. `None` matches every document.
    pub fn find(&self, filter: Option<&Document>) -> BridgeResult<Cursor> {
        let filter = filter.map(Document::raw).transpose()?;
        let registry = self.bridge.registry();
        let engine = registry.engine();
        let mut out = None;
        self.check(|db| engine.find(db, &self.c_name, filter, &mut out))?;
        registry
            .adopt(out, ResourceKind::Cursor)
            .map(Cursor::wrap_unchecked)
    }

    /// Runs a query matching every document.
    pub fn find_all(&self) -> BridgeResult<Cursor> {
        self.find(None)
    }

    /// Runs a query and converts every row into a host object.
    pub fn find_objects(&self, filter: Option<&HostObject>) -> BridgeResult<Vec<HostObject>> {
        let filter = filter
            .map(|obj| self.bridge.to_document(obj))
            .transpose()?;
        let cursor = self.find(filter.as_ref())?;
        let objects: BridgeResult<Vec<HostObject>> = cursor
            .rows()
            .map(|row| row?.get_document()?.to_host_object())
            .collect();
        cursor.release();
        objects
    }

    /// Applies `$set`, `$unset` and `$inc` operators to matching documents
    /// and returns the number updated.
    pub fn update(&self, filter: Option<&Document>, update: &Document) -> BridgeResult<i64> {
        let filter = filter.map(Document::raw).transpose()?;
        let update = update.raw()?;
        let engine = self.bridge.registry().engine();
        let mut out = 0;
        self.check(|db| engine.update(db, &self.c_name, filter, update, &mut out))?;
        Ok(out)
    }

    /// Host-object form of [`update`](Self::update).
    pub fn update_objects(
        &self,
        filter: Option<&HostObject>,
        update: &HostObject,
    ) -> BridgeResult<i64> {
        let bridge = &self.bridge;
        let filter = filter.map(|obj| bridge.to_document(obj)).transpose()?;
        let update = bridge.to_document(update)?;
        self.update(filter.as_ref(), &update)
    }

    /// Deletes matching documents and returns how many were removed.
    pub fn delete(&self, filter: &Document) -> BridgeResult<i64> {
        let filter = filter.raw()?;
        let engine = self.bridge.registry().engine();
        let mut out = 0;
        self.check(|db| engine.delete(db, &self.c_name, filter, &mut out))?;
        Ok(out)
    }

    /// Host-object form of [`delete`](Self::delete).
    pub fn delete_objects(&self, filter: &HostObject) -> BridgeResult<i64> {
        let filter = self.bridge.to_document(filter)?;
        self.delete(&filter)
    }

    /// Deletes every document and returns how many were removed.
    pub fn delete_all(&self) -> BridgeResult<i64> {
        let engine = self.bridge.registry().engine();
        let mut out = 0;
        self.check(|db| engine.delete_all(db, &self.c_name, &mut out))?;
        Ok(out)
    }
}
