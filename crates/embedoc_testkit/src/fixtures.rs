//! Test fixtures and database helpers.
//!
//! A [`TestBridge`] owns a [`MemoryEngine`], a [`Bridge`] over it and a
//! temporary directory for database files. Because the engine counts every
//! allocation and free, a fixture can check at the end of a test that every
//! handle was released exactly once.

use embedoc_bridge::{Bridge, BridgeConfig, Collection, Database, HostObject, HostValue};
use embedoc_engine::{EngineStats, MemoryEngine};
use std::path::PathBuf;
use std::rc::Rc;
use tempfile::TempDir;

/// A bridge over a fresh in-memory engine with automatic cleanup.
pub struct TestBridge {
    /// The engine, for inspecting allocation counters.
    pub engine: Rc<MemoryEngine>,
    /// The bridge under test.
    pub bridge: Bridge,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: TempDir,
}

impl TestBridge {
    /// Creates a fixture with the default bridge configuration.
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    /// Creates a fixture with the given bridge configuration.
    pub fn with_config(config: BridgeConfig) -> Self {
        let engine = Rc::new(MemoryEngine::new());
        let bridge = Bridge::with_config(engine.clone(), config);
        Self {
            engine,
            bridge,
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Path of a database file inside the fixture's directory.
    pub fn db_path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Opens `test.db` in the fixture's directory.
    pub fn open(&self) -> Database {
        self.bridge
            .open(self.db_path("test.db"))
            .expect("Failed to open test database")
    }

    /// Current engine counters.
    pub fn stats(&self) -> EngineStats {
        self.engine.stats()
    }

    /// Panics unless every resource was freed and no free was repeated or
    /// sent to the wrong kind.
    pub fn assert_no_leaks(&self) {
        let stats = self.stats();
        assert_eq!(stats.live(), 0, "live engine resources remain: {stats:?}");
        assert!(stats.is_clean(), "release protocol violated: {stats:?}");
    }
}

impl Default for TestBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestBridge {
    type Target = Bridge;

    fn deref(&self) -> &Self::Target {
        &self.bridge
    }
}

/// Runs a test with an open database, closes it and checks for leaks.
///
/// Handles created inside `f` must be dropped by the time it returns.
pub fn with_test_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let fixture = TestBridge::new();
    let db = fixture.open();
    let result = f(&db);
    db.close();
    drop(db);
    fixture.assert_no_leaks();
    result
}

/// Runs a test with a freshly created collection.
pub fn with_test_collection<F, R>(name: &str, f: F) -> R
where
    F: FnOnce(&Collection) -> R,
{
    with_test_db(|db| {
        let collection = db
            .create_collection(name)
            .expect("Failed to create collection");
        f(&collection)
    })
}

/// Builds a host object from a JSON object literal.
///
/// # Panics
///
/// Panics when `json` is not an object.
pub fn host_object(json: serde_json::Value) -> HostObject {
    match HostValue::from(json) {
        HostValue::Object(obj) => obj,
        other => panic!("expected a JSON object, got {}", other.type_name()),
    }
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Opens a database with a `users` collection holding `count` users.
    ///
    /// User `i` is `{name: "user<i>", age: i}`.
    pub fn populated_users(count: usize) -> (TestBridge, Database, Collection) {
        let fixture = TestBridge::new();
        let db = fixture.open();
        let users = db
            .create_collection("users")
            .expect("Failed to create collection");
        for i in 0..count {
            let user = HostObject::new()
                .with("name", format!("user{i}"))
                .with("age", HostValue::Number(i as f64));
            users.insert_object(&user).expect("Failed to insert user");
        }
        (fixture, db, users)
    }
}
