//! Explicit transactions.

use crate::database::Database;
use crate::error::BridgeResult;
use embedoc_engine::TransactionMode;

impl Database {
    /// Starts an explicit transaction.
    ///
    /// Fails when one is already active.
    pub fn start_transaction(&self, mode: TransactionMode) -> BridgeResult<()> {
        let raw = self.raw()?;
        let registry = self.handle().registry();
        registry.check(registry.engine().start_transaction(raw, mode.flags()))?;
        tracing::trace!(?mode, "transaction started");
        Ok(())
    }

    /// Commits the active transaction.
    pub fn commit(&self) -> BridgeResult<()> {
        let raw = self.raw()?;
        let registry = self.handle().registry();
        registry.check(registry.engine().commit(raw))?;
        tracing::trace!("transaction committed");
        Ok(())
    }

    /// Rolls back the active transaction.
    pub fn rollback(&self) -> BridgeResult<()> {
        let raw = self.raw()?;
        let registry = self.handle().registry();
        registry.check(registry.engine().rollback(raw))?;
        tracing::trace!("transaction rolled back");
        Ok(())
    }

    /// Runs `f` inside a transaction.
    ///
    /// Commits when `f` succeeds. When `f` fails the transaction is rolled
    /// back and the error of `f` is returned. If the rollback fails too, the
    /// error of `f` keeps its variant and its reason gains a
    /// "rollback also failed" note. A failed commit is returned as is.
    ///
    /// # Example
    ///
    /// ```rust
    /// use embedoc_bridge::{Bridge, HostObject};
    /// use embedoc_engine::{MemoryEngine, TransactionMode};
    /// use std::rc::Rc;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let bridge = Bridge::new(Rc::new(MemoryEngine::new()));
    /// let db = bridge.open(dir.path().join("app.db")).unwrap();
    /// let users = db.create_collection("users").unwrap();
    ///
    /// let inserted = db.transaction(TransactionMode::Write, |_| {
    ///     users.insert_object(&HostObject::new().with("name", "a"))?;
    ///     users.count()
    /// });
    /// assert_eq!(inserted.unwrap(), 1);
    /// ```
    pub fn transaction<T>(
        &self,
        mode: TransactionMode,
        f: impl FnOnce(&Database) -> BridgeResult<T>,
    ) -> BridgeResult<T> {
        self.start_transaction(mode)?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => match self.rollback() {
                Ok(()) => Err(err),
                Err(rollback) => {
                    tracing::warn!(error = %err, rollback = %rollback, "rollback failed");
                    Err(err.with_note(&format!("rollback also failed: {}", rollback.detail())))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::BridgeError;
    use crate::host::{HostObject, HostValue};
    use crate::Bridge;
    use embedoc_engine::{MemoryEngine, TransactionMode};
    use std::rc::Rc;
    use tempfile::TempDir;

    fn open() -> (TempDir, crate::Database) {
        let dir = TempDir::new().unwrap();
        let bridge = Bridge::new(Rc::new(MemoryEngine::new()));
        let db = bridge.open(dir.path().join("txn.db")).unwrap();
        (dir, db)
    }

    #[test]
    fn rollback_restores_count() {
        let (_dir, db) = open();
        let c = db.create_collection("c").unwrap();
        c.insert_object(&HostObject::new().with("n", 1)).unwrap();

        db.start_transaction(TransactionMode::Write).unwrap();
        c.insert_object(&HostObject::new().with("n", 2)).unwrap();
        assert_eq!(c.count().unwrap(), 2);
        db.rollback().unwrap();
        assert_eq!(c.count().unwrap(), 1);
    }

    #[test]
    fn misuse_is_reported() {
        let (_dir, db) = open();
        assert!(matches!(db.commit(), Err(BridgeError::Engine { .. })));
        assert!(matches!(db.rollback(), Err(BridgeError::Engine { .. })));
        db.start_transaction(TransactionMode::Auto).unwrap();
        assert!(db.start_transaction(TransactionMode::Write).is_err());
        db.commit().unwrap();
    }

    #[test]
    fn read_transaction_rejects_writes() {
        let (_dir, db) = open();
        let c = db.create_collection("c").unwrap();
        db.start_transaction(TransactionMode::Read).unwrap();
        assert!(c.insert_object(&HostObject::new()).is_err());
        db.commit().unwrap();
    }

    #[test]
    fn closure_failure_rolls_back() {
        let (_dir, db) = open();
        let c = db.create_collection("c").unwrap();

        let result: Result<(), _> = db.transaction(TransactionMode::Write, |_| {
            c.insert_object(&HostObject::new().with("n", 1))?;
            Err(BridgeError::engine("boom"))
        });
        assert_eq!(result, Err(BridgeError::engine("boom")));
        assert_eq!(c.count().unwrap(), 0);
    }

    #[test]
    fn rollback_failure_is_appended_to_the_original_error() {
        let (_dir, db) = open();
        let result: Result<(), _> = db.transaction(TransactionMode::Write, |db| {
            db.rollback()?;
            Err(BridgeError::engine("boom"))
        });
        let Err(BridgeError::Engine { message }) = result else {
            panic!("expected an engine error");
        };
        assert!(message.starts_with("boom; rollback also failed: "), "{message}");
        assert!(!message.contains("engine error"), "{message}");
    }

    #[test]
    fn rollback_failure_keeps_conversion_errors() {
        let (_dir, db) = open();
        let c = db.create_collection("c").unwrap();
        let result = db.transaction(TransactionMode::Write, |db| {
            db.rollback()?;
            c.insert_object(&HostObject::new().with("f", HostValue::Undefined))
        });
        let Err(BridgeError::Conversion { path, message }) = result else {
            panic!("expected a conversion error");
        };
        assert_eq!(path, "f");
        assert!(
            message.starts_with("unsupported value type undefined; rollback also failed: "),
            "{message}"
        );
    }
}
