//! Documents and document iterators.

use crate::error::BridgeResult;
use crate::registry::{ExternalHandle, HandleWrapper};
use crate::value::{c_string, Value};
use embedoc_engine::ResourceKind;
use std::cell::Cell;

/// A handle to an ordered, string-keyed engine document.
#[derive(Debug, Clone)]
pub struct Document {
    handle: ExternalHandle,
}

impl HandleWrapper for Document {
    const KIND: ResourceKind = ResourceKind::Document;

    fn wrap_unchecked(handle: ExternalHandle) -> Self {
        Self { handle }
    }

    fn handle(&self) -> &ExternalHandle {
        &self.handle
    }
}

impl Document {
    /// Sets `key` to a copy of `value`.
    ///
    /// An existing key keeps its position. `value` stays owned by the caller.
    pub fn set(&self, key: &str, value: &Value) -> BridgeResult<()> {
        let key = c_string(key)?;
        let registry = self.handle.registry();
        registry.check(
            registry
                .engine()
                .document_set(self.raw()?, &key, value.raw()?),
        )
    }

    /// Returns a copy of the value stored under `key`.
    pub fn get(&self, key: &str) -> BridgeResult<Option<Value>> {
        let key = c_string(key)?;
        let registry = self.handle.registry();
        let mut out = None;
        registry.check(registry.engine().document_get(self.raw()?, &key, &mut out))?;
        Ok(out.map(|raw| Value::wrap_unchecked(registry.register(raw, ResourceKind::Value))))
    }

    /// Number of entries.
    pub fn len(&self) -> BridgeResult<usize> {
        let registry = self.handle.registry();
        let len = registry.engine().document_len(self.raw()?);
        usize::try_from(len).map_err(|_| registry.last_error("document_len failed"))
    }

    /// Returns true when the document has no entries.
    pub fn is_empty(&self) -> BridgeResult<bool> {
        self.len().map(|n| n == 0)
    }

    /// Iterates over a snapshot of the entries, in insertion order.
    pub fn iter(&self) -> BridgeResult<DocumentIter> {
        let registry = self.handle.registry();
        registry
            .adopt(
                registry.engine().document_iter(self.raw()?),
                ResourceKind::DocumentIter,
            )
            .map(DocumentIter::wrap_unchecked)
    }

    /// Wraps this document into a value.
    ///
    /// The engine takes the document over; this handle and its clones are
    /// marked transferred and fail with `UseAfterRelease` from now on.
    pub fn into_value(self) -> BridgeResult<Value> {
        let registry = self.handle.registry().clone();
        let raw = registry.engine().document_into_value(self.raw()?);
        if raw.is_some() {
            self.handle.mark_transferred();
        }
        registry
            .adopt(raw, ResourceKind::Value)
            .map(Value::wrap_unchecked)
    }
}

/// A single-pass iterator over `(key, value)` pairs of a document snapshot.
///
/// Fused: once it has returned `None` it never calls the engine again.
#[derive(Debug, Clone)]
pub struct DocumentIter {
    handle: ExternalHandle,
    done: Cell<bool>,
}

impl HandleWrapper for DocumentIter {
    const KIND: ResourceKind = ResourceKind::DocumentIter;

    fn wrap_unchecked(handle: ExternalHandle) -> Self {
        Self {
            handle,
            done: Cell::new(false),
        }
    }

    fn handle(&self) -> &ExternalHandle {
        &self.handle
    }
}

impl DocumentIter {
    /// Returns the next entry, or `None` at the end.
    pub fn next_entry(&self) -> BridgeResult<Option<(String, Value)>> {
        if self.done.get() {
            return Ok(None);
        }
        let registry = self.handle.registry();
        let mut key = String::new();
        let mut value = None;
        let status = registry
            .engine()
            .document_iter_next(self.raw()?, &mut key, &mut value);
        if let Err(err) = registry.check(status) {
            self.done.set(true);
            return Err(err);
        }
        match value {
            Some(raw) => Ok(Some((
                key,
                Value::wrap_unchecked(registry.register(raw, ResourceKind::Value)),
            ))),
            None => {
                self.done.set(true);
                Ok(None)
            }
        }
    }
}

impl Iterator for DocumentIter {
    type Item = BridgeResult<(String, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

impl std::iter::FusedIterator for DocumentIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::registry::HandleState;
    use crate::Bridge;
    use embedoc_engine::MemoryEngine;
    use std::rc::Rc;

    fn setup() -> (Rc<MemoryEngine>, Bridge) {
        let engine = Rc::new(MemoryEngine::new());
        (engine.clone(), Bridge::new(engine))
    }

    #[test]
    fn set_get_len_and_overwrite_order() {
        let (_engine, bridge) = setup();
        let doc = bridge.make_document().unwrap();
        doc.set("b", &bridge.int_value(1).unwrap()).unwrap();
        doc.set("a", &bridge.string_value("x").unwrap()).unwrap();
        doc.set("b", &bridge.int_value(2).unwrap()).unwrap();

        assert_eq!(doc.len().unwrap(), 2);
        assert_eq!(doc.get("b").unwrap().unwrap().get_int64().unwrap(), 2);
        assert!(doc.get("missing").unwrap().is_none());

        let keys: Vec<String> = doc.iter().unwrap().map(|e| e.unwrap().0).collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn iterator_is_a_snapshot() {
        let (_engine, bridge) = setup();
        let doc = bridge.make_document().unwrap();
        doc.set("x", &bridge.bool_value(true).unwrap()).unwrap();
        let iter = doc.iter().unwrap();
        doc.set("y", &bridge.bool_value(false).unwrap()).unwrap();

        assert_eq!(iter.count(), 1);
    }

    #[test]
    fn into_value_transfers_ownership() {
        let (engine, bridge) = setup();
        let doc = bridge.make_document().unwrap();
        let alias = doc.clone();
        let value = doc.into_value().unwrap();

        assert_eq!(alias.handle().state(), HandleState::Transferred);
        assert_eq!(
            alias.len(),
            Err(BridgeError::UseAfterRelease {
                kind: ResourceKind::Document
            })
        );
        assert_eq!(value.type_name().unwrap(), "Document");
        drop(alias);
        drop(value);

        let stats = engine.stats();
        assert_eq!(stats.live(), 0);
        assert!(stats.is_clean());
    }

    #[test]
    fn key_with_nul_is_refused() {
        let (_engine, bridge) = setup();
        let doc = bridge.make_document().unwrap();
        let value = bridge.make_null().unwrap();
        assert!(matches!(
            doc.set("a\0", &value),
            Err(BridgeError::TypeMismatch { .. })
        ));
    }
}
