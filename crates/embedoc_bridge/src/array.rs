//! Arrays of engine values.

use crate::error::BridgeResult;
use crate::registry::{ExternalHandle, HandleWrapper};
use crate::value::Value;
use embedoc_engine::ResourceKind;

/// A handle to an ordered, append-only engine array.
#[derive(Debug, Clone)]
pub struct Array {
    handle: ExternalHandle,
}

impl HandleWrapper for Array {
    const KIND: ResourceKind = ResourceKind::Array;

    fn wrap_unchecked(handle: ExternalHandle) -> Self {
        Self { handle }
    }

    fn handle(&self) -> &ExternalHandle {
        &self.handle
    }
}

impl Array {
    /// Appends a copy of `value`. `value` stays owned by the caller.
    pub fn push(&self, value: &Value) -> BridgeResult<()> {
        let registry = self.handle.registry();
        registry.check(registry.engine().array_push(self.raw()?, value.raw()?))
    }

    /// Returns a copy of the element at `index`, or `None` when out of range.
    pub fn get(&self, index: usize) -> BridgeResult<Option<Value>> {
        let Ok(index) = u32::try_from(index) else {
            return Ok(None);
        };
        let registry = self.handle.registry();
        let mut out = None;
        registry.check(registry.engine().array_get(self.raw()?, index, &mut out))?;
        Ok(out.map(|raw| Value::wrap_unchecked(registry.register(raw, ResourceKind::Value))))
    }

    /// Number of elements.
    pub fn len(&self) -> BridgeResult<usize> {
        let registry = self.handle.registry();
        let len = registry.engine().array_len(self.raw()?);
        usize::try_from(len).map_err(|_| registry.last_error("array_len failed"))
    }

    /// Returns true when the array has no elements.
    pub fn is_empty(&self) -> BridgeResult<bool> {
        self.len().map(|n| n == 0)
    }

    /// Wraps this array into a value, transferring it to the engine.
    pub fn into_value(self) -> BridgeResult<Value> {
        let registry = self.handle.registry().clone();
        let raw = registry.engine().array_into_value(self.raw()?);
        if raw.is_some() {
            self.handle.mark_transferred();
        }
        registry
            .adopt(raw, ResourceKind::Value)
            .map(Value::wrap_unchecked)
    }
}
