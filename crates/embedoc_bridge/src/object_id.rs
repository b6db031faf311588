//! Object ids.

use crate::error::BridgeResult;
use crate::registry::{ExternalHandle, HandleWrapper};
use crate::value::Value;
use embedoc_engine::ResourceKind;
use std::fmt;

/// A handle to an engine-generated object id.
///
/// Two ids are equal when they render to the same hex string.
#[derive(Debug, Clone)]
pub struct ObjectId {
    handle: ExternalHandle,
}

impl HandleWrapper for ObjectId {
    const KIND: ResourceKind = ResourceKind::ObjectId;

    fn wrap_unchecked(handle: ExternalHandle) -> Self {
        Self { handle }
    }

    fn handle(&self) -> &ExternalHandle {
        &self.handle
    }
}

impl ObjectId {
    /// Wraps a copy of the id into a value.
    pub fn to_value(&self) -> BridgeResult<Value> {
        let registry = self.handle.registry();
        registry
            .adopt(
                registry.engine().object_id_to_value(self.raw()?),
                ResourceKind::Value,
            )
            .map(Value::wrap_unchecked)
    }

    /// Renders the id as 24 lowercase hex characters.
    pub fn to_hex(&self) -> BridgeResult<String> {
        let registry = self.handle.registry();
        let mut out = String::new();
        registry.check(registry.engine().object_id_to_hex(self.raw()?, &mut out))?;
        Ok(out)
    }
}

impl PartialEq for ObjectId {
    fn eq(&self, other: &Self) -> bool {
        if self.handle.ptr_eq(&other.handle) {
            return true;
        }
        match (self.to_hex(), other.to_hex()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_hex() {
            Ok(hex) => f.write_str(&hex),
            Err(_) => f.write_str("ObjectId(<released>)"),
        }
    }
}
