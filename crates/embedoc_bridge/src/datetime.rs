//! UTC timestamps.

use crate::error::BridgeResult;
use crate::registry::{ExternalHandle, HandleWrapper};
use crate::value::Value;
use embedoc_engine::ResourceKind;

/// A handle to an engine timestamp, in milliseconds since the Unix epoch.
#[derive(Debug, Clone)]
pub struct UtcDateTime {
    handle: ExternalHandle,
}

impl HandleWrapper for UtcDateTime {
    const KIND: ResourceKind = ResourceKind::UtcDateTime;

    fn wrap_unchecked(handle: ExternalHandle) -> Self {
        Self { handle }
    }

    fn handle(&self) -> &ExternalHandle {
        &self.handle
    }
}

impl UtcDateTime {
    /// Milliseconds since the Unix epoch.
    pub fn millis(&self) -> BridgeResult<i64> {
        let registry = self.handle.registry();
        let mut out = 0;
        registry.check(registry.engine().utc_datetime_millis(self.raw()?, &mut out))?;
        Ok(out)
    }

    /// Wraps a copy of the timestamp into a value.
    pub fn to_value(&self) -> BridgeResult<Value> {
        let registry = self.handle.registry();
        registry
            .adopt(
                registry.engine().utc_datetime_to_value(self.raw()?),
                ResourceKind::Value,
            )
            .map(Value::wrap_unchecked)
    }
}
