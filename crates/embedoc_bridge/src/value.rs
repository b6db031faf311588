//! Tagged engine values.

use crate::array::Array;
use crate::datetime::UtcDateTime;
use crate::document::Document;
use crate::error::{BridgeError, BridgeResult};
use crate::object_id::ObjectId;
use crate::registry::{ExternalHandle, HandleWrapper};
use embedoc_engine::{Engine, EngineStatus, RawHandle, ResourceKind, ValueTag};
use std::ffi::CString;

/// Copies a host string into a null-terminated buffer.
pub(crate) fn c_string(s: &str) -> BridgeResult<CString> {
    CString::new(s).map_err(|_| BridgeError::type_mismatch("string", "string with interior NUL"))
}

/// A handle to an engine value.
///
/// The value's type is only known by asking the engine for its tag. Every
/// accessor checks the tag first and fails with
/// [`BridgeError::TypeMismatch`] instead of reading the wrong type.
#[derive(Debug, Clone)]
pub struct Value {
    handle: ExternalHandle,
}

impl HandleWrapper for Value {
    const KIND: ResourceKind = ResourceKind::Value;

    fn wrap_unchecked(handle: ExternalHandle) -> Self {
        Self { handle }
    }

    fn handle(&self) -> &ExternalHandle {
        &self.handle
    }
}

impl Value {
    /// Returns the value's tag.
    pub fn tag(&self) -> BridgeResult<ValueTag> {
        let registry = self.handle.registry();
        let code = registry.engine().value_type(self.raw()?);
        if code < 0 {
            return Err(registry.last_error("value_type failed"));
        }
        ValueTag::try_from(code)
            .map_err(|code| BridgeError::engine(format!("unknown value tag {code:#x}")))
    }

    /// Returns the type name: `"Null"`, `"Double"`, `"Boolean"`, `"Int"`,
    /// `"String"`, `"ObjectId"`, `"Array"`, `"Document"` or `"UTCDateTime"`.
    pub fn type_name(&self) -> BridgeResult<&'static str> {
        self.tag().map(ValueTag::name)
    }

    /// Returns true for Null.
    pub fn is_null(&self) -> BridgeResult<bool> {
        Ok(self.tag()? == ValueTag::Null)
    }

    fn expect(&self, expected: ValueTag) -> BridgeResult<RawHandle> {
        let actual = self.tag()?;
        if actual != expected {
            return Err(BridgeError::type_mismatch(expected.name(), actual.name()));
        }
        self.raw()
    }

    /// Reads an Int.
    pub fn get_int64(&self) -> BridgeResult<i64> {
        let raw = self.expect(ValueTag::Int)?;
        let registry = self.handle.registry();
        let mut out = 0;
        registry.check(registry.engine().value_get_i64(raw, &mut out))?;
        Ok(out)
    }

    /// Reads a Double.
    pub fn get_double(&self) -> BridgeResult<f64> {
        let raw = self.expect(ValueTag::Double)?;
        let registry = self.handle.registry();
        let mut out = 0.0;
        registry.check(registry.engine().value_get_double(raw, &mut out))?;
        Ok(out)
    }

    /// Reads a Boolean.
    pub fn get_bool(&self) -> BridgeResult<bool> {
        let raw = self.expect(ValueTag::Boolean)?;
        let registry = self.handle.registry();
        let mut out = false;
        registry.check(registry.engine().value_get_bool(raw, &mut out))?;
        Ok(out)
    }

    /// Reads a String.
    pub fn get_string(&self) -> BridgeResult<String> {
        let raw = self.expect(ValueTag::String)?;
        let registry = self.handle.registry();
        let mut out = String::new();
        registry.check(registry.engine().value_get_string(raw, &mut out))?;
        Ok(out)
    }

    /// Reads an Int or a Double as a float.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_number(&self) -> BridgeResult<f64> {
        match self.tag()? {
            ValueTag::Int => self.get_int64().map(|i| i as f64),
            ValueTag::Double => self.get_double(),
            other => Err(BridgeError::type_mismatch("Int or Double", other.name())),
        }
    }

    /// Copies out the Array held by this value.
    pub fn get_array(&self) -> BridgeResult<Array> {
        let raw = self.expect(ValueTag::Array)?;
        self.get_handle(ResourceKind::Array, |engine, out| {
            engine.value_get_array(raw, out)
        })
        .map(Array::wrap_unchecked)
    }

    /// Copies out the Document held by this value.
    pub fn get_document(&self) -> BridgeResult<Document> {
        let raw = self.expect(ValueTag::Document)?;
        self.get_handle(ResourceKind::Document, |engine, out| {
            engine.value_get_document(raw, out)
        })
        .map(Document::wrap_unchecked)
    }

    /// Copies out the ObjectId held by this value.
    pub fn get_object_id(&self) -> BridgeResult<ObjectId> {
        let raw = self.expect(ValueTag::ObjectId)?;
        self.get_handle(ResourceKind::ObjectId, |engine, out| {
            engine.value_get_object_id(raw, out)
        })
        .map(ObjectId::wrap_unchecked)
    }

    /// Copies out the UTCDateTime held by this value.
    pub fn get_utc_datetime(&self) -> BridgeResult<UtcDateTime> {
        let raw = self.expect(ValueTag::UtcDateTime)?;
        self.get_handle(ResourceKind::UtcDateTime, |engine, out| {
            engine.value_get_utc_datetime(raw, out)
        })
        .map(UtcDateTime::wrap_unchecked)
    }

    fn get_handle(
        &self,
        kind: ResourceKind,
        call: impl FnOnce(&dyn Engine, &mut Option<RawHandle>) -> EngineStatus,
    ) -> BridgeResult<ExternalHandle> {
        let registry = self.handle.registry();
        let mut out = None;
        registry.check(call(registry.engine(), &mut out))?;
        registry.adopt(out, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bridge;
    use embedoc_engine::MemoryEngine;
    use std::rc::Rc;

    fn bridge() -> Bridge {
        Bridge::new(Rc::new(MemoryEngine::new()))
    }

    #[test]
    fn accessors_check_the_tag() {
        let bridge = bridge();
        let values = [
            bridge.make_null().unwrap(),
            bridge.int_value(1).unwrap(),
            bridge.double_value(1.5).unwrap(),
            bridge.bool_value(true).unwrap(),
            bridge.string_value("s").unwrap(),
        ];

        for value in &values {
            let tag = value.tag().unwrap();
            let results = [
                (ValueTag::Int, value.get_int64().is_ok()),
                (ValueTag::Double, value.get_double().is_ok()),
                (ValueTag::Boolean, value.get_bool().is_ok()),
                (ValueTag::String, value.get_string().is_ok()),
                (ValueTag::Array, value.get_array().is_ok()),
                (ValueTag::Document, value.get_document().is_ok()),
                (ValueTag::ObjectId, value.get_object_id().is_ok()),
                (ValueTag::UtcDateTime, value.get_utc_datetime().is_ok()),
            ];
            for (accessor_tag, ok) in results {
                assert_eq!(ok, accessor_tag == tag, "{accessor_tag} on {tag}");
            }
        }
    }

    #[test]
    fn mismatch_names_both_types() {
        let bridge = bridge();
        let value = bridge.string_value("x").unwrap();
        assert_eq!(
            value.get_int64(),
            Err(BridgeError::TypeMismatch {
                expected: "Int",
                actual: "String"
            })
        );
    }

    #[test]
    fn type_names_and_as_number() {
        let bridge = bridge();
        assert_eq!(bridge.make_null().unwrap().type_name().unwrap(), "Null");
        assert!(bridge.make_null().unwrap().is_null().unwrap());
        assert_eq!(bridge.int_value(3).unwrap().as_number().unwrap(), 3.0);
        assert_eq!(bridge.double_value(0.25).unwrap().as_number().unwrap(), 0.25);
        assert!(bridge.bool_value(false).unwrap().as_number().is_err());
    }

    #[test]
    fn released_value_fails_with_use_after_release() {
        let bridge = bridge();
        let value = bridge.int_value(9).unwrap();
        value.release();
        assert_eq!(
            value.get_int64(),
            Err(BridgeError::UseAfterRelease {
                kind: ResourceKind::Value
            })
        );
    }

    #[test]
    fn unwrap_from_checks_kind() {
        let bridge = bridge();
        let doc = bridge.make_document().unwrap();
        let err = Value::unwrap_from(doc.handle().clone()).unwrap_err();
        assert_eq!(err, BridgeError::type_mismatch("Value", "Document"));
    }
}
