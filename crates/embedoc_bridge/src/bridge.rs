//! Entry point of the adapter and the primitive value constructors.

use crate::array::Array;
use crate::config::BridgeConfig;
use crate::datetime::UtcDateTime;
use crate::document::Document;
use crate::error::{BridgeError, BridgeResult};
use crate::host::HostValue;
use crate::registry::{HandleWrapper, ResourceRegistry};
use crate::value::{c_string, Value};
use embedoc_engine::{Engine, RawHandle, ResourceKind};
use std::rc::Rc;

/// The adapter between a host and an engine.
///
/// A `Bridge` is cheap to clone. Everything it creates holds a reference to
/// the same [`ResourceRegistry`], so the engine outlives every handle.
///
/// # Example
///
/// ```rust
/// use embedoc_bridge::{Bridge, HostValue};
/// use embedoc_engine::MemoryEngine;
/// use std::rc::Rc;
///
/// let bridge = Bridge::new(Rc::new(MemoryEngine::new()));
/// let value = bridge.make_int(&HostValue::Number(7.0)).unwrap();
/// assert_eq!(value.get_int64().unwrap(), 7);
/// assert!(bridge.make_int(&HostValue::Number(7.5)).is_err());
/// ```
#[derive(Clone, Debug)]
pub struct Bridge {
    registry: ResourceRegistry,
}

impl Bridge {
    /// Creates a bridge with the default configuration.
    pub fn new(engine: Rc<dyn Engine>) -> Self {
        Self::with_config(engine, BridgeConfig::default())
    }

    /// Creates a bridge with the given configuration.
    pub fn with_config(engine: Rc<dyn Engine>, config: BridgeConfig) -> Self {
        tracing::debug!(engine = %engine.version(), max_depth = config.max_depth, "bridge created");
        Self {
            registry: ResourceRegistry::new(engine, config),
        }
    }

    /// Returns the resource registry.
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BridgeConfig {
        self.registry.config()
    }

    /// Returns the engine version string.
    pub fn version(&self) -> String {
        self.registry.engine().version()
    }

    /// Wraps a raw value handle returned by the engine.
    pub fn wrap(&self, raw: RawHandle) -> Value {
        Value::wrap_unchecked(self.registry.register(raw, ResourceKind::Value))
    }

    fn new_value(&self, raw: Option<RawHandle>) -> BridgeResult<Value> {
        self.registry
            .adopt(raw, ResourceKind::Value)
            .map(Value::wrap_unchecked)
    }

    /// Creates a Null value.
    pub fn make_null(&self) -> BridgeResult<Value> {
        self.new_value(self.registry.engine().make_null())
    }

    /// Creates an Int value from a host number or big integer.
    ///
    /// Non-numeric input, fractions, non-finite numbers and numbers outside
    /// the `i64` range are refused without calling the engine.
    pub fn make_int(&self, input: &HostValue) -> BridgeResult<Value> {
        let n = match input {
            HostValue::BigInt(i) => *i,
            HostValue::Number(x) => number_to_i64(*x)?,
            other => return Err(BridgeError::type_mismatch("integer", other.type_name())),
        };
        self.int_value(n)
    }

    /// Creates a Double value from a host number or big integer.
    #[allow(clippy::cast_precision_loss)]
    pub fn make_double(&self, input: &HostValue) -> BridgeResult<Value> {
        let x = match input {
            HostValue::Number(x) => *x,
            HostValue::BigInt(i) => *i as f64,
            other => return Err(BridgeError::type_mismatch("number", other.type_name())),
        };
        self.double_value(x)
    }

    /// Creates a Boolean value from a host boolean.
    pub fn make_bool(&self, input: &HostValue) -> BridgeResult<Value> {
        match input {
            HostValue::Bool(b) => self.bool_value(*b),
            other => Err(BridgeError::type_mismatch("boolean", other.type_name())),
        }
    }

    /// Creates a String value from a host string.
    pub fn make_string(&self, input: &HostValue) -> BridgeResult<Value> {
        match input {
            HostValue::String(s) => self.string_value(s),
            other => Err(BridgeError::type_mismatch("string", other.type_name())),
        }
    }

    /// Creates an Int value.
    pub fn int_value(&self, n: i64) -> BridgeResult<Value> {
        self.new_value(self.registry.engine().make_int(n))
    }

    /// Creates a Double value.
    pub fn double_value(&self, x: f64) -> BridgeResult<Value> {
        self.new_value(self.registry.engine().make_double(x))
    }

    /// Creates a Boolean value.
    pub fn bool_value(&self, b: bool) -> BridgeResult<Value> {
        self.new_value(self.registry.engine().make_bool(b))
    }

    /// Creates a String value. Strings with an interior NUL are refused.
    pub fn string_value(&self, s: &str) -> BridgeResult<Value> {
        let content = c_string(s)?;
        self.new_value(self.registry.engine().make_string(&content))
    }

    /// Creates an empty document.
    pub fn make_document(&self) -> BridgeResult<Document> {
        self.registry
            .adopt(self.registry.engine().make_document(), ResourceKind::Document)
            .map(Document::wrap_unchecked)
    }

    /// Creates an empty array.
    pub fn make_array(&self) -> BridgeResult<Array> {
        self.registry
            .adopt(self.registry.engine().make_array(), ResourceKind::Array)
            .map(Array::wrap_unchecked)
    }

    /// Creates a timestamp. `None` lets the engine use the current time.
    pub fn make_utc_datetime(&self, millis: Option<i64>) -> BridgeResult<UtcDateTime> {
        let millis = match millis {
            Some(ms) if ms < 0 => {
                return Err(BridgeError::type_mismatch(
                    "non-negative milliseconds",
                    "negative milliseconds",
                ))
            }
            Some(ms) => ms,
            None => -1,
        };
        self.registry
            .adopt(
                self.registry.engine().make_utc_datetime(millis),
                ResourceKind::UtcDateTime,
            )
            .map(UtcDateTime::wrap_unchecked)
    }
}

/// Lower bound of `i64` as a float (`-2^63`).
const I64_MIN_F64: f64 = -9_223_372_036_854_775_808.0;

#[allow(clippy::cast_possible_truncation)]
fn number_to_i64(x: f64) -> BridgeResult<i64> {
    if !x.is_finite() || x.fract() != 0.0 {
        return Err(BridgeError::type_mismatch("integer", "non-integral number"));
    }
    if x < I64_MIN_F64 || x >= -I64_MIN_F64 {
        return Err(BridgeError::type_mismatch("integer", "out-of-range number"));
    }
    Ok(x as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedoc_engine::MemoryEngine;

    fn bridge() -> (Rc<MemoryEngine>, Bridge) {
        let engine = Rc::new(MemoryEngine::new());
        (engine.clone(), Bridge::new(engine))
    }

    #[test]
    fn constructors_validate_before_engine_call() {
        let (engine, bridge) = bridge();

        let cases = [
            bridge.make_int(&HostValue::from("3")),
            bridge.make_int(&HostValue::Number(1.5)),
            bridge.make_int(&HostValue::Number(f64::NAN)),
            bridge.make_int(&HostValue::Number(1e19)),
            bridge.make_double(&HostValue::Bool(true)),
            bridge.make_bool(&HostValue::Number(1.0)),
            bridge.make_string(&HostValue::Null),
            bridge.make_string(&HostValue::from("a\0b")),
        ];
        for result in cases {
            assert!(matches!(result, Err(BridgeError::TypeMismatch { .. })));
        }
        assert_eq!(engine.stats().allocated, 0);
    }

    #[test]
    fn make_int_accepts_integral_numbers_and_bigints() {
        let (_engine, bridge) = bridge();
        assert_eq!(bridge.make_int(&HostValue::Number(-4.0)).unwrap().get_int64().unwrap(), -4);
        assert_eq!(
            bridge.make_int(&HostValue::BigInt(i64::MAX)).unwrap().get_int64().unwrap(),
            i64::MAX
        );
        assert_eq!(number_to_i64(I64_MIN_F64).unwrap(), i64::MIN);
        assert!(number_to_i64(-I64_MIN_F64).is_err());
    }

    #[test]
    fn string_roundtrip() {
        let (_engine, bridge) = bridge();
        let value = bridge.make_string(&HostValue::from("héllo")).unwrap();
        assert_eq!(value.get_string().unwrap(), "héllo");
    }

    #[test]
    fn allocation_failure_carries_engine_message() {
        let (engine, bridge) = bridge();
        engine.set_resource_limit(Some(0));
        let err = bridge.make_null().unwrap_err();
        assert_eq!(
            err,
            BridgeError::AllocationFailure {
                kind: ResourceKind::Value,
                message: "out of memory: resource limit of 0 reached".into(),
            }
        );
    }

    #[test]
    fn negative_datetime_is_refused() {
        let (_engine, bridge) = bridge();
        assert!(bridge.make_utc_datetime(Some(-5)).is_err());
        let now = bridge.make_utc_datetime(None).unwrap();
        assert!(now.millis().unwrap() > 0);
    }
}
