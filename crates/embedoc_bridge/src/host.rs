//! Host-side values.
//!
//! [`HostValue`] is the plain data a garbage-collected host hands to the
//! bridge: primitives, arrays, ordered plain objects, dates and wrapped
//! object ids. Functions and symbols exist on the host too, but cannot be
//! stored.

use crate::codec::MAX_SAFE_INTEGER;
use crate::object_id::ObjectId;

/// A host value.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    /// `undefined`.
    Undefined,
    /// `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// An IEEE-754 number.
    Number(f64),
    /// A big integer.
    BigInt(i64),
    /// A string.
    String(String),
    /// An array.
    Array(Vec<HostValue>),
    /// A plain object.
    Object(HostObject),
    /// A date, in milliseconds since the Unix epoch.
    Date(i64),
    /// A wrapped object id.
    ObjectId(ObjectId),
    /// A function, by name.
    Function(String),
    /// A symbol, by description.
    Symbol(String),
}

impl HostValue {
    /// Returns the host's name for the type of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null => "null",
            HostValue::Bool(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::BigInt(_) => "bigint",
            HostValue::String(_) => "string",
            HostValue::Array(_) => "array",
            HostValue::Object(_) => "object",
            HostValue::Date(_) => "Date",
            HostValue::ObjectId(_) => "ObjectId",
            HostValue::Function(_) => "function",
            HostValue::Symbol(_) => "symbol",
        }
    }

    /// Returns the object, if this is one.
    pub fn as_object(&self) -> Option<&HostObject> {
        match self {
            HostValue::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Number(n)
    }
}

impl From<i32> for HostValue {
    fn from(n: i32) -> Self {
        HostValue::Number(f64::from(n))
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(s.to_string())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::String(s)
    }
}

impl From<HostObject> for HostValue {
    fn from(obj: HostObject) -> Self {
        HostValue::Object(obj)
    }
}

impl From<Vec<HostValue>> for HostValue {
    fn from(items: Vec<HostValue>) -> Self {
        HostValue::Array(items)
    }
}

impl From<serde_json::Value> for HostValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => HostValue::Null,
            serde_json::Value::Bool(b) => HostValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) if !(-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&i) => HostValue::BigInt(i),
                Some(i) => HostValue::Number(i as f64),
                None => HostValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => HostValue::String(s),
            serde_json::Value::Array(items) => {
                HostValue::Array(items.into_iter().map(HostValue::from).collect())
            }
            serde_json::Value::Object(map) => HostValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, HostValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// A plain host object: string keys in insertion order.
///
/// Assigning an existing key keeps its position and replaces the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostObject {
    entries: Vec<(String, HostValue)>,
}

impl HostObject {
    /// Creates an empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<HostValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<HostValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Reads a property.
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the object has no properties.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Own properties in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HostValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Property names in enumeration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>> FromIterator<(K, HostValue)> for HostObject {
    fn from_iter<I: IntoIterator<Item = (K, HostValue)>>(iter: I) -> Self {
        let mut obj = HostObject::new();
        for (k, v) in iter {
            obj.insert(k, v);
        }
        obj
    }
}
