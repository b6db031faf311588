//! Engine-side value model of the in-memory engine.

use crate::types::ValueTag;
use std::fmt;

/// Length of an object id in bytes.
pub const OBJECT_ID_LEN: usize = 12;

/// Raw object id bytes: 8-byte big-endian millisecond timestamp followed by a
/// 4-byte big-endian counter.
pub type ObjectIdBytes = [u8; OBJECT_ID_LEN];

/// A value stored by the in-memory engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineValue {
    /// Null.
    Null,
    /// 64-bit float.
    Double(f64),
    /// Boolean.
    Boolean(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// UTF-8 string.
    String(String),
    /// Object id.
    ObjectId(ObjectIdBytes),
    /// Array of values.
    Array(Vec<EngineValue>),
    /// Nested document.
    Document(EngineDoc),
    /// Milliseconds since the Unix epoch.
    UtcDateTime(i64),
}

impl EngineValue {
    /// Returns the ABI tag of this value.
    pub fn tag(&self) -> ValueTag {
        match self {
            EngineValue::Null => ValueTag::Null,
            EngineValue::Double(_) => ValueTag::Double,
            EngineValue::Boolean(_) => ValueTag::Boolean,
            EngineValue::Int(_) => ValueTag::Int,
            EngineValue::String(_) => ValueTag::String,
            EngineValue::ObjectId(_) => ValueTag::ObjectId,
            EngineValue::Array(_) => ValueTag::Array,
            EngineValue::Document(_) => ValueTag::Document,
            EngineValue::UtcDateTime(_) => ValueTag::UtcDateTime,
        }
    }

    /// Query equality: like `==`, except that integers and doubles compare
    /// by numeric value.
    pub fn query_eq(&self, other: &EngineValue) -> bool {
        match (self, other) {
            #[allow(clippy::cast_precision_loss)]
            (EngineValue::Int(a), EngineValue::Double(b))
            | (EngineValue::Double(b), EngineValue::Int(a)) => (*a as f64) == *b,
            (EngineValue::Array(a), EngineValue::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.query_eq(y))
            }
            (EngineValue::Document(a), EngineValue::Document(b)) => a.query_eq(b),
            _ => self == other,
        }
    }
}

impl fmt::Display for EngineValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineValue::Null => f.write_str("null"),
            EngineValue::Double(d) => write!(f, "{d:?}"),
            EngineValue::Boolean(b) => write!(f, "{b}"),
            EngineValue::Int(i) => write!(f, "{i}"),
            EngineValue::String(s) => write!(f, "{s:?}"),
            EngineValue::ObjectId(oid) => write!(f, "ObjectId({})", object_id_hex(oid)),
            EngineValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            EngineValue::Document(doc) => write!(f, "{doc}"),
            EngineValue::UtcDateTime(ms) => write!(f, "UTCDateTime({ms})"),
        }
    }
}

/// Renders object id bytes as 24 lowercase hex characters.
pub fn object_id_hex(oid: &ObjectIdBytes) -> String {
    oid.iter().map(|b| format!("{b:02x}")).collect()
}

/// An insertion-ordered document with unique keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineDoc {
    entries: Vec<(String, EngineValue)>,
}

impl EngineDoc {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an existing entry in place. Returns the old value.
    pub fn insert(&mut self, key: impl Into<String>, value: EngineValue) -> Option<EngineValue> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Looks up a key.
    pub fn get(&self, key: &str) -> Option<&EngineValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Removes a key. Returns the removed value.
    pub fn remove(&mut self, key: &str) -> Option<EngineValue> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the document has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[(String, EngineValue)] {
        &self.entries
    }

    /// Returns true when every field of `filter` is present here with an
    /// equal value.
    pub fn matches(&self, filter: &EngineDoc) -> bool {
        filter
            .entries
            .iter()
            .all(|(key, expected)| self.get(key).is_some_and(|v| v.query_eq(expected)))
    }

    fn query_eq(&self, other: &EngineDoc) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|((ka, va), (kb, vb))| ka == kb && va.query_eq(vb))
    }
}

impl fmt::Display for EngineDoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, " {key}: {value}")?;
        }
        if !self.entries.is_empty() {
            f.write_str(" ")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_order_and_overwrites_in_place() {
        let mut doc = EngineDoc::new();
        doc.insert("b", EngineValue::Int(1));
        doc.insert("a", EngineValue::Int(2));
        let old = doc.insert("b", EngineValue::Int(3));

        assert_eq!(old, Some(EngineValue::Int(1)));
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.entries()[0], ("b".to_string(), EngineValue::Int(3)));
        assert_eq!(doc.entries()[1].0, "a");
    }

    #[test]
    fn matches_compares_numbers_by_value() {
        let mut doc = EngineDoc::new();
        doc.insert("age", EngineValue::Int(3));
        doc.insert("name", EngineValue::String("a".into()));

        let mut filter = EngineDoc::new();
        filter.insert("age", EngineValue::Double(3.0));
        assert!(doc.matches(&filter));

        filter.insert("name", EngineValue::String("b".into()));
        assert!(!doc.matches(&filter));

        assert!(doc.matches(&EngineDoc::new()));
    }

    #[test]
    fn display_renders_nested_values() {
        let mut inner = EngineDoc::new();
        inner.insert("x", EngineValue::Boolean(true));
        let mut doc = EngineDoc::new();
        doc.insert("n", EngineValue::Null);
        doc.insert("list", EngineValue::Array(vec![EngineValue::Int(1), EngineValue::Double(2.5)]));
        doc.insert("inner", EngineValue::Document(inner));

        assert_eq!(doc.to_string(), "{ n: null, list: [1, 2.5], inner: { x: true } }");
    }

    #[test]
    fn object_id_hex_is_24_chars() {
        let oid: ObjectIdBytes = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 255];
        assert_eq!(object_id_hex(&oid), "000102030405060708090aff");
    }
}
