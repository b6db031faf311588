//! Conversion between host object graphs and engine documents.
//!
//! ## Numbers
//!
//! Host numbers are IEEE-754 doubles. [`classify_number`] decides which
//! engine type a number becomes:
//!
//! | host number                               | engine value |
//! |-------------------------------------------|--------------|
//! | finite, integral, `abs <= 2^53-1`, not -0 | Int          |
//! | `-0.0`, larger integrals, fractions       | Double       |
//! | NaN, ±Infinity                            | Double, or an error with `reject_non_finite` |
//!
//! Host big integers always become Int. On the way back, an Int within
//! `±(2^53-1)` becomes a host number and anything larger a big integer.
//!
//! ## Failure
//!
//! Conversion is all or nothing. The first failure aborts it, every native
//! resource built so far is released as its handle drops, and the error
//! names the key path of the offending value, e.g. `profile.tags[2]`.

use crate::array::Array;
use crate::bridge::Bridge;
use crate::document::Document;
use crate::error::{BridgeError, BridgeResult};
use crate::host::{HostObject, HostValue};
use crate::registry::HandleWrapper;
use crate::value::Value;
use embedoc_engine::ValueTag;
use std::fmt;

/// Largest integer a host number represents exactly (`2^53 - 1`).
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Engine type chosen for a host number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberClass {
    /// Stored as a 64-bit integer.
    Int64(i64),
    /// Stored as a double.
    Double(f64),
}

/// Classifies a host number.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn classify_number(x: f64) -> NumberClass {
    let integral = x.is_finite() && x.fract() == 0.0;
    let negative_zero = x == 0.0 && x.is_sign_negative();
    if integral && !negative_zero && x.abs() <= MAX_SAFE_INTEGER as f64 {
        NumberClass::Int64(x as i64)
    } else {
        NumberClass::Double(x)
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, Default)]
struct KeyPath(Vec<Segment>);

impl KeyPath {
    fn push_key(&mut self, key: &str) {
        self.0.push(Segment::Key(key.to_string()));
    }

    fn push_index(&mut self, index: usize) {
        self.0.push(Segment::Index(index));
    }

    fn pop(&mut self) {
        self.0.pop();
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => f.write_str(key)?,
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Shared state of one conversion.
struct Walk {
    path: KeyPath,
    max_depth: usize,
}

impl Walk {
    fn new(max_depth: usize) -> Self {
        Self {
            path: KeyPath::default(),
            max_depth,
        }
    }

    fn fail(&self, message: impl Into<String>) -> BridgeError {
        BridgeError::conversion(self.path.to_string(), message)
    }

    /// Attaches the current key path to an error from below.
    fn at_path(&self, err: BridgeError) -> BridgeError {
        match err {
            err @ BridgeError::Conversion { .. } => err,
            other => self.fail(other.to_string()),
        }
    }

    fn enter(&self, depth: usize) -> BridgeResult<()> {
        if depth > self.max_depth {
            return Err(self.fail(format!(
                "nesting exceeds the maximum depth of {}",
                self.max_depth
            )));
        }
        Ok(())
    }
}

struct Encoder<'a> {
    bridge: &'a Bridge,
    walk: Walk,
}

impl<'a> Encoder<'a> {
    fn new(bridge: &'a Bridge) -> Self {
        Self {
            bridge,
            walk: Walk::new(bridge.config().max_depth),
        }
    }

    fn document(&mut self, obj: &HostObject, depth: usize) -> BridgeResult<Document> {
        self.walk.enter(depth)?;
        let doc = self
            .bridge
            .make_document()
            .map_err(|e| self.walk.at_path(e))?;
        for (key, host) in obj.iter() {
            self.walk.path.push_key(key);
            let value = self.value(host, depth)?;
            doc.set(key, &value).map_err(|e| self.walk.at_path(e))?;
            self.walk.path.pop();
        }
        Ok(doc)
    }

    fn array(&mut self, items: &[HostValue], depth: usize) -> BridgeResult<Array> {
        self.walk.enter(depth)?;
        let array = self.bridge.make_array().map_err(|e| self.walk.at_path(e))?;
        for (index, host) in items.iter().enumerate() {
            self.walk.path.push_index(index);
            let value = self.value(host, depth)?;
            array.push(&value).map_err(|e| self.walk.at_path(e))?;
            self.walk.path.pop();
        }
        Ok(array)
    }

    /// Converts one value found inside a container at `depth`.
    fn value(&mut self, host: &HostValue, depth: usize) -> BridgeResult<Value> {
        let bridge = self.bridge;
        let result = match host {
            HostValue::Null => bridge.make_null(),
            HostValue::Bool(b) => bridge.bool_value(*b),
            HostValue::Number(x) => {
                if !x.is_finite() && bridge.config().reject_non_finite {
                    return Err(self.walk.fail(format!("non-finite number {x}")));
                }
                match classify_number(*x) {
                    NumberClass::Int64(n) => bridge.int_value(n),
                    NumberClass::Double(d) => bridge.double_value(d),
                }
            }
            HostValue::BigInt(n) => bridge.int_value(*n),
            HostValue::String(s) => bridge.string_value(s),
            HostValue::Array(items) => self.array(items, depth + 1).and_then(Array::into_value),
            HostValue::Object(obj) => self
                .document(obj, depth + 1)
                .and_then(Document::into_value),
            HostValue::Date(ms) => {
                if *ms < 0 {
                    return Err(self.walk.fail("dates before the Unix epoch are not supported"));
                }
                bridge
                    .make_utc_datetime(Some(*ms))
                    .and_then(|dt| dt.to_value())
            }
            HostValue::ObjectId(oid) => oid.to_value(),
            HostValue::Undefined | HostValue::Function(_) | HostValue::Symbol(_) => {
                return Err(self
                    .walk
                    .fail(format!("unsupported value type {}", host.type_name())));
            }
        };
        result.map_err(|e| self.walk.at_path(e))
    }
}

struct Decoder {
    walk: Walk,
}

impl Decoder {
    fn object(&mut self, doc: &Document, depth: usize) -> BridgeResult<HostObject> {
        self.walk.enter(depth)?;
        let mut obj = HostObject::new();
        for entry in doc.iter().map_err(|e| self.walk.at_path(e))? {
            let (key, value) = entry.map_err(|e| self.walk.at_path(e))?;
            self.walk.path.push_key(&key);
            let host = self.value(&value, depth)?;
            self.walk.path.pop();
            obj.insert(key, host);
        }
        Ok(obj)
    }

    fn array(&mut self, array: &Array, depth: usize) -> BridgeResult<Vec<HostValue>> {
        self.walk.enter(depth)?;
        let len = array.len().map_err(|e| self.walk.at_path(e))?;
        let mut items = Vec::with_capacity(len);
        for index in 0..len {
            self.walk.path.push_index(index);
            let item = array
                .get(index)
                .map_err(|e| self.walk.at_path(e))?
                .ok_or_else(|| self.walk.fail("array element vanished during decoding"))?;
            items.push(self.value(&item, depth)?);
            self.walk.path.pop();
        }
        Ok(items)
    }

    fn value(&mut self, value: &Value, depth: usize) -> BridgeResult<HostValue> {
        match value.tag().map_err(|e| self.walk.at_path(e))? {
            ValueTag::Array => {
                let array = value.get_array().map_err(|e| self.walk.at_path(e))?;
                self.array(&array, depth + 1).map(HostValue::Array)
            }
            ValueTag::Document => {
                let doc = value.get_document().map_err(|e| self.walk.at_path(e))?;
                self.object(&doc, depth + 1).map(HostValue::Object)
            }
            tag => scalar(value, tag).map_err(|e| self.walk.at_path(e)),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn scalar(value: &Value, tag: ValueTag) -> BridgeResult<HostValue> {
    Ok(match tag {
        ValueTag::Null => HostValue::Null,
        ValueTag::Boolean => HostValue::Bool(value.get_bool()?),
        ValueTag::Double => HostValue::Number(value.get_double()?),
        ValueTag::Int => {
            let n = value.get_int64()?;
            if (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&n) {
                HostValue::Number(n as f64)
            } else {
                HostValue::BigInt(n)
            }
        }
        ValueTag::String => HostValue::String(value.get_string()?),
        ValueTag::ObjectId => HostValue::ObjectId(value.get_object_id()?),
        ValueTag::UtcDateTime => HostValue::Date(value.get_utc_datetime()?.millis()?),
        ValueTag::Array | ValueTag::Document => {
            return Err(BridgeError::type_mismatch("scalar", tag.name()))
        }
    })
}

impl Bridge {
    /// Converts a host object into a new document.
    pub fn to_document(&self, obj: &HostObject) -> BridgeResult<Document> {
        Encoder::new(self).document(obj, 1).inspect_err(log_failure)
    }

    /// Converts a host array into a new engine array.
    pub fn to_array(&self, items: &[HostValue]) -> BridgeResult<Array> {
        Encoder::new(self).array(items, 1).inspect_err(log_failure)
    }

    /// Converts any single host value, including a top-level array.
    pub fn to_value(&self, host: &HostValue) -> BridgeResult<Value> {
        Encoder::new(self).value(host, 0).inspect_err(log_failure)
    }

    /// Converts a document back into a host object.
    pub fn to_host_object(&self, doc: &Document) -> BridgeResult<HostObject> {
        doc.to_host_object()
    }

    /// Converts an engine array back into a host array.
    pub fn to_host_array(&self, array: &Array) -> BridgeResult<Vec<HostValue>> {
        decoder_for(array.handle().registry().config().max_depth).array(array, 1)
    }

    /// Converts an engine value back into a host value.
    pub fn to_host_value(&self, value: &Value) -> BridgeResult<HostValue> {
        value.to_host_value()
    }
}

impl Document {
    /// Converts this document into a host object.
    pub fn to_host_object(&self) -> BridgeResult<HostObject> {
        decoder_for(self.handle().registry().config().max_depth).object(self, 1)
    }
}

impl Value {
    /// Converts this value into a host value.
    pub fn to_host_value(&self) -> BridgeResult<HostValue> {
        decoder_for(self.handle().registry().config().max_depth).value(self, 0)
    }
}

fn decoder_for(max_depth: usize) -> Decoder {
    Decoder {
        walk: Walk::new(max_depth),
    }
}

fn log_failure(err: &BridgeError) {
    tracing::debug!(error = %err, "host value conversion failed");
}
