//! Type definitions shared across the engine ABI.

use std::fmt;
use std::num::NonZeroU64;

/// An opaque resource handle issued by an engine.
///
/// This is the Rust rendition of the raw pointers the engine hands out.
/// Only the engine that issued a handle can interpret it; the adapter stores
/// it, passes it back, and frees it exactly once with the free function that
/// matches its [`ResourceKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(NonZeroU64);

impl RawHandle {
    /// Creates a handle from a raw token. Returns `None` for zero (the null handle).
    #[must_use]
    pub fn new(token: u64) -> Option<Self> {
        NonZeroU64::new(token).map(Self)
    }

    /// Returns the raw token.
    #[must_use]
    pub fn token(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0.get())
    }
}

/// The kind of native resource behind a [`RawHandle`].
///
/// Every kind has its own free function in the ABI. Freeing a resource with
/// another kind's free function is undefined behaviour in a real engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// A tagged value.
    Value,
    /// An ordered string-keyed document.
    Document,
    /// An ordered array of values.
    Array,
    /// A document identifier.
    ObjectId,
    /// A millisecond timestamp.
    UtcDateTime,
    /// A single-pass iterator over a document snapshot.
    DocumentIter,
    /// A query result cursor.
    Cursor,
    /// An open database.
    Database,
}

impl ResourceKind {
    /// All kinds, in declaration order.
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::Value,
        ResourceKind::Document,
        ResourceKind::Array,
        ResourceKind::ObjectId,
        ResourceKind::UtcDateTime,
        ResourceKind::DocumentIter,
        ResourceKind::Cursor,
        ResourceKind::Database,
    ];

    /// Returns the display name of this kind.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Value => "Value",
            ResourceKind::Document => "Document",
            ResourceKind::Array => "Array",
            ResourceKind::ObjectId => "ObjectId",
            ResourceKind::UtcDateTime => "UTCDateTime",
            ResourceKind::DocumentIter => "DocumentIterator",
            ResourceKind::Cursor => "Cursor",
            ResourceKind::Database => "Database",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type tag of an engine value, as reported by `value_type`.
///
/// The numbering is part of the ABI.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueTag {
    /// Null.
    Null = 0x0A,
    /// 64-bit float.
    Double = 0x01,
    /// Boolean.
    Boolean = 0x08,
    /// 64-bit signed integer.
    Int = 0x16,
    /// UTF-8 string.
    String = 0x02,
    /// Object id.
    ObjectId = 0x07,
    /// Array.
    Array = 0x17,
    /// Nested document.
    Document = 0x13,
    /// UTC timestamp in milliseconds.
    UtcDateTime = 0x09,
}

impl ValueTag {
    /// Returns the host-facing type name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ValueTag::Null => "Null",
            ValueTag::Double => "Double",
            ValueTag::Boolean => "Boolean",
            ValueTag::Int => "Int",
            ValueTag::String => "String",
            ValueTag::ObjectId => "ObjectId",
            ValueTag::Array => "Array",
            ValueTag::Document => "Document",
            ValueTag::UtcDateTime => "UTCDateTime",
        }
    }

    /// Returns the raw tag code.
    #[must_use]
    pub fn code(self) -> i32 {
        self as u8 as i32
    }
}

impl TryFrom<i32> for ValueTag {
    type Error = i32;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0x0A => Ok(ValueTag::Null),
            0x01 => Ok(ValueTag::Double),
            0x08 => Ok(ValueTag::Boolean),
            0x16 => Ok(ValueTag::Int),
            0x02 => Ok(ValueTag::String),
            0x07 => Ok(ValueTag::ObjectId),
            0x17 => Ok(ValueTag::Array),
            0x13 => Ok(ValueTag::Document),
            0x09 => Ok(ValueTag::UtcDateTime),
            other => Err(other),
        }
    }
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cursor state codes reported by `cursor_state`.
pub mod cursor_state {
    /// Created, not yet stepped.
    pub const INITIAL: i32 = 0;
    /// No more rows.
    pub const EXHAUSTED: i32 = 1;
    /// A current row is available.
    pub const HAS_ROW: i32 = 2;
    /// The last step failed.
    pub const ERRORED: i32 = 3;
}

/// Transaction mode flags accepted by `start_transaction`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    /// Engine decides; behaves as a write transaction.
    #[default]
    Auto = 0,
    /// Read-only transaction.
    Read = 1,
    /// Read-write transaction.
    Write = 2,
}

impl TransactionMode {
    /// Returns the raw flag value.
    #[must_use]
    pub fn flags(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for TransactionMode {
    type Error = u32;

    fn try_from(flags: u32) -> Result<Self, Self::Error> {
        match flags {
            0 => Ok(TransactionMode::Auto),
            1 => Ok(TransactionMode::Read),
            2 => Ok(TransactionMode::Write),
            other => Err(other),
        }
    }
}
