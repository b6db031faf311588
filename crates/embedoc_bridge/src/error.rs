//! Error types for the bridge.

use embedoc_engine::ResourceKind;
use thiserror::Error;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors surfaced to the host.
///
/// Every failure of an engine call, a host-side type check or a conversion
/// ends up here. Nothing is swallowed except release failures inside
/// finalizers, which are logged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// A value was used as a type it does not have.
    #[error("type mismatch: expected {expected}, actual {actual}")]
    TypeMismatch {
        /// Type the operation needed.
        expected: &'static str,
        /// Type that was found.
        actual: &'static str,
    },

    /// The engine could not allocate a new resource.
    #[error("failed to allocate {kind}: {message}")]
    AllocationFailure {
        /// Kind of the resource being created.
        kind: ResourceKind,
        /// Engine-reported reason.
        message: String,
    },

    /// An engine call failed.
    #[error("engine error: {message}")]
    Engine {
        /// Engine-reported reason.
        message: String,
    },

    /// A handle was used after it was released or transferred.
    #[error("{kind} handle used after release")]
    UseAfterRelease {
        /// Kind of the handle.
        kind: ResourceKind,
    },

    /// A host value could not be converted.
    #[error("cannot convert `{path}`: {message}")]
    Conversion {
        /// Key path of the offending value, e.g. `profile.tags[2]`.
        path: String,
        /// Description of the problem.
        message: String,
    },
}

impl BridgeError {
    /// Creates an engine error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Creates a conversion error.
    pub fn conversion(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: &'static str, actual: &'static str) -> Self {
        Self::TypeMismatch { expected, actual }
    }

    /// The reason without the variant's prefix.
    pub fn detail(&self) -> String {
        match self {
            BridgeError::AllocationFailure { message, .. }
            | BridgeError::Engine { message }
            | BridgeError::Conversion { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Appends `note` to the reason, keeping the variant.
    ///
    /// Variants without a free-form reason are returned unchanged.
    #[must_use]
    pub fn with_note(mut self, note: &str) -> Self {
        if let BridgeError::AllocationFailure { message, .. }
        | BridgeError::Engine { message }
        | BridgeError::Conversion { message, .. } = &mut self
        {
            message.push_str("; ");
            message.push_str(note);
        }
        self
    }

    /// Returns the stable numeric code of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            BridgeError::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            BridgeError::AllocationFailure { .. } => ErrorCode::AllocationFailure,
            BridgeError::Engine { .. } => ErrorCode::Engine,
            BridgeError::UseAfterRelease { .. } => ErrorCode::UseAfterRelease,
            BridgeError::Conversion { .. } => ErrorCode::Conversion,
        }
    }

    /// Returns the host exception class this error is raised as.
    pub fn host_class(&self) -> HostErrorClass {
        match self {
            BridgeError::TypeMismatch { .. } | BridgeError::Conversion { .. } => {
                HostErrorClass::TypeError
            }
            _ => HostErrorClass::Error,
        }
    }
}

/// Stable numeric error codes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Value used as a type it does not have.
    TypeMismatch = 1,
    /// Engine allocation failed.
    AllocationFailure = 2,
    /// Engine call failed.
    Engine = 3,
    /// Handle used after release.
    UseAfterRelease = 4,
    /// Host value conversion failed.
    Conversion = 5,
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code as i32
    }
}

impl TryFrom<i32> for ErrorCode {
    type Error = i32;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(ErrorCode::TypeMismatch),
            2 => Ok(ErrorCode::AllocationFailure),
            3 => Ok(ErrorCode::Engine),
            4 => Ok(ErrorCode::UseAfterRelease),
            5 => Ok(ErrorCode::Conversion),
            other => Err(other),
        }
    }
}

/// Exception class a host raises for a [`BridgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostErrorClass {
    /// The host's `TypeError`.
    TypeError,
    /// The host's generic `Error`.
    Error,
}

impl HostErrorClass {
    /// Returns the class name as the host spells it.
    pub fn name(self) -> &'static str {
        match self {
            HostErrorClass::TypeError => "TypeError",
            HostErrorClass::Error => "Error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = BridgeError::conversion("profile.tags[2]", "unsupported value type function");
        assert_eq!(
            err.to_string(),
            "cannot convert `profile.tags[2]`: unsupported value type function"
        );

        let err = BridgeError::UseAfterRelease {
            kind: ResourceKind::Database,
        };
        assert_eq!(err.to_string(), "Database handle used after release");
    }

    #[test]
    fn codes_and_classes() {
        let mismatch = BridgeError::type_mismatch("Int", "String");
        assert_eq!(mismatch.code(), ErrorCode::TypeMismatch);
        assert_eq!(mismatch.host_class(), HostErrorClass::TypeError);

        let engine = BridgeError::engine("boom");
        assert_eq!(i32::from(engine.code()), 3);
        assert_eq!(engine.host_class().name(), "Error");

        assert_eq!(ErrorCode::try_from(5), Ok(ErrorCode::Conversion));
        assert_eq!(ErrorCode::try_from(42), Err(42));
    }

    #[test]
    fn notes_keep_the_variant() {
        let err = BridgeError::engine("boom").with_note("rollback also failed: x");
        assert_eq!(err, BridgeError::engine("boom; rollback also failed: x"));
        assert_eq!(err.detail(), "boom; rollback also failed: x");

        let mismatch = BridgeError::type_mismatch("Int", "String");
        assert_eq!(mismatch.clone().with_note("ignored"), mismatch);
        assert_eq!(mismatch.detail(), "type mismatch: expected Int, actual String");
    }
}
