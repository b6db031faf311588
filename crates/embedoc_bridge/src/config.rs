//! Bridge configuration.

use serde::{Deserialize, Serialize};

/// Default maximum nesting depth of converted host graphs.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Configuration of a [`crate::Bridge`].
///
/// Hosts usually load it from JSON:
///
/// ```rust
/// use embedoc_bridge::BridgeConfig;
///
/// let config = BridgeConfig::from_json(r#"{ "max_depth": 8 }"#).unwrap();
/// assert_eq!(config.max_depth, 8);
/// assert!(!config.reject_non_finite);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Maximum nesting depth of documents and arrays, on encode and decode.
    pub max_depth: usize,

    /// Whether NaN and ±Infinity fail conversion instead of becoming Doubles.
    pub reject_non_finite: bool,

    /// Whether to log a warning when a database is reclaimed by its finalizer
    /// instead of being closed explicitly.
    pub warn_on_finalized_database: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            reject_non_finite: false,
            warn_on_finalized_database: true,
        }
    }
}

impl BridgeConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Sets the maximum nesting depth.
    #[must_use]
    pub const fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets whether non-finite numbers are rejected.
    #[must_use]
    pub const fn reject_non_finite(mut self, value: bool) -> Self {
        self.reject_non_finite = value;
        self
    }

    /// Sets whether finalized databases are reported.
    #[must_use]
    pub const fn warn_on_finalized_database(mut self, value: bool) -> Self {
        self.warn_on_finalized_database = value;
        self
    }
}
