//! Property-based test generators using proptest.
//!
//! Graphs produced here only contain types that survive a round trip
//! through the engine unchanged: null, booleans, finite numbers, big
//! integers outside the exactly representable range, strings, dates,
//! arrays and objects.

use embedoc_bridge::{HostObject, HostValue, MAX_SAFE_INTEGER};
use proptest::prelude::*;

/// Strategy for generating valid collection names.
pub fn collection_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_]{0,31}").expect("Invalid regex")
}

/// Strategy for generating object keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z_][a-z0-9_]{0,7}").expect("Invalid regex")
}

/// Strategy for generating finite host numbers, biased towards the edges of
/// the integer classification.
pub fn number_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        (-1000i32..1000).prop_map(f64::from),
        Just(-0.0),
        Just(MAX_SAFE_INTEGER as f64),
        Just(-(MAX_SAFE_INTEGER as f64)),
        Just(2f64.powi(53)),
        any::<f64>().prop_filter("finite", |x| x.is_finite()),
    ]
}

/// Strategy for generating big integers that decode back as big integers.
pub fn bigint_strategy() -> impl Strategy<Value = i64> {
    prop_oneof![
        (MAX_SAFE_INTEGER + 1)..=i64::MAX,
        i64::MIN..=-(MAX_SAFE_INTEGER + 1),
    ]
}

/// Strategy for generating leaf host values.
pub fn host_leaf_strategy() -> impl Strategy<Value = HostValue> {
    prop_oneof![
        Just(HostValue::Null),
        any::<bool>().prop_map(HostValue::Bool),
        number_strategy().prop_map(HostValue::Number),
        bigint_strategy().prop_map(HostValue::BigInt),
        "\\PC{0,12}".prop_map(HostValue::String),
        (0i64..4_102_444_800_000).prop_map(HostValue::Date),
    ]
}

/// Strategy for generating nested host values, at most four levels deep.
pub fn host_value_strategy() -> impl Strategy<Value = HostValue> {
    host_leaf_strategy().prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(HostValue::Array),
            prop::collection::vec((key_strategy(), inner), 0..6)
                .prop_map(|entries| HostValue::Object(entries.into_iter().collect())),
        ]
    })
}

/// Strategy for generating host objects to store as documents.
pub fn host_graph_strategy() -> impl Strategy<Value = HostObject> {
    prop::collection::vec((key_strategy(), host_value_strategy()), 0..8)
        .prop_map(|entries| entries.into_iter().collect())
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

fn depth(value: &HostValue) -> usize {
    match value {
        HostValue::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        HostValue::Object(obj) => 1 + obj.iter().map(|(_, v)| depth(v)).max().unwrap_or(0),
        _ => 0,
    }
}

/// Nesting depth of an object graph, counting the root object as 1.
pub fn graph_depth(obj: &HostObject) -> usize {
    1 + obj.iter().map(|(_, v)| depth(v)).max().unwrap_or(0)
}
