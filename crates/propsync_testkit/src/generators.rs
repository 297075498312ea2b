//! Property-based test generators using proptest.
//!
//! Provides strategies for payloads, values and input sequences.

use propsync_codec::{Node, Opaque, Payload, Value};
use proptest::prelude::*;

/// Strategy for field names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,11}").expect("Invalid regex")
}

/// Strategy for persistable scalar values (no NaN).
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        any::<f64>()
            .prop_filter("NaN is never persisted", |f| !f.is_nan())
            .prop_map(Value::Float),
        "[ -~]{0,16}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
    ]
}

/// Strategy for persistable values, nesting lists and records.
pub fn persistable_value_strategy() -> impl Strategy<Value = Value> {
    scalar_value_strategy().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(|items| Value::list(items)),
            prop::collection::vec((field_name_strategy(), inner), 0..4)
                .prop_map(|fields| Value::record(fields.into_iter().collect())),
        ]
    })
}

/// Strategy for renderable nodes with optional keys and a few children.
pub fn node_strategy() -> impl Strategy<Value = Node> {
    (
        prop::sample::select(vec!["div", "span", "ul", "li"]),
        prop::option::of("[a-z]{1,4}"),
        0usize..3,
    )
        .prop_map(|(tag, key, children)| {
            let mut node = Node::element(tag);
            if let Some(key) = key {
                node = node.with_key(key);
            }
            for _ in 0..children {
                node = node.with_child(Node::element("span"));
            }
            node
        })
}

/// Strategy for any value a host may pass, including nodes and handles.
pub fn input_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => persistable_value_strategy(),
        1 => node_strategy().prop_map(Value::Node),
        1 => any::<u8>().prop_map(|tag| Value::Opaque(Opaque::new(tag))),
    ]
}

/// Strategy for payloads of persistable values.
pub fn persistable_payload_strategy() -> impl Strategy<Value = Payload> {
    prop::collection::vec((field_name_strategy(), persistable_value_strategy()), 0..8)
        .prop_map(|fields| fields.into_iter().collect())
}

/// Strategy for host input payloads.
pub fn payload_strategy() -> impl Strategy<Value = Payload> {
    prop::collection::vec((field_name_strategy(), input_value_strategy()), 0..8)
        .prop_map(|fields| fields.into_iter().collect())
}

/// Strategy for a sequence of input payloads fed to consecutive cycles.
pub fn input_sequence_strategy(
    min_cycles: usize,
    max_cycles: usize,
) -> impl Strategy<Value = Vec<Payload>> {
    prop::collection::vec(payload_strategy(), min_cycles..max_cycles)
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
