//! Change detection between synced payloads.
//!
//! The detector answers one question per stream and cycle: does the
//! candidate payload differ from the last one merged into the store?
//!
//! The comparison is one level deep. Primitives compare by value, shared
//! containers and opaque handles by identity. Renderable nodes get their
//! own rule: hosts rebuild them on every evaluation, so comparing them by
//! identity would report a change every cycle. Two nodes are the same
//! element when their type and key match, whatever their content.

use propsync_codec::{Payload, Value};

/// Returns true if `next` must be merged given the last merged `previous`.
///
/// - No baseline yet: always changed.
/// - Different field counts: changed.
/// - Otherwise changed iff some field of `next` is missing from `previous`
///   or differs under [`same_field`]. Field order is irrelevant.
pub fn changed(previous: Option<&Payload>, next: &Payload) -> bool {
    let Some(previous) = previous else {
        return true;
    };

    if previous.len() != next.len() {
        return true;
    }

    next.iter().any(|(name, value)| match previous.get(name) {
        Some(old) => !same_field(old, value),
        None => true,
    })
}

/// Field-level equality used by [`changed`].
pub fn same_field(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Node(a), Value::Node(b)) => a.node_type() == b.node_type() && a.key() == b.key(),
        // A node is never the same as a non-node
        (Value::Node(_), _) | (_, Value::Node(_)) => false,
        _ => a.same(b),
    }
}
