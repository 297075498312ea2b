//! Benchmark utilities.

use propsync_codec::{Node, Opaque, Payload, Value};
use rand::Rng;

/// Generate random bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate a random persistable scalar.
pub fn random_scalar<R: Rng>(rng: &mut R) -> Value {
    match rng.gen_range(0..4) {
        0 => Value::Bool(rng.gen()),
        1 => Value::Integer(rng.gen()),
        2 => Value::Float(rng.gen_range(-1e6..1e6)),
        _ => Value::Text(format!("text-{}", rng.gen::<u32>())),
    }
}

/// Generate a payload of `fields` persistable fields.
pub fn random_payload(fields: usize) -> Payload {
    let mut rng = rand::thread_rng();
    (0..fields)
        .map(|i| (format!("field_{i}"), random_scalar(&mut rng)))
        .collect()
}

/// Generate a payload the way a rendering layer passes props: scalars,
/// a rebuilt child tree and a fresh callback.
pub fn render_inputs(fields: usize, children: usize) -> Payload {
    let tree = (0..children).fold(Node::element("ul").with_key("items"), |node, i| {
        node.with_child(Node::element("li").with_key(format!("item-{i}")))
    });

    random_payload(fields)
        .with("children", tree)
        .with("on_change", Opaque::new(()))
}

/// Generate a nested record `depth` levels deep with `width` fields each.
pub fn nested_record(depth: usize, width: usize) -> Value {
    if depth == 0 {
        return Value::Text("leaf".into());
    }
    Value::record(
        (0..width)
            .map(|i| (format!("key_{i}"), nested_record(depth - 1, width)))
            .collect(),
    )
}
