//! Property tests for canonical encoding of persistable payloads.

use propsync_codec::{
    from_cbor, payload_from_cbor, payload_to_cbor, to_canonical_cbor, Decode, Encode, Envelope,
    Payload, Value,
};
use proptest::prelude::*;

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        any::<f64>()
            .prop_filter("NaN is not persistable", |f| !f.is_nan())
            .prop_map(Value::Float),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
    ]
}

fn persistable_value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(|items| Value::list(items)),
            prop::collection::vec(("[a-z]{1,6}", inner), 0..6)
                .prop_map(|fields| Value::record(fields.into_iter().collect())),
        ]
    })
}

fn persistable_payload() -> impl Strategy<Value = Payload> {
    prop::collection::vec(("[a-z][a-z0-9_]{0,7}", persistable_value()), 0..10)
        .prop_map(|fields| fields.into_iter().collect())
}

proptest! {
    #[test]
    fn persistable_values_come_back_equal(value in persistable_value()) {
        let bytes = to_canonical_cbor(&value).unwrap();
        prop_assert_eq!(from_cbor(&bytes).unwrap(), value);
    }

    #[test]
    fn encoding_is_stable_across_a_decode(payload in persistable_payload()) {
        let bytes = payload_to_cbor(&payload).unwrap();
        let decoded = payload_from_cbor(&bytes).unwrap();
        prop_assert_eq!(payload_to_cbor(&decoded).unwrap(), bytes);
    }

    #[test]
    fn field_order_does_not_change_bytes(payload in persistable_payload()) {
        let mut fields: Vec<(String, Value)> = payload
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        fields.reverse();
        let reversed: Payload = fields.into_iter().collect();
        prop_assert_eq!(payload_to_cbor(&reversed).unwrap(), payload_to_cbor(&payload).unwrap());
    }

    #[test]
    fn envelope_keeps_state_and_version(payload in persistable_payload(), version in any::<u32>()) {
        let envelope = Envelope::new(payload, version);
        let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();
        prop_assert_eq!(decoded.version, version);
        prop_assert_eq!(decoded.state, envelope.state);
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
        let _ = from_cbor(&bytes);
        let _ = Envelope::decode(&bytes);
    }
}
