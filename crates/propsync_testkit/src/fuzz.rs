//! Fuzz testing harnesses for PropSync.
//!
//! This module provides fuzz targets that can be used with cargo-fuzz
//! or other fuzzing frameworks.

use propsync_codec::{from_cbor, to_canonical_cbor, Decode, Envelope, Payload, Value};
use propsync_core::{ScopeConfig, SyncContext};

/// Fuzz target for CBOR decoding.
///
/// Arbitrary bytes either decode or return an error; they never panic.
pub fn fuzz_cbor_decode(data: &[u8]) {
    let _ = from_cbor(data);
}

/// Fuzz target for CBOR roundtrip.
///
/// Anything the decoder accepts must re-encode and decode to the same value.
pub fn fuzz_cbor_roundtrip(data: &[u8]) {
    if let Ok(value) = from_cbor(data) {
        let encoded = to_canonical_cbor(&value).expect("Decoded value must re-encode");
        let decoded = from_cbor(&encoded).expect("Canonical bytes must decode");
        assert_eq!(value, decoded, "Roundtrip mismatch");
    }
}

/// Fuzz target for envelope decoding.
pub fn fuzz_envelope_decode(data: &[u8]) {
    if let Ok(envelope) = Envelope::decode(data) {
        assert!(envelope.state.values().all(Value::is_persistable));
    }
}

/// Fuzz target for sync cycles.
///
/// Each chunk of three bytes is one step: an op code, a field index and a
/// value. Steps either evaluate inputs, write the store directly, or read.
/// Checks that repeated inputs settle without further merges.
pub fn fuzz_sync_cycles(data: &[u8]) {
    let ctx = SyncContext::builder()
        .initializer(|_| Payload::new().with("f0", 0))
        .build();
    let scope = ctx.provider().mount(ScopeConfig::new().write_once(["f1"]));
    let reader = ctx.reader();

    let mut inputs = Payload::new();
    for step in data.chunks_exact(3) {
        let field = format!("f{}", step[1] % 4);
        let value = i64::from(step[2]);

        match step[0] % 4 {
            0 => {
                inputs.insert(field, value);
                scope.evaluate(&inputs);
                // a write-once field drops out on the cycle after the first sync
                scope.evaluate(&inputs);
                assert!(!scope.evaluate(&inputs).direct_merged);
            }
            1 => {
                inputs.remove(&field);
                scope.evaluate(&inputs);
            }
            2 => scope.store().merge(&Payload::new().with(field, value)),
            _ => {
                let state = scope.enter(|| reader.get()).expect("Scope is active");
                assert!(state.contains_key("f0"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzz_decode_empty() {
        fuzz_cbor_decode(&[]);
    }

    #[test]
    fn fuzz_decode_garbage() {
        fuzz_cbor_decode(&[0xff, 0xff, 0xff]);
        fuzz_cbor_decode(&[0xa1, 0x00]);
        fuzz_cbor_decode(&[0x9f, 0x01, 0xff]);
    }

    #[test]
    fn fuzz_roundtrip_valid() {
        fuzz_cbor_roundtrip(&[0x01]);
        fuzz_cbor_roundtrip(&[0xa1, 0x61, 0x61, 0x01]);
        fuzz_cbor_roundtrip(&[0x82, 0x01, 0x02]);
    }

    #[test]
    fn fuzz_envelope_garbage() {
        fuzz_envelope_decode(&[0xa0]);
        fuzz_envelope_decode(&[0x00]);
    }

    #[test]
    fn fuzz_sync_cycles_smoke() {
        fuzz_sync_cycles(&[0, 1, 5, 0, 1, 6, 2, 0, 9, 3, 0, 0, 1, 1, 0, 0, 2, 7]);
    }

    proptest::proptest! {
        #[test]
        fn decode_never_panics(data in proptest::collection::vec(proptest::num::u8::ANY, 0..64)) {
            fuzz_cbor_decode(&data);
            fuzz_cbor_roundtrip(&data);
            fuzz_envelope_decode(&data);
        }

        #[test]
        fn sync_cycles_never_panic(data in proptest::collection::vec(proptest::num::u8::ANY, 0..96)) {
            fuzz_sync_cycles(&data);
        }
    }
}
