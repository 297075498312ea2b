//! Persistence envelope.

use crate::decoder::from_cbor;
use crate::encoder::CanonicalEncoder;
use crate::error::{CodecError, CodecResult};
use crate::payload::Payload;
use crate::value::Value;
use crate::{Decode, Encode};

/// A named, versioned snapshot of store state as written to durable storage.
///
/// On the wire this is a canonical CBOR map:
///
/// ```text
/// { "state": { <persisted fields> }, "version": <unsigned integer> }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Persisted application fields.
    pub state: Payload,
    /// Schema version of `state`.
    pub version: u32,
}

impl Envelope {
    /// Creates an envelope.
    pub fn new(state: Payload, version: u32) -> Self {
        Self { state, version }
    }
}

impl Encode for Envelope {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut wire = Payload::with_capacity(2);
        wire.insert("state", Value::record(self.state.clone()));
        wire.insert("version", self.version);

        let mut encoder = CanonicalEncoder::new();
        encoder.encode_record(&wire)?;
        Ok(encoder.into_bytes())
    }
}

impl Decode for Envelope {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let Value::Record(wire) = from_cbor(bytes)? else {
            return Err(CodecError::invalid_envelope("top-level value is not a map"));
        };

        let state = match wire.get("state") {
            Some(Value::Record(fields)) => fields.as_ref().clone(),
            Some(other) => {
                return Err(CodecError::invalid_envelope(format!(
                    "state is {}, expected map",
                    other.kind()
                )))
            }
            None => return Err(CodecError::invalid_envelope("missing state")),
        };

        let version = match wire.get("version") {
            Some(Value::Integer(n)) => u32::try_from(*n)
                .map_err(|_| CodecError::invalid_envelope(format!("version {n} out of range")))?,
            Some(other) => {
                return Err(CodecError::invalid_envelope(format!(
                    "version is {}, expected integer",
                    other.kind()
                )))
            }
            None => return Err(CodecError::invalid_envelope("missing version")),
        };

        Ok(Self { state, version })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_wire_layout() {
        let envelope = Envelope::new(Payload::new().with("value", 99), 0);
        let bytes = envelope.encode().unwrap();

        // {"state": {"value": 99}, "version": 0}
        let mut expected = vec![0xa2, 0x65];
        expected.extend_from_slice(b"state");
        expected.extend_from_slice(&[0xa1, 0x65]);
        expected.extend_from_slice(b"value");
        expected.extend_from_slice(&[0x18, 99, 0x67]);
        expected.extend_from_slice(b"version");
        expected.push(0x00);
        assert_eq!(bytes, expected);

        assert_eq!(Envelope::decode(&bytes).unwrap(), envelope);
    }

    #[test]
    fn decode_rejects_missing_fields() {
        let bytes = crate::payload_to_cbor(&Payload::new().with("version", 1)).unwrap();
        assert_eq!(
            Envelope::decode(&bytes),
            Err(CodecError::invalid_envelope("missing state"))
        );

        let bytes = crate::payload_to_cbor(&Payload::new().with("state", Payload::new())).unwrap();
        assert_eq!(
            Envelope::decode(&bytes),
            Err(CodecError::invalid_envelope("missing version"))
        );
    }

    #[test]
    fn decode_rejects_negative_version() {
        let wire = Payload::new().with("state", Payload::new()).with("version", -1);
        let bytes = crate::payload_to_cbor(&wire).unwrap();
        assert!(matches!(
            Envelope::decode(&bytes),
            Err(CodecError::InvalidEnvelope { .. })
        ));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Envelope::decode(b"not cbor at all").is_err());
        assert!(matches!(
            Envelope::decode(&[0x01]),
            Err(CodecError::InvalidEnvelope { .. })
        ));
    }
}
