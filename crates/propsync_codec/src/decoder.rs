//! Strict CBOR decoder for the persistable subset.

use crate::error::{CodecError, CodecResult};
use crate::payload::Payload;
use crate::value::Value;
use std::sync::Arc;

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not canonical CBOR, use a construct
/// outside the persistable subset (indefinite lengths, half or single
/// floats, NaN, non-text map keys), or carry trailing bytes.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = CanonicalDecoder::new(bytes);
    let value = decoder.decode()?;
    match decoder.remaining().len() {
        0 => Ok(value),
        remaining => Err(CodecError::TrailingBytes { remaining }),
    }
}

/// Decode a payload from CBOR bytes produced by
/// [`payload_to_cbor`](crate::payload_to_cbor).
///
/// # Errors
///
/// Same as [`from_cbor`], plus a structure error if the top-level value
/// is not a map.
pub fn payload_from_cbor(bytes: &[u8]) -> CodecResult<Payload> {
    match from_cbor(bytes)? {
        Value::Record(fields) => Ok(Arc::unwrap_or_clone(fields)),
        other => Err(CodecError::invalid_structure(format!(
            "expected map, found {}",
            other.kind()
        ))),
    }
}

/// Upper bound on list and map element counts.
const MAX_ELEMENTS: u64 = 1 << 24;

/// Upper bound on byte and text string lengths.
const MAX_STRING_LEN: u64 = 1 << 28;

/// Upper bound on nested lists, maps and tags.
pub const MAX_DEPTH: usize = 256;

/// Initial byte of an item, split into major type and additional info.
#[derive(Debug, Clone, Copy)]
struct Head {
    major: u8,
    info: u8,
}

impl From<u8> for Head {
    fn from(byte: u8) -> Self {
        Self {
            major: byte >> 5,
            info: byte & 0x1f,
        }
    }
}

/// Reads canonical CBOR from a byte slice.
#[derive(Debug)]
pub struct CanonicalDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> CanonicalDecoder<'a> {
    /// Create a decoder over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
        }
    }

    /// Decode the next value.
    ///
    /// Fails with [`CodecError::NestingTooDeep`] once lists, maps and tags
    /// nest more than [`MAX_DEPTH`] levels.
    pub fn decode(&mut self) -> CodecResult<Value> {
        if self.depth >= MAX_DEPTH {
            return Err(CodecError::NestingTooDeep { max: MAX_DEPTH });
        }
        self.depth += 1;
        let value = self.item();
        self.depth -= 1;
        value
    }

    fn item(&mut self) -> CodecResult<Value> {
        let head = Head::from(self.byte()?);
        match head.major {
            0 => {
                let n = self.argument(head.info)?;
                i64::try_from(n)
                    .map(Value::Integer)
                    .map_err(|_| CodecError::invalid_structure("integer out of range"))
            }
            1 => {
                let n = self.argument(head.info)?;
                i64::try_from(n)
                    .map(|n| Value::Integer(!n))
                    .map_err(|_| CodecError::invalid_structure("integer out of range"))
            }
            2 => {
                let len = self.length(head.info, MAX_STRING_LEN)?;
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            3 => self.text(head.info).map(|text| Value::Text(text.to_owned())),
            4 => {
                let len = self.length(head.info, MAX_ELEMENTS)?;
                let mut items = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    items.push(self.decode()?);
                }
                Ok(Value::List(Arc::new(items)))
            }
            5 => self.record(head.info),
            6 => {
                // tags carry no meaning for the persisted subset
                self.argument(head.info)?;
                self.decode()
            }
            _ => self.simple(head.info),
        }
    }

    /// Returns true once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining().is_empty()
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> &'a [u8] {
        self.data.get(self.pos..).unwrap_or_default()
    }

    fn byte(&mut self) -> CodecResult<u8> {
        let [byte] = self.array::<1>()?;
        Ok(byte)
    }

    fn take(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let bytes = self
            .remaining()
            .get(..len)
            .ok_or(CodecError::UnexpectedEof)?;
        self.pos += len;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Reads the argument following a head and enforces shortest form.
    fn argument(&mut self, info: u8) -> CodecResult<u64> {
        let (width, floor) = match info {
            0..=23 => return Ok(u64::from(info)),
            24 => (1, 24),
            25 => (2, 0x100),
            26 => (4, 0x1_0000),
            27 => (8, 0x1_0000_0000),
            31 => return Err(CodecError::IndefiniteLengthForbidden),
            _ => return Err(CodecError::invalid_structure("reserved additional info")),
        };
        let value = self
            .take(width)?
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        if value < floor {
            return Err(CodecError::invalid_structure(
                "non-canonical: argument fits a shorter head",
            ));
        }
        Ok(value)
    }

    fn length(&mut self, info: u8, max_allowed: u64) -> CodecResult<usize> {
        let claimed = self.argument(info)?;
        usize::try_from(claimed)
            .ok()
            .filter(|_| claimed <= max_allowed)
            .ok_or(CodecError::SizeLimitExceeded {
                claimed,
                max_allowed,
            })
    }

    fn text(&mut self, info: u8) -> CodecResult<&'a str> {
        let len = self.length(info, MAX_STRING_LEN)?;
        std::str::from_utf8(self.take(len)?).map_err(|_| CodecError::InvalidUtf8)
    }

    fn record(&mut self, info: u8) -> CodecResult<Value> {
        let len = self.length(info, MAX_ELEMENTS)?;
        let mut fields = Payload::with_capacity(len.min(1024));
        let mut previous: &[u8] = &[];

        for _ in 0..len {
            let start = self.pos;
            let head = Head::from(self.byte()?);
            if head.major != 3 {
                return Err(CodecError::invalid_structure("map keys must be text"));
            }
            let name = self.text(head.info)?;
            let data = self.data;
            let key = &data[start..self.pos];

            // strictly increasing by (length, bytes); the first key always passes
            if !previous.is_empty() && (previous.len(), previous) >= (key.len(), key) {
                return Err(CodecError::invalid_structure(
                    "non-canonical: map keys out of order",
                ));
            }
            previous = key;

            let value = self.decode()?;
            fields.insert(name, value);
        }

        Ok(Value::Record(Arc::new(fields)))
    }

    fn simple(&mut self, info: u8) -> CodecResult<Value> {
        match info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            // undefined reads as null
            22 | 23 => Ok(Value::Null),
            25 | 26 => Err(CodecError::FloatWidth),
            27 => {
                let value = f64::from_be_bytes(self.array::<8>()?);
                if value.is_nan() {
                    return Err(CodecError::NaNForbidden);
                }
                Ok(Value::Float(value))
            }
            31 => Err(CodecError::invalid_structure("break outside indefinite item")),
            _ => Err(CodecError::unsupported_type(format!("simple value {info}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{payload_to_cbor, to_canonical_cbor};

    fn is_structure_error(result: CodecResult<Value>) -> bool {
        matches!(result, Err(CodecError::InvalidStructure { .. }))
    }

    #[test]
    fn primitives() {
        assert_eq!(from_cbor(&[0xf6]).unwrap(), Value::Null);
        assert_eq!(from_cbor(&[0xf7]).unwrap(), Value::Null);
        assert_eq!(from_cbor(&[0xf5]).unwrap(), Value::Bool(true));
        assert_eq!(from_cbor(&[0x19, 0x01, 0x2c]).unwrap(), Value::Integer(300));
        assert_eq!(from_cbor(&[0x38, 24]).unwrap(), Value::Integer(-25));
        assert_eq!(from_cbor(&[0x61, b'a']).unwrap(), Value::from("a"));
        assert_eq!(from_cbor(&[0x42, 1, 2]).unwrap(), Value::bytes(vec![1u8, 2]));
    }

    #[test]
    fn integer_extremes() {
        for n in [i64::MIN, -1, 0, i64::MAX] {
            let bytes = to_canonical_cbor(&Value::Integer(n)).unwrap();
            assert_eq!(from_cbor(&bytes).unwrap(), Value::Integer(n));
        }
        // 2^63 does not fit an i64
        let too_big = [0x1b, 0x80, 0, 0, 0, 0, 0, 0, 0];
        assert!(is_structure_error(from_cbor(&too_big)));
    }

    #[test]
    fn doubles_only() {
        let bytes = to_canonical_cbor(&Value::Float(-0.25)).unwrap();
        assert_eq!(from_cbor(&bytes).unwrap(), Value::Float(-0.25));

        assert_eq!(from_cbor(&[0xf9, 0x00, 0x00]), Err(CodecError::FloatWidth));
        assert_eq!(
            from_cbor(&[0xfa, 0x00, 0x00, 0x00, 0x00]),
            Err(CodecError::FloatWidth)
        );

        let mut nan = vec![0xfb];
        nan.extend_from_slice(&f64::NAN.to_be_bytes());
        assert_eq!(from_cbor(&nan), Err(CodecError::NaNForbidden));
    }

    #[test]
    fn longer_heads_than_needed_are_rejected() {
        assert!(is_structure_error(from_cbor(&[0x18, 0x05])));
        assert!(is_structure_error(from_cbor(&[0x19, 0x00, 0xff])));
        assert!(is_structure_error(from_cbor(&[0x1a, 0x00, 0x00, 0xff, 0xff])));
    }

    #[test]
    fn indefinite_lengths_are_rejected() {
        assert_eq!(
            from_cbor(&[0x9f, 0x01, 0xff]),
            Err(CodecError::IndefiniteLengthForbidden)
        );
        assert_eq!(
            from_cbor(&[0xbf, 0x61, b'a', 0x01, 0xff]),
            Err(CodecError::IndefiniteLengthForbidden)
        );
    }

    #[test]
    fn map_keys_must_be_sorted_unique_text() {
        // {"b": 1, "a": 2}
        assert!(is_structure_error(from_cbor(&[
            0xa2, 0x61, b'b', 0x01, 0x61, b'a', 0x02
        ])));
        // {"a": 1, "a": 2}
        assert!(is_structure_error(from_cbor(&[
            0xa2, 0x61, b'a', 0x01, 0x61, b'a', 0x02
        ])));
        // {"bb": 1, "c": 2}: longer key first
        assert!(is_structure_error(from_cbor(&[
            0xa2, 0x62, b'b', b'b', 0x01, 0x61, b'c', 0x02
        ])));
        // {1: 1}
        assert!(is_structure_error(from_cbor(&[0xa1, 0x01, 0x01])));
    }

    #[test]
    fn tags_are_skipped() {
        // tag 1 (epoch time) around an integer
        assert_eq!(from_cbor(&[0xc1, 0x0a]).unwrap(), Value::Integer(10));
    }

    #[test]
    fn truncation_and_trailing_bytes() {
        assert_eq!(from_cbor(&[]), Err(CodecError::UnexpectedEof));
        assert_eq!(from_cbor(&[0x62, b'a']), Err(CodecError::UnexpectedEof));
        assert_eq!(
            from_cbor(&[0x01, 0x02]),
            Err(CodecError::TrailingBytes { remaining: 1 })
        );
    }

    #[test]
    fn oversized_claims_fail_before_reading() {
        // byte string claiming 2^32 bytes
        let bytes = [0x5b, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(
            from_cbor(&bytes),
            Err(CodecError::SizeLimitExceeded { .. })
        ));
    }

    #[test]
    fn nested_payload_comes_back() {
        let payload = Payload::new()
            .with("count", 3)
            .with("tags", Value::list(vec!["a".into(), "b".into()]))
            .with("prefs", Payload::new().with("theme", "dark"))
            .with("ratio", 0.5);

        let decoded = payload_from_cbor(&payload_to_cbor(&payload).unwrap()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn payload_requires_a_map() {
        assert!(matches!(
            payload_from_cbor(&[0x01]),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn decoder_reads_a_sequence() {
        let mut decoder = CanonicalDecoder::new(&[0x01, 0x61, b'x']);
        assert_eq!(decoder.decode().unwrap(), Value::Integer(1));
        assert!(!decoder.is_empty());
        assert_eq!(decoder.decode().unwrap(), Value::from("x"));
        assert!(decoder.is_empty());
    }

    fn nested(prefix: u8, levels: usize) -> Vec<u8> {
        let mut bytes = vec![prefix; levels];
        bytes.push(0x00);
        bytes
    }

    #[test]
    fn nesting_up_to_the_limit_decodes() {
        // MAX_DEPTH - 1 single-item lists around one integer
        let value = from_cbor(&nested(0x81, MAX_DEPTH - 1)).unwrap();
        assert!(value.as_list().is_some());
    }

    #[test]
    fn deep_nesting_is_an_error_not_a_crash() {
        let too_deep = Err(CodecError::NestingTooDeep { max: MAX_DEPTH });
        assert_eq!(from_cbor(&nested(0x81, MAX_DEPTH)), too_deep);
        assert_eq!(from_cbor(&nested(0x81, 500_000)), too_deep);
        // tag chains
        assert_eq!(from_cbor(&nested(0xc0, 10_000)), too_deep);
        // {"a": {"a": ...}}
        let mut records = [0xa1, 0x61, b'a'].repeat(10_000);
        records.push(0x00);
        assert_eq!(from_cbor(&records), too_deep);
    }
}
