//! Canonical CBOR encoder.

use crate::error::{CodecError, CodecResult};
use crate::payload::Payload;
use crate::value::Value;

/// Encode a value to canonical CBOR bytes.
///
/// Output follows the deterministic encoding of RFC 8949 Section 4.2.1:
/// shortest-form heads, map keys ordered by their encoded bytes
/// (shorter first), definite lengths only. Floats are always written as
/// 64-bit doubles.
///
/// # Errors
///
/// Returns an error if the value contains a node, an opaque handle, or NaN.
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// Encode a payload as a canonical CBOR map.
///
/// # Errors
///
/// Same as [`to_canonical_cbor`].
pub fn payload_to_cbor(payload: &Payload) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::with_capacity(payload.len() * 16);
    encoder.encode_record(payload)?;
    Ok(encoder.into_bytes())
}

/// CBOR major types used by the persistable subset.
#[derive(Debug, Clone, Copy)]
#[repr(u8)]
enum Major {
    Unsigned = 0,
    Negative = 1,
    Bytes = 2,
    Text = 3,
    Array = 4,
    Map = 5,
}

const FALSE: u8 = 0xf4;
const TRUE: u8 = 0xf5;
const NULL: u8 = 0xf6;
const FLOAT64: u8 = 0xfb;

/// Writes canonical CBOR into a growable buffer.
///
/// The same logical payload always produces the same bytes, whatever the
/// field insertion order.
#[derive(Debug, Default)]
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new encoder with a preallocated buffer.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Append one value.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.buffer.push(NULL),
            Value::Bool(flag) => self.buffer.push(if *flag { TRUE } else { FALSE }),
            Value::Integer(n) => self.write_integer(*n),
            Value::Float(f) => self.write_float(*f)?,
            Value::Text(text) => self.write_text(text),
            Value::Bytes(data) => {
                self.write_head(Major::Bytes, data.len() as u64);
                self.buffer.extend_from_slice(data);
            }
            Value::List(items) => {
                self.write_head(Major::Array, items.len() as u64);
                for item in items.iter() {
                    self.encode(item)?;
                }
            }
            Value::Record(fields) => self.encode_record(fields)?,
            Value::Node(_) | Value::Opaque(_) => {
                return Err(CodecError::Unpersistable { kind: value.kind() })
            }
        }
        Ok(())
    }

    /// Append a payload as a map with text keys in canonical order.
    pub fn encode_record(&mut self, fields: &Payload) -> CodecResult<()> {
        let mut entries: Vec<(Vec<u8>, &Value)> = fields
            .iter()
            .map(|(name, value)| (text_key(name), value))
            .collect();
        entries.sort_unstable_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

        self.write_head(Major::Map, entries.len() as u64);
        for (key, value) in entries {
            self.buffer.extend_from_slice(&key);
            self.encode(value)?;
        }
        Ok(())
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    #[allow(clippy::cast_possible_truncation)]
    fn write_head(&mut self, major: Major, arg: u64) {
        let prefix = (major as u8) << 5;
        match arg {
            0..=23 => self.buffer.push(prefix | arg as u8),
            24..=0xff => self.buffer.extend_from_slice(&[prefix | 24, arg as u8]),
            0x100..=0xffff => {
                self.buffer.push(prefix | 25);
                self.buffer.extend_from_slice(&(arg as u16).to_be_bytes());
            }
            0x1_0000..=0xffff_ffff => {
                self.buffer.push(prefix | 26);
                self.buffer.extend_from_slice(&(arg as u32).to_be_bytes());
            }
            _ => {
                self.buffer.push(prefix | 27);
                self.buffer.extend_from_slice(&arg.to_be_bytes());
            }
        }
    }

    #[allow(clippy::cast_sign_loss)]
    fn write_integer(&mut self, n: i64) {
        // negative n is carried as -1 - n, which is !n in two's complement
        if n < 0 {
            self.write_head(Major::Negative, !n as u64);
        } else {
            self.write_head(Major::Unsigned, n as u64);
        }
    }

    fn write_float(&mut self, f: f64) -> CodecResult<()> {
        if f.is_nan() {
            return Err(CodecError::NaNForbidden);
        }
        self.buffer.push(FLOAT64);
        self.buffer.extend_from_slice(&f.to_be_bytes());
        Ok(())
    }

    fn write_text(&mut self, text: &str) {
        self.write_head(Major::Text, text.len() as u64);
        self.buffer.extend_from_slice(text.as_bytes());
    }
}

fn text_key(name: &str) -> Vec<u8> {
    let mut key = CanonicalEncoder::with_capacity(name.len() + 9);
    key.write_text(name);
    key.into_bytes()
}
