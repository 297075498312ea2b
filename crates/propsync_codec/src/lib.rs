//! # PropSync Codec
//!
//! Payload values and canonical CBOR encoding for PropSync.
//!
//! This crate provides:
//! - [`Value`], the dynamic field value, with [`Node`] (renderable UI
//!   nodes) and [`Opaque`] (host handles)
//! - [`Payload`], the insertion-ordered named-field bag the sync engine
//!   moves around
//! - Deterministic CBOR encoding of the persistable subset of values
//! - [`Envelope`], the `{ state, version }` record written to storage
//!
//! ## Canonical CBOR Rules
//!
//! - Map keys are text and sorted (length-first, then bytewise)
//! - Integers use shortest encoding
//! - Floats are always doubles, never NaN
//! - No indefinite-length items
//! - Nodes and opaque handles are never encoded
//!
//! ## Usage
//!
//! ```
//! use propsync_codec::{payload_from_cbor, payload_to_cbor, Payload};
//!
//! let state = Payload::new().with("count", 42).with("label", "x");
//! let bytes = payload_to_cbor(&state).unwrap();
//! assert_eq!(payload_from_cbor(&bytes).unwrap(), state);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod envelope;
mod error;
mod payload;
mod value;

pub use decoder::{from_cbor, payload_from_cbor, CanonicalDecoder, MAX_DEPTH};
pub use encoder::{payload_to_cbor, to_canonical_cbor, CanonicalEncoder};
pub use envelope::Envelope;
pub use error::{CodecError, CodecResult};
pub use payload::Payload;
pub use value::{Node, NodeType, Opaque, Value};

/// Trait for types that can be encoded to canonical CBOR.
pub trait Encode {
    /// Encode this value to canonical CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from CBOR.
pub trait Decode: Sized {
    /// Decode this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(self)
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

impl Encode for Payload {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        payload_to_cbor(self)
    }
}

impl Decode for Payload {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        payload_from_cbor(bytes)
    }
}
