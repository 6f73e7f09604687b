//! # Canonical CBOR
//!
//! A CBOR (Concise Binary Object Representation, RFC 8949) encoder that produces
//! deterministic output, with a small decoder for reading it back.
//!
//! ## Features
//! - Canonical encoding by default:
//!   - Integers and lengths in their shortest form (0-23 packed into the initial byte)
//!   - Floats in the narrowest of half/single/double that is bit-exact
//!   - Map keys and set elements sorted by encoded length, then bytewise
//!   - Integers outside the 64-bit range as bignums (tags 2 and 3)
//! - Application types through a per-encoder semantic type registry, with an
//!   optional shared base table, or through their own [`EncodeCbor`] impl
//! - Streaming output: every chunk goes to a callback as it is produced
//! - All-or-nothing writes when buffering
//! - `decode_all` for concatenated items, and serde support via [`to_vec`] and [`from_slice`]
//!
//! ## Example
//! ```rust
//! use cbor_canon::{Encoder, EncoderOptions, Value, decode_all, encode};
//!
//! // Keys come out in canonical order regardless of insertion order
//! let value = Value::map([("aa", 2), ("b", 1)]);
//! let bytes = encode(&value).unwrap();
//! assert_eq!(bytes, [0xa2, 0x61, 0x62, 0x01, 0x62, 0x61, 0x61, 0x02]);
//! assert_eq!(decode_all(&bytes).unwrap(), vec![value]);
//!
//! // Several values through one encoder
//! let mut encoder = Encoder::new(EncoderOptions::default().canonical(false));
//! encoder.write(&Value::from(1)).unwrap().write(&Value::from("a")).unwrap();
//! assert_eq!(encoder.finalize().unwrap(), [0x01, 0x61, 0x61]);
//! ```

mod de;
mod decode;
mod encode;
mod error;
mod numeric;
mod registry;
mod ser;
mod sink;
pub mod tags;
mod value;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use de::from_value;
pub use decode::{Decoder, MAX_DEPTH, decode_all, decode_one};
pub use encode::{EncodeCbor, Encoder, EncoderOptions, canonical_cmp};
pub use error::{CborError, Result};
pub use registry::{EncodeFn, Registry, TypeKey};
pub use ser::{ValueSerializer, to_value};
pub use sink::Sink;
pub use tags::Tagged;
pub use value::{AsAny, CborObject, Decimal, Map, Set, Value};

// CBOR major types
pub(crate) const MAJOR_UNSIGNED: u8 = 0;
pub(crate) const MAJOR_NEGATIVE: u8 = 1;
pub(crate) const MAJOR_BYTES: u8 = 2;
pub(crate) const MAJOR_TEXT: u8 = 3;
pub(crate) const MAJOR_ARRAY: u8 = 4;
pub(crate) const MAJOR_MAP: u8 = 5;
pub(crate) const MAJOR_TAG: u8 = 6;
pub(crate) const MAJOR_SIMPLE: u8 = 7;

/// Encodes one value with the default (canonical, buffering) options.
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    encode_with(value, EncoderOptions::default())
}

/// Encodes one value with the given options.
///
/// Options that set a stream get [`CborError::NotBuffering`] back after the
/// value has been streamed.
pub fn encode_with(value: &Value, options: EncoderOptions<'_>) -> Result<Vec<u8>> {
    let mut encoder = Encoder::new(options);
    encoder.write(value)?;
    encoder.finalize()
}

// Convenience functions
pub fn to_vec<T: ?Sized + Serialize>(value: &T) -> Result<Vec<u8>> {
    encode(&to_value(value)?)
}

pub fn from_slice<T: DeserializeOwned>(slice: &[u8]) -> Result<T> {
    from_value(decode_one(slice)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{TAG_DATETIME_STRING, TAG_EPOCH_DATETIME, TAG_URI};
    use serde::Deserialize;
    use serde_bytes::ByteBuf;
    use std::collections::HashMap;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Person {
        name: String,
        age: u32,
        emails: Vec<String>,
    }

    #[test]
    fn test_basic_types() {
        assert_eq!(from_slice::<u32>(&to_vec(&42u32).unwrap()).unwrap(), 42);
        assert_eq!(from_slice::<i32>(&to_vec(&-42i32).unwrap()).unwrap(), -42);
        assert!(from_slice::<bool>(&to_vec(&true).unwrap()).unwrap());
        assert_eq!(
            from_slice::<String>(&to_vec(&"hello".to_string()).unwrap()).unwrap(),
            "hello"
        );
        assert_eq!(from_slice::<f64>(&to_vec(&1.5f64).unwrap()).unwrap(), 1.5);
    }

    #[test]
    fn test_struct() {
        let person = Person {
            name: "Alice".to_string(),
            age: 30,
            emails: vec!["alice@example.com".to_string()],
        };
        let encoded = to_vec(&person).unwrap();
        let decoded: Person = from_slice(&encoded).unwrap();
        assert_eq!(person, decoded);
    }

    #[test]
    fn test_struct_fields_are_canonically_ordered() {
        // "age" and "name" sort before "emails" because they are shorter
        let person = Person {
            name: "A".to_string(),
            age: 1,
            emails: vec![],
        };
        let encoded = to_vec(&person).unwrap();
        assert_eq!(encoded[0], 0xa3);
        assert_eq!(&encoded[1..5], &[0x63, b'a', b'g', b'e']);
    }

    #[test]
    fn test_map() {
        let mut map = HashMap::new();
        map.insert("key1".to_string(), 100);
        map.insert("key2".to_string(), 200);
        let encoded = to_vec(&map).unwrap();
        let decoded: HashMap<String, i32> = from_slice(&encoded).unwrap();
        assert_eq!(map, decoded);
    }

    #[test]
    fn test_tagged_datetime_string() {
        let buf = to_vec(&Tagged::new(Some(TAG_DATETIME_STRING), "2024-01-15T10:30:00Z")).unwrap();

        // Tag 0 is encoded as 0xC0 (major type 6, value 0)
        assert_eq!(buf[0], 0xC0);

        // Tags are transparent to plain targets
        let decoded: String = from_slice(&buf).unwrap();
        assert_eq!(decoded, "2024-01-15T10:30:00Z");
    }

    #[test]
    fn test_tagged_epoch_datetime() {
        let epoch: i64 = 1705315800;
        let buf = to_vec(&Tagged::new(Some(TAG_EPOCH_DATETIME), epoch)).unwrap();
        assert_eq!(buf[0], 0xC1);

        let decoded: i64 = from_slice(&buf).unwrap();
        assert_eq!(decoded, epoch);
    }

    #[test]
    fn test_manual_tag_encoding() {
        let mut encoder = Encoder::default();
        encoder.push_tag(100);
        encoder.push_text("custom tagged value");
        let buf = encoder.finalize().unwrap();

        // Tag 100 is encoded as 0xD8 0x64
        assert_eq!(buf[0], 0xD8);
        assert_eq!(buf[1], 100);

        let decoded: String = from_slice(&buf).unwrap();
        assert_eq!(decoded, "custom tagged value");

        let tagged: Tagged<String> = from_slice(&buf).unwrap();
        assert_eq!(tagged.tag, Some(100));
    }

    #[test]
    fn test_tagged_uri_value() {
        let buf = encode(&Value::tag(TAG_URI, "https://example.com/path")).unwrap();
        assert_eq!(&buf[..2], &[0xD8, 32]);
        assert_eq!(
            decode_one(&buf).unwrap(),
            Value::tag(TAG_URI, "https://example.com/path")
        );
    }

    #[test]
    fn test_large_byte_array() {
        // 1KB array: 1 byte major type + 2 bytes for length (1024 = 0x400)
        let data: Vec<u8> = (0..1024).map(|i| (i % 256) as u8).collect();
        let encoded = to_vec(&ByteBuf::from(data.clone())).unwrap();
        assert_eq!(encoded.len(), 1024 + 3);
        assert_eq!(encoded[0], (MAJOR_BYTES << 5) | 25);
        assert_eq!(encoded[1], 0x04);
        assert_eq!(encoded[2], 0x00);

        let decoded: ByteBuf = from_slice(&encoded).unwrap();
        assert_eq!(decoded.into_vec(), data);

        // 100KB array: 1 byte major + 4 bytes for length
        let large_data: Vec<u8> = (0..102400).map(|i| (i % 256) as u8).collect();
        let encoded_large = to_vec(&ByteBuf::from(large_data)).unwrap();
        assert_eq!(encoded_large.len(), 102400 + 5);
    }

    #[test]
    fn test_vec_u8_as_array() {
        // Without serde_bytes, Vec<u8> serializes as an array
        let data: Vec<u8> = vec![1, 2, 3];
        let encoded = to_vec(&data).unwrap();
        assert_eq!(encoded[0], (MAJOR_ARRAY << 5) | 3);

        let decoded: Vec<u8> = from_slice(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_from_slice_rejects_trailing_bytes() {
        let mut buf = to_vec(&1u8).unwrap();
        buf.push(0x02);
        assert!(matches!(from_slice::<u8>(&buf), Err(CborError::TrailingData(1))));
    }

    #[test]
    fn test_encode_with_streaming_options() {
        let mut out = Vec::new();
        let result = encode_with(
            &Value::from("hi"),
            EncoderOptions::default().stream(|chunk: &[u8]| out.extend_from_slice(chunk)),
        );
        assert!(matches!(result, Err(CborError::NotBuffering)));
        assert_eq!(out, [0x62, b'h', b'i']);
    }
}
