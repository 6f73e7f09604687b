//! Well-known tag numbers and the [`Tagged`] serde helper.

use serde::de::{self, Visitor};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

// Standard CBOR tags (RFC 8949)
pub const TAG_DATETIME_STRING: u64 = 0; // Standard date/time string (RFC 3339)
pub const TAG_EPOCH_DATETIME: u64 = 1; // Epoch-based date/time
pub const TAG_POSITIVE_BIGNUM: u64 = 2; // Positive bignum
pub const TAG_NEGATIVE_BIGNUM: u64 = 3; // Negative bignum
pub const TAG_URI: u64 = 32; // URI (RFC 3986)
pub const TAG_SELF_DESCRIBED: u64 = 55799; // Self-described CBOR

// Reserved names the value serializer recognizes. Other serializers see an
// ordinary struct or newtype.
pub(crate) const TAGGED_NAME: &str = "@@CBOR_TAGGED@@";
pub(crate) const UNDEFINED_NAME: &str = "@@CBOR_UNDEFINED@@";
pub(crate) const SIMPLE_NAME: &str = "@@CBOR_SIMPLE@@";

/// A value paired with an optional CBOR tag number.
///
/// Serializes as a real CBOR tag when `tag` is set and as the bare value
/// otherwise. Through a non-CBOR format such as JSON it appears as
/// `{"tag": n, "value": ...}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged<T> {
    /// Tag number; `None` when the source carried no tag
    pub tag: Option<u64>,
    pub value: T,
}

impl<T> Tagged<T> {
    pub fn new(tag: Option<u64>, value: T) -> Self {
        Tagged { tag, value }
    }
}

impl<T: Serialize> Serialize for Tagged<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.tag {
            Some(tag) => {
                let mut s = serializer.serialize_struct(TAGGED_NAME, 2)?;
                s.serialize_field("tag", &tag)?;
                s.serialize_field("value", &self.value)?;
                s.end()
            }
            None => self.value.serialize(serializer),
        }
    }
}

// A Value::Tag arrives as a {tag, value} map; anything else is taken as untagged
impl<'de, T> Deserialize<'de> for Tagged<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TaggedVisitor<T> {
            marker: PhantomData<T>,
        }

        fn plain<'de, T, D>(deserializer: D) -> Result<Tagged<T>, D::Error>
        where
            T: Deserialize<'de>,
            D: Deserializer<'de>,
        {
            T::deserialize(deserializer).map(|value| Tagged { tag: None, value })
        }

        impl<'de, T> Visitor<'de> for TaggedVisitor<T>
        where
            T: Deserialize<'de>,
        {
            type Value = Tagged<T>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a CBOR tag or an untagged value")
            }

            fn visit_newtype_struct<D>(self, deserializer: D) -> Result<Tagged<T>, D::Error>
            where
                D: Deserializer<'de>,
            {
                deserializer.deserialize_any(self)
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Tagged<T>, E> {
                plain(de::value::BoolDeserializer::new(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Tagged<T>, E> {
                plain(de::value::I64Deserializer::new(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Tagged<T>, E> {
                plain(de::value::U64Deserializer::new(v))
            }

            fn visit_i128<E: de::Error>(self, v: i128) -> Result<Tagged<T>, E> {
                plain(de::value::I128Deserializer::new(v))
            }

            fn visit_u128<E: de::Error>(self, v: u128) -> Result<Tagged<T>, E> {
                plain(de::value::U128Deserializer::new(v))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Tagged<T>, E> {
                plain(de::value::F64Deserializer::new(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Tagged<T>, E> {
                plain(de::value::StrDeserializer::new(v))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Tagged<T>, E> {
                plain(de::value::StringDeserializer::new(v))
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Tagged<T>, E> {
                plain(de::value::BytesDeserializer::new(v))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Tagged<T>, E> {
                plain(de::value::BytesDeserializer::new(&v))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Tagged<T>, E> {
                plain(de::value::UnitDeserializer::new())
            }

            fn visit_none<E: de::Error>(self) -> Result<Tagged<T>, E> {
                plain(de::value::UnitDeserializer::new())
            }

            fn visit_seq<A>(self, seq: A) -> Result<Tagged<T>, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                plain(de::value::SeqAccessDeserializer::new(seq))
            }

            fn visit_map<A>(self, map: A) -> Result<Tagged<T>, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                #[derive(Deserialize)]
                struct TaggedHelper<T> {
                    tag: Option<u64>,
                    value: T,
                }

                TaggedHelper::deserialize(de::value::MapAccessDeserializer::new(map))
                    .map(|helper| Tagged {
                        tag: helper.tag,
                        value: helper.value,
                    })
                    .map_err(|_| de::Error::custom("expected tagged value structure or plain value"))
            }
        }

        deserializer.deserialize_newtype_struct(
            TAGGED_NAME,
            TaggedVisitor {
                marker: PhantomData,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;
    use hex_literal::hex;

    #[test]
    fn test_plain_json_string_has_no_tag() {
        let json = r#""https://example.com""#;
        let tagged: Tagged<String> = serde_json::from_str(json).unwrap();

        assert_eq!(tagged.tag, None);
        assert_eq!(tagged.value, "https://example.com");
    }

    #[test]
    fn test_json_object_carries_tag() {
        let json = r#"{"tag": 32, "value": "https://example.com"}"#;
        let tagged: Tagged<String> = serde_json::from_str(json).unwrap();

        assert_eq!(tagged.tag, Some(32));
        assert_eq!(tagged.value, "https://example.com");
    }

    #[test]
    fn test_tagged_serialize_to_json_object() {
        let tagged = Tagged::new(Some(TAG_URI), "https://example.com");
        assert_eq!(
            serde_json::to_string(&tagged).unwrap(),
            r#"{"tag":32,"value":"https://example.com"}"#
        );
    }

    #[test]
    fn test_tagged_round_trip_through_cbor() {
        let tagged_original = Tagged::new(Some(TAG_URI), "https://example.com".to_string());
        let cbor = crate::to_vec(&tagged_original).unwrap();
        assert_eq!(&cbor[..2], &hex!("d820"));

        let tagged_decoded: Tagged<String> = crate::from_slice(&cbor).unwrap();
        assert_eq!(tagged_decoded, tagged_original);
    }

    #[test]
    fn test_untagged_value_through_cbor() {
        let cbor = crate::to_vec(&Tagged::new(None, 42u32)).unwrap();
        assert_eq!(cbor, hex!("182a"));

        let tagged: Tagged<u32> = crate::from_slice(&cbor).unwrap();
        assert_eq!(tagged.tag, None);
        assert_eq!(tagged.value, 42);
    }

    #[test]
    fn test_self_described_prefix() {
        let cbor = crate::to_vec(&Tagged::new(Some(TAG_SELF_DESCRIBED), 1u8)).unwrap();
        assert_eq!(cbor, hex!("d9d9f7 01"));
        assert_eq!(
            crate::decode_one(&cbor).unwrap(),
            Value::tag(TAG_SELF_DESCRIBED, 1)
        );
    }

    #[test]
    fn test_tagged_to_value() {
        let value = crate::to_value(&Tagged::new(Some(TAG_EPOCH_DATETIME), 1705315800i64)).unwrap();
        assert_eq!(value, Value::tag(TAG_EPOCH_DATETIME, 1705315800));
    }

    #[test]
    fn test_plain_json_number_has_no_tag() {
        let json = r#"42"#;
        let tagged: Tagged<u32> = serde_json::from_str(json).unwrap();

        assert_eq!(tagged.tag, None);
        assert_eq!(tagged.value, 42);
    }
}
