//! Serde bridge from typed Rust data to [`Value`].

use num_bigint::BigInt;
use serde::ser::{self, Serialize};

use crate::decode::tagged_value;
use crate::error::{CborError, Result};
use crate::numeric::IntParts;
use crate::tags::{SIMPLE_NAME, TAGGED_NAME, UNDEFINED_NAME};
use crate::value::{Map, Value};

/// Converts any `T: Serialize` into a [`Value`].
///
/// Structs and maps become [`Value::Map`] in field order, sequences and
/// tuples become [`Value::Array`], `None` and `()` become [`Value::Null`],
/// and enum variants other than unit variants become a single-entry map
/// keyed by the variant name.
pub fn to_value<T: ?Sized + Serialize>(value: &T) -> Result<Value> {
    value.serialize(ValueSerializer)
}

impl Serialize for Value {
    fn serialize<S: ser::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use ser::{Error, SerializeMap, SerializeSeq};

        match self {
            Value::Undefined => serializer.serialize_unit_struct(UNDEFINED_NAME),
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serialize_int(*i, serializer),
            Value::BigInt(b) => serialize_bigint(b, serializer),
            Value::Decimal(d) => match d.to_integer() {
                Some(n) => serialize_bigint(&n, serializer),
                None => Err(S::Error::custom(format!("non-integral decimal {d}"))),
            },
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Set(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
            Value::Tag(tag, inner) => {
                crate::tags::Tagged::new(Some(*tag), inner.as_ref()).serialize(serializer)
            }
            Value::Simple(n) => serializer.serialize_newtype_struct(SIMPLE_NAME, n),
            Value::Object(o) => Err(S::Error::custom(format!(
                "application object `{}` cannot be serialized",
                o.type_key()
            ))),
        }
    }
}

fn serialize_int<S: ser::Serializer>(i: i128, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    match (u64::try_from(i), i64::try_from(i)) {
        (Ok(u), _) => serializer.serialize_u64(u),
        (_, Ok(n)) => serializer.serialize_i64(n),
        _ => serializer.serialize_i128(i),
    }
}

fn serialize_bigint<S: ser::Serializer>(
    b: &BigInt,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    if let Ok(i) = i128::try_from(b) {
        return serialize_int(i, serializer);
    }
    if let Ok(u) = u128::try_from(b) {
        return serializer.serialize_u128(u);
    }
    match crate::numeric::bignum_parts(b) {
        IntParts::Bignum(tag, magnitude) => crate::tags::Tagged::new(
            Some(tag),
            serde_bytes::Bytes::new(&magnitude),
        )
        .serialize(serializer),
        // every native-range value fits i128 and returned above
        IntParts::Native(_) => Err(ser::Error::custom("bignum in native range")),
    }
}

/// Serializer whose output is a [`Value`].
pub struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = CborError;
    type SerializeSeq = SerializeVec;
    type SerializeTuple = SerializeVec;
    type SerializeTupleStruct = SerializeVec;
    type SerializeTupleVariant = SerializeTupleVariant;
    type SerializeMap = SerializeMap;
    type SerializeStruct = SerializeMap;
    type SerializeStructVariant = SerializeStructVariant;

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        self.serialize_i128(i128::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        self.serialize_i128(i128::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        self.serialize_i128(i128::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        self.serialize_i128(i128::from(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Value> {
        Ok(Value::Integer(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        self.serialize_i128(i128::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        self.serialize_i128(i128::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        self.serialize_i128(i128::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        self.serialize_i128(i128::from(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Value> {
        Ok(Value::from(v))
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        Ok(Value::Float(f64::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        Ok(Value::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        Ok(Value::Text(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::Text(v.to_owned()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<Value> {
        if name == UNDEFINED_NAME {
            return Ok(Value::Undefined);
        }
        self.serialize_unit()
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        Ok(Value::from(variant))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Value> {
        let inner = value.serialize(self)?;
        if name != SIMPLE_NAME {
            return Ok(inner);
        }
        inner
            .as_i128()
            .and_then(|n| u8::try_from(n).ok())
            .map(Value::Simple)
            .ok_or_else(|| CborError::Serde("simple value out of range".to_string()))
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value> {
        let mut map = Map::with_capacity(1);
        map.insert(Value::from(variant), value.serialize(self)?);
        Ok(Value::Map(map))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeVec> {
        Ok(SerializeVec {
            vec: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeVec> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SerializeVec> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeTupleVariant> {
        Ok(SerializeTupleVariant {
            variant,
            vec: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<SerializeMap> {
        Ok(SerializeMap {
            map: Map::with_capacity(len.unwrap_or(0)),
            next_key: None,
            tagged: false,
        })
    }

    fn serialize_struct(self, name: &'static str, len: usize) -> Result<SerializeMap> {
        let mut map = self.serialize_map(Some(len))?;
        map.tagged = name == TAGGED_NAME;
        Ok(map)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeStructVariant> {
        Ok(SerializeStructVariant {
            variant,
            map: Map::with_capacity(len),
        })
    }
}

pub struct SerializeVec {
    vec: Vec<Value>,
}

pub struct SerializeTupleVariant {
    variant: &'static str,
    vec: Vec<Value>,
}

pub struct SerializeMap {
    map: Map,
    next_key: Option<Value>,
    tagged: bool,
}

pub struct SerializeStructVariant {
    variant: &'static str,
    map: Map,
}

impl ser::SerializeSeq for SerializeVec {
    type Ok = Value;
    type Error = CborError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.vec.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Array(self.vec))
    }
}

impl ser::SerializeTuple for SerializeVec {
    type Ok = Value;
    type Error = CborError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SerializeVec {
    type Ok = Value;
    type Error = CborError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleVariant for SerializeTupleVariant {
    type Ok = Value;
    type Error = CborError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.vec.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::map([(Value::from(self.variant), Value::Array(self.vec))]))
    }
}

impl ser::SerializeMap for SerializeMap {
    type Ok = Value;
    type Error = CborError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        self.next_key = Some(to_value(key)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| CborError::Serde("map value without a key".to_string()))?;
        self.map.insert(key, to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::Map(self.map))
    }
}

impl ser::SerializeStruct for SerializeMap {
    type Ok = Value;
    type Error = CborError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.map.insert(Value::from(key), to_value(value)?);
        Ok(())
    }

    fn end(mut self) -> Result<Value> {
        if !self.tagged {
            return Ok(Value::Map(self.map));
        }
        let tag = self
            .map
            .swap_remove(&Value::from("tag"))
            .and_then(|t| t.as_i128())
            .and_then(|t| u64::try_from(t).ok())
            .ok_or_else(|| CborError::Serde("tagged value without a tag number".to_string()))?;
        let value = self
            .map
            .swap_remove(&Value::from("value"))
            .ok_or_else(|| CborError::Serde("tagged value without content".to_string()))?;
        Ok(tagged_value(tag, value))
    }
}

impl ser::SerializeStructVariant for SerializeStructVariant {
    type Ok = Value;
    type Error = CborError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.map.insert(Value::from(key), to_value(value)?);
        Ok(())
    }

    fn end(self) -> Result<Value> {
        Ok(Value::map([(Value::from(self.variant), Value::Map(self.map))]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Decimal;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Person {
        name: String,
        age: u32,
        nickname: Option<String>,
    }

    #[derive(Serialize)]
    enum Shape {
        Empty,
        Circle(f64),
        Rect(u8, u8),
        Named { label: String },
    }

    #[test]
    fn test_struct_to_value() {
        let person = Person {
            name: "Alice".to_string(),
            age: 30,
            nickname: None,
        };
        assert_eq!(
            to_value(&person).unwrap(),
            Value::map([
                ("name", Value::from("Alice")),
                ("age", Value::from(30)),
                ("nickname", Value::Null),
            ])
        );
    }

    #[test]
    fn test_enum_to_value() {
        assert_eq!(to_value(&Shape::Empty).unwrap(), Value::from("Empty"));
        assert_eq!(
            to_value(&Shape::Circle(1.5)).unwrap(),
            Value::map([("Circle", 1.5)])
        );
        assert_eq!(
            to_value(&Shape::Rect(2, 3)).unwrap(),
            Value::map([("Rect", Value::Array(vec![Value::from(2), Value::from(3)]))])
        );
        assert_eq!(
            to_value(&Shape::Named { label: "x".into() }).unwrap(),
            Value::map([("Named", Value::map([("label", "x")]))])
        );
    }

    #[test]
    fn test_wide_integers() {
        assert_eq!(to_value(&u128::MAX).unwrap(), Value::from(u128::MAX));
        assert_eq!(to_value(&i128::MIN).unwrap(), Value::Integer(i128::MIN));
    }

    #[test]
    fn test_value_serializes_to_itself() {
        let value = Value::Array(vec![
            Value::Undefined,
            Value::Simple(16),
            Value::tag(65534, "foo"),
            Value::BigInt(BigInt::from(u128::MAX) * 4),
            Value::Decimal(Decimal::new(5, 2)),
            Value::Bytes(vec![1, 2]),
        ]);
        let mut expected = value.clone();
        if let Value::Array(items) = &mut expected {
            items[4] = Value::from(500);
        }
        assert_eq!(to_value(&value).unwrap(), expected);
    }

    #[test]
    fn test_value_to_json() {
        let value = Value::map([("a", Value::from(1)), ("b", Value::Undefined)]);
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"a":1,"b":null}"#);
    }

    #[test]
    fn test_non_integral_decimal_fails() {
        assert!(to_value(&Value::Decimal(Decimal::new(15, -1))).is_err());
    }
}
