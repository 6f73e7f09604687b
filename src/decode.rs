use half::f16;
use num_bigint::{BigInt, Sign};
use tracing::debug;

use crate::error::{CborError, Result};
use crate::tags::{TAG_NEGATIVE_BIGNUM, TAG_POSITIVE_BIGNUM};
use crate::value::{Map, Value};
use crate::{
    MAJOR_ARRAY, MAJOR_BYTES, MAJOR_MAP, MAJOR_NEGATIVE, MAJOR_SIMPLE, MAJOR_TAG, MAJOR_TEXT,
    MAJOR_UNSIGNED,
};

/// Deepest nesting of arrays, maps and tags the decoder will follow.
pub const MAX_DEPTH: usize = 256;

const BREAK: u8 = 0xff;
const INDEFINITE: u8 = 31;

/// Decodes every concatenated top-level item in `bytes`.
///
/// Any malformed or truncated item fails the whole call.
pub fn decode_all(bytes: &[u8]) -> Result<Vec<Value>> {
    Decoder::new(bytes).collect()
}

/// Decodes exactly one item; trailing bytes are an error.
pub fn decode_one(bytes: &[u8]) -> Result<Value> {
    let mut decoder = Decoder::new(bytes);
    let value = decoder.decode_value()?;
    if !decoder.is_empty() {
        return Err(CborError::TrailingData(decoder.offset()));
    }
    Ok(value)
}

/// Builds a tagged value, reading bignum tags over a byte string back as
/// [`Value::BigInt`].
pub(crate) fn tagged_value(tag: u64, inner: Value) -> Value {
    match (tag, inner) {
        (TAG_POSITIVE_BIGNUM, Value::Bytes(b)) => {
            Value::BigInt(BigInt::from_bytes_be(Sign::Plus, &b))
        }
        (TAG_NEGATIVE_BIGNUM, Value::Bytes(b)) => {
            Value::BigInt(-1 - BigInt::from_bytes_be(Sign::Plus, &b))
        }
        (tag, inner) => Value::Tag(tag, Box::new(inner)),
    }
}

/// Cursor over a byte slice holding one or more CBOR items.
///
/// Iterating yields one decoded value per top-level item.
#[derive(Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
    offset: usize,
    depth: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Decoder {
            data,
            offset: 0,
            depth: 0,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    fn malformed(&self, reason: &'static str) -> CborError {
        debug!(offset = self.offset, reason, "malformed CBOR");
        CborError::malformed(self.offset, reason)
    }

    fn read_u8(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.offset)
            .ok_or_else(|| self.malformed("unexpected end of input"))?;
        self.offset += 1;
        Ok(b)
    }

    fn peek_u8(&self) -> Result<u8> {
        self.data
            .get(self.offset)
            .copied()
            .ok_or_else(|| self.malformed("unexpected end of input"))
    }

    fn read_slice(&mut self, len: u64) -> Result<&'a [u8]> {
        let remaining = self.data.len() - self.offset;
        let len = usize::try_from(len)
            .ok()
            .filter(|&len| len <= remaining)
            .ok_or_else(|| self.malformed("length exceeds remaining input"))?;
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self.read_slice(N as u64)?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(slice);
        Ok(buf)
    }

    /// Reads the argument for `info`; `None` marks indefinite length.
    fn read_length(&mut self, info: u8) -> Result<Option<u64>> {
        Ok(Some(match info {
            0..=23 => u64::from(info),
            24 => u64::from(self.read_u8()?),
            25 => u64::from(u16::from_be_bytes(self.read_array()?)),
            26 => u64::from(u32::from_be_bytes(self.read_array()?)),
            27 => u64::from_be_bytes(self.read_array()?),
            INDEFINITE => return Ok(None),
            _ => return Err(self.malformed("reserved additional information")),
        }))
    }

    fn read_definite(&mut self, info: u8) -> Result<u64> {
        self.read_length(info)?
            .ok_or_else(|| self.malformed("indefinite length not allowed here"))
    }

    /// Consumes a break byte if one is next.
    fn at_break(&mut self) -> Result<bool> {
        if self.peek_u8()? == BREAK {
            self.offset += 1;
            return Ok(true);
        }
        Ok(false)
    }

    fn read_string(&mut self, major: u8, info: u8) -> Result<Vec<u8>> {
        match self.read_length(info)? {
            Some(len) => Ok(self.read_slice(len)?.to_vec()),
            None => {
                let mut buf = Vec::new();
                while !self.at_break()? {
                    let initial = self.read_u8()?;
                    if initial >> 5 != major {
                        return Err(self.malformed("chunk type differs from string type"));
                    }
                    let len = self.read_definite(initial & 0x1f)?;
                    buf.extend_from_slice(self.read_slice(len)?);
                }
                Ok(buf)
            }
        }
    }

    /// Decodes the next complete item.
    pub fn decode_value(&mut self) -> Result<Value> {
        if self.depth >= MAX_DEPTH {
            return Err(CborError::DepthLimit);
        }
        self.depth += 1;
        let result = self.decode_item();
        self.depth -= 1;
        result
    }

    fn decode_item(&mut self) -> Result<Value> {
        let initial = self.read_u8()?;
        let major = initial >> 5;
        let info = initial & 0x1f;

        match major {
            MAJOR_UNSIGNED => Ok(Value::Integer(i128::from(self.read_definite(info)?))),
            MAJOR_NEGATIVE => Ok(Value::Integer(-1 - i128::from(self.read_definite(info)?))),
            MAJOR_BYTES => Ok(Value::Bytes(self.read_string(major, info)?)),
            MAJOR_TEXT => {
                let buf = self.read_string(major, info)?;
                String::from_utf8(buf)
                    .map(Value::Text)
                    .map_err(|_| self.malformed("invalid UTF-8 in text string"))
            }
            MAJOR_ARRAY => {
                let mut items = Vec::new();
                match self.read_length(info)? {
                    Some(len) => {
                        for _ in 0..len {
                            items.push(self.decode_value()?);
                        }
                    }
                    None => {
                        while !self.at_break()? {
                            items.push(self.decode_value()?);
                        }
                    }
                }
                Ok(Value::Array(items))
            }
            MAJOR_MAP => {
                let mut map = Map::new();
                match self.read_length(info)? {
                    Some(len) => {
                        for _ in 0..len {
                            let key = self.decode_value()?;
                            let value = self.decode_value()?;
                            map.insert(key, value);
                        }
                    }
                    None => {
                        while !self.at_break()? {
                            let key = self.decode_value()?;
                            let value = self.decode_value()?;
                            map.insert(key, value);
                        }
                    }
                }
                Ok(Value::Map(map))
            }
            MAJOR_TAG => {
                let tag = self.read_definite(info)?;
                let inner = self.decode_value()?;
                Ok(tagged_value(tag, inner))
            }
            MAJOR_SIMPLE => match info {
                20 => Ok(Value::Bool(false)),
                21 => Ok(Value::Bool(true)),
                22 => Ok(Value::Null),
                23 => Ok(Value::Undefined),
                0..=19 => Ok(Value::Simple(info)),
                24 => match self.read_u8()? {
                    n if n < 32 => Err(self.malformed("two-byte simple value below 32")),
                    n => Ok(Value::Simple(n)),
                },
                25 => Ok(Value::Float(f16::from_be_bytes(self.read_array()?).to_f64())),
                26 => Ok(Value::Float(f64::from(f32::from_be_bytes(self.read_array()?)))),
                27 => Ok(Value::Float(f64::from_be_bytes(self.read_array()?))),
                INDEFINITE => Err(self.malformed("unexpected break")),
                _ => Err(self.malformed("reserved additional information")),
            },
            _ => unreachable!("major type is three bits"),
        }
    }
}

impl Iterator for Decoder<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_empty() {
            return None;
        }
        let item = self.decode_value();
        if item.is_err() {
            // stop at the first error
            self.offset = self.data.len();
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_decode_all_sequence() {
        let values = decode_all(&hex!("01 6161 f5 f7")).unwrap();
        assert_eq!(
            values,
            vec![Value::from(1), Value::from("a"), Value::Bool(true), Value::Undefined]
        );
        assert!(decode_all(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_decode_nested() {
        let values = decode_all(&hex!("82 182c f5")).unwrap();
        assert_eq!(
            values,
            vec![Value::Array(vec![Value::from(44), Value::Bool(true)])]
        );
    }

    #[test]
    fn test_decode_tag_is_kept() {
        let values = decode_all(&hex!("d9fffe 63666f6f")).unwrap();
        assert_eq!(values, vec![Value::tag(65534, "foo")]);
    }

    #[test]
    fn test_decode_bignums() {
        let values = decode_all(&hex!("c249010000000000000000 c349010000000000000000")).unwrap();
        let two_64 = BigInt::from(1u128 << 64);
        assert_eq!(
            values,
            vec![Value::BigInt(two_64.clone()), Value::BigInt(-two_64 - 1)]
        );
    }

    #[test]
    fn test_decode_floats() {
        let values = decode_all(&hex!("f93e00 fa47c35000 fb3ff199999999999a f97c00")).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Float(1.5),
                Value::Float(100000.0),
                Value::Float(1.1),
                Value::Float(f64::INFINITY)
            ]
        );
    }

    #[test]
    fn test_decode_indefinite() {
        let values = decode_all(&hex!("9f 01 820203 ff bf 6161 01 ff 5f 4201 02 4103 ff")).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Array(vec![
                    Value::from(1),
                    Value::Array(vec![Value::from(2), Value::from(3)])
                ]),
                Value::map([("a", 1)]),
                Value::Bytes(vec![1, 2, 3]),
            ]
        );
    }

    #[test]
    fn test_truncated_input_fails() {
        for bytes in [&hex!("18")[..], &hex!("62 61")[..], &hex!("82 01")[..], &hex!("01 19 01")[..]] {
            let err = decode_all(bytes).unwrap_err();
            assert!(matches!(err, CborError::Malformed { .. }), "{bytes:02x?}");
        }
    }

    #[test]
    fn test_invalid_structure_fails() {
        // reserved additional info, stray break, indefinite integer,
        // mixed chunk types, bad utf-8, short two-byte simple value
        for bytes in [
            &hex!("1c")[..],
            &hex!("ff")[..],
            &hex!("1f")[..],
            &hex!("5f 6161 ff")[..],
            &hex!("62 c328")[..],
            &hex!("f8 10")[..],
        ] {
            let err = decode_all(bytes).unwrap_err();
            assert!(matches!(err, CborError::Malformed { .. }), "{bytes:02x?}");
        }
    }

    #[test]
    fn test_huge_length_does_not_allocate() {
        let err = decode_all(&hex!("5b ffffffffffffffff")).unwrap_err();
        assert!(matches!(err, CborError::Malformed { .. }));
    }

    #[test]
    fn test_depth_limit() {
        let bytes = vec![0x81; MAX_DEPTH + 1];
        assert!(matches!(decode_all(&bytes), Err(CborError::DepthLimit)));
    }

    #[test]
    fn test_decode_one_rejects_trailing() {
        assert_eq!(decode_one(&hex!("01")).unwrap(), Value::from(1));
        assert!(matches!(decode_one(&hex!("01 02")), Err(CborError::TrailingData(1))));
    }
}
