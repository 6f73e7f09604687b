//! Minimal-width numeric encodings.
//!
//! Everything here is a pure function of its input: the encoder calls these
//! to decide how many bytes a header, integer, float or bignum needs under
//! the canonical rules (RFC 8949 §4.2.1).

use std::ops::Deref;

use half::f16;
use num_bigint::{BigInt, Sign};

use crate::tags::{TAG_NEGATIVE_BIGNUM, TAG_POSITIVE_BIGNUM};
use crate::{MAJOR_NEGATIVE, MAJOR_SIMPLE, MAJOR_UNSIGNED};

// Additional info values selecting the argument width
const ONE_BYTE: u8 = 24;
const TWO_BYTES: u8 = 25;
const FOUR_BYTES: u8 = 26;
const EIGHT_BYTES: u8 = 27;

/// An encoded item head: the initial byte plus up to eight argument bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Head {
    bytes: [u8; 9],
    len: usize,
}

impl Head {
    fn new(initial: u8, arg: &[u8]) -> Self {
        let mut bytes = [0u8; 9];
        bytes[0] = initial;
        bytes[1..=arg.len()].copy_from_slice(arg);
        Head {
            bytes,
            len: 1 + arg.len(),
        }
    }
}

impl Deref for Head {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl std::fmt::Debug for Head {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Head(")?;
        for b in self.iter() {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

/// Shortest head for `major` carrying `value`.
///
/// Values below 24 are packed into the initial byte; larger ones use the
/// smallest of 1, 2, 4 or 8 following bytes that can hold them.
pub fn type_head(major: u8, value: u64) -> Head {
    let major = major << 5;
    if value < 24 {
        Head::new(major | value as u8, &[])
    } else if let Ok(v) = u8::try_from(value) {
        Head::new(major | ONE_BYTE, &[v])
    } else if let Ok(v) = u16::try_from(value) {
        Head::new(major | TWO_BYTES, &v.to_be_bytes())
    } else if let Ok(v) = u32::try_from(value) {
        Head::new(major | FOUR_BYTES, &v.to_be_bytes())
    } else {
        Head::new(major | EIGHT_BYTES, &value.to_be_bytes())
    }
}

/// Native (major type 0 or 1) encoding of `n`, or `None` when `n` lies
/// outside `[-2^64, 2^64 - 1]` and needs a bignum.
pub fn int_head(n: i128) -> Option<Head> {
    if n >= 0 {
        u64::try_from(n).ok().map(|v| type_head(MAJOR_UNSIGNED, v))
    } else {
        u64::try_from(-1 - n).ok().map(|v| type_head(MAJOR_NEGATIVE, v))
    }
}

/// Narrowest float encoding that reproduces `value` bit for bit.
///
/// NaN always collapses to the canonical half-precision quiet NaN.
pub fn float_head(value: f64) -> Head {
    let simple = MAJOR_SIMPLE << 5;
    if value.is_nan() {
        return Head::new(simple | TWO_BYTES, &[0x7e, 0x00]);
    }
    let half = f16::from_f64(value);
    if half.to_f64().to_bits() == value.to_bits() {
        return Head::new(simple | TWO_BYTES, &half.to_be_bytes());
    }
    let single = value as f32;
    if f64::from(single).to_bits() == value.to_bits() {
        return Head::new(simple | FOUR_BYTES, &single.to_be_bytes());
    }
    Head::new(simple | EIGHT_BYTES, &value.to_be_bytes())
}

/// How an arbitrary-size integer is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntParts {
    /// Fits major type 0 or 1.
    Native(Head),
    /// Tag 2 or 3 over the minimal big-endian magnitude.
    Bignum(u64, Vec<u8>),
}

/// Splits a big integer into its native head, or its bignum tag and
/// magnitude when it falls outside the native range.
///
/// Negative values carry `-1 - n` as their magnitude (tag 3).
pub fn bignum_parts(n: &BigInt) -> IntParts {
    if let Some(head) = i128::try_from(n).ok().and_then(int_head) {
        return IntParts::Native(head);
    }
    match n.sign() {
        Sign::Minus => {
            let magnitude = n.magnitude() - 1u32;
            IntParts::Bignum(TAG_NEGATIVE_BIGNUM, magnitude.to_bytes_be())
        }
        _ => IntParts::Bignum(TAG_POSITIVE_BIGNUM, n.magnitude().to_bytes_be()),
    }
}
