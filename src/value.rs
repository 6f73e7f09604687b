use std::any::Any;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use num_bigint::BigInt;
use num_traits::Zero;

use crate::encode::EncodeCbor;

/// Insertion-ordered, key-unique CBOR map.
pub type Map = IndexMap<Value, Value>;

/// Insertion-ordered CBOR set, encoded as an array.
pub type Set = IndexSet<Value>;

/// Dynamic CBOR value type
///
/// This is the input to the encoder and the output of the decoder. It can
/// represent any CBOR item plus a few things only the encoder understands:
/// arbitrary-precision decimals, sets and application-defined objects.
///
/// # Example
/// ```
/// use cbor_canon::{Map, Value, decode_all, encode};
///
/// let mut map = Map::new();
/// map.insert(Value::from("name"), Value::from("Alice"));
/// map.insert(Value::from("age"), Value::from(30));
/// let value = Value::Map(map);
///
/// let bytes = encode(&value).unwrap();
/// let decoded = decode_all(&bytes).unwrap();
/// assert_eq!(decoded, vec![value]);
/// ```
#[derive(Clone)]
pub enum Value {
    /// The absent value, CBOR `undefined`
    Undefined,
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value; anything outside the native CBOR range is encoded as a bignum
    Integer(i128),
    /// Arbitrary-precision integer
    BigInt(BigInt),
    /// Arbitrary-precision decimal
    Decimal(Decimal),
    /// Floating point value
    Float(f64),
    /// Byte string
    Bytes(Vec<u8>),
    /// Text string
    Text(String),
    /// Array of values
    Array(Vec<Value>),
    /// Map of values, in insertion order
    Map(Map),
    /// Set of values, encoded as an array
    Set(Set),
    /// Tagged value (tag number, boxed content)
    Tag(u64, Box<Value>),
    /// Simple value other than the booleans, null and undefined
    Simple(u8),
    /// Application-defined object
    Object(Arc<dyn CborObject>),
}

/// Arbitrary-precision decimal `mantissa * 10^exponent`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal {
    pub mantissa: BigInt,
    pub exponent: i64,
}

impl Decimal {
    pub fn new(mantissa: impl Into<BigInt>, exponent: i64) -> Self {
        Decimal {
            mantissa: mantissa.into(),
            exponent,
        }
    }

    /// The exact integer this decimal denotes, or `None` if it has a
    /// fractional part.
    pub fn to_integer(&self) -> Option<BigInt> {
        let ten = BigInt::from(10u32);
        if self.exponent >= 0 {
            let exp = u32::try_from(self.exponent).ok()?;
            return Some(&self.mantissa * ten.pow(exp));
        }
        if self.mantissa.is_zero() {
            return Some(BigInt::zero());
        }
        // a non-zero mantissa below 10^shift cannot be a multiple of it
        let shift = self.exponent.unsigned_abs();
        let digits = self.mantissa.magnitude().to_str_radix(10).len() as u64;
        if shift >= digits {
            return None;
        }
        let divisor = ten.pow(u32::try_from(shift).ok()?);
        (&self.mantissa % &divisor)
            .is_zero()
            .then(|| &self.mantissa / &divisor)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}e{}", self.mantissa, self.exponent)
    }
}

/// Object-safe access to [`Any`], implemented for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An application-defined type that can be placed in a [`Value`].
///
/// The encoder first looks the object's type identity up in its semantic
/// type registry, walking [`type_key`](Self::type_key) and then
/// [`supertypes`](Self::supertypes) from most to least specific. If nothing
/// is registered it falls back to the object's own [`EncodeCbor`]
/// implementation, if it exposes one.
pub trait CborObject: AsAny + fmt::Debug + Send + Sync {
    /// Stable identifier of the concrete type.
    fn type_key(&self) -> &str;

    /// Identifiers of the types this one specializes, nearest first.
    fn supertypes(&self) -> &[&str] {
        &[]
    }

    /// Returns the object's self-encoding capability, if it has one.
    fn as_encode_cbor(&self) -> Option<&dyn EncodeCbor> {
        None
    }
}

impl dyn CborObject {
    pub fn downcast_ref<T: CborObject>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl Value {
    /// Wraps an application object.
    pub fn object<T: CborObject>(object: T) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Builds a tagged value.
    pub fn tag(tag: u64, value: impl Into<Value>) -> Self {
        Value::Tag(tag, Box::new(value.into()))
    }

    /// Builds a map from key/value pairs; a repeated key keeps its first
    /// position and takes the last value.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns true if the value is undefined
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns true if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if the value is a boolean
    pub fn is_bool(&self) -> bool {
        matches!(self, Value::Bool(_))
    }

    /// Returns true if the value is an integer of any precision
    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::BigInt(_))
    }

    /// Returns true if the value is a float
    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    /// Returns true if the value is bytes
    pub fn is_bytes(&self) -> bool {
        matches!(self, Value::Bytes(_))
    }

    /// Returns true if the value is text
    pub fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    /// Returns true if the value is an array
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Returns true if the value is a map
    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    /// Returns true if the value is tagged
    pub fn is_tag(&self) -> bool {
        matches!(self, Value::Tag(_, _))
    }

    /// Returns the value as a boolean, if it is one
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as an `i128`, if it is an integer that fits
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::BigInt(b) => i128::try_from(b).ok(),
            _ => None,
        }
    }

    /// Returns the value as an `i64`, if it is an integer that fits
    pub fn as_i64(&self) -> Option<i64> {
        self.as_i128().and_then(|i| i64::try_from(i).ok())
    }

    /// Returns the value as a big integer, if it is an integer
    pub fn as_bigint(&self) -> Option<BigInt> {
        match self {
            Value::Integer(i) => Some(BigInt::from(*i)),
            Value::BigInt(b) => Some(b.clone()),
            _ => None,
        }
    }

    /// Returns the value as a float, if it is one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the value as bytes, if it is a byte string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the value as text, if it is a text string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an array, if it is one
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the value as a map, if it is one
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the tag number and inner value, if this is a tagged value
    pub fn as_tag(&self) -> Option<(u64, &Value)> {
        match self {
            Value::Tag(tag, value) => Some((*tag, value)),
            _ => None,
        }
    }

    /// Returns the application object, if this is one
    pub fn as_object(&self) -> Option<&dyn CborObject> {
        match self {
            Value::Object(o) => Some(o.as_ref()),
            _ => None,
        }
    }
}

// Floats compare by bit pattern and objects by identity so that Value can
// be a map key.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Tag(ta, a), Value::Tag(tb, b)) => ta == tb && a == b,
            (Value::Simple(a), Value::Simple(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

// Map and set equality ignores order, so their hashes must too.
fn unordered_hash<T: Hash>(items: impl Iterator<Item = T>) -> u64 {
    items
        .map(|item| {
            let mut h = DefaultHasher::new();
            item.hash(&mut h);
            h.finish()
        })
        .fold(0u64, u64::wrapping_add)
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Undefined | Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::BigInt(b) => b.hash(state),
            Value::Decimal(d) => d.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Text(s) => s.hash(state),
            Value::Array(a) => a.hash(state),
            Value::Map(m) => {
                m.len().hash(state);
                unordered_hash(m.iter()).hash(state);
            }
            Value::Set(s) => {
                s.len().hash(state);
                unordered_hash(s.iter()).hash(state);
            }
            Value::Tag(t, v) => {
                t.hash(state);
                v.hash(state);
            }
            Value::Simple(n) => n.hash(state),
            Value::Object(o) => (Arc::as_ptr(o) as *const () as usize).hash(state),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Integer(i) => f.debug_tuple("Integer").field(i).finish(),
            Value::BigInt(b) => f.debug_tuple("BigInt").field(b).finish(),
            Value::Decimal(d) => f.debug_tuple("Decimal").field(d).finish(),
            Value::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Value::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            Value::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Value::Array(a) => f.debug_tuple("Array").field(a).finish(),
            Value::Map(m) => f.debug_tuple("Map").field(m).finish(),
            Value::Set(s) => f.debug_tuple("Set").field(s).finish(),
            Value::Tag(t, v) => f.debug_tuple("Tag").field(t).field(v).finish(),
            Value::Simple(n) => f.debug_tuple("Simple").field(n).finish(),
            Value::Object(o) => f.debug_tuple("Object").field(o).finish(),
        }
    }
}

fn write_text(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

fn write_joined<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = T>,
) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Renders CBOR diagnostic notation (RFC 8949 §8).
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::BigInt(b) => write!(f, "{b}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Float(x) if x.is_nan() => f.write_str("NaN"),
            Value::Float(x) if x.is_infinite() => {
                f.write_str(if *x > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Bytes(b) => {
                f.write_str("h'")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                f.write_str("'")
            }
            Value::Text(s) => write_text(f, s),
            Value::Array(a) => {
                f.write_str("[")?;
                write_joined(f, a.iter())?;
                f.write_str("]")
            }
            Value::Set(s) => {
                f.write_str("[")?;
                write_joined(f, s.iter())?;
                f.write_str("]")
            }
            Value::Map(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Value::Tag(t, v) => write!(f, "{t}({v})"),
            Value::Simple(n) => write!(f, "simple({n})"),
            Value::Object(o) => write!(f, "<{}>", o.type_key()),
        }
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Integer(i128::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, i128, u8, u16, u32, u64);

impl From<u128> for Value {
    fn from(v: u128) -> Self {
        match i128::try_from(v) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::BigInt(BigInt::from(v)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Value::Map(v)
    }
}

impl From<Set> for Value {
    fn from(v: Set) -> Self {
        Value::Set(v)
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Value::BigInt(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
