use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use num_bigint::BigInt;
use tracing::{debug, trace};

use crate::error::{CborError, Result};
use crate::numeric::{IntParts, bignum_parts, float_head, int_head, type_head};
use crate::registry::{EncodeFn, Registry, TypeKey};
use crate::sink::Sink;
use crate::value::{CborObject, Decimal, Map, Set, Value};
use crate::{MAJOR_ARRAY, MAJOR_BYTES, MAJOR_MAP, MAJOR_SIMPLE, MAJOR_TAG, MAJOR_TEXT};

// Simple values with a fixed meaning
const FALSE: u8 = 20;
const TRUE: u8 = 21;
const NULL: u8 = 22;
const UNDEFINED: u8 = 23;

/// Self-encoding capability of an application object.
///
/// Implementations write their own representation through the encoder's
/// `push_*` methods. Returning an error aborts the whole write.
pub trait EncodeCbor {
    fn encode_cbor(&self, encoder: &mut Encoder<'_>) -> Result<()>;
}

/// Encoder configuration.
///
/// ```
/// use cbor_canon::{Encoder, EncoderOptions};
///
/// let mut chunks = Vec::new();
/// let mut encoder = Encoder::new(
///     EncoderOptions::default().stream(|chunk: &[u8]| chunks.push(chunk.to_vec())),
/// );
/// encoder.write(&"hello".into()).unwrap();
/// drop(encoder);
/// assert_eq!(chunks, vec![vec![0x65], b"hello".to_vec()]);
/// ```
pub struct EncoderOptions<'a> {
    /// Sort map keys and set elements and use minimal widths. Defaults to true.
    pub canonical: bool,
    /// Skip map entries whose value is [`Value::Undefined`].
    pub omit_undefined_properties: bool,
    /// Semantic types registered at construction, applied in order.
    pub sem_types: Vec<(TypeKey, EncodeFn)>,
    /// Chunk consumer; when set the encoder streams instead of buffering.
    pub stream: Option<Box<dyn FnMut(&[u8]) + 'a>>,
    /// Shared read-only registry consulted after the encoder's own entries.
    pub base_registry: Option<Arc<Registry>>,
}

impl Default for EncoderOptions<'_> {
    fn default() -> Self {
        EncoderOptions {
            canonical: true,
            omit_undefined_properties: false,
            sem_types: Vec::new(),
            stream: None,
            base_registry: None,
        }
    }
}

impl<'a> EncoderOptions<'a> {
    pub fn canonical(mut self, canonical: bool) -> Self {
        self.canonical = canonical;
        self
    }

    pub fn omit_undefined_properties(mut self, omit: bool) -> Self {
        self.omit_undefined_properties = omit;
        self
    }

    pub fn sem_type<K, F>(mut self, key: K, f: F) -> Self
    where
        K: Into<TypeKey>,
        F: Fn(&mut Encoder<'_>, &dyn CborObject) -> Result<()> + Send + Sync + 'static,
    {
        self.sem_types.push((key.into(), Arc::new(f)));
        self
    }

    pub fn stream<F>(mut self, f: F) -> Self
    where
        F: FnMut(&[u8]) + 'a,
    {
        self.stream = Some(Box::new(f));
        self
    }

    pub fn base_registry(mut self, base: Arc<Registry>) -> Self {
        self.base_registry = Some(base);
        self
    }
}

impl fmt::Debug for EncoderOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderOptions")
            .field("canonical", &self.canonical)
            .field("omit_undefined_properties", &self.omit_undefined_properties)
            .field(
                "sem_types",
                &self.sem_types.iter().map(|(k, _)| k).collect::<Vec<_>>(),
            )
            .field("stream", &self.stream.is_some())
            .field("base_registry", &self.base_registry)
            .finish()
    }
}

/// CBOR encoder.
///
/// Each [`write`](Self::write) dispatches one value: first through the
/// semantic type registry (for application objects), then through the
/// object's own [`EncodeCbor`] capability, and finally through the built-in
/// rules for each [`Value`] variant.
#[derive(Debug)]
pub struct Encoder<'a> {
    sink: Sink<'a>,
    registry: Registry,
    canonical: bool,
    omit_undefined_properties: bool,
}

impl Default for Encoder<'_> {
    fn default() -> Self {
        Encoder::new(EncoderOptions::default())
    }
}

impl<'a> Encoder<'a> {
    pub fn new(options: EncoderOptions<'a>) -> Self {
        let mut registry = match options.base_registry {
            Some(base) => Registry::with_base(base),
            None => Registry::new(),
        };
        for (key, f) in options.sem_types {
            registry.insert(key, f);
        }
        let sink = match options.stream {
            Some(f) => Sink::Stream(f),
            None => Sink::buffer(),
        };
        Encoder {
            sink,
            registry,
            canonical: options.canonical,
            omit_undefined_properties: options.omit_undefined_properties,
        }
    }

    /// Shorthand for a canonical encoder that streams to `f`.
    pub fn streaming<F>(f: F) -> Self
    where
        F: FnMut(&[u8]) + 'a,
    {
        Encoder::new(EncoderOptions::default().stream(f))
    }

    pub fn is_canonical(&self) -> bool {
        self.canonical
    }

    pub fn is_streaming(&self) -> bool {
        self.sink.is_streaming()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registers (or replaces) the encoder for an application type on this
    /// encoder only.
    pub fn add_semantic_type<K, F>(&mut self, key: K, f: F)
    where
        K: Into<TypeKey>,
        F: Fn(&mut Encoder<'_>, &dyn CborObject) -> Result<()> + Send + Sync + 'static,
    {
        self.registry.register(key, f);
    }

    /// Encodes one top-level value.
    ///
    /// On failure nothing from this call remains in a buffering encoder.
    /// Chunks already handed to a stream callback cannot be taken back.
    pub fn write(&mut self, value: &Value) -> Result<&mut Self> {
        let mark = self.sink.mark();
        if let Err(e) = self.push_any(value) {
            debug!(error = %e, "discarding partial output of failed write");
            self.sink.rewind(mark);
            return Err(e);
        }
        Ok(self)
    }

    /// Returns the buffered output. Streaming encoders have none and fail
    /// with [`CborError::NotBuffering`].
    pub fn finalize(self) -> Result<Vec<u8>> {
        self.sink.into_bytes()
    }

    /// Dispatches `value` without the rollback of [`write`](Self::write).
    /// This is what registered functions and self-encoders call to emit
    /// nested values.
    pub fn push_any(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Undefined => self.push_undefined(),
            Value::Null => self.push_null(),
            Value::Bool(b) => self.push_bool(*b),
            Value::Integer(n) => self.push_int(*n),
            Value::BigInt(n) => self.push_bigint(n),
            Value::Decimal(d) => return self.push_decimal(d),
            Value::Float(f) => self.push_float(*f),
            Value::Text(s) => self.push_text(s),
            Value::Bytes(b) => self.push_bytes(b),
            Value::Array(items) => return self.push_array(items),
            Value::Map(map) => return self.push_map(map),
            Value::Set(set) => return self.push_set(set),
            Value::Tag(tag, inner) => {
                self.push_tag(*tag);
                return self.push_any(inner);
            }
            Value::Simple(n) => return self.push_simple(*n),
            Value::Object(object) => return self.push_object(object.as_ref()),
        }
        Ok(())
    }

    fn push_object(&mut self, object: &dyn CborObject) -> Result<()> {
        if let Some(f) = self.registry.resolve(object) {
            trace!(type_key = object.type_key(), "encoding via registered semantic type");
            return f(self, object);
        }
        if let Some(this) = object.as_encode_cbor() {
            trace!(type_key = object.type_key(), "encoding via self-encode");
            return this.encode_cbor(self).map_err(|e| match e {
                CborError::SelfEncode(_) | CborError::SelfEncodeFailed(_) => e,
                other => CborError::SelfEncode(Box::new(other)),
            });
        }
        debug!(type_key = object.type_key(), "no encoder for application type");
        Err(CborError::Unsupported(format!(
            "no encoder for type `{}`",
            object.type_key()
        )))
    }

    /// Emits raw bytes as a single chunk, unchecked.
    pub fn push_raw(&mut self, bytes: &[u8]) {
        self.sink.emit(bytes);
    }

    fn push_head(&mut self, major: u8, value: u64) {
        self.sink.emit(&type_head(major, value));
    }

    pub fn push_undefined(&mut self) {
        self.sink.emit(&[(MAJOR_SIMPLE << 5) | UNDEFINED]);
    }

    pub fn push_null(&mut self) {
        self.sink.emit(&[(MAJOR_SIMPLE << 5) | NULL]);
    }

    pub fn push_bool(&mut self, v: bool) {
        let val = if v { TRUE } else { FALSE };
        self.sink.emit(&[(MAJOR_SIMPLE << 5) | val]);
    }

    pub fn push_uint(&mut self, v: u64) {
        self.push_head(crate::MAJOR_UNSIGNED, v);
    }

    /// Emits an integer of any size, switching to a bignum outside the
    /// native CBOR range.
    pub fn push_int(&mut self, n: i128) {
        match int_head(n) {
            Some(head) => self.sink.emit(&head),
            None => self.push_bigint(&BigInt::from(n)),
        }
    }

    pub fn push_bigint(&mut self, n: &BigInt) {
        match bignum_parts(n) {
            IntParts::Native(head) => self.sink.emit(&head),
            IntParts::Bignum(tag, magnitude) => {
                self.push_tag(tag);
                self.push_bytes(&magnitude);
            }
        }
    }

    /// Emits an integral decimal as an integer. Decimals with a fractional
    /// part have no canonical encoding here and are rejected.
    pub fn push_decimal(&mut self, d: &Decimal) -> Result<()> {
        match d.to_integer() {
            Some(n) => {
                self.push_bigint(&n);
                Ok(())
            }
            None => {
                debug!(decimal = %d, "refusing non-integral decimal");
                Err(CborError::Unsupported(format!(
                    "non-integral decimal {d}"
                )))
            }
        }
    }

    pub fn push_float(&mut self, v: f64) {
        self.sink.emit(&float_head(v));
    }

    pub fn push_text(&mut self, v: &str) {
        self.push_head(MAJOR_TEXT, v.len() as u64);
        self.sink.emit(v.as_bytes());
    }

    pub fn push_bytes(&mut self, v: &[u8]) {
        self.push_head(MAJOR_BYTES, v.len() as u64);
        self.sink.emit(v);
    }

    pub fn push_tag(&mut self, tag: u64) {
        self.push_head(MAJOR_TAG, tag);
    }

    pub fn push_array_header(&mut self, len: usize) {
        self.push_head(MAJOR_ARRAY, len as u64);
    }

    pub fn push_map_header(&mut self, len: usize) {
        self.push_head(MAJOR_MAP, len as u64);
    }

    /// Emits a simple value. 20-23 are the booleans, null and undefined,
    /// and 24-31 are reserved, so both ranges are refused.
    pub fn push_simple(&mut self, n: u8) -> Result<()> {
        match n {
            0..=19 => self.sink.emit(&[(MAJOR_SIMPLE << 5) | n]),
            20..=31 => {
                return Err(CborError::Unsupported(format!(
                    "simple value {n} is reserved"
                )));
            }
            _ => self.sink.emit(&[(MAJOR_SIMPLE << 5) | 24, n]),
        }
        Ok(())
    }

    fn push_array(&mut self, items: &[Value]) -> Result<()> {
        self.push_array_header(items.len());
        items.iter().try_for_each(|item| self.push_any(item))
    }

    fn push_map(&mut self, map: &Map) -> Result<()> {
        let omit = self.omit_undefined_properties;
        let entries: Vec<_> = map
            .iter()
            .filter(|(_, v)| !(omit && v.is_undefined()))
            .collect();

        if !self.canonical {
            self.push_map_header(entries.len());
            for (k, v) in entries {
                self.push_any(k)?;
                self.push_any(v)?;
            }
            return Ok(());
        }

        let mut keyed = Vec::with_capacity(entries.len());
        for (k, v) in entries {
            keyed.push((self.encode_scratch(k)?, v));
        }
        keyed.sort_by(|(a, _), (b, _)| canonical_cmp(a, b));
        if keyed.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(CborError::Unsupported(
                "map keys with identical encodings".to_string(),
            ));
        }

        self.push_map_header(keyed.len());
        for (key, v) in keyed {
            self.sink.emit(&key);
            self.push_any(v)?;
        }
        Ok(())
    }

    fn push_set(&mut self, set: &Set) -> Result<()> {
        if !self.canonical {
            self.push_array_header(set.len());
            return set.iter().try_for_each(|item| self.push_any(item));
        }

        let mut encoded = set
            .iter()
            .map(|item| self.encode_scratch(item))
            .collect::<Result<Vec<_>>>()?;
        encoded.sort_by(|a, b| canonical_cmp(a, b));

        self.push_array_header(encoded.len());
        for item in encoded {
            self.sink.emit(&item);
        }
        Ok(())
    }

    /// Encodes `value` with this encoder's registry and options into a
    /// private buffer, leaving the real sink untouched.
    fn encode_scratch(&mut self, value: &Value) -> Result<Vec<u8>> {
        let saved = std::mem::replace(&mut self.sink, Sink::buffer());
        let result = self.push_any(value);
        let scratch = std::mem::replace(&mut self.sink, saved);
        result?;
        scratch.into_bytes()
    }
}

/// Canonical key order: shorter encodings first, then bytewise.
pub fn canonical_cmp(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
