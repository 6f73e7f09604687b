use std::fmt;

use crate::error::{CborError, Result};

/// Destination for encoded chunks.
///
/// A buffering sink accumulates every chunk in memory; a streaming sink hands
/// each chunk to a callback as soon as it is produced, in emission order.
pub enum Sink<'a> {
    Buffer(Vec<u8>),
    Stream(Box<dyn FnMut(&[u8]) + 'a>),
}

impl<'a> Sink<'a> {
    pub fn buffer() -> Self {
        Sink::Buffer(Vec::new())
    }

    pub fn stream<F>(f: F) -> Self
    where
        F: FnMut(&[u8]) + 'a,
    {
        Sink::Stream(Box::new(f))
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Sink::Stream(_))
    }

    pub(crate) fn emit(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        match self {
            Sink::Buffer(buf) => buf.extend_from_slice(chunk),
            Sink::Stream(f) => f(chunk),
        }
    }

    /// Current buffered length, used to undo a failed write. Streaming sinks
    /// cannot be rewound.
    pub(crate) fn mark(&self) -> Option<usize> {
        match self {
            Sink::Buffer(buf) => Some(buf.len()),
            Sink::Stream(_) => None,
        }
    }

    pub(crate) fn rewind(&mut self, mark: Option<usize>) {
        if let (Sink::Buffer(buf), Some(len)) = (self, mark) {
            buf.truncate(len);
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Sink::Buffer(buf) => Ok(buf),
            Sink::Stream(_) => Err(CborError::NotBuffering),
        }
    }
}

impl fmt::Debug for Sink<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sink::Buffer(buf) => f.debug_tuple("Buffer").field(&buf.len()).finish(),
            Sink::Stream(_) => f.write_str("Stream"),
        }
    }
}
