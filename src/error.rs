use std::fmt;

/// Errors raised while encoding or decoding CBOR.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CborError {
    /// The dispatcher found no rule for the value.
    #[error("unsupported value: {0}")]
    Unsupported(String),

    /// An object's own encoder returned an error.
    #[error("self-encode failed: {0}")]
    SelfEncode(#[source] Box<CborError>),

    /// An object's own encoder reported failure without a nested cause.
    #[error("self-encode failed: {0}")]
    SelfEncodeFailed(String),

    /// The input is truncated or structurally invalid.
    #[error("malformed CBOR at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: &'static str },

    /// A single item was expected but more bytes follow it.
    #[error("trailing data after CBOR item at offset {0}")]
    TrailingData(usize),

    /// Nesting exceeded the decoder's depth limit.
    #[error("nesting depth limit exceeded")]
    DepthLimit,

    /// `finalize` was called on a streaming encoder.
    #[error("encoder is streaming and has no buffered output")]
    NotBuffering,

    /// Custom message raised through serde.
    #[error("serde error: {0}")]
    Serde(String),
}

impl CborError {
    pub(crate) fn malformed(offset: usize, reason: &'static str) -> Self {
        CborError::Malformed { offset, reason }
    }

    /// Convenience for [`EncodeCbor`](crate::EncodeCbor) implementations
    /// that need to signal failure.
    pub fn self_encode_failed<T: fmt::Display>(msg: T) -> Self {
        CborError::SelfEncodeFailed(msg.to_string())
    }
}

impl serde::ser::Error for CborError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        CborError::Serde(msg.to_string())
    }
}

impl serde::de::Error for CborError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        CborError::Serde(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CborError>;
