//! Response body representation.

use std::fmt;

use bytes::Bytes;
use tokio::sync::mpsc;

/// The payload of a [`Response`](super::Response).
///
/// A `Full` body is an in-memory buffer written with `Content-Length`.
/// A `Streaming` body is fed by a channel and written with chunked transfer
/// encoding; it is consumed as it is sent and can't be captured or replayed.
pub enum Body {
    Full(Bytes),
    Streaming(mpsc::Receiver<Bytes>),
}

impl Body {
    /// An empty, fully buffered body.
    pub fn empty() -> Self {
        Self::Full(Bytes::new())
    }

    /// Returns the buffered bytes, or `None` for a streaming body.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Full(bytes) => Some(bytes),
            Self::Streaming(_) => None,
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming(_))
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::Full(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Full(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::Full(Bytes::from(text))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Self::Full(Bytes::from_static(text.as_bytes()))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(bytes) => f.debug_tuple("Full").field(bytes).finish(),
            Self::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}
