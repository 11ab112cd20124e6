//! Payload value type exchanged by requests and responses.
//!
//! A [`Payload`] is an immutable pair of data bytes and optional metadata
//! bytes. Clones are cheap reference-counted copies; [`Payload::deep_copy`]
//! produces independently owned storage for frames that must not alias the
//! inbound buffer.

use bytes::Bytes;

/// Immutable unit of data carried by request and response frames.
///
/// `data` may be empty but is never absent; `metadata` is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Payload {
    data: Bytes,
    metadata: Option<Bytes>,
}

impl Payload {
    /// Create a payload from data bytes with no metadata.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            metadata: None,
        }
    }

    /// Create a payload carrying both data and metadata.
    pub fn with_metadata(data: impl Into<Bytes>, metadata: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            metadata: Some(metadata.into()),
        }
    }

    /// An empty payload.
    #[must_use]
    pub fn empty() -> Self { Self::default() }

    /// Data bytes of this payload.
    #[must_use]
    pub fn data(&self) -> &Bytes { &self.data }

    /// Metadata bytes, if any.
    #[must_use]
    pub fn metadata(&self) -> Option<&Bytes> { self.metadata.as_ref() }

    /// Total byte length of data plus metadata.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() + self.metadata.as_ref().map_or(0, Bytes::len)
    }

    /// Returns `true` when both data and metadata are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Copy this payload into independently owned storage.
    ///
    /// Emitted payloads must not share a buffer with the request they were
    /// derived from past the frame-write boundary, so handlers that echo
    /// request bytes return a deep copy rather than a refcounted clone.
    #[must_use]
    pub fn deep_copy(&self) -> Self {
        Self {
            data: Bytes::copy_from_slice(&self.data),
            metadata: self.metadata.as_ref().map(|m| Bytes::copy_from_slice(m)),
        }
    }
}

impl From<&'static str> for Payload {
    fn from(data: &'static str) -> Self { Self::new(data.as_bytes()) }
}
