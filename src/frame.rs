//! Protocol frames and their wire representation.
//!
//! A [`Frame`] pairs a [`StreamId`] with a [`FrameBody`] describing one of
//! the protocol's frame kinds. [`Frame::encode_body`] and
//! [`Frame::decode_body`] convert between frames and the header + payload
//! byte layout shared by both transports; the length prefix used on byte
//! stream transports is added separately by [`FrameCodec`].
//!
//! [`FrameCodec`]: crate::codec::FrameCodec

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{codec::ProtocolError, payload::Payload};

/// Identifier of one logical stream multiplexed over a connection.
///
/// Id `0` is reserved for connection-level frames (SETUP). Request streams
/// use non-zero ids unique for the connection's lifetime. The top bit is
/// reserved and must be zero on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u32);

impl StreamId {
    /// The connection-level stream carrying SETUP frames.
    pub const CONNECTION: StreamId = StreamId(0);

    /// Highest encodable id; the top bit is reserved.
    pub const MAX: StreamId = StreamId(0x7FFF_FFFF);

    /// Create a [`StreamId`] with the provided value.
    #[must_use]
    pub const fn new(id: u32) -> Self { Self(id) }

    /// Return the inner `u32` representation.
    #[must_use]
    pub const fn as_u32(self) -> u32 { self.0 }

    /// Returns `true` for the reserved connection-level id.
    #[must_use]
    pub const fn is_connection(self) -> bool { self.0 == 0 }
}

impl From<u32> for StreamId {
    fn from(value: u32) -> Self { Self(value) }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error code carried by ERROR frames.
///
/// Values mirror the reactive-socket error registry so peers built against
/// that protocol interpret them correctly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorCode(u32);

impl ErrorCode {
    /// Connection-level failure.
    pub const CONNECTION_ERROR: ErrorCode = ErrorCode(0x0101);
    /// Handler raised an application failure for one stream.
    pub const APPLICATION_ERROR: ErrorCode = ErrorCode(0x0201);
    /// Request was rejected before execution.
    pub const REJECTED: ErrorCode = ErrorCode(0x0202);
    /// Stream was cancelled by the responder.
    pub const CANCELED: ErrorCode = ErrorCode(0x0203);
    /// Request was malformed.
    pub const INVALID: ErrorCode = ErrorCode(0x0204);

    /// Create an [`ErrorCode`] from its wire value.
    #[must_use]
    pub const fn new(code: u32) -> Self { Self(code) }

    /// Return the wire value.
    #[must_use]
    pub const fn as_u32(self) -> u32 { self.0 }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

// Wire kind codes.
const KIND_SETUP: u8 = 0x01;
const KIND_REQUEST_RESPONSE: u8 = 0x04;
const KIND_REQUEST_STREAM: u8 = 0x06;
const KIND_REQUEST_N: u8 = 0x08;
const KIND_CANCEL: u8 = 0x09;
const KIND_PAYLOAD: u8 = 0x0A;
const KIND_ERROR: u8 = 0x0B;
const KIND_COMPLETE: u8 = 0x0C;

/// Flag bit set when a metadata section precedes the data bytes.
const FLAG_METADATA: u8 = 0x01;

/// Fixed header: stream id (4) + kind (1) + flags (1).
const HEADER_LEN: usize = 6;

/// Body of a protocol frame, tagged by kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameBody {
    /// Connection establishment; must precede any request frame.
    Setup {
        /// Negotiation payload. Not interpreted beyond acknowledgement.
        payload: Payload,
    },
    /// Initiate a request expecting exactly one response.
    RequestResponse { payload: Payload },
    /// Initiate a request expecting a flow-controlled response stream.
    RequestStream {
        /// Initial Requested-N authorization; always positive.
        initial_n: u32,
        payload: Payload,
    },
    /// Grant `n` further emissions on an active stream.
    RequestN { n: u32 },
    /// Stop an active stream; no further payloads will be delivered.
    Cancel,
    /// One response item.
    Payload { payload: Payload },
    /// Terminal failure of a stream.
    Error { code: ErrorCode, message: String },
    /// Successful end of a stream.
    Complete,
}

impl FrameBody {
    /// Human-readable kind name for logging and errors.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Setup { .. } => "SETUP",
            Self::RequestResponse { .. } => "REQUEST_RESPONSE",
            Self::RequestStream { .. } => "REQUEST_STREAM",
            Self::RequestN { .. } => "REQUEST_N",
            Self::Cancel => "CANCEL",
            Self::Payload { .. } => "PAYLOAD",
            Self::Error { .. } => "ERROR",
            Self::Complete => "COMPLETE",
        }
    }

    const fn kind_byte(&self) -> u8 {
        match self {
            Self::Setup { .. } => KIND_SETUP,
            Self::RequestResponse { .. } => KIND_REQUEST_RESPONSE,
            Self::RequestStream { .. } => KIND_REQUEST_STREAM,
            Self::RequestN { .. } => KIND_REQUEST_N,
            Self::Cancel => KIND_CANCEL,
            Self::Payload { .. } => KIND_PAYLOAD,
            Self::Error { .. } => KIND_ERROR,
            Self::Complete => KIND_COMPLETE,
        }
    }

    fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Setup { payload }
            | Self::RequestResponse { payload }
            | Self::RequestStream { payload, .. }
            | Self::Payload { payload } => Some(payload),
            _ => None,
        }
    }
}

/// One protocol frame: a stream id plus a kind-tagged body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Stream this frame belongs to; `0` for connection-level frames.
    pub stream_id: StreamId,
    /// Kind-tagged contents.
    pub body: FrameBody,
}

impl Frame {
    /// Construct a frame for `stream_id` with the given body.
    #[must_use]
    pub fn new(stream_id: StreamId, body: FrameBody) -> Self { Self { stream_id, body } }

    /// The SETUP frame opening a connection.
    #[must_use]
    pub fn setup(payload: Payload) -> Self {
        Self::new(StreamId::CONNECTION, FrameBody::Setup { payload })
    }

    /// Byte length of the encoded body.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        let mut len = HEADER_LEN;
        len += match &self.body {
            FrameBody::RequestStream { .. } | FrameBody::RequestN { .. } => 4,
            FrameBody::Error { message, .. } => 4 + message.len(),
            _ => 0,
        };
        if let Some(payload) = self.body.payload() {
            if let Some(metadata) = payload.metadata() {
                len += 4 + metadata.len();
            }
            len += payload.data().len();
        }
        len
    }

    /// Append the encoded body (header + payload section) to `dst`.
    ///
    /// The length prefix used on byte stream transports is not included;
    /// message-framed transports send the body as-is.
    pub fn encode_body(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        dst.put_u32(self.stream_id.as_u32());
        dst.put_u8(self.body.kind_byte());

        let metadata_flag = self.body.payload().is_some_and(|p| p.metadata().is_some());
        dst.put_u8(if metadata_flag { FLAG_METADATA } else { 0 });

        match &self.body {
            FrameBody::RequestStream { initial_n, .. } => dst.put_u32(*initial_n),
            FrameBody::RequestN { n } => dst.put_u32(*n),
            FrameBody::Error { code, message } => {
                dst.put_u32(code.as_u32());
                dst.put_slice(message.as_bytes());
            }
            _ => {}
        }

        if let Some(payload) = self.body.payload() {
            if let Some(metadata) = payload.metadata() {
                // Encoded metadata is bounded by the codec's frame length
                // check; u32 always fits.
                dst.put_u32(metadata.len() as u32);
                dst.put_slice(metadata);
            }
            dst.put_slice(payload.data());
        }
    }

    /// Decode a frame from one complete body.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::CorruptFrame`] when the header is short, a
    /// length field disagrees with the body, or a kind carries bytes it must
    /// not, and [`ProtocolError::UnknownKind`] for unrecognised kind codes.
    pub fn decode_body(mut src: Bytes) -> Result<Frame, ProtocolError> {
        if src.len() < HEADER_LEN {
            return Err(ProtocolError::corrupt("frame shorter than fixed header"));
        }
        let raw_id = src.get_u32();
        if raw_id > StreamId::MAX.as_u32() {
            return Err(ProtocolError::corrupt("reserved stream id bit set"));
        }
        let stream_id = StreamId::new(raw_id);
        let kind = src.get_u8();
        let flags = src.get_u8();
        if flags & !FLAG_METADATA != 0 {
            return Err(ProtocolError::corrupt("unknown flag bits set"));
        }
        let has_metadata = flags & FLAG_METADATA != 0;

        let body = match kind {
            KIND_SETUP => FrameBody::Setup {
                payload: decode_payload(&mut src, has_metadata)?,
            },
            KIND_REQUEST_RESPONSE => FrameBody::RequestResponse {
                payload: decode_payload(&mut src, has_metadata)?,
            },
            KIND_REQUEST_STREAM => {
                let initial_n = decode_request_n(&mut src)?;
                FrameBody::RequestStream {
                    initial_n,
                    payload: decode_payload(&mut src, has_metadata)?,
                }
            }
            KIND_REQUEST_N => {
                let n = decode_request_n(&mut src)?;
                expect_empty(&src)?;
                FrameBody::RequestN { n }
            }
            KIND_CANCEL => {
                expect_empty(&src)?;
                FrameBody::Cancel
            }
            KIND_PAYLOAD => FrameBody::Payload {
                payload: decode_payload(&mut src, has_metadata)?,
            },
            KIND_ERROR => {
                if src.len() < 4 {
                    return Err(ProtocolError::corrupt("ERROR frame missing code"));
                }
                let code = ErrorCode::new(src.get_u32());
                let message = String::from_utf8(src.to_vec())
                    .map_err(|_| ProtocolError::corrupt("ERROR message is not UTF-8"))?;
                FrameBody::Error { code, message }
            }
            KIND_COMPLETE => {
                expect_empty(&src)?;
                FrameBody::Complete
            }
            _ => return Err(ProtocolError::UnknownKind { kind }),
        };

        Ok(Frame { stream_id, body })
    }
}

fn decode_request_n(src: &mut Bytes) -> Result<u32, ProtocolError> {
    if src.len() < 4 {
        return Err(ProtocolError::corrupt("missing requestN field"));
    }
    let n = src.get_u32();
    if n == 0 {
        return Err(ProtocolError::corrupt("requestN must be positive"));
    }
    Ok(n)
}

fn decode_payload(src: &mut Bytes, has_metadata: bool) -> Result<Payload, ProtocolError> {
    let metadata = if has_metadata {
        if src.len() < 4 {
            return Err(ProtocolError::corrupt("missing metadata length"));
        }
        let len = src.get_u32() as usize;
        if src.len() < len {
            return Err(ProtocolError::corrupt("metadata length exceeds body"));
        }
        Some(src.split_to(len))
    } else {
        None
    };
    let data = src.split_off(0);
    Ok(match metadata {
        Some(metadata) => Payload::with_metadata(data, metadata),
        None => Payload::new(data),
    })
}

fn expect_empty(src: &Bytes) -> Result<(), ProtocolError> {
    if src.is_empty() {
        Ok(())
    } else {
        Err(ProtocolError::corrupt("trailing bytes after frame body"))
    }
}
