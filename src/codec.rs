//! Length-prefixed frame codec for byte stream transports.
//!
//! [`FrameCodec`] implements `tokio_util`'s [`Decoder`] and [`Encoder`] so a
//! raw socket can be wrapped in [`tokio_util::codec::Framed`]. Each frame
//! body is preceded by a 4-byte big-endian length so frame boundaries
//! survive arbitrary transport chunking. Decoding is resumable: a buffer
//! holding less than one frame yields `Ok(None)` without consuming input.
//!
//! # Error handling
//!
//! Malformed frames are unrecoverable. Once a length or kind field cannot be
//! trusted, neither can any subsequent boundary, so every [`ProtocolError`]
//! tears the connection down rather than resynchronising.

use std::io;

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{Frame, StreamId};

/// Maximum frame body length in bytes (16 MiB).
///
/// A declared length above this is treated as corruption rather than an
/// instruction to allocate.
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// Length prefix size (big-endian u32).
pub const LENGTH_HEADER_SIZE: usize = 4;

/// Protocol violations: malformed frames or frames that are illegal for the
/// connection or stream state they arrived in.
///
/// All variants are fatal to their connection only; sibling connections are
/// unaffected.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame bytes could not be parsed; boundaries are no longer trustworthy.
    #[error("corrupt frame: {reason}")]
    CorruptFrame {
        /// What the decoder stumbled over.
        reason: &'static str,
    },

    /// Unrecognised frame kind code.
    #[error("unknown frame kind {kind:#04x}")]
    UnknownKind { kind: u8 },

    /// Declared body length exceeds [`MAX_FRAME_LENGTH`].
    #[error("frame exceeds max length: {size} > {max}")]
    OversizedFrame { size: usize, max: usize },

    /// A request frame arrived before the connection's SETUP frame.
    #[error("{kind} frame received before SETUP")]
    SetupRequired { kind: &'static str },

    /// A second SETUP frame arrived on an established connection.
    #[error("duplicate SETUP frame")]
    DuplicateSetup,

    /// A request frame reused a stream id that is still active.
    #[error("stream id {id} is already active")]
    StreamReuse { id: StreamId },

    /// A frame kind that is not valid for its stream or direction.
    #[error("unexpected {kind} frame on stream {id}")]
    UnexpectedFrame { kind: &'static str, id: StreamId },
}

impl ProtocolError {
    pub(crate) const fn corrupt(reason: &'static str) -> Self {
        Self::CorruptFrame { reason }
    }
}

/// Codec-layer errors: protocol violations or transport I/O failures.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The peer violated the wire protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The underlying channel failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            CodecError::Protocol(e) => io::Error::new(io::ErrorKind::InvalidData, e),
        }
    }
}

/// Length-prefixed codec turning a byte stream into [`Frame`]s and back.
#[derive(Clone, Debug)]
pub struct FrameCodec {
    max_frame_length: usize,
}

impl FrameCodec {
    /// Construct a codec accepting bodies up to `max_frame_length` bytes.
    #[must_use]
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            max_frame_length: max_frame_length.min(MAX_FRAME_LENGTH),
        }
    }

    /// Maximum body length this codec will accept.
    #[must_use]
    pub fn max_frame_length(&self) -> usize { self.max_frame_length }
}

impl Default for FrameCodec {
    fn default() -> Self { Self::new(MAX_FRAME_LENGTH) }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, CodecError> {
        if src.len() < LENGTH_HEADER_SIZE {
            return Ok(None);
        }
        let mut prefix = &src[..LENGTH_HEADER_SIZE];
        let len = prefix.get_u32() as usize;
        if len > self.max_frame_length {
            return Err(ProtocolError::OversizedFrame {
                size: len,
                max: self.max_frame_length,
            }
            .into());
        }
        if src.len() < LENGTH_HEADER_SIZE + len {
            src.reserve(LENGTH_HEADER_SIZE + len - src.len());
            return Ok(None);
        }
        src.advance(LENGTH_HEADER_SIZE);
        let body = src.split_to(len).freeze();
        Frame::decode_body(body).map(Some).map_err(CodecError::from)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), CodecError> {
        let body_len = frame.encoded_len();
        if body_len > self.max_frame_length {
            return Err(ProtocolError::OversizedFrame {
                size: body_len,
                max: self.max_frame_length,
            }
            .into());
        }
        dst.reserve(LENGTH_HEADER_SIZE + body_len);
        // Body length is bounded by max_frame_length, so the cast holds.
        dst.put_u32(body_len as u32);
        frame.encode_body(dst);
        Ok(())
    }
}
