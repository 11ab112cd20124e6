//! Transport abstraction over byte-stream and message-framed channels.
//!
//! A [`Listener`] accepts connections and hands each one over as a boxed
//! [`FrameTransport`]: a bidirectional, ordered channel of whole [`Frame`]s.
//! Two variants exist behind the same seam — raw TCP ([`tcp`]), where the
//! codec's length prefix delimits frames in the byte stream, and WebSocket
//! ([`ws`]), where each binary message carries exactly one frame body.
//!
//! Selecting the wrong variant for a given client is a configuration error,
//! not a runtime one.

pub mod tcp;
pub mod ws;

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    codec::{CodecError, ProtocolError},
    config::TransportKind,
    frame::Frame,
};

pub use tcp::{StreamTransport, TcpTransportListener};
pub use ws::{WsTransport, WsTransportListener};

/// Connection-scoped failure: the underlying channel broke or the peer
/// violated the protocol. Either way the connection is closed and all of its
/// streams are cancelled; sibling connections are unaffected.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Underlying channel failure. No retry at this layer.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// Peer violated the wire protocol.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl From<CodecError> for ConnectionError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => Self::Transport(e),
            CodecError::Protocol(e) => Self::Protocol(e),
        }
    }
}

/// Bidirectional ordered channel of whole frames.
///
/// Implementations deliver frames intact: a read never yields part of a
/// frame and a write either queues the whole frame or fails.
#[async_trait]
pub trait FrameTransport: Send {
    /// Read the next frame, or `None` when the peer closed the connection.
    async fn read_frame(&mut self) -> Result<Option<Frame>, ConnectionError>;

    /// Write one whole frame.
    async fn write_frame(&mut self, frame: Frame) -> Result<(), ConnectionError>;

    /// Flush pending writes and close the channel.
    async fn close(&mut self) -> Result<(), ConnectionError>;
}

/// Accepts inbound connections for one transport variant.
#[async_trait]
pub trait Listener: Send {
    /// Wait for the next connection.
    async fn accept(&mut self) -> io::Result<(Box<dyn FrameTransport>, SocketAddr)>;

    /// Address this listener is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// Bind a listener for the selected transport variant.
///
/// # Errors
///
/// Returns an [`io::Error`] if the socket cannot be bound.
pub async fn bind(kind: TransportKind, addr: SocketAddr) -> io::Result<Box<dyn Listener>> {
    Ok(match kind {
        TransportKind::Tcp => Box::new(TcpTransportListener::bind(addr).await?),
        TransportKind::Ws => Box::new(WsTransportListener::bind(addr).await?),
    })
}
