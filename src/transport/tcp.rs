//! Raw duplex-socket transport.
//!
//! Bytes pass through unmodified; the [`FrameCodec`] length prefix delimits
//! frames within the stream. [`StreamTransport`] is generic over the
//! underlying I/O so tests can drive it with in-memory duplex pipes.

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
};
use tokio_util::codec::Framed;

use super::{ConnectionError, FrameTransport, Listener};
use crate::{codec::FrameCodec, frame::Frame};

/// Frame transport over any ordered byte stream.
pub struct StreamTransport<S> {
    framed: Framed<S, FrameCodec>,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a byte stream with the default codec.
    pub fn new(io: S) -> Self {
        Self {
            framed: Framed::new(io, FrameCodec::default()),
        }
    }

    /// Wrap a byte stream with an explicit codec.
    pub fn with_codec(io: S, codec: FrameCodec) -> Self {
        Self {
            framed: Framed::new(io, codec),
        }
    }
}

#[async_trait]
impl<S> FrameTransport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        self.framed
            .next()
            .await
            .transpose()
            .map_err(ConnectionError::from)
    }

    async fn write_frame(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        self.framed.send(frame).await.map_err(ConnectionError::from)
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        self.framed.close().await.map_err(ConnectionError::from)
    }
}

/// Listener producing [`StreamTransport`]s from accepted TCP sockets.
pub struct TcpTransportListener {
    inner: TcpListener,
}

impl TcpTransportListener {
    /// Bind a TCP listener on `addr`.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] if binding fails.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        Ok(Self {
            inner: TcpListener::bind(addr).await?,
        })
    }
}

#[async_trait]
impl Listener for TcpTransportListener {
    async fn accept(&mut self) -> io::Result<(Box<dyn FrameTransport>, SocketAddr)> {
        let (stream, peer) = self.inner.accept().await?;
        Ok((Box::new(StreamTransport::<TcpStream>::new(stream)), peer))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> { self.inner.local_addr() }
}
