//! WebSocket transport.
//!
//! Message boundaries come from the WebSocket layer, so no length prefix is
//! used: each binary message carries exactly one frame body (header included,
//! as on the raw socket). Text messages are a protocol violation; ping/pong
//! are handled by the WebSocket implementation and skipped here. The HTTP
//! upgrade handshake is a provided capability of `tokio-tungstenite`.

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
};
use tokio_tungstenite::{
    WebSocketStream,
    accept_async,
    tungstenite::{Error as WsError, Message},
};

use super::{ConnectionError, FrameTransport, Listener};
use crate::{codec::ProtocolError, frame::Frame};

/// Frame transport over an accepted WebSocket connection.
pub struct WsTransport<S> {
    inner: WebSocketStream<S>,
}

impl<S> WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already-upgraded WebSocket stream.
    pub fn new(inner: WebSocketStream<S>) -> Self { Self { inner } }
}

fn map_ws_error(err: WsError) -> ConnectionError {
    match err {
        WsError::Io(e) => ConnectionError::Transport(e),
        other => ConnectionError::Transport(io::Error::other(other)),
    }
}

#[async_trait]
impl<S> FrameTransport for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        loop {
            let message = match self.inner.next().await {
                None => return Ok(None),
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => return Ok(None),
                Some(Err(e)) => return Err(map_ws_error(e)),
                Some(Ok(message)) => message,
            };
            match message {
                Message::Binary(body) => {
                    return Frame::decode_body(Bytes::from(body))
                        .map(Some)
                        .map_err(ConnectionError::from);
                }
                Message::Close(_) => return Ok(None),
                Message::Text(_) => {
                    return Err(ProtocolError::corrupt("text message on binary channel").into());
                }
                // Ping/pong keepalives carry no frames.
                _ => {}
            }
        }
    }

    async fn write_frame(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        let mut body = BytesMut::with_capacity(frame.encoded_len());
        frame.encode_body(&mut body);
        self.inner
            .send(Message::binary(body.freeze()))
            .await
            .map_err(map_ws_error)
    }

    async fn close(&mut self) -> Result<(), ConnectionError> {
        match self.inner.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(map_ws_error(e)),
        }
    }
}

/// Listener performing the WebSocket upgrade on accepted TCP sockets.
///
/// The upgrade handshake runs on the accept path; with no admission control
/// in this core that keeps the listener simple at the cost of serializing
/// handshakes.
pub struct WsTransportListener {
    inner: TcpListener,
}

impl WsTransportListener {
    /// Bind a TCP listener for WebSocket upgrades on `addr`.
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
impl Listener for WsTransportListener {
    async fn accept(&mut self) -> io::Result<(Box<dyn FrameTransport>, SocketAddr)> {
        let (stream, peer) = self.inner.accept().await?;
        let upgraded = accept_async(stream).await.map_err(io::Error::other)?;
        Ok((
            Box::new(WsTransport::<TcpStream>::new(upgraded)),
            peer,
        ))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> { self.inner.local_addr() }
}
