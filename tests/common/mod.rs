//! Shared helpers for end-to-end tests: a loopback server on an ephemeral
//! port plus a frame-level TCP client.

#![allow(dead_code)]

use std::{net::SocketAddr, time::Duration};

use fluxwire::{
    Frame,
    FrameBody,
    FrameTransport,
    Payload,
    Server,
    ServerConfig,
    StreamId,
    StreamTransport,
    TransportKind,
};
use tokio::{net::TcpStream, sync::oneshot, task::JoinHandle, time::timeout};

/// Echo server running on a loopback ephemeral port.
pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// Signal shutdown and wait for the server to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        timeout(Duration::from_secs(5), self.task)
            .await
            .expect("server shuts down")
            .expect("server task join")
            .expect("server run");
    }
}

/// Start an echo server for `kind` on `127.0.0.1:0`.
pub async fn spawn_server(kind: TransportKind) -> ServerHandle {
    let config = ServerConfig {
        port: 0,
        ..ServerConfig::new(kind)
    };
    let bound = Server::new(config).bind().await.expect("bind listener");
    let addr = bound.local_addr().expect("listener addr");
    let (shutdown, rx) = oneshot::channel::<()>();
    let task = tokio::spawn(bound.run_with_shutdown(async {
        let _ = rx.await;
    }));
    ServerHandle {
        addr,
        shutdown,
        task,
    }
}

/// Frame-level client over a raw TCP connection.
pub struct TcpClient {
    transport: StreamTransport<TcpStream>,
}

impl TcpClient {
    /// Connect and send the opening SETUP frame.
    pub async fn connect(addr: SocketAddr) -> Self {
        let mut client = Self::connect_without_setup(addr).await;
        client.send(Frame::setup(Payload::empty())).await;
        client
    }

    /// Connect without performing SETUP (for protocol violation tests).
    pub async fn connect_without_setup(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        Self {
            transport: StreamTransport::new(stream),
        }
    }

    pub async fn send(&mut self, frame: Frame) {
        self.transport.write_frame(frame).await.expect("write frame");
    }

    pub async fn request_response(&mut self, id: u32, data: &'static str) {
        self.send(Frame::new(
            StreamId::new(id),
            FrameBody::RequestResponse {
                payload: Payload::from(data),
            },
        ))
        .await;
    }

    pub async fn request_stream(&mut self, id: u32, n: u32, data: &'static str) {
        self.send(Frame::new(
            StreamId::new(id),
            FrameBody::RequestStream {
                initial_n: n,
                payload: Payload::from(data),
            },
        ))
        .await;
    }

    pub async fn request_n(&mut self, id: u32, n: u32) {
        self.send(Frame::new(StreamId::new(id), FrameBody::RequestN { n }))
            .await;
    }

    pub async fn cancel(&mut self, id: u32) {
        self.send(Frame::new(StreamId::new(id), FrameBody::Cancel)).await;
    }

    /// Read the next frame within one second.
    pub async fn recv(&mut self) -> Frame {
        timeout(Duration::from_secs(1), self.transport.read_frame())
            .await
            .expect("frame within deadline")
            .expect("transport healthy")
            .expect("connection open")
    }

    /// Read the next frame and assert it is a PAYLOAD for `id` carrying
    /// `data`.
    pub async fn expect_payload(&mut self, id: u32, data: &'static str) {
        let frame = self.recv().await;
        assert_eq!(frame.stream_id, StreamId::new(id));
        let FrameBody::Payload { payload } = frame.body else {
            panic!("expected PAYLOAD, got {}", frame.body.kind_name());
        };
        assert_eq!(payload.data().as_ref(), data.as_bytes());
    }

    /// Read the next frame and assert it is COMPLETE for `id`.
    pub async fn expect_complete(&mut self, id: u32) {
        let frame = self.recv().await;
        assert_eq!(frame.stream_id, StreamId::new(id));
        assert!(
            matches!(frame.body, FrameBody::Complete),
            "expected COMPLETE, got {}",
            frame.body.kind_name()
        );
    }

    /// Assert that nothing arrives for `quiet`.
    pub async fn expect_silence(&mut self, quiet: Duration) {
        assert!(
            timeout(quiet, self.transport.read_frame()).await.is_err(),
            "expected no frames"
        );
    }

    /// Assert the server closed the connection.
    pub async fn expect_closed(&mut self) {
        let next = timeout(Duration::from_secs(1), self.transport.read_frame())
            .await
            .expect("close within deadline");
        assert!(
            matches!(next, Ok(None) | Err(_)),
            "expected connection close"
        );
    }
}
