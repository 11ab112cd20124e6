//! Connection multiplexer.
//!
//! One [`ConnectionActor`] owns one physical connection. It runs a single
//! `select!` loop over inbound frames and the serialized outbound queue:
//! inbound frames are dispatched to per-stream executor tasks without
//! blocking the read path, and outbound frames from concurrently running
//! executors are written one whole frame at a time, preserving each stream's
//! emission order and never interleaving partial frames.

mod dispatch;

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, trace};

use crate::{
    codec::ProtocolError,
    flow::RequestWindow,
    frame::{ErrorCode, Frame, FrameBody, StreamId},
    handler::Handlers,
    transport::{ConnectionError, FrameTransport},
};

/// Depth of the per-connection outbound frame queue shared by all executors.
const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// Bookkeeping for one active stream, owned by its connection's actor.
struct StreamHandle {
    cancel: CancellationToken,
    window: Option<Arc<RequestWindow>>,
}

impl StreamHandle {
    /// Stop the stream's producer: cancel its token and close its window.
    fn terminate(&self) {
        self.cancel.cancel();
        if let Some(window) = &self.window {
            window.close();
        }
    }
}

enum Event {
    Inbound(Result<Option<Frame>, ConnectionError>),
    Outbound(Frame),
    Shutdown,
}

/// Actor multiplexing logical streams over one connection.
pub struct ConnectionActor {
    transport: Box<dyn FrameTransport>,
    handlers: Handlers,
    streams: HashMap<StreamId, StreamHandle>,
    outbound_tx: mpsc::Sender<Frame>,
    outbound_rx: mpsc::Receiver<Frame>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
    setup_received: bool,
    peer: Option<SocketAddr>,
}

impl ConnectionActor {
    /// Create an actor for one accepted connection.
    ///
    /// `shutdown` is the connection-level token; per-stream tokens are its
    /// children, so cancelling it stops every executor.
    #[must_use]
    pub fn new(
        transport: Box<dyn FrameTransport>,
        handlers: Handlers,
        shutdown: CancellationToken,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        Self {
            transport,
            handlers,
            streams: HashMap::new(),
            outbound_tx,
            outbound_rx,
            shutdown,
            tasks: TaskTracker::new(),
            setup_received: false,
            peer: None,
        }
    }

    /// Record the peer address for log context.
    #[must_use]
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Drive the connection until the peer disconnects, a connection-scoped
    /// error occurs, or shutdown is requested.
    ///
    /// Teardown always runs: every active stream is cancelled and executor
    /// tasks are awaited before the transport is closed. There is no
    /// draining grace period.
    ///
    /// # Errors
    ///
    /// Returns the [`ConnectionError`] that ended the connection. A clean
    /// peer disconnect and an external shutdown are both `Ok`.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        let result = self.drive().await;
        if let Err(ConnectionError::Protocol(e)) = &result {
            self.notify_protocol_error(e).await;
        }
        self.teardown().await;
        result
    }

    /// Best-effort connection-level ERROR telling the peer why it is being
    /// disconnected. The transport may already be unusable.
    async fn notify_protocol_error(&mut self, error: &ProtocolError) {
        let frame = Frame::new(
            StreamId::CONNECTION,
            FrameBody::Error {
                code: ErrorCode::CONNECTION_ERROR,
                message: error.to_string(),
            },
        );
        if let Err(e) = self.transport.write_frame(frame).await {
            debug!(peer = ?self.peer, error = %e, "could not deliver error frame");
        }
    }

    async fn drive(&mut self) -> Result<(), ConnectionError> {
        loop {
            let event = {
                let transport = &mut self.transport;
                let outbound_rx = &mut self.outbound_rx;
                tokio::select! {
                    biased;
                    () = self.shutdown.cancelled() => Event::Shutdown,
                    // Reads come before writes so CANCEL and REQUEST_N stay
                    // responsive even while producers keep the queue full.
                    res = transport.read_frame() => Event::Inbound(res),
                    Some(frame) = outbound_rx.recv() => Event::Outbound(frame),
                }
            };

            match event {
                Event::Shutdown => return Ok(()),
                Event::Outbound(frame) => self.write_outbound(frame).await?,
                Event::Inbound(Ok(Some(frame))) => self.dispatch(frame)?,
                Event::Inbound(Ok(None)) => {
                    debug!(peer = ?self.peer, "peer closed connection");
                    return Ok(());
                }
                Event::Inbound(Err(e)) => return Err(e),
            }
        }
    }

    /// Write one executor-produced frame to the transport.
    ///
    /// Frames for streams no longer in the map were queued before a CANCEL
    /// or teardown won the race; they are discarded without writing.
    /// COMPLETE and ERROR are terminal: forwarding one retires the stream.
    async fn write_outbound(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        if !self.streams.contains_key(&frame.stream_id) {
            trace!(
                stream_id = %frame.stream_id,
                kind = frame.body.kind_name(),
                "discarding frame for retired stream"
            );
            return Ok(());
        }

        let terminal = matches!(frame.body, FrameBody::Complete | FrameBody::Error { .. });
        let stream_id = frame.stream_id;
        let kind = frame.body.kind_name();
        self.transport.write_frame(frame).await?;
        trace!(stream_id = %stream_id, kind, "frame written");

        if terminal {
            if let Some(handle) = self.streams.remove(&stream_id) {
                handle.terminate();
                debug!(stream_id = %stream_id, kind, "stream finished");
            }
        }
        Ok(())
    }

    async fn teardown(&mut self) {
        // Cancelling the connection token cancels every per-stream child.
        self.shutdown.cancel();
        for (_, handle) in self.streams.drain() {
            handle.terminate();
        }
        self.tasks.close();
        self.tasks.wait().await;
        if let Err(e) = self.transport.close().await {
            debug!(peer = ?self.peer, error = %e, "transport close failed");
        }
    }
}

#[cfg(test)]
mod tests;
