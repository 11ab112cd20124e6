//! Inbound frame dispatch for the connection actor.
//!
//! Dispatch never blocks the read path: request frames spawn executor tasks,
//! flow-control and cancellation frames flip per-stream state and return.

use std::sync::Arc;

use tracing::{debug, trace};

use super::{ConnectionActor, StreamHandle};
use crate::{
    codec::ProtocolError,
    executor::{self, StreamContext},
    flow::RequestWindow,
    frame::{Frame, FrameBody, StreamId},
};

impl ConnectionActor {
    /// Route one inbound frame to the matching stream or spawn a new one.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] for frames that are illegal in the
    /// connection's current state; the caller tears the connection down.
    pub(super) fn dispatch(&mut self, frame: Frame) -> Result<(), ProtocolError> {
        let stream_id = frame.stream_id;
        match frame.body {
            FrameBody::Setup { .. } => self.handle_setup(stream_id),
            FrameBody::RequestResponse { payload } => {
                self.require_setup("REQUEST_RESPONSE")?;
                let ctx = self.open_stream(stream_id, None)?;
                self.tasks.spawn(executor::run_request_response(
                    ctx,
                    self.handlers.response(),
                    payload,
                ));
                Ok(())
            }
            FrameBody::RequestStream { initial_n, payload } => {
                self.require_setup("REQUEST_STREAM")?;
                let window = Arc::new(RequestWindow::new(initial_n));
                let ctx = self.open_stream(stream_id, Some(Arc::clone(&window)))?;
                self.tasks.spawn(executor::run_request_stream(
                    ctx,
                    self.handlers.stream(),
                    payload,
                    window,
                ));
                Ok(())
            }
            FrameBody::RequestN { n } => {
                // Re-authorization racing a finished stream is benign.
                match self.streams.get(&stream_id).and_then(|h| h.window.as_ref()) {
                    Some(window) => {
                        window.grant(n);
                        trace!(stream_id = %stream_id, n, "granted requestN");
                    }
                    None => trace!(stream_id = %stream_id, n, "requestN for retired stream"),
                }
                Ok(())
            }
            FrameBody::Cancel => {
                // Likewise, CANCEL may cross a terminal frame in flight.
                match self.streams.remove(&stream_id) {
                    Some(handle) => {
                        handle.terminate();
                        debug!(stream_id = %stream_id, "stream cancelled by peer");
                    }
                    None => trace!(stream_id = %stream_id, "cancel for retired stream"),
                }
                Ok(())
            }
            // This server never originates streams, so no peer payload or
            // terminal frame can belong to one.
            FrameBody::Payload { .. } | FrameBody::Error { .. } | FrameBody::Complete => {
                Err(ProtocolError::UnexpectedFrame {
                    kind: frame.body.kind_name(),
                    id: stream_id,
                })
            }
        }
    }

    fn handle_setup(&mut self, stream_id: StreamId) -> Result<(), ProtocolError> {
        if !stream_id.is_connection() {
            return Err(ProtocolError::UnexpectedFrame {
                kind: "SETUP",
                id: stream_id,
            });
        }
        if self.setup_received {
            return Err(ProtocolError::DuplicateSetup);
        }
        // Negotiation parameters are acknowledged, not interpreted.
        self.setup_received = true;
        debug!(peer = ?self.peer, "connection established");
        Ok(())
    }

    fn require_setup(&self, kind: &'static str) -> Result<(), ProtocolError> {
        if self.setup_received {
            Ok(())
        } else {
            Err(ProtocolError::SetupRequired { kind })
        }
    }

    /// Register a fresh stream and build its executor context.
    fn open_stream(
        &mut self,
        stream_id: StreamId,
        window: Option<Arc<RequestWindow>>,
    ) -> Result<StreamContext, ProtocolError> {
        if stream_id.is_connection() {
            return Err(ProtocolError::UnexpectedFrame {
                kind: "request",
                id: stream_id,
            });
        }
        if self.streams.contains_key(&stream_id) {
            return Err(ProtocolError::StreamReuse { id: stream_id });
        }
        let cancel = self.shutdown.child_token();
        self.streams.insert(
            stream_id,
            StreamHandle {
                cancel: cancel.clone(),
                window,
            },
        );
        trace!(stream_id = %stream_id, "stream opened");
        Ok(StreamContext {
            stream_id,
            outbound: self.outbound_tx.clone(),
            cancel,
        })
    }
}
