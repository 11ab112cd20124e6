//! Per-stream executor tasks.
//!
//! The multiplexer spawns one executor task per accepted request. Executors
//! produce outbound frames through the connection's serialized write queue
//! and observe cancellation cooperatively: a cancelled token is checked at
//! every suspension point, never pre-empted.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    flow::RequestWindow,
    frame::{Frame, FrameBody, StreamId},
    handler::{HandlerError, RequestResponseHandler, RequestStreamHandler},
    payload::Payload,
};

/// Everything an executor needs to talk back to its connection.
pub(crate) struct StreamContext {
    pub stream_id: StreamId,
    pub outbound: mpsc::Sender<Frame>,
    pub cancel: CancellationToken,
}

impl StreamContext {
    /// Queue one outbound frame, abandoning the attempt on cancellation.
    ///
    /// Returns `false` once the stream is cancelled or the connection is
    /// gone; the executor must then stop emitting.
    async fn send(&self, body: FrameBody) -> bool {
        let frame = Frame::new(self.stream_id, body);
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            res = self.outbound.send(frame) => res.is_ok(),
        }
    }

    async fn send_error(&self, error: &HandlerError) {
        debug!(stream_id = %self.stream_id, %error, "handler failed");
        let _ = self
            .send(FrameBody::Error {
                code: error.code(),
                message: error.message().to_owned(),
            })
            .await;
    }
}

/// Run one request to one response: exactly one PAYLOAD then COMPLETE, or a
/// single ERROR frame if the handler fails.
pub(crate) async fn run_request_response(
    ctx: StreamContext,
    handler: Arc<dyn RequestResponseHandler>,
    request: Payload,
) {
    let result = tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => return,
        result = handler.handle(request) => result,
    };

    match result {
        Ok(response) => {
            if ctx.send(FrameBody::Payload { payload: response }).await {
                let _ = ctx.send(FrameBody::Complete).await;
            }
        }
        Err(error) => ctx.send_error(&error).await,
    }
}

/// Run one request to a flow-controlled stream of responses.
///
/// One window credit is consumed per PAYLOAD. With the window exhausted the
/// producer suspends — indefinitely if the consumer never re-authorizes.
/// The task exits on cancellation, window closure, connection loss, or the
/// handler's stream ending (COMPLETE) or failing (ERROR).
pub(crate) async fn run_request_stream(
    ctx: StreamContext,
    handler: Arc<dyn RequestStreamHandler>,
    request: Payload,
    window: Arc<RequestWindow>,
) {
    let mut payloads = tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => return,
        result = handler.handle(request) => match result {
            Ok(stream) => stream,
            Err(error) => {
                ctx.send_error(&error).await;
                return;
            }
        },
    };

    loop {
        // Authorization first: never pull an item that could not be sent.
        tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return,
            acquired = window.acquire() => {
                if acquired.is_err() {
                    return;
                }
            }
        }

        let item = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return,
            item = payloads.next() => item,
        };

        match item {
            Some(Ok(payload)) => {
                if !ctx.send(FrameBody::Payload { payload }).await {
                    return;
                }
            }
            Some(Err(error)) => {
                ctx.send_error(&error).await;
                return;
            }
            None => {
                let _ = ctx.send(FrameBody::Complete).await;
                return;
            }
        }
    }
}
