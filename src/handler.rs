//! Request handlers and the interaction-model registry.
//!
//! [`Handlers`] maps each interaction model to its behavior. The server
//! registers the two echo behaviors by default: request/response returns an
//! independent copy of the request, request/stream yields copies forever.

use std::{pin::Pin, sync::Arc};

use async_trait::async_trait;
use futures::{Stream, stream};
use thiserror::Error;

use crate::{frame::ErrorCode, payload::Payload};

/// Failure raised by a handler, reported to the peer as an ERROR frame for
/// that stream. The connection survives.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    code: ErrorCode,
    message: String,
}

impl HandlerError {
    /// Create an application-level handler error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::APPLICATION_ERROR,
            message: message.into(),
        }
    }

    /// Create a handler error with an explicit code.
    pub fn with_code(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Error code reported on the wire.
    #[must_use]
    pub fn code(&self) -> ErrorCode { self.code }

    /// Error message reported on the wire.
    #[must_use]
    pub fn message(&self) -> &str { &self.message }
}

/// Type-erased stream of payloads produced by a request/stream handler.
///
/// The stream may be unbounded; flow control is enforced by the executor,
/// not the handler.
pub type PayloadStream = Pin<Box<dyn Stream<Item = Result<Payload, HandlerError>> + Send>>;

/// Behavior for the request/response interaction model.
#[async_trait]
pub trait RequestResponseHandler: Send + Sync {
    /// Produce exactly one response payload for `request`.
    async fn handle(&self, request: Payload) -> Result<Payload, HandlerError>;
}

/// Behavior for the request/stream interaction model.
#[async_trait]
pub trait RequestStreamHandler: Send + Sync {
    /// Produce a (potentially unbounded) stream of response payloads.
    async fn handle(&self, request: Payload) -> Result<PayloadStream, HandlerError>;
}

/// Registry mapping each interaction model to its handler.
#[derive(Clone)]
pub struct Handlers {
    response: Arc<dyn RequestResponseHandler>,
    stream: Arc<dyn RequestStreamHandler>,
}

impl Handlers {
    /// Build a registry from explicit handlers.
    pub fn new(
        response: impl RequestResponseHandler + 'static,
        stream: impl RequestStreamHandler + 'static,
    ) -> Self {
        Self {
            response: Arc::new(response),
            stream: Arc::new(stream),
        }
    }

    /// The built-in echo behaviors for both interaction models.
    #[must_use]
    pub fn echo() -> Self { Self::new(EchoResponse, EchoStream) }

    pub(crate) fn response(&self) -> Arc<dyn RequestResponseHandler> {
        Arc::clone(&self.response)
    }

    pub(crate) fn stream(&self) -> Arc<dyn RequestStreamHandler> { Arc::clone(&self.stream) }
}

impl Default for Handlers {
    fn default() -> Self { Self::echo() }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Handlers(..)")
    }
}

/// Echo handler: responds with an independent copy of the request payload.
#[derive(Clone, Copy, Debug, Default)]
pub struct EchoResponse;

#[async_trait]
impl RequestResponseHandler for EchoResponse {
    async fn handle(&self, request: Payload) -> Result<Payload, HandlerError> {
        Ok(request.deep_copy())
    }
}

/// Echo handler: emits independent copies of the request payload forever.
///
/// The stream never completes on its own; it ends only through cancellation
/// or connection teardown.
#[derive(Clone, Copy, Debug, Default)]
pub struct EchoStream;

#[async_trait]
impl RequestStreamHandler for EchoStream {
    async fn handle(&self, request: Payload) -> Result<PayloadStream, HandlerError> {
        Ok(Box::pin(stream::repeat_with(move || {
            Ok(request.deep_copy())
        })))
    }
}
