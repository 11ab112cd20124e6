//! Public API for the `fluxwire` library.
//!
//! Building blocks for a minimal reactive RPC server: a length-prefixed
//! multiplexed frame protocol, two interaction models (request/response and
//! request/stream) with Requested-N flow control and cooperative
//! cancellation, and interchangeable TCP and WebSocket transports.

pub mod cli;
pub mod codec;
pub mod config;
pub mod connection;
pub mod executor;
pub mod flow;
pub mod frame;
pub mod handler;
pub mod payload;
pub mod server;
pub mod transport;

pub use codec::{CodecError, FrameCodec, ProtocolError};
pub use config::{ConfigError, ServerConfig, TransportKind};
pub use connection::ConnectionActor;
pub use flow::RequestWindow;
pub use frame::{ErrorCode, Frame, FrameBody, StreamId};
pub use handler::{
    EchoResponse,
    EchoStream,
    HandlerError,
    Handlers,
    PayloadStream,
    RequestResponseHandler,
    RequestStreamHandler,
};
pub use payload::Payload;
pub use server::{BoundServer, Server};
pub use transport::{ConnectionError, FrameTransport, Listener, StreamTransport, WsTransport};
