//! Top-level server composition.
//!
//! A [`Server`] binds the configured transport, accepts connections without
//! limit, and attaches a [`ConnectionActor`] with the handler registry to
//! each. Connections run independently; a failure in one never crosses to
//! another. The process runs until a shutdown signal (Ctrl+C) or, in tests,
//! until an injected shutdown future resolves.

use std::{io, net::SocketAddr};

use futures::Future;
use tokio::time::{Duration, sleep};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{info, warn};

use crate::{
    config::ServerConfig,
    connection::ConnectionActor,
    handler::Handlers,
    transport::{self, Listener},
};

/// Initial delay before retrying a failed accept.
const ACCEPT_BACKOFF_INITIAL: Duration = Duration::from_millis(10);
/// Ceiling for the accept retry delay.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Reactive RPC server, not yet bound.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    handlers: Handlers,
}

impl Server {
    /// Create a server with the built-in echo handlers.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            handlers: Handlers::echo(),
        }
    }

    /// Replace the handler registry.
    #[must_use]
    pub fn handlers(mut self, handlers: Handlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Bind a listener for the configured transport.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] if the socket cannot be bound.
    pub async fn bind(self) -> io::Result<BoundServer> {
        let listener = transport::bind(self.config.transport, self.config.addr()).await?;
        info!(
            transport = %self.config.transport,
            addr = %listener.local_addr()?,
            "server started"
        );
        Ok(BoundServer {
            listener,
            handlers: self.handlers,
        })
    }
}

/// A server bound to its listener and ready to accept connections.
pub struct BoundServer {
    listener: Box<dyn Listener>,
    handlers: Handlers,
}

impl BoundServer {
    /// Address the listener is bound to.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] if the address cannot be read back.
    pub fn local_addr(&self) -> io::Result<SocketAddr> { self.listener.local_addr() }

    /// Run until a Ctrl+C signal is received.
    ///
    /// # Errors
    ///
    /// Accept failures are retried with capped exponential backoff and do
    /// not surface as errors; this currently always returns `Ok`.
    pub async fn run(self) -> io::Result<()> {
        self.run_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
    }

    /// Run until the `shutdown` future resolves.
    ///
    /// Shutdown cancels every connection's token and waits for their actors
    /// (and therefore all executor tasks) to finish.
    ///
    /// # Errors
    ///
    /// Accept failures are retried with capped exponential backoff and do
    /// not surface as errors; this currently always returns `Ok`.
    pub async fn run_with_shutdown<S>(mut self, shutdown: S) -> io::Result<()>
    where
        S: Future<Output = ()> + Send,
    {
        let shutdown_token = CancellationToken::new();
        let tracker = TaskTracker::new();

        let accept_loop = async {
            let mut delay = ACCEPT_BACKOFF_INITIAL;
            loop {
                match self.listener.accept().await {
                    Ok((transport, peer)) => {
                        delay = ACCEPT_BACKOFF_INITIAL;
                        info!(%peer, "connection accepted");
                        let actor =
                            ConnectionActor::new(transport, self.handlers.clone(), shutdown_token.child_token())
                                .with_peer(peer);
                        tracker.spawn(async move {
                            if let Err(e) = actor.run().await {
                                warn!(%peer, error = %e, "connection closed with error");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed; backing off");
                        sleep(delay).await;
                        delay = (delay * 2).min(ACCEPT_BACKOFF_MAX);
                    }
                }
            }
        };

        tokio::select! {
            () = shutdown => info!("shutdown requested"),
            () = accept_loop => {}
        }

        shutdown_token.cancel();
        tracker.close();
        tracker.wait().await;
        Ok(())
    }
}
