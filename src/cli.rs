//! Command line interface for the `fluxwire` binary.

use std::net::IpAddr;

use clap::Parser;

use crate::config::{ConfigError, ServerConfig};

/// Command line arguments for the `fluxwire` binary.
#[derive(Debug, Parser)]
#[command(name = "fluxwire", version, about = "Reactive RPC echo server")]
pub struct Cli {
    /// Transport to serve on: "tcp" or "ws".
    #[arg(short, long, default_value = "tcp")]
    pub transport: String,

    /// Interface to listen on.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to listen on.
    #[arg(short, long, default_value_t = 7000)]
    pub port: u16,
}

impl Cli {
    /// Validate the arguments into a [`ServerConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownTransport`] for unrecognised transport
    /// values; the caller must not bind anything in that case.
    pub fn into_config(self) -> Result<ServerConfig, ConfigError> {
        Ok(ServerConfig {
            transport: self.transport.parse()?,
            host: self.host,
            port: self.port,
        })
    }
}
