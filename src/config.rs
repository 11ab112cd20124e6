//! Server configuration types.
//!
//! The transport is a closed enumeration chosen at startup; an unrecognised
//! selection is a fatal [`ConfigError`] reported before any socket is bound.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use thiserror::Error;

/// Configuration failure detected before the server starts.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The transport selection matched neither `tcp` nor `ws`.
    #[error("unknown transport: {0}")]
    UnknownTransport(String),
}

/// Transport variants the server can bind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    /// Raw duplex socket; the codec's length prefix delimits frames.
    Tcp,
    /// WebSocket; message boundaries delimit frames.
    Ws,
}

impl std::str::FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s {
            "tcp" => Ok(Self::Tcp),
            "ws" => Ok(Self::Ws),
            other => Err(ConfigError::UnknownTransport(other.to_owned())),
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Tcp => "tcp",
            Self::Ws => "ws",
        })
    }
}

/// Startup configuration for a [`Server`](crate::server::Server).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Transport variant to bind.
    pub transport: TransportKind,
    /// Interface to listen on.
    pub host: IpAddr,
    /// Port to listen on.
    pub port: u16,
}

impl ServerConfig {
    /// Configuration for `transport` on the default loopback endpoint.
    #[must_use]
    pub fn new(transport: TransportKind) -> Self {
        Self {
            transport,
            ..Self::default()
        }
    }

    /// Socket address to bind.
    #[must_use]
    pub fn addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Tcp,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 7000,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{ConfigError, ServerConfig, TransportKind};

    #[rstest]
    #[case("tcp", TransportKind::Tcp)]
    #[case("ws", TransportKind::Ws)]
    fn recognised_transports_parse(#[case] input: &str, #[case] expected: TransportKind) {
        assert_eq!(input.parse::<TransportKind>().unwrap(), expected);
    }

    #[rstest]
    #[case("quic")]
    #[case("TCP")]
    #[case("")]
    fn unknown_transports_fail_fast(#[case] input: &str) {
        let err = input.parse::<TransportKind>().unwrap_err();
        assert_eq!(err, ConfigError::UnknownTransport(input.to_owned()));
    }

    #[test]
    fn default_config_is_loopback_7000() {
        let config = ServerConfig::default();
        assert_eq!(config.addr().to_string(), "127.0.0.1:7000");
        assert_eq!(config.transport, TransportKind::Tcp);
    }
}
