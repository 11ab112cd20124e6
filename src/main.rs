//! `fluxwire` server binary.
//!
//! Parses the transport selection, binds the listener, and serves the echo
//! behaviors until terminated. An unrecognised transport fails fast before
//! any socket is opened.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use fluxwire::{Server, cli::Cli};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let bound = match Server::new(config).bind().await {
        Ok(bound) => bound,
        Err(e) => {
            error!(addr = %config.addr(), "failed to bind: {e}");
            return ExitCode::FAILURE;
        }
    };

    match bound.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("server terminated: {e}");
            ExitCode::FAILURE
        }
    }
}
