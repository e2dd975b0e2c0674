//! Encode server command.

use crate::ServeArgs;
use anyhow::{Context, Result};
use dcpenc_core::Config;
use dcpenc_dist::EncodeServer;
use tracing::{info, trace};

/// Runs the encode server until the listener fails.
pub fn run(args: ServeArgs, config: &Config, verbose: u8) -> Result<()> {
    trace!(bind = %args.bind, port = ?args.port, "serve::run");

    let port = args.port.unwrap_or(config.server_port);
    let threads = args.threads.unwrap_or(config.num_local_encoding_threads);
    let server = EncodeServer::bind((args.bind.as_str(), port), threads, config.socket_timeout())
        .with_context(|| format!("Failed to listen on {}:{port}", args.bind))?;

    let addr = server.local_addr()?;
    info!(%addr, threads, "Serving encode requests");
    if verbose > 0 {
        println!("Listening on {addr} with {threads} encode threads");
    }

    server.run().context("Encode server stopped")?;
    Ok(())
}
