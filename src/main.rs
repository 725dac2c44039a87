//! # overseerr-mcp
//!
//! MCP (Model Context Protocol) server that lets an AI agent search for
//! media and file requests through an Overseerr instance. Runs as a stdio
//! JSON-RPC server — designed to be launched by an AI agent host.
//!
//! ## Architecture
//!
//! ```text
//! main.rs      — entry point, config, directory snapshot, MCP server launch
//! config.rs    — CLI / env-var configuration
//! defaults.rs  — precedence chain for the requesting user id
//! models.rs    — typed Overseerr records (pure data)
//! client.rs    — HTTP client for the Overseerr v1 REST API
//! directory.rs — startup snapshot of libraries and users, indexed by name
//! resolver.rs  — library / user name → id resolution
//! tools.rs     — tool definitions, argument validation and handlers
//! mcp.rs       — MCP JSON-RPC protocol handler (stdio)
//! ```
//!
//! ## Startup
//!
//! The library and user lists are fetched before the first line is read from
//! stdin. If Overseerr cannot be reached at that point the process exits: the
//! request tools describe their arguments from that snapshot.

mod client;
mod config;
mod defaults;
mod directory;
mod mcp;
mod models;
mod resolver;
mod tools;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use clap::Parser;
use config::{BackendConfig, Cli};
use directory::Directory;
use tools::Dispatcher;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // stdout carries protocol frames; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(cli.log_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = match BackendConfig::from_cli(&cli) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    let client = match client::OverseerrClient::new(&config) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!("cannot create HTTP client: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "overseerr-mcp v{} starting, Overseerr at {}",
        env!("CARGO_PKG_VERSION"),
        config.base_url
    );

    let directory = match Directory::build(client.as_ref()).await {
        Ok(d) => Arc::new(d),
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        libraries = directory.libraries().len(),
        users = directory.users().len(),
        default_user_id = config.default_user_id(),
        "directory loaded"
    );

    let dispatcher = Arc::new(Dispatcher::new(client, directory, config));
    mcp::run_stdio(dispatcher).await;

    tracing::info!("stdin closed, shutting down");
}
