//! shellcache worker entry point.
//!
//! Boots the offline-caching worker and exposes its host events as MCP tools
//! on stdio transport. Logging goes to stderr to avoid interfering with the
//! JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shellcache_core::{CacheDb, WorkerConfig};
use shellcache_engine::{HttpNetwork, NetworkConfig, Policy, Reactor, Worker};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = WorkerConfig::load()?;
    let policy = Policy::from_config(&config)?;

    tracing::info!(
        origin = %policy.origin,
        shell_cache = %policy.shell_cache,
        cdn_cache = %policy.cdn_cache,
        db_path = %config.db_path.display(),
        "Starting shellcache worker on stdio transport"
    );

    let db = CacheDb::open(&config.db_path).await?;
    let network = HttpNetwork::new(NetworkConfig::from(&config), policy.origin.clone())?;
    let worker = Worker::new(policy, db.clone(), Arc::new(network));
    let reactor = Reactor::spawn(Arc::new(worker));

    let handler = handler::WorkerServer::new(reactor);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;
    db.close().await?;

    Ok(())
}
