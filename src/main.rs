//! vtcp - virtual TCP socket registry
//!
//! Serves the virtual socket table over TCP until Ctrl-C.

use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vtcp_server::{Config, ConfigError, Server, ServerConfig};

/// Loads configuration from file if VTCP_CONFIG is set, then env overrides.
/// Any error is fatal, so one bad override never discards the others.
fn load_config() -> Result<Config, ConfigError> {
    match Config::load() {
        Ok(config) => {
            if let Ok(path) = std::env::var("VTCP_CONFIG") {
                tracing::info!("Loaded config from {}", path);
            }
            Ok(config)
        }
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            Err(e)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;

    tracing::info!("Starting vtcp registry");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Max connections: {}", config.network.max_connections);
    tracing::info!("  Poll interval: {:?}", config.registry.poll_interval());
    match config.registry.rendezvous_timeout() {
        Some(timeout) => tracing::info!("  Rendezvous timeout: {:?}", timeout),
        None => tracing::info!("  Rendezvous timeout: none"),
    }
    tracing::info!("  Buffer capacity: {} bytes", config.registry.buffer_capacity);

    let server = Arc::new(Server::new(ServerConfig::from_config(&config)));

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping registry...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown)
    server.run().await?;

    tracing::info!(
        "Registry stopped ({} sockets, {} connections served)",
        server.table().len(),
        server
            .stats()
            .connections_total
            .load(std::sync::atomic::Ordering::Relaxed)
    );
    Ok(())
}
