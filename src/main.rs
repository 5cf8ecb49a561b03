//! Realtime Room Synchronization Server - Entry Point
//!
//! Binds the TCP listener and hands it to the accept loop.

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use room_sync::{serve, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=room_sync=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("room_sync=info")),
        )
        .init();

    // Bind address from command line, ROOM_SYNC_ADDR, or default
    let config = Config::from_env();

    // Start TCP listener
    let listener = TcpListener::bind(&config.addr).await?;
    info!(
        "Room sync server listening on ws://{}{}",
        config.addr, config.ws_path
    );

    serve(listener, config).await;

    Ok(())
}
