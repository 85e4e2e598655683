//! Multi-room Line Chat Server - Entry Point
//!
//! Loads configuration, binds the TCP listener and spawns one worker per
//! accepted connection.

use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_rooms::{handle_connection, ChatServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_rooms=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_rooms=info")),
        )
        .init();

    // Config file from CHAT_ROOMS_CONFIG; first argument overrides the address
    let mut config = ServerConfig::from_env()?;
    if let Some(addr) = env::args().nth(1) {
        config.bind_addr = addr;
    }

    // Bind failure is fatal
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Chat server listening on {}", config.bind_addr);

    let server = Arc::new(ChatServer::new(config));

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let server = Arc::clone(&server);

                // Spawn a worker for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, server).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
