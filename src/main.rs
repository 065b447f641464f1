//! Line-oriented TCP Chat Server - Entry Point
//!
//! Loads the configuration, binds the listener and serves connections until
//! Ctrl-C.

use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_relay::{serve, Config};

/// Default configuration file path
const DEFAULT_CONFIG_PATH: &str = "server_details.txt";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    // Get config path from command line or use default
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Arc::new(Config::load(&config_path)?);

    // Start TCP listener
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("{} is running on port {}", config.server_name, config.port);

    serve(listener, config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    info!("Server stopped");
    Ok(())
}
