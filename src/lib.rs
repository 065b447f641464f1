//! Line-oriented TCP Chat Server Library
//!
//! A multi-client chat relay built on tokio using the Actor pattern for the
//! shared client registry.
//!
//! # Features
//! - Username handshake with a default name for blank input
//! - Broadcast chat lines
//! - Private messages to a list of users (`/send`)
//! - Broadcast excluding a list of users (`/exclude`)
//! - Case-insensitive banned-phrase filtering (`/banned` lists them)
//! - Join/leave announcements
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning the `ClientRegistry`
//! - Each connection runs a session task that talks to the actor
//! - Each connection has a writer task fed through its `Connection` handle
//! - No locks needed - all registry access goes through message passing
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use chat_relay::{serve, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Arc::new(Config::load("server_details.txt")?);
//!     let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
//!     serve(listener, config, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod router;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::Connection;
pub use codec::LossyLinesCodec;
pub use config::Config;
pub use error::{AppError, CommandError, ConfigError, SendError};
pub use handler::{handle_connection, serve, Phase};
pub use message::{ClientCommand, Notice};
pub use registry::ClientRegistry;
pub use router::{Delivery, MessageRouter, UnicastOutcome};
pub use server::{ChatServer, ServerCommand};
pub use types::ClientId;
