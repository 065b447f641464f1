//! ChatServer Actor implementation
//!
//! The central actor that owns the `ClientRegistry`. Sessions never touch the
//! registry directly; they send `ServerCommand`s and the actor processes them
//! one at a time, which makes the actor the single exclusion domain for
//! registration, lookup, snapshots and fan-out.

use std::collections::HashSet;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::client::Connection;
use crate::config::Config;
use crate::message::Notice;
use crate::registry::ClientRegistry;
use crate::router::{MessageRouter, UnicastOutcome};

/// Commands sent from session handlers to the ChatServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// Handshake finished; reply carries the effective username
    Register {
        username: String,
        connection: Connection,
        reply: oneshot::Sender<String>,
    },
    /// Session ended
    Unregister {
        connection: Connection,
        /// Broadcast a departure notice if the entry was still present
        announce: bool,
    },
    /// Snapshot of online usernames
    Names { reply: oneshot::Sender<Vec<String>> },
    /// Deliver to everyone but the sender
    Broadcast { sender: Connection, body: String },
    /// Deliver to the named targets
    Unicast {
        sender: Connection,
        targets: Vec<String>,
        body: String,
        reply: oneshot::Sender<UnicastOutcome>,
    },
    /// Deliver to everyone but the sender and the excluded names
    BroadcastExcluding {
        sender: Connection,
        excluded: HashSet<String>,
        body: String,
    },
}

/// The main ChatServer actor
///
/// Owns the registry and the router and processes commands from session
/// handlers until every command sender has been dropped.
pub struct ChatServer {
    /// Online clients
    registry: ClientRegistry,
    /// Banned-phrase filter and fan-out
    router: MessageRouter,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>, config: &Config) -> Self {
        Self {
            registry: ClientRegistry::new(),
            router: MessageRouter::new(&config.banned_phrases),
            receiver,
        }
    }

    /// Run the ChatServer event loop
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        info!("ChatServer shutting down");
    }

    /// Process a single command
    async fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Register {
                username,
                connection,
                reply,
            } => {
                let client_id = connection.id();
                let username = self.registry.register(&username, connection);
                info!("Client {} registered as '{}'", client_id, username);
                let _ = reply.send(username);
            }
            ServerCommand::Unregister {
                connection,
                announce,
            } => {
                self.handle_unregister(&connection, announce).await;
            }
            ServerCommand::Names { reply } => {
                let _ = reply.send(self.registry.names_snapshot());
            }
            ServerCommand::Broadcast { sender, body } => {
                let result = self.router.broadcast(&self.registry, &body, &sender).await;
                debug!("Broadcast from {}: {:?}", sender.id(), result);
            }
            ServerCommand::Unicast {
                sender,
                targets,
                body,
                reply,
            } => {
                let outcome = self
                    .router
                    .unicast(&self.registry, &body, &sender, &targets)
                    .await;
                let _ = reply.send(outcome);
            }
            ServerCommand::BroadcastExcluding {
                sender,
                excluded,
                body,
            } => {
                let result = self
                    .router
                    .broadcast_excluding(&self.registry, &body, &sender, &excluded)
                    .await;
                debug!("Exclude-broadcast from {}: {:?}", sender.id(), result);
            }
        }
    }

    /// Handle session teardown
    ///
    /// The departure notice goes through the router like any other
    /// broadcast, after the entry is gone.
    async fn handle_unregister(&mut self, connection: &Connection, announce: bool) {
        let client_id = connection.id();
        let Some(username) = self.registry.unregister(client_id) else {
            debug!("Client {} was not registered", client_id);
            return;
        };
        info!("Client {} ('{}') unregistered", client_id, username);

        if announce {
            let notice = Notice::Left(username).to_string();
            self.router
                .broadcast(&self.registry, &notice, connection)
                .await;
        }

        debug!("Total clients: {}", self.registry.len());
    }
}
