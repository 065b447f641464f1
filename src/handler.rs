//! TCP connection handler
//!
//! Accepts connections and drives one session per connection through
//! `Handshake -> Active -> Closed`: line framing, command dispatch, and
//! guaranteed unregistration on every exit path.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{AnyDelimiterCodecError, FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::client::Connection;
use crate::codec::LossyLinesCodec;
use crate::config::Config;
use crate::error::AppError;
use crate::message::{chat_line, private_line, ClientCommand, Notice, INSTRUCTIONS};
use crate::server::{ChatServer, ServerCommand};
use crate::types::ClientId;

/// Channel buffer size for server commands
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Per-connection outbound line buffer
const LINE_BUFFER_SIZE: usize = 64;

/// Longest accepted client line, in bytes
const MAX_LINE_LENGTH: usize = 4096;

/// How long a closing connection may take to flush queued lines
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// How long shutdown waits for sessions and the actor to finish
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Accept connections until `shutdown` resolves
///
/// Starts the `ChatServer` actor and spawns one task per accepted
/// connection. On shutdown, sessions stop reading new lines, flush what is
/// already queued for them, and are waited on before this returns. An
/// `accept` failure ends the loop with an error.
pub async fn serve<F>(listener: TcpListener, config: Arc<Config>, shutdown: F) -> Result<(), AppError>
where
    F: Future<Output = ()>,
{
    let tracker = TaskTracker::new();
    let stop = CancellationToken::new();

    let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    tracker.spawn(ChatServer::new(cmd_rx, &config).run());
    info!("ChatServer actor started");

    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => break Err(AppError::Io(e)),
                };
                info!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();
                let config = Arc::clone(&config);
                let stop = stop.clone();

                tracker.spawn(async move {
                    if let Err(e) = handle_connection(stream, cmd_tx, config, stop).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            _ = &mut shutdown => {
                info!("Shutdown requested, no longer accepting connections");
                break Ok(());
            }
        }
    };

    // Stop sessions reading, then let them and the actor drain
    drop(listener);
    stop.cancel();
    drop(cmd_tx);
    tracker.close();

    if tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, tracker.wait())
        .await
        .is_err()
    {
        warn!("{} tasks still running after shutdown timeout", tracker.len());
    } else {
        info!("All sessions drained");
    }

    result
}

/// Handle a new TCP connection
///
/// Splits the stream, spawns the writer task, runs the session, and drains
/// the writer once the session has been torn down.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
    config: Arc<Config>,
    stop: CancellationToken,
) -> Result<(), AppError> {
    let peer_addr = stream.peer_addr()?;
    let client_id = ClientId::new();
    info!("Client {} connected from {}", client_id, peer_addr);

    let (read_half, write_half) = stream.into_split();
    let mut lines = FramedRead::new(read_half, LossyLinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let mut sink = FramedWrite::new(write_half, LinesCodec::new());

    // Create channel for server -> client lines
    let (line_tx, mut line_rx) = mpsc::channel::<String>(LINE_BUFFER_SIZE);

    // Spawn write task (lines -> socket), one flush per line
    let writer = tokio::spawn(async move {
        while let Some(line) = line_rx.recv().await {
            if let Err(e) = sink.send(line).await {
                debug!("Socket write failed for {}: {}", client_id, e);
                break;
            }
        }
        let _ = SinkExt::<String>::close(&mut sink).await;
        debug!("Write task ended for {}", client_id);
    });

    let connection = Connection::new(client_id, peer_addr, line_tx);
    let mut session = Session::new(connection, cmd_tx, config, stop);
    let result = session.run(&mut lines).await;

    // Closed: dropping the session unregisters it and releases its handle
    drop(session);

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        warn!("Client {} did not drain its output in time", client_id);
    }

    match &result {
        Ok(()) => info!("Client {} disconnected", client_id),
        Err(e) => error!("Client {} closed after error: {}", client_id, e),
    }

    result
}

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Handshake,
    Active,
    Closed,
}

/// Unregisters a connection when dropped
///
/// Created once the handshake has registered the client, so teardown runs
/// exactly once whether the session ends by `exit`, end of stream, an I/O
/// error, or task cancellation.
struct Registration {
    connection: Connection,
    cmd_tx: mpsc::Sender<ServerCommand>,
    /// Departure not yet announced by the session itself
    announce: bool,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let cmd = ServerCommand::Unregister {
            connection: self.connection.clone(),
            announce: self.announce,
        };

        let client_id = self.connection.id();
        match self.cmd_tx.try_send(cmd) {
            Ok(()) => {}
            Err(TrySendError::Full(cmd)) => {
                // Queue is busy; hand the command to a task that can wait
                let Ok(handle) = tokio::runtime::Handle::try_current() else {
                    warn!("No runtime to unregister {}; entry left behind", client_id);
                    return;
                };
                let cmd_tx = self.cmd_tx.clone();
                handle.spawn(async move {
                    if cmd_tx.send(cmd).await.is_err() {
                        warn!("ChatServer gone before {} unregistered", client_id);
                    }
                });
            }
            Err(TrySendError::Closed(_)) => {
                warn!("ChatServer gone before {} unregistered", client_id);
            }
        }
    }
}

/// Per-connection protocol state machine
struct Session {
    connection: Connection,
    cmd_tx: mpsc::Sender<ServerCommand>,
    config: Arc<Config>,
    /// Server shutdown: stop taking new lines
    stop: CancellationToken,
    username: Option<String>,
    phase: Phase,
    registration: Option<Registration>,
}

impl Session {
    fn new(
        connection: Connection,
        cmd_tx: mpsc::Sender<ServerCommand>,
        config: Arc<Config>,
        stop: CancellationToken,
    ) -> Self {
        Self {
            connection,
            cmd_tx,
            config,
            stop,
            username: None,
            phase: Phase::Handshake,
            registration: None,
        }
    }

    /// Drive the session until `exit`, end of stream, shutdown, or an error
    async fn run<S>(&mut self, lines: &mut S) -> Result<(), AppError>
    where
        S: Stream<Item = Result<String, AnyDelimiterCodecError>> + Unpin,
    {
        self.send(Notice::UsernamePrompt).await?;

        let Some(proposed) = self.next_line(lines).await? else {
            debug!("Client {} left during handshake", self.connection.id());
            self.phase = Phase::Closed;
            return Ok(());
        };
        self.handshake(&proposed).await?;

        while self.phase == Phase::Active {
            let Some(line) = self.next_line(lines).await? else {
                debug!("Client {} closed the connection", self.connection.id());
                break;
            };
            self.handle_line(&line).await?;
        }

        // Departures during shutdown are not announced
        if self.stop.is_cancelled() {
            if let Some(registration) = self.registration.as_mut() {
                registration.announce = false;
            }
        }

        self.phase = Phase::Closed;
        Ok(())
    }

    /// Next client line, or `None` at end of stream or on shutdown
    async fn next_line<S>(&self, lines: &mut S) -> Result<Option<String>, AppError>
    where
        S: Stream<Item = Result<String, AnyDelimiterCodecError>> + Unpin,
    {
        tokio::select! {
            line = lines.next() => Ok(line.transpose()?),
            _ = self.stop.cancelled() => {
                debug!("Client {} closing for shutdown", self.connection.id());
                Ok(None)
            }
        }
    }

    /// Register, announce, and greet the client
    async fn handshake(&mut self, proposed: &str) -> Result<(), AppError> {
        let (reply, rx) = oneshot::channel();
        self.command(ServerCommand::Register {
            username: proposed.to_string(),
            connection: self.connection.clone(),
            reply,
        })
        .await?;
        let username = rx.await.map_err(|_| AppError::ChannelSend)?;

        self.registration = Some(Registration {
            connection: self.connection.clone(),
            cmd_tx: self.cmd_tx.clone(),
            announce: true,
        });

        self.broadcast(Notice::Joined(username.clone()).to_string())
            .await?;

        let names = self.names().await?;
        self.send(Notice::ConnectedClients(names)).await?;
        for line in INSTRUCTIONS {
            self.connection.send_line(line).await?;
        }

        self.username = Some(username);
        self.phase = Phase::Active;
        Ok(())
    }

    /// Process one line received while active
    async fn handle_line(&mut self, line: &str) -> Result<(), AppError> {
        let command = match ClientCommand::parse(line) {
            Ok(command) => command,
            Err(e) => {
                debug!("Usage error from {}: {}", self.display_name(), e);
                return self.send(Notice::from(e)).await;
            }
        };

        match command {
            ClientCommand::Empty => self.send(Notice::EmptyMessage).await?,
            ClientCommand::Exit => {
                self.broadcast(Notice::Left(self.display_name().to_string()).to_string())
                    .await?;
                if let Some(registration) = self.registration.as_mut() {
                    registration.announce = false;
                }
                self.phase = Phase::Closed;
            }
            ClientCommand::Banned => {
                self.send(Notice::BannedPhrases(self.config.banned_phrases.clone()))
                    .await?
            }
            ClientCommand::Send { recipients, body } => {
                self.send_private(recipients, &body).await?
            }
            ClientCommand::Exclude { excluded, body } => {
                self.command(ServerCommand::BroadcastExcluding {
                    sender: self.connection.clone(),
                    excluded: excluded.into_iter().collect::<HashSet<_>>(),
                    body: chat_line(self.display_name(), &body),
                })
                .await?
            }
            ClientCommand::Chat(text) => {
                self.broadcast(chat_line(self.display_name(), &text))
                    .await?
            }
        }

        Ok(())
    }

    /// Unicast, then report every unreachable target to the sender
    async fn send_private(&self, recipients: Vec<String>, body: &str) -> Result<(), AppError> {
        let (reply, rx) = oneshot::channel();
        self.command(ServerCommand::Unicast {
            sender: self.connection.clone(),
            targets: recipients,
            body: private_line(self.display_name(), body),
            reply,
        })
        .await?;
        let outcome = rx.await.map_err(|_| AppError::ChannelSend)?;

        let missing = outcome.not_found();
        if missing.is_empty() {
            return Ok(());
        }

        let available = self.names().await?;
        for username in missing {
            self.send(Notice::UserNotFound {
                username: username.to_string(),
                available: available.clone(),
            })
            .await?;
        }
        Ok(())
    }

    async fn broadcast(&self, body: String) -> Result<(), AppError> {
        self.command(ServerCommand::Broadcast {
            sender: self.connection.clone(),
            body,
        })
        .await
    }

    async fn names(&self) -> Result<Vec<String>, AppError> {
        let (reply, rx) = oneshot::channel();
        self.command(ServerCommand::Names { reply }).await?;
        rx.await.map_err(|_| AppError::ChannelSend)
    }

    async fn command(&self, cmd: ServerCommand) -> Result<(), AppError> {
        self.cmd_tx.send(cmd).await.map_err(|_| AppError::ChannelSend)
    }

    async fn send(&self, notice: Notice) -> Result<(), AppError> {
        Ok(self.connection.send_line(notice.to_string()).await?)
    }

    /// Username if registered, otherwise "Unknown"
    fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("Unknown")
    }
}
