//! Connection handle definition
//!
//! Represents the writable side of one accepted connection. The socket write
//! half itself is owned by the connection's writer task; this handle only
//! feeds lines into it.

use std::net::SocketAddr;

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::types::ClientId;

/// Writable handle to a connected client
///
/// Cheap to clone. The registry stores clones, the owning session keeps the
/// original. The connection is closed once every clone has been dropped and
/// the writer task has drained the channel.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Identity of the accepted connection
    id: ClientId,
    /// Remote address, used for the default username
    peer_addr: SocketAddr,
    /// Server → Client line channel
    sender: mpsc::Sender<String>,
}

impl Connection {
    /// Create a new handle with the given ID, peer address and line channel
    pub fn new(id: ClientId, peer_addr: SocketAddr, sender: mpsc::Sender<String>) -> Self {
        Self {
            id,
            peer_addr,
            sender,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Send one line to this client
    ///
    /// Returns an error if the channel is closed (client disconnected).
    pub async fn send_line(&self, line: impl Into<String>) -> Result<(), SendError> {
        self.sender
            .send(line.into())
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Username substituted when the client supplies a blank one
    pub fn default_username(&self) -> String {
        format!("Client-{}", self.peer_addr.port())
    }

    /// Check whether `other` refers to the same accepted connection
    pub fn is(&self, other: &Connection) -> bool {
        self.id == other.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test]
    async fn test_send_line() {
        let (tx, mut rx) = mpsc::channel(32);
        let conn = Connection::new(ClientId::new(), addr(5000), tx);

        conn.send_line("hello").await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_send_line_after_close() {
        let (tx, rx) = mpsc::channel(32);
        let conn = Connection::new(ClientId::new(), addr(5000), tx);
        drop(rx);

        assert!(matches!(
            conn.send_line("hello").await,
            Err(SendError::ChannelClosed)
        ));
    }

    #[test]
    fn test_default_username_uses_port() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = Connection::new(ClientId::new(), addr(51234), tx);
        assert_eq!(conn.default_username(), "Client-51234");
    }

    #[test]
    fn test_identity() {
        let (tx, _rx) = mpsc::channel(1);
        let a = Connection::new(ClientId::new(), addr(1), tx.clone());
        let b = Connection::new(ClientId::new(), addr(1), tx);

        assert!(a.is(&a.clone()));
        assert!(!a.is(&b));
    }
}
