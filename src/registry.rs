//! Client registry
//!
//! Maps online usernames to their connection handles. The registry is owned
//! by the `ChatServer` actor, so every operation on it is serialized with
//! every other one: there is exactly one exclusion domain for the whole map
//! and no per-entry locking.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::client::Connection;
use crate::types::ClientId;

/// Online username → connection mapping
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, Connection>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connection` under `username`
    ///
    /// A blank username is replaced by the connection's default name. An
    /// existing holder of the same name is displaced (last writer wins).
    /// Returns the effective username.
    pub fn register(&mut self, username: &str, connection: Connection) -> String {
        let username = match username.trim() {
            "" => connection.default_username(),
            name => name.to_string(),
        };

        if let Some(previous) = self.clients.insert(username.clone(), connection) {
            warn!(
                "Username '{}' re-registered; connection {} is no longer reachable by name",
                username,
                previous.id()
            );
        }
        debug!("Registered '{}' ({} online)", username, self.clients.len());

        username
    }

    /// Remove the entry held by connection `id`
    ///
    /// Returns the removed username, or `None` if the connection is not (or
    /// no longer) registered. Calling it again is a no-op.
    pub fn unregister(&mut self, id: ClientId) -> Option<String> {
        let username = self
            .clients
            .iter()
            .find(|(_, conn)| conn.id() == id)
            .map(|(name, _)| name.clone())?;

        self.clients.remove(&username);
        debug!("Unregistered '{}' ({} online)", username, self.clients.len());
        Some(username)
    }

    /// Point-in-time copy of all registered usernames, sorted
    pub fn names_snapshot(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.keys().cloned().collect();
        names.sort();
        names
    }

    /// Connection currently registered under `username`
    pub fn lookup(&self, username: &str) -> Option<&Connection> {
        self.clients.get(username)
    }

    /// Visit every entry
    ///
    /// The shared borrow keeps the map unchanged for the whole visit; callers
    /// that need the entries afterwards clone what they keep.
    pub fn for_each(&self, mut visit: impl FnMut(&str, &Connection)) {
        for (name, conn) in &self.clients {
            visit(name, conn);
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use tokio::sync::mpsc;

    use super::*;

    fn connection(port: u16) -> Connection {
        let (tx, _rx) = mpsc::channel(8);
        Connection::new(ClientId::new(), SocketAddr::from(([127, 0, 0, 1], port)), tx)
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ClientRegistry::new();
        let alice = connection(1000);

        let name = registry.register("alice", alice.clone());

        assert_eq!(name, "alice");
        assert!(registry.lookup("alice").unwrap().is(&alice));
        assert!(registry.lookup("bob").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_trims_name() {
        let mut registry = ClientRegistry::new();
        assert_eq!(registry.register("  alice \t", connection(1000)), "alice");
        assert!(registry.lookup("alice").is_some());
    }

    #[test]
    fn test_blank_name_gets_default() {
        let mut registry = ClientRegistry::new();

        assert_eq!(registry.register("", connection(4242)), "Client-4242");
        assert_eq!(registry.register("   ", connection(4343)), "Client-4343");
        assert_eq!(registry.names_snapshot(), vec!["Client-4242", "Client-4343"]);
    }

    #[test]
    fn test_unregister_removes_entry() {
        let mut registry = ClientRegistry::new();
        let alice = connection(1000);
        registry.register("alice", alice.clone());

        assert_eq!(registry.unregister(alice.id()).as_deref(), Some("alice"));
        assert!(registry.lookup("alice").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut registry = ClientRegistry::new();
        let alice = connection(1000);
        let bob = connection(1001);
        registry.register("alice", alice.clone());
        registry.register("bob", bob);

        assert!(registry.unregister(alice.id()).is_some());
        assert!(registry.unregister(alice.id()).is_none());
        assert_eq!(registry.names_snapshot(), vec!["bob"]);
    }

    #[test]
    fn test_duplicate_name_last_writer_wins() {
        let mut registry = ClientRegistry::new();
        let first = connection(1000);
        let second = connection(1001);

        registry.register("alice", first.clone());
        registry.register("alice", second.clone());

        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("alice").unwrap().is(&second));

        // The displaced connection no longer owns an entry
        assert!(registry.unregister(first.id()).is_none());
        assert!(registry.lookup("alice").is_some());
    }

    #[test]
    fn test_names_snapshot_sorted() {
        let mut registry = ClientRegistry::new();
        registry.register("carol", connection(3));
        registry.register("alice", connection(1));
        registry.register("bob", connection(2));

        assert_eq!(registry.names_snapshot(), vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_for_each_visits_every_entry() {
        let mut registry = ClientRegistry::new();
        let alice = connection(1);
        registry.register("alice", alice.clone());
        registry.register("bob", connection(2));

        let mut seen = Vec::new();
        registry.for_each(|name, conn| {
            if name == "alice" {
                assert!(conn.is(&alice));
            }
            seen.push(name.to_string());
        });
        seen.sort();

        assert_eq!(seen, vec!["alice", "bob"]);
    }
}
