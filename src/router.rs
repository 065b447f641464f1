//! Message routing
//!
//! Stateless apart from the banned-phrase list: every operation filters the
//! outbound body first, then fans it out over a snapshot of the registry.
//! Delivery is best effort. A failed write to one recipient is logged and
//! the remaining recipients are still served.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::client::Connection;
use crate::message::Notice;
use crate::registry::ClientRegistry;

/// Result of a broadcast-style routing call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Filtered; only the sender was notified
    Blocked,
    /// Sent to this many recipients (failed writes not counted)
    Delivered(usize),
}

/// Result of a unicast routing call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnicastOutcome {
    /// Filtered; nothing was delivered to any target
    Blocked,
    /// One `(target, delivered)` pair per requested target, in request order
    Routed(Vec<(String, bool)>),
}

impl UnicastOutcome {
    /// Targets that could not be reached
    pub fn not_found(&self) -> Vec<&str> {
        match self {
            UnicastOutcome::Blocked => Vec::new(),
            UnicastOutcome::Routed(results) => results
                .iter()
                .filter(|(_, delivered)| !delivered)
                .map(|(name, _)| name.as_str())
                .collect(),
        }
    }
}

/// Filters and fans out messages against a `ClientRegistry`
#[derive(Debug, Clone, Default)]
pub struct MessageRouter {
    banned_phrases: Vec<String>,
}

impl MessageRouter {
    pub fn new<S: AsRef<str>>(banned_phrases: &[S]) -> Self {
        Self {
            banned_phrases: banned_phrases
                .iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// True iff the lowercased body contains any banned phrase
    pub fn contains_banned_phrase(&self, body: &str) -> bool {
        let body = body.to_lowercase();
        self.banned_phrases.iter().any(|p| body.contains(p.as_str()))
    }

    /// Deliver `body` to every registered connection except `sender`
    pub async fn broadcast(
        &self,
        registry: &ClientRegistry,
        body: &str,
        sender: &Connection,
    ) -> Delivery {
        self.broadcast_where(registry, body, sender, |_| true).await
    }

    /// Deliver `body` to every registered connection except `sender` and
    /// the `excluded` usernames
    pub async fn broadcast_excluding(
        &self,
        registry: &ClientRegistry,
        body: &str,
        sender: &Connection,
        excluded: &HashSet<String>,
    ) -> Delivery {
        self.broadcast_where(registry, body, sender, |name| !excluded.contains(name))
            .await
    }

    /// Deliver `body` to each named target independently
    ///
    /// A filtered body is rejected as a whole with one notice to `sender`.
    /// Otherwise a missing or unreachable target only affects its own flag.
    pub async fn unicast(
        &self,
        registry: &ClientRegistry,
        body: &str,
        sender: &Connection,
        targets: &[String],
    ) -> UnicastOutcome {
        if self.contains_banned_phrase(body) {
            info!("Blocked private message from connection {}", sender.id());
            notify(sender, Notice::BlockedPrivate).await;
            return UnicastOutcome::Blocked;
        }

        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            let delivered = match registry.lookup(target) {
                Some(conn) => deliver(target, conn, body).await,
                None => {
                    debug!("Unicast target '{}' not found", target);
                    false
                }
            };
            results.push((target.clone(), delivered));
        }

        UnicastOutcome::Routed(results)
    }

    async fn broadcast_where(
        &self,
        registry: &ClientRegistry,
        body: &str,
        sender: &Connection,
        include: impl Fn(&str) -> bool,
    ) -> Delivery {
        if self.contains_banned_phrase(body) {
            info!("Blocked broadcast from connection {}", sender.id());
            notify(sender, Notice::BlockedBroadcast).await;
            return Delivery::Blocked;
        }

        let mut recipients = Vec::new();
        registry.for_each(|name, conn| {
            if !conn.is(sender) && include(name) {
                recipients.push((name.to_string(), conn.clone()));
            }
        });

        let mut delivered = 0;
        for (name, conn) in &recipients {
            if deliver(name, conn, body).await {
                delivered += 1;
            }
        }

        Delivery::Delivered(delivered)
    }
}

/// Write one line to one recipient, logging a failure
async fn deliver(name: &str, conn: &Connection, line: &str) -> bool {
    match conn.send_line(line).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Error delivering message to {}: {}", name, e);
            false
        }
    }
}

async fn notify(sender: &Connection, notice: Notice) {
    if let Err(e) = sender.send_line(notice.to_string()).await {
        warn!(
            "Error notifying connection {} about blocked message: {}",
            sender.id(),
            e
        );
    }
}
