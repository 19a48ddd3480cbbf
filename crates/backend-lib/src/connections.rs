// ============================
// crates/backend-lib/src/connections.rs
// ============================
//! Table of live connections and their outbound queues.
//!
//! Each connection owns a bounded `mpsc` queue drained by its socket task.
//! Delivery uses `try_send`, so a slow consumer only loses its own events
//! and never stalls the sender.
use dashmap::DashMap;
use meetwire_common::{ConnectionId, ServerEvent};
use metrics::counter;
use tokio::sync::mpsc;

use crate::metrics::FANOUT_DROPPED;

/// Who is behind a connection, learned from `join-meeting`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identity {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub meeting_id: Option<String>,
}

#[derive(Debug)]
struct ConnectionEntry {
    tx: mpsc::Sender<ServerEvent>,
    identity: Identity,
}

/// Every live connection keyed by id
#[derive(Debug, Default)]
pub struct ConnectionTable {
    entries: DashMap<ConnectionId, ConnectionEntry>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connection_id: ConnectionId, tx: mpsc::Sender<ServerEvent>) {
        self.entries.insert(
            connection_id,
            ConnectionEntry {
                tx,
                identity: Identity::default(),
            },
        );
    }

    /// Remove a connection, returning its last known identity
    pub fn unregister(&self, connection_id: ConnectionId) -> Option<Identity> {
        self.entries
            .remove(&connection_id)
            .map(|(_, entry)| entry.identity)
    }

    pub fn identify(&self, connection_id: ConnectionId, identity: Identity) {
        if let Some(mut entry) = self.entries.get_mut(&connection_id) {
            entry.identity = identity;
        }
    }

    pub fn identity_of(&self, connection_id: ConnectionId) -> Option<Identity> {
        self.entries
            .get(&connection_id)
            .map(|entry| entry.identity.clone())
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.entries.contains_key(&connection_id)
    }

    /// Queue an event for one connection. Returns false when the connection
    /// is unknown or its queue is full or closed.
    pub fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        let Some(tx) = self.entries.get(&connection_id).map(|e| e.tx.clone()) else {
            return false;
        };

        match tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                counter!(FANOUT_DROPPED).increment(1);
                tracing::warn!(%connection_id, event = event.name(), "outbound queue full, dropping event");
                false
            },
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Queue an event for each listed connection and return how many accepted it
    pub fn deliver<I>(&self, recipients: I, event: &ServerEvent) -> usize
    where
        I: IntoIterator<Item = ConnectionId>,
    {
        recipients
            .into_iter()
            .filter(|id| self.send_to(*id, event.clone()))
            .count()
    }

    /// Queue an event for every live connection
    pub fn broadcast_all(&self, event: &ServerEvent) -> usize {
        let ids: Vec<ConnectionId> = self.entries.iter().map(|e| *e.key()).collect();
        self.deliver(ids, event)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
