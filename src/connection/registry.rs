//! Client registry
//!
//! The single source of truth for who is online. Every operation is a plain
//! method on `&mut self`/`&self`; callers share the registry as
//! `SharedRegistry` and run each call under its one mutex, which makes the
//! capacity check and the insert a single atomic step.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::connection::results::{RejectReason, Registration};
use crate::connection::{Connection, ConnectionId};

/// Registry shared between the supervisor and every worker
pub type SharedRegistry = Arc<Mutex<ClientRegistry>>;

/// Capacity-bounded set of active connections, ordered by identity
#[derive(Debug)]
pub struct ClientRegistry {
    clients: BTreeMap<ConnectionId, Connection>,
    capacity: usize,
}

impl ClientRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            clients: BTreeMap::new(),
            capacity,
        }
    }

    /// Build an empty registry already wrapped for sharing across tasks
    pub fn shared(capacity: usize) -> SharedRegistry {
        Arc::new(Mutex::new(Self::new(capacity)))
    }

    /// Insert `connection` unless the registry is full or already holds its id.
    pub fn register(&mut self, connection: Connection) -> Registration {
        if self.clients.len() >= self.capacity {
            return Registration::Rejected {
                reason: RejectReason::Full,
                connection,
            };
        }

        if self.clients.contains_key(&connection.id()) {
            return Registration::Rejected {
                reason: RejectReason::DuplicateIdentity,
                connection,
            };
        }

        self.clients.insert(connection.id(), connection.clone());

        Registration::Accepted {
            connection,
            active: self.clients.len(),
        }
    }

    /// Remove `id`. Removing an absent id is a no-op and returns `None`.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        self.clients.remove(&id)
    }

    /// Point-in-time handles of every connection except `origin`, in id order
    pub fn snapshot_others(&self, origin: ConnectionId) -> Vec<Connection> {
        self.clients
            .iter()
            .filter(|(id, _)| **id != origin)
            .map(|(_, connection)| connection.clone())
            .collect()
    }

    /// Empty the registry, handing every connection to the caller for closing
    pub fn drain(&mut self) -> Vec<Connection> {
        std::mem::take(&mut self.clients).into_values().collect()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.clients.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
