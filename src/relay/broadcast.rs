//! Broadcast engine
//!
//! Delivery is best effort. Recipients come from a registry snapshot taken
//! under the lock; the writes happen after the lock is released, so a slow
//! peer never stalls registration or removal. Writes to all recipients run
//! concurrently, and a recipient whose write fails or times out is evicted
//! so it cannot hold up later broadcasts.

use std::time::Duration;

use futures::future::join_all;
use log::debug;

use crate::connection::{Connection, ConnectionId, SharedRegistry};
use crate::error::ConnectionError;

/// Per-broadcast delivery tally
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Recipients whose write failed; each was evicted from the registry
    pub failed: Vec<ConnectionId>,
}

impl BroadcastReport {
    pub fn recipients(&self) -> usize {
        self.delivered + self.failed.len()
    }
}

#[derive(Clone)]
pub struct Broadcaster {
    registry: SharedRegistry,
    write_timeout: Duration,
}

impl Broadcaster {
    pub fn new(registry: SharedRegistry, write_timeout: Duration) -> Self {
        Self {
            registry,
            write_timeout,
        }
    }

    /// Write `payload` unmodified to every registered connection except `origin`.
    ///
    /// A failed or timed-out write never stops delivery to the remaining
    /// recipients. The failing recipient is removed and closed, which also
    /// ends its worker.
    pub async fn broadcast(&self, payload: &[u8], origin: ConnectionId) -> BroadcastReport {
        let recipients = self.registry.lock().await.snapshot_others(origin);
        if recipients.is_empty() {
            return BroadcastReport::default();
        }

        let sends = recipients.iter().map(|recipient| async move {
            let outcome = recipient.send(payload, self.write_timeout).await;
            (recipient, outcome)
        });

        let mut report = BroadcastReport::default();
        for (recipient, outcome) in join_all(sends).await {
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(
                        "Dropped {} bytes from {} to {} ({}): {}",
                        payload.len(),
                        origin,
                        recipient.id(),
                        recipient.peer_addr(),
                        e
                    );
                    self.evict(recipient, &e).await;
                    report.failed.push(recipient.id());
                }
            }
        }

        report
    }

    /// Remove a recipient that could not keep up. Whoever removes it from the
    /// registry owns the close, so a racing worker or shutdown never closes it
    /// twice.
    async fn evict(&self, recipient: &Connection, cause: &ConnectionError) {
        let removed = self.registry.lock().await.remove(recipient.id());
        if let Some(connection) = removed {
            debug!("Evicting {} ({}): {}", connection.id(), connection.peer_addr(), cause);
            connection.close().await;
        }
    }
}
