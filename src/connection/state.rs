//! Module `state`
//!
//! Defines `Connection`, the shared handle to one accepted peer. The read side
//! of the socket is owned by the connection's worker; the handle carries the
//! write side so the broadcast engine and the supervisor can reach the peer.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::debug;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, Notify};

use crate::error::ConnectionError;

/// Write side of a peer connection
pub type PeerWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Opaque identity of an accepted connection.
///
/// Assigned by the supervisor in accept order, so ordering by id is ordering
/// by registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Cloneable handle to one accepted peer.
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    connected_at: Instant,
    writer: Arc<Mutex<PeerWriter>>,
    close_signal: Arc<Notify>,
    closed: Arc<AtomicBool>,
}

impl Connection {
    pub fn new<W>(id: ConnectionId, peer_addr: SocketAddr, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            id,
            peer_addr,
            connected_at: Instant::now(),
            writer: Arc::new(Mutex::new(Box::new(writer))),
            close_signal: Arc::new(Notify::new()),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    // --------------------
    // Getter methods
    // --------------------

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Time since the connection was accepted
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Signal the worker waits on next to its read; fired by `close`.
    pub fn close_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.close_signal)
    }

    // --------------------
    // I/O
    // --------------------

    /// Write `payload` verbatim, bounded by `timeout`.
    pub async fn send(&self, payload: &[u8], timeout: Duration) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }

        let write = async {
            let mut writer = self.writer.lock().await;
            writer.write_all(payload).await?;
            writer.flush().await
        };

        match tokio::time::timeout(timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::WriteFailed(e)),
            Err(_) => Err(ConnectionError::WriteTimedOut),
        }
    }

    /// Close the connection: wake its worker and shut down the write side.
    ///
    /// Only the first call does anything. The socket is released once the
    /// worker drops the read side and the last handle goes away.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        // notify_one keeps a permit if the worker is not parked yet
        self.close_signal.notify_one();

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!("Shutdown of {} ({}) failed: {}", self.id, self.peer_addr, e);
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
