//! Connection result types
//!
//! Defines result structures returned by registry and worker operations.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use crate::connection::{Connection, ConnectionId};

/// Why a registration was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Full,
    DuplicateIdentity,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Full => write!(f, "registry full"),
            RejectReason::DuplicateIdentity => write!(f, "duplicate identity"),
        }
    }
}

/// Outcome of `ClientRegistry::register`.
///
/// Both variants hand the connection handle back: on acceptance the registry
/// keeps its own clone, on rejection the caller is the sole owner and must
/// notify and close it.
#[derive(Debug)]
pub enum Registration {
    Accepted { connection: Connection, active: usize },
    Rejected { reason: RejectReason, connection: Connection },
}

impl Registration {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Registration::Accepted { .. })
    }
}

/// Why a worker left its read loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    PeerClosed,
    ReadError(io::ErrorKind),
    /// Shutdown, or eviction after a failed broadcast write
    ClosedByServer,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::PeerClosed => write!(f, "peer closed the connection"),
            DisconnectReason::ReadError(kind) => write!(f, "read error ({:?})", kind),
            DisconnectReason::ClosedByServer => write!(f, "closed by server"),
        }
    }
}

/// What a finished worker reports back to the supervisor
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    pub reason: DisconnectReason,
    pub messages_relayed: u64,
    pub bytes_relayed: u64,
    pub duration: Duration,
}
