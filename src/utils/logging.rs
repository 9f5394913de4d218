//! Logging utilities
//!
//! Logger setup plus the connection lifecycle lines shared by the supervisor
//! and its workers.

use env_logger::Env;
use log::{info, warn};

use crate::connection::{Connection, DisconnectReason, RejectReason, SessionSummary};

/// Setup logging. `RUST_LOG` wins over `default_filter`.
pub fn setup_logging(default_filter: &str) {
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();
}

/// Log a registered connection
pub fn log_connection(connection: &Connection, active: usize, capacity: usize) {
    info!(
        "New client connected: {} from {} ({}/{} clients)",
        connection.id(),
        connection.peer_addr(),
        active,
        capacity
    );
}

/// Log a connection turned away at accept time
pub fn log_rejection(connection: &Connection, reason: RejectReason) {
    warn!(
        "Rejected client {} from {}: {}",
        connection.id(),
        connection.peer_addr(),
        reason
    );
}

/// Log the end of a worker's session
pub fn log_disconnect(summary: &SessionSummary) {
    let line = format!(
        "Client {} ({}) disconnected: {} after {:.1?}, relayed {} message(s), {} byte(s)",
        summary.id,
        summary.peer_addr,
        summary.reason,
        summary.duration,
        summary.messages_relayed,
        summary.bytes_relayed
    );

    match summary.reason {
        DisconnectReason::ReadError(_) => warn!("{}", line),
        _ => info!("{}", line),
    }
}
