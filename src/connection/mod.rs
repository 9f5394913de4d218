//! Connection management
//!
//! Per-peer connection handles, the capacity-bounded registry of active
//! connections, and the worker task that drives one connection's read loop.

pub mod registry;
pub mod results;
pub mod state;
pub mod worker;

pub use registry::{ClientRegistry, SharedRegistry};
pub use results::{DisconnectReason, RejectReason, Registration, SessionSummary};
pub use state::{Connection, ConnectionId};
pub use worker::ConnectionWorker;
