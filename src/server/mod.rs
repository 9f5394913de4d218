//! Server core functionality
//!
//! The supervisor owning the listener and registry, its lifecycle handle, and
//! signal handling.

pub mod control;
pub mod core;
pub mod signals;

pub use control::{ServerHandle, ServerState};
pub use self::core::{Server, ShutdownSummary};
pub use signals::wait_for_shutdown_signal;
