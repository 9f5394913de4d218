//! Relay
//!
//! Fans a payload out from its origin connection to every other registered
//! connection.

pub mod broadcast;

pub use broadcast::{BroadcastReport, Broadcaster};
