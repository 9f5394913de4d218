//! Utility functions
//!
//! Logging setup and lifecycle log helpers.

pub mod logging;

pub use logging::{log_connection, log_disconnect, log_rejection, setup_logging};
