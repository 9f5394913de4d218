//! Error handlers
//!
//! Reports errors that reach the top of the process.

use crate::error::types::RelayError;
use log::{error, warn};

/// Log a relay server error with the severity it deserves
pub fn handle_error(err: &RelayError) {
    if err.is_fatal() {
        error!("Chat relay fatal error: {}", err);
    } else {
        warn!("Chat relay error: {}", err);
    }
}
