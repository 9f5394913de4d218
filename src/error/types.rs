//! Error types
//!
//! Process-level errors for startup and lifecycle, and per-connection errors
//! that stay inside the worker owning the connection.

use std::fmt;
use std::io;

/// Errors local to one connection. They never cross a task boundary.
#[derive(Debug)]
pub enum ConnectionError {
    ReadFailed(io::Error),
    WriteFailed(io::Error),
    WriteTimedOut,
    Closed,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::ReadFailed(e) => write!(f, "Read failed: {}", e),
            ConnectionError::WriteFailed(e) => write!(f, "Write failed: {}", e),
            ConnectionError::WriteTimedOut => write!(f, "Write timed out"),
            ConnectionError::Closed => write!(f, "Connection already closed"),
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectionError::ReadFailed(e) | ConnectionError::WriteFailed(e) => Some(e),
            _ => None,
        }
    }
}

/// General relay server error
#[derive(Debug)]
pub enum RelayError {
    Config(config::ConfigError),
    Bind { addr: String, source: io::Error },
    Io(io::Error),
    Signal(io::Error),
}

impl RelayError {
    /// Startup errors abort the process; the rest are reported and survived.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RelayError::Config(_) | RelayError::Bind { .. })
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Config(e) => write!(f, "Configuration error: {}", e),
            RelayError::Bind { addr, source } => {
                write!(f, "Failed to bind to {}: {}", addr, source)
            }
            RelayError::Io(e) => write!(f, "I/O error: {}", e),
            RelayError::Signal(e) => write!(f, "Signal handler error: {}", e),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Config(e) => Some(e),
            RelayError::Bind { source, .. } => Some(source),
            RelayError::Io(e) | RelayError::Signal(e) => Some(e),
        }
    }
}

impl From<config::ConfigError> for RelayError {
    fn from(error: config::ConfigError) -> Self {
        RelayError::Config(error)
    }
}

impl From<io::Error> for RelayError {
    fn from(error: io::Error) -> Self {
        RelayError::Io(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_errors_are_fatal() {
        let bind = RelayError::Bind {
            addr: "0.0.0.0:8888".into(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(bind.is_fatal());
        assert!(bind.to_string().contains("0.0.0.0:8888"));

        let io = RelayError::from(io::Error::other("accept"));
        assert!(!io.is_fatal());
    }
}
