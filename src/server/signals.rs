//! Signal handling for graceful server shutdown.

use log::info;
use tokio::signal;

use crate::error::RelayError;

/// Wait for SIGINT or SIGTERM (Ctrl+C on Windows).
///
/// Returns an error only if the signal handlers could not be installed.
pub async fn wait_for_shutdown_signal() -> Result<(), RelayError> {
    #[cfg(unix)]
    {
        use signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt()).map_err(RelayError::Signal)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(RelayError::Signal)?;

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.map_err(RelayError::Signal)?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
