//! Server lifecycle control
//!
//! A cloneable handle over the running flag and the published lifecycle
//! state. The binary hands one to the signal listener; tests use one to stop
//! a server and wait for it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};
use tokio::sync::{Notify, watch};

/// Lifecycle of the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Starting,
    Listening,
    ShuttingDown,
    Stopped,
}

struct Control {
    running: AtomicBool,
    wake: Notify,
    state: watch::Sender<ServerState>,
}

#[derive(Clone)]
pub struct ServerHandle {
    inner: Arc<Control>,
}

impl ServerHandle {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(ServerState::Starting);
        Self {
            inner: Arc::new(Control {
                running: AtomicBool::new(true),
                wake: Notify::new(),
                state,
            }),
        }
    }

    /// Ask the server to stop. Safe to call any number of times.
    pub fn shutdown(&self) {
        if self.inner.running.swap(false, Ordering::AcqRel) {
            info!("Shutdown requested");
            self.inner.wake.notify_one();
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ServerState {
        *self.inner.state.borrow()
    }

    /// Resolve once the server reaches `Stopped`
    pub async fn wait_stopped(&self) {
        let mut state = self.inner.state.subscribe();
        let _ = state.wait_for(|s| *s == ServerState::Stopped).await;
    }

    /// Resolve when `shutdown` is called; the accept loop waits on this.
    pub(crate) async fn shutdown_requested(&self) {
        self.inner.wake.notified().await;
    }

    pub(crate) fn set_state(&self, state: ServerState) {
        debug!("Server state -> {:?}", state);
        self.inner.state.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn shutdown_is_idempotent_and_wakes_waiter() {
        let handle = ServerHandle::new();
        assert!(handle.is_running());
        assert_eq!(handle.state(), ServerState::Starting);

        handle.shutdown();
        handle.shutdown();
        assert!(!handle.is_running());

        // Permit survives even though nobody was waiting yet
        tokio::time::timeout(Duration::from_secs(1), handle.shutdown_requested())
            .await
            .expect("shutdown wake-up was lost");
    }

    #[tokio::test]
    async fn wait_stopped_observes_state_change() {
        let handle = ServerHandle::new();
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.wait_stopped().await })
        };

        handle.set_state(ServerState::ShuttingDown);
        handle.set_state(ServerState::Stopped);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(handle.state(), ServerState::Stopped);
    }
}
