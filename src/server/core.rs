//! Server supervisor
//!
//! Owns the listener, the client registry and the worker tasks. Moves through
//! `Starting -> Listening -> ShuttingDown -> Stopped`.

use futures::future::join_all;
use log::{debug, error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinError, JoinSet};

use crate::config::ServerConfig;
use crate::connection::{
    ClientRegistry, Connection, ConnectionId, ConnectionWorker, Registration, SessionSummary,
    SharedRegistry,
};
use crate::error::RelayError;
use crate::protocol::SERVER_FULL_NOTICE;
use crate::relay::Broadcaster;
use crate::server::control::{ServerHandle, ServerState};
use crate::utils::{log_connection, log_disconnect, log_rejection};

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// How long a rejected peer gets to close its side after the notice
const REJECT_LINGER: Duration = Duration::from_millis(500);

/// What the shutdown phase did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownSummary {
    pub connections_closed: usize,
    pub workers_joined: usize,
    pub workers_aborted: usize,
}

enum LoopEvent {
    ShutdownRequested,
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    WorkerExited(Result<SessionSummary, JoinError>),
    RejectionDone,
}

pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    registry: SharedRegistry,
    broadcaster: Broadcaster,
    handle: ServerHandle,
    config: Arc<ServerConfig>,
    next_id: u64,
    workers: JoinSet<SessionSummary>,
    rejections: JoinSet<()>,
}

impl Server {
    /// Bind the listening socket. Failure here is fatal for the process.
    pub async fn bind(config: ServerConfig) -> Result<Self, RelayError> {
        config.validate()?;
        let handle = ServerHandle::new();

        let addr = config.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RelayError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!("Server bound to {}", local_addr);

        let registry = ClientRegistry::shared(config.max_clients);
        let broadcaster = Broadcaster::new(Arc::clone(&registry), config.write_timeout());
        handle.set_state(ServerState::Listening);

        Ok(Self {
            listener,
            local_addr,
            registry,
            broadcaster,
            handle,
            config: Arc::new(config),
            next_id: 0,
            workers: JoinSet::new(),
            rejections: JoinSet::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle for requesting shutdown and observing the lifecycle
    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    /// Run the accept loop until shutdown is requested, then tear down.
    pub async fn run(mut self) -> ShutdownSummary {
        info!(
            "Starting chat relay on {} (max {} clients)",
            self.local_addr, self.config.max_clients
        );

        while self.handle.is_running() {
            let event = tokio::select! {
                _ = self.handle.shutdown_requested() => LoopEvent::ShutdownRequested,
                accepted = self.listener.accept() => LoopEvent::Accepted(accepted),
                Some(joined) = self.workers.join_next(), if !self.workers.is_empty() => {
                    LoopEvent::WorkerExited(joined)
                }
                Some(_) = self.rejections.join_next(), if !self.rejections.is_empty() => {
                    LoopEvent::RejectionDone
                }
            };

            match event {
                LoopEvent::ShutdownRequested => break,
                LoopEvent::Accepted(Ok((stream, peer_addr))) => self.admit(stream, peer_addr).await,
                LoopEvent::Accepted(Err(e)) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
                LoopEvent::WorkerExited(joined) => log_worker_exit(joined),
                LoopEvent::RejectionDone => {}
            }
        }

        self.shutdown().await
    }

    /// Register a freshly accepted stream and spawn its worker, or turn it away.
    async fn admit(&mut self, stream: TcpStream, peer_addr: SocketAddr) {
        self.next_id += 1;
        let id = ConnectionId::new(self.next_id);

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY for {}: {}", peer_addr, e);
        }

        let (reader, writer) = stream.into_split();
        let connection = Connection::new(id, peer_addr, writer);
        let registration = self.registry.lock().await.register(connection);

        match registration {
            Registration::Accepted { connection, active } => {
                log_connection(&connection, active, self.config.max_clients);

                let worker = ConnectionWorker::new(
                    connection,
                    reader,
                    Arc::clone(&self.registry),
                    self.broadcaster.clone(),
                    self.config.max_message_size(),
                );
                self.workers.spawn(worker.run());
            }
            Registration::Rejected { reason, connection } => {
                log_rejection(&connection, reason);
                self.rejections
                    .spawn(reject(connection, reader, self.config.write_timeout()));
            }
        }
    }

    async fn shutdown(mut self) -> ShutdownSummary {
        self.handle.set_state(ServerState::ShuttingDown);
        info!("Shutting down chat relay...");

        // Drained connections are closed here and only here; a worker that
        // finds itself already removed leaves the close to us.
        let drained = self.registry.lock().await.drain();
        let connections_closed = drained.len();
        close_all(&drained).await;
        drop(drained);
        info!("Closed {} client connection(s)", connections_closed);

        let grace = self.config.shutdown_grace();
        let mut workers_joined = 0;
        let workers = &mut self.workers;
        let joined_all = tokio::time::timeout(grace, async {
            while let Some(joined) = workers.join_next().await {
                log_worker_exit(joined);
                workers_joined += 1;
            }
        })
        .await
        .is_ok();

        let mut workers_aborted = 0;
        if !joined_all {
            workers_aborted = self.workers.len();
            warn!(
                "{} worker(s) still running after {:?}, aborting",
                workers_aborted, grace
            );
            self.workers.shutdown().await;
        }

        self.rejections.shutdown().await;
        drop(self.listener);

        self.handle.set_state(ServerState::Stopped);
        info!("Chat relay stopped");

        ShutdownSummary {
            connections_closed,
            workers_joined,
            workers_aborted,
        }
    }
}

/// Send the capacity notice, close, and give the peer a moment to hang up so
/// unread input does not turn the close into a reset.
/// Close every connection at once; a close can wait behind an in-flight write
async fn close_all(connections: &[Connection]) {
    join_all(connections.iter().map(Connection::close)).await;
}

async fn reject(connection: Connection, mut reader: OwnedReadHalf, timeout: Duration) {
    if let Err(e) = connection.send(SERVER_FULL_NOTICE.as_bytes(), timeout).await {
        debug!(
            "Could not deliver full notice to {}: {}",
            connection.peer_addr(),
            e
        );
    }
    connection.close().await;

    let mut sink = [0u8; 256];
    let drain = async {
        while let Ok(n) = reader.read(&mut sink).await {
            if n == 0 {
                break;
            }
        }
    };
    let _ = tokio::time::timeout(REJECT_LINGER, drain).await;
}

fn log_worker_exit(joined: Result<SessionSummary, JoinError>) {
    match joined {
        Ok(summary) => log_disconnect(&summary),
        Err(e) if e.is_panic() => error!("Connection worker panicked: {}", e),
        Err(e) => debug!("Connection worker cancelled: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn close_all_does_not_serialize_behind_stuck_writes() {
        let write_timeout = Duration::from_millis(400);
        let mut connections = Vec::new();
        let mut peers = Vec::new();
        let mut sends = Vec::new();

        for id in 1..=3u64 {
            // Never read, so the pending send holds the writer until it times out
            let (server_end, client_end) = tokio::io::duplex(4);
            let addr: SocketAddr = format!("127.0.0.1:{}", 42000 + id).parse().unwrap();
            let connection = Connection::new(ConnectionId::new(id), addr, server_end);

            let sender = connection.clone();
            sends.push(tokio::spawn(async move {
                sender.send(b"more than four bytes", write_timeout).await
            }));
            connections.push(connection);
            peers.push(client_end);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        close_all(&connections).await;
        assert!(started.elapsed() < write_timeout * 2);
        assert!(connections.iter().all(Connection::is_closed));

        for send in sends {
            assert!(send.await.unwrap().is_err());
        }
    }
}
