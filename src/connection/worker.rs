//! Connection worker
//!
//! One task per registered connection. Reads up to the configured message
//! size, relays each read as one unit, and deregisters itself on end of
//! stream, read error, or when the supervisor closes the connection.

use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::connection::results::{DisconnectReason, SessionSummary};
use crate::connection::{Connection, SharedRegistry};
use crate::error::ConnectionError;
use crate::relay::Broadcaster;

pub struct ConnectionWorker<R> {
    connection: Connection,
    reader: R,
    registry: SharedRegistry,
    broadcaster: Broadcaster,
    max_message_size: usize,
}

impl<R> ConnectionWorker<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(
        connection: Connection,
        reader: R,
        registry: SharedRegistry,
        broadcaster: Broadcaster,
        max_message_size: usize,
    ) -> Self {
        Self {
            connection,
            reader,
            registry,
            broadcaster,
            max_message_size: max_message_size.max(1),
        }
    }

    /// Drive the read loop until the connection closes.
    ///
    /// Errors never escape: whatever ends the loop is folded into the
    /// returned summary.
    pub async fn run(mut self) -> SessionSummary {
        let id = self.connection.id();
        let peer_addr = self.connection.peer_addr();
        let close_signal = self.connection.close_signal();
        let mut buffer = vec![0u8; self.max_message_size];
        let mut messages_relayed = 0u64;
        let mut bytes_relayed = 0u64;

        let reason = loop {
            let read = tokio::select! {
                _ = close_signal.notified() => None,
                read = self.reader.read(&mut buffer) => Some(read),
            };

            match read {
                None => break DisconnectReason::ClosedByServer,
                Some(Ok(0)) => break DisconnectReason::PeerClosed,
                Some(Ok(n)) => {
                    let payload = &buffer[..n];
                    debug!(
                        "Received from {} ({}): {}",
                        id,
                        peer_addr,
                        String::from_utf8_lossy(payload)
                    );

                    let report = self.broadcaster.broadcast(payload, id).await;
                    if !report.failed.is_empty() {
                        debug!(
                            "Relay from {} reached {}/{} peers",
                            id,
                            report.delivered,
                            report.recipients()
                        );
                    }

                    messages_relayed += 1;
                    bytes_relayed += n as u64;
                }
                Some(Err(e)) => {
                    let kind = e.kind();
                    warn!(
                        "Dropping {} ({}): {}",
                        id,
                        peer_addr,
                        ConnectionError::ReadFailed(e)
                    );
                    break DisconnectReason::ReadError(kind);
                }
            }
        };

        self.deregister().await;

        SessionSummary {
            id,
            peer_addr,
            reason,
            messages_relayed,
            bytes_relayed,
            duration: self.connection.age(),
        }
    }

    /// Remove this connection from the registry and close it, unless the
    /// supervisor already drained it (it then owns the close).
    async fn deregister(&self) {
        let removed = self.registry.lock().await.remove(self.connection.id());
        if let Some(connection) = removed {
            connection.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ClientRegistry, ConnectionId};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, DuplexStream};

    const TIMEOUT: Duration = Duration::from_secs(1);

    struct Peer {
        client: DuplexStream,
        worker: ConnectionWorker<tokio::io::ReadHalf<DuplexStream>>,
        connection: Connection,
    }

    async fn peer(registry: &SharedRegistry, id: u64, max_message_size: usize) -> Peer {
        let (server_end, client) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(server_end);
        let addr: SocketAddr = format!("127.0.0.1:{}", 41000 + id).parse().unwrap();
        let connection = Connection::new(ConnectionId::new(id), addr, writer);
        assert!(
            registry
                .lock()
                .await
                .register(connection.clone())
                .is_accepted()
        );

        let broadcaster = Broadcaster::new(Arc::clone(registry), TIMEOUT);
        let worker = ConnectionWorker::new(
            connection.clone(),
            reader,
            Arc::clone(registry),
            broadcaster,
            max_message_size,
        );
        Peer {
            client,
            worker,
            connection,
        }
    }

    async fn read_once(end: &mut DuplexStream) -> Vec<u8> {
        let mut buf = [0u8; 4096];
        let n = tokio::time::timeout(TIMEOUT, end.read(&mut buf))
            .await
            .expect("nothing relayed")
            .unwrap();
        buf[..n].to_vec()
    }

    #[tokio::test]
    async fn relays_reads_and_deregisters_on_eof() {
        let registry = ClientRegistry::shared(4);
        let a = peer(&registry, 1, 1023).await;
        let mut b = peer(&registry, 2, 1023).await;

        let worker = tokio::spawn(a.worker.run());
        let mut a_client = a.client;

        a_client.write_all(b"hello").await.unwrap();
        assert_eq!(read_once(&mut b.client).await, b"hello");

        drop(a_client);
        let summary = tokio::time::timeout(TIMEOUT, worker).await.unwrap().unwrap();

        assert_eq!(summary.reason, DisconnectReason::PeerClosed);
        assert_eq!(summary.messages_relayed, 1);
        assert_eq!(summary.bytes_relayed, 5);
        assert!(a.connection.is_closed());

        let guard = registry.lock().await;
        assert_eq!(guard.len(), 1);
        assert!(guard.contains(ConnectionId::new(2)));
    }

    #[tokio::test]
    async fn oversized_writes_are_split_at_message_size() {
        let registry = ClientRegistry::shared(4);
        let a = peer(&registry, 1, 4).await;
        let mut b = peer(&registry, 2, 4).await;

        let worker = tokio::spawn(a.worker.run());
        let mut a_client = a.client;
        a_client.write_all(b"abcdefgh").await.unwrap();

        let mut relayed = Vec::new();
        while relayed.len() < 8 {
            relayed.extend(read_once(&mut b.client).await);
        }
        assert_eq!(relayed, b"abcdefgh");

        drop(a_client);
        let summary = worker.await.unwrap();
        // Two reads of at most 4 bytes each
        assert_eq!(summary.messages_relayed, 2);
        assert_eq!(summary.bytes_relayed, 8);
    }

    /// Reader whose next read fails with a connection reset
    struct ResetReader;

    impl AsyncRead for ResetReader {
        fn poll_read(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Err(std::io::ErrorKind::ConnectionReset.into()))
        }
    }

    #[tokio::test]
    async fn read_error_deregisters_and_closes() {
        let registry = ClientRegistry::shared(4);
        let (server_end, mut client) = tokio::io::duplex(64);
        let addr: SocketAddr = "127.0.0.1:41009".parse().unwrap();
        let connection = Connection::new(ConnectionId::new(9), addr, server_end);
        assert!(
            registry
                .lock()
                .await
                .register(connection.clone())
                .is_accepted()
        );
        let _other = peer(&registry, 2, 1023).await;

        let broadcaster = Broadcaster::new(Arc::clone(&registry), TIMEOUT);
        let worker = ConnectionWorker::new(
            connection.clone(),
            ResetReader,
            Arc::clone(&registry),
            broadcaster,
            1023,
        );
        let summary = tokio::time::timeout(TIMEOUT, worker.run()).await.unwrap();

        assert_eq!(
            summary.reason,
            DisconnectReason::ReadError(std::io::ErrorKind::ConnectionReset)
        );
        assert_eq!(summary.messages_relayed, 0);
        assert!(connection.is_closed());

        let guard = registry.lock().await;
        assert!(!guard.contains(ConnectionId::new(9)));
        assert!(guard.contains(ConnectionId::new(2)));
        drop(guard);

        let mut buf = [0u8; 8];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn close_from_supervisor_stops_worker_without_double_close() {
        let registry = ClientRegistry::shared(4);
        let a = peer(&registry, 1, 1023).await;
        let worker = tokio::spawn(a.worker.run());

        // Supervisor path: drain, then close what was drained
        let drained = registry.lock().await.drain();
        for connection in &drained {
            connection.close().await;
        }

        let summary = tokio::time::timeout(TIMEOUT, worker).await.unwrap().unwrap();
        assert_eq!(summary.reason, DisconnectReason::ClosedByServer);
        assert!(registry.lock().await.is_empty());

        // Client side sees end of stream
        let mut client = a.client;
        let mut buf = [0u8; 8];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
    }
}
