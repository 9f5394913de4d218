//! Peer session
//!
//! A thin wrapper over one TCP stream to the relay. Receives mirror the
//! server's unit of relay: one read, at most `max_message_size` bytes.

use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

/// Default receive size: the server's 1024-byte buffer minus the reserved byte
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1023;

/// Result of one receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Message(Vec<u8>),
    Disconnected,
}

impl Received {
    /// Lossy text view of a message; `None` once disconnected
    pub fn text(&self) -> Option<String> {
        match self {
            Received::Message(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            Received::Disconnected => None,
        }
    }
}

pub struct PeerSession {
    sender: PeerSender,
    receiver: PeerReceiver,
}

impl PeerSession {
    /// Connect to the relay at `endpoint`
    pub async fn connect<A: ToSocketAddrs>(endpoint: A) -> io::Result<Self> {
        let stream = TcpStream::connect(endpoint).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            sender: PeerSender { inner: write_half },
            receiver: PeerReceiver {
                inner: read_half,
                buffer: vec![0u8; DEFAULT_MAX_MESSAGE_SIZE],
            },
        })
    }

    pub async fn send(&mut self, payload: &[u8]) -> io::Result<()> {
        self.sender.send(payload).await
    }

    pub async fn receive(&mut self) -> io::Result<Received> {
        self.receiver.receive().await
    }

    /// Split for concurrent sending and receiving
    pub fn into_split(self) -> (PeerSender, PeerReceiver) {
        (self.sender, self.receiver)
    }
}

pub struct PeerSender {
    inner: OwnedWriteHalf,
}

impl PeerSender {
    pub async fn send(&mut self, payload: &[u8]) -> io::Result<()> {
        self.inner.write_all(payload).await?;
        self.inner.flush().await
    }

    /// Close the write side; the server sees end of stream.
    pub async fn close(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }
}

pub struct PeerReceiver {
    inner: OwnedReadHalf,
    buffer: Vec<u8>,
}

impl PeerReceiver {
    pub async fn receive(&mut self) -> io::Result<Received> {
        match self.inner.read(&mut self.buffer).await {
            Ok(0) => Ok(Received::Disconnected),
            Ok(n) => Ok(Received::Message(self.buffer[..n].to_vec())),
            Err(e) if is_disconnect(&e) => Ok(Received::Disconnected),
            Err(e) => Err(e),
        }
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn send_and_receive_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let echo = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(&buf[..n]).await.unwrap();
        });

        let mut session = PeerSession::connect(addr).await.unwrap();
        session.send(b"ping").await.unwrap();
        let received = session.receive().await.unwrap();
        assert_eq!(received, Received::Message(b"ping".to_vec()));
        assert_eq!(received.text().as_deref(), Some("ping"));

        echo.await.unwrap();
        assert_eq!(session.receive().await.unwrap(), Received::Disconnected);
    }
}
