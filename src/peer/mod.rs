//! Client-facing interface
//!
//! What a front-end needs to take part in a chat: connect to the relay, send
//! bytes, and receive whatever other peers sent.

pub mod session;

pub use session::{PeerReceiver, PeerSender, PeerSession, Received};
