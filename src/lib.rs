pub mod config;
pub mod connection;
pub mod error;
pub mod peer;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod utils;

pub use crate::config::ServerConfig;
pub use server::{Server, ServerHandle, ServerState};
