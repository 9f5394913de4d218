//! Configuration management for the chat relay
//!
//! Settings are layered: built-in defaults, then an optional `config.toml`,
//! then `CHAT_RELAY_*` environment variables.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8888;
const DEFAULT_MAX_CLIENTS: usize = 10;
const DEFAULT_BUFFER_SIZE: usize = 1024;
const DEFAULT_WRITE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5_000;

/// Server configuration, loaded once at startup.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// IP address the listener binds to
    pub bind_address: String,

    /// Listening port. `0` asks the OS for an ephemeral port.
    pub port: u16,

    /// Maximum number of concurrently registered connections
    /// Environment: CHAT_RELAY_MAX_CLIENTS
    pub max_clients: usize,

    /// Per-connection read buffer. One byte is reserved, so a single relayed
    /// unit is at most `buffer_size - 1` bytes.
    pub buffer_size: usize,

    /// Upper bound for one write to one recipient during a broadcast
    pub write_timeout_ms: u64,

    /// How long shutdown waits for workers before aborting them
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            max_clients: DEFAULT_MAX_CLIENTS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from config.toml (if present) with environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        // Packaged layout first, then the working directory
        let settings = Self::defaults()?
            .add_source(File::with_name("chat-relay/config").required(false))
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("CHAT_RELAY").try_parsing(true))
            .build()?;

        Self::from_settings(settings)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("bind_address", DEFAULT_BIND_ADDRESS)?
            .set_default("port", i64::from(DEFAULT_PORT))?
            .set_default("max_clients", DEFAULT_MAX_CLIENTS as i64)?
            .set_default("buffer_size", DEFAULT_BUFFER_SIZE as i64)?
            .set_default("write_timeout_ms", DEFAULT_WRITE_TIMEOUT_MS as i64)?
            .set_default("shutdown_grace_ms", DEFAULT_SHUTDOWN_GRACE_MS as i64)
    }

    fn from_settings(settings: Config) -> Result<Self, ConfigError> {
        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::Message("bind_address cannot be empty".into()));
        }

        if self.bind_address.parse::<IpAddr>().is_err() {
            return Err(ConfigError::Message(format!(
                "bind_address is not a valid IP address: {}",
                self.bind_address
            )));
        }

        if self.max_clients == 0 {
            return Err(ConfigError::Message(
                "max_clients must be greater than 0".into(),
            ));
        }

        if self.buffer_size < 2 {
            return Err(ConfigError::Message(
                "buffer_size must be at least 2 bytes".into(),
            ));
        }

        if self.write_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "write_timeout_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Bind address and port as a `SocketAddr`
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = self
            .bind_address
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::Message(format!("invalid bind_address: {e}")))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Largest payload relayed from a single read
    pub fn max_message_size(&self) -> usize {
        self.buffer_size.saturating_sub(1).max(1)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
