//! Chat relay - Entry Point
//!
//! Relays every message a client sends to all other connected clients.

use log::{error, info};
use std::process::ExitCode;

use tcp_chat_relay::config::ServerConfig;
use tcp_chat_relay::error::{RelayError, handle_error};
use tcp_chat_relay::server::{Server, wait_for_shutdown_signal};
use tcp_chat_relay::utils::setup_logging;

#[tokio::main]
async fn main() -> ExitCode {
    // env_logger picks up RUST_LOG, defaulting to info
    setup_logging("info");

    info!("Launching chat relay...");

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            handle_error(&RelayError::from(e));
            return ExitCode::FAILURE;
        }
    };

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            handle_error(&e);
            return ExitCode::FAILURE;
        }
    };

    let handle = server.handle();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!("Signal handling unavailable, stopping: {}", e);
        }
        handle.shutdown();
    });

    let summary = server.run().await;
    info!(
        "Closed {} connection(s); {} worker(s) joined, {} aborted",
        summary.connections_closed, summary.workers_joined, summary.workers_aborted
    );

    ExitCode::SUCCESS
}
