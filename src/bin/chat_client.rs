//! Terminal chat client
//!
//! Connects to a relay, announces itself, sends each typed line as
//! `<name>: <text>`, and prints everything other peers send.

use std::io::BufRead;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::{error, warn};
use tokio::sync::mpsc;

use tcp_chat_relay::peer::session::DEFAULT_MAX_MESSAGE_SIZE;
use tcp_chat_relay::peer::{PeerSession, Received};
use tcp_chat_relay::protocol::{
    DISCONNECTED_NOTICE, MAX_USERNAME_LEN, chat_line, join_notice, leave_notice, truncate_utf8,
};
use tcp_chat_relay::utils::setup_logging;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Relay server IP address
    server_ip: String,
    /// Name shown to the other peers
    username: String,
    /// Relay server port
    #[arg(short, long, default_value_t = 8888)]
    port: u16,
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging("warn");
    let args = Args::parse();

    let username = truncate_utf8(args.username.trim(), MAX_USERNAME_LEN).to_string();
    if username.is_empty() {
        error!("Username cannot be empty");
        return ExitCode::FAILURE;
    }

    let session = match PeerSession::connect((args.server_ip.as_str(), args.port)).await {
        Ok(session) => session,
        Err(e) => {
            error!(
                "Failed to connect to server {}:{}: {}",
                args.server_ip, args.port, e
            );
            return ExitCode::FAILURE;
        }
    };
    let (mut sender, mut receiver) = session.into_split();

    if let Err(e) = sender.send(join_notice(&username).as_bytes()).await {
        error!("Failed to send join notice: {}", e);
        return ExitCode::FAILURE;
    }

    let mut receive_task = tokio::spawn(async move {
        loop {
            match receiver.receive().await {
                Ok(Received::Message(bytes)) => println!("{}", String::from_utf8_lossy(&bytes)),
                Ok(Received::Disconnected) => {
                    println!("{}", DISCONNECTED_NOTICE);
                    break;
                }
                Err(e) => {
                    error!("Receive failed: {}", e);
                    break;
                }
            }
        }
    });

    println!("Chat started. Type your messages and press Enter. Use Ctrl+C to exit.");
    let mut input = spawn_stdin_reader();

    let still_connected = loop {
        tokio::select! {
            _ = &mut receive_task => break false,
            _ = tokio::signal::ctrl_c() => break true,
            line = input.recv() => match line {
                Some(line) => {
                    let text = line.trim_end_matches(['\r', '\n']);
                    if text.is_empty() {
                        continue;
                    }
                    let message = chat_line(&username, text);
                    let message = truncate_utf8(&message, DEFAULT_MAX_MESSAGE_SIZE);
                    if let Err(e) = sender.send(message.as_bytes()).await {
                        error!("Failed to send message: {}", e);
                        break false;
                    }
                }
                None => break true,
            },
        }
    };

    if still_connected {
        receive_task.abort();
        let leave = leave_notice(&username);
        let goodbye = async {
            sender.send(leave.as_bytes()).await?;
            sender.close().await
        };
        match tokio::time::timeout(Duration::from_secs(1), goodbye).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to send leave notice: {}", e),
            Err(_) => warn!("Timed out sending leave notice"),
        }
    }

    ExitCode::SUCCESS
}

/// Read stdin on a plain thread; a blocking stdin read would otherwise hold
/// up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(32);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}
