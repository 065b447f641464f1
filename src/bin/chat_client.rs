//! Interactive terminal client
//!
//! Prints every line the server sends and forwards stdin lines to it.
//! Blank lines are rejected locally; `exit` is forwarded and ends the client.

use std::env;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use chat_relay::LossyLinesCodec;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 12345;

/// Longest server line printed, in bytes
const MAX_LINE_LENGTH: usize = 64 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_client=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = env::args().skip(1);
    let host = args.next().unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = match args.next() {
        Some(port) => port.parse::<u16>()?,
        None => DEFAULT_PORT,
    };

    let stream = match TcpStream::connect((host.as_str(), port)).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to connect to the server: {}", e);
            return Err(e.into());
        }
    };
    println!("Connected to the server.");

    let (read_half, write_half) = stream.into_split();
    let mut inbound = FramedRead::new(read_half, LossyLinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let mut outbound = FramedWrite::new(write_half, LinesCodec::new());

    // Spawn receive task (server -> terminal)
    let receiver = tokio::spawn(async move {
        while let Some(line) = inbound.next().await {
            match line {
                Ok(line) => println!("{}", line),
                Err(e) => {
                    error!("Error receiving messages: {}", e);
                    break;
                }
            }
        }
        debug!("Server closed the connection");
    });

    println!("Type 'exit' to disconnect.");
    let mut stdin = BufReader::new(io::stdin()).lines();

    while let Some(line) = stdin.next_line().await? {
        if line.trim().eq_ignore_ascii_case("exit") {
            outbound.send("exit").await?;
            println!("Disconnecting from the server...");
            break;
        }

        if line.trim().is_empty() {
            println!("Cannot send an empty message. Please type something.");
            continue;
        }

        if let Err(e) = outbound.send(line).await {
            error!("Error sending message: {}", e);
            break;
        }
    }

    let _ = SinkExt::<String>::close(&mut outbound).await;
    receiver.abort();
    Ok(())
}
