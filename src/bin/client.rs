use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use wust_bridge::{BridgeClient, frames::Opcode};

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Server to connect to
    #[arg(default_value = "ws://127.0.0.1:8080/")]
    url: String,

    /// Seconds to wait for the connection and upgrade
    #[arg(short, long, default_value_t = 5)]
    timeout_secs: u64,
}

/// Sends each stdin line as a Text frame and prints the reply.
/// `:ping`, `:pong` and `:bin <text>` send the other frame types.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("wust_bridge=info".parse()?),
        )
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let mut ws =
        BridgeClient::connect_timeout(&args.url, Duration::from_secs(args.timeout_secs)).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.as_str() {
            ":ping" => ws.send(Opcode::Ping, b"ping").await?,
            ":pong" => ws.send(Opcode::Pong, b"pong").await?,
            l => match l.strip_prefix(":bin ") {
                Some(b) => ws.send_bytes(b.as_bytes()).await?,
                None => ws.send_text(l).await?,
            },
        }
        if line == "close" {
            break;
        }

        match ws.recv().await {
            Ok(frame) => match frame.as_text() {
                Some(text) => println!("{:?}: {text}", frame.opcode),
                None => println!("{:?}: {:?}", frame.opcode, frame.payload),
            },
            Err(e) => {
                eprintln!("connection ended: {e}");
                return Ok(());
            }
        }
    }

    ws.close().await?;
    Ok(())
}
