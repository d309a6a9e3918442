use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;
use wust_bridge::{BackendConfig, BridgeServer, Config, ConnConfig, Mode, ReadStrategy};

#[derive(Clone, Copy, ValueEnum)]
enum Read {
    /// Check for data, sleep and retry when there is none
    Poll,
    /// Block until data arrives or the timeout elapses
    Deadline,
}

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind to
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Type of server to spawn: echo, echo-frames or bridge
    #[arg(short, long, default_value_t = Mode::PlainEcho)]
    mode: Mode,

    /// How connections wait for data
    #[arg(long, value_enum, default_value_t = Read::Poll)]
    read: Read,

    /// Sleep between polls when no data is available
    #[arg(long, default_value_t = 1000)]
    idle_ms: u64,

    /// Drop connections idle for this long
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Redis backend for bridge mode, e.g. redis://localhost:6379 (in-memory when absent)
    #[arg(long)]
    redis: Option<String>,

    /// Expiry of keys written with SET
    #[arg(long, default_value_t = 3600)]
    ttl_secs: u64,

    /// Add debug info
    #[arg(long)]
    debug: bool,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let read = match args.read {
            Read::Poll => ReadStrategy::IdlePoll(Duration::from_millis(args.idle_ms)),
            Read::Deadline => ReadStrategy::Deadline,
        };
        Config {
            host: args.host,
            port: args.port,
            mode: args.mode,
            conn: ConnConfig {
                read,
                read_timeout: Duration::from_secs(args.timeout_secs),
                ..ConnConfig::default()
            },
            backend: args.redis.map_or(BackendConfig::Memory, BackendConfig::Redis),
            kv_ttl: Duration::from_secs(args.ttl_secs),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let level = if args.debug { "wust_bridge=debug" } else { "wust_bridge=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_target(false)
        .compact()
        .init();

    let config = Config::from(args);
    let dispatcher = config.dispatcher()?;

    BridgeServer::bind(config.addr(), dispatcher, config.conn)
        .await?
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "could not listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
