use std::{sync::Arc, time::Duration};

use crate::{
    MAX_FRAME_PAYLOAD,
    backend::{MemoryBackend, RedisBackend},
    error::BackendError,
    protocol::{DEFAULT_TTL, KvBackend, KvBridge},
    ws::{Dispatcher, Mode},
};

/// How a connection waits for inbound data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStrategy {
    /// Check for data without blocking; when none is there, sleep the given
    /// delay and check again.
    IdlePoll(Duration),
    /// Block on the socket until data arrives or the read timeout elapses.
    Deadline,
}

/// Per-connection settings.
#[derive(Debug, Clone, Copy)]
pub struct ConnConfig {
    pub read: ReadStrategy,
    /// Longest time without inbound data before the connection is dropped,
    /// under either strategy.
    pub read_timeout: Duration,
    pub max_payload: usize,
}

impl Default for ConnConfig {
    fn default() -> Self {
        Self {
            read: ReadStrategy::IdlePoll(Duration::from_secs(1)),
            read_timeout: Duration::from_secs(60),
            max_payload: MAX_FRAME_PAYLOAD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BackendConfig {
    #[default]
    Memory,
    /// `redis://host[:port]`
    Redis(String),
}

/// Process-wide settings, fixed at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub mode: Mode,
    pub conn: ConnConfig,
    pub backend: BackendConfig,
    pub kv_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8080,
            mode: Mode::PlainEcho,
            conn: ConnConfig::default(),
            backend: BackendConfig::Memory,
            kv_ttl: DEFAULT_TTL,
        }
    }
}

impl Config {
    #[must_use]
    pub fn addr(&self) -> String { format!("{}:{}", self.host, self.port) }

    /// Resolves the mode into the routing strategy shared by all connections.
    ///
    /// The backend is only constructed in command-bridge mode.
    pub fn dispatcher(&self) -> Result<Dispatcher, BackendError> {
        Ok(match self.mode {
            Mode::PlainEcho => Dispatcher::PlainEcho,
            Mode::TypedEcho => Dispatcher::TypedEcho,
            Mode::CommandBridge => {
                let backend: Arc<dyn KvBackend> = match &self.backend {
                    BackendConfig::Memory => Arc::new(MemoryBackend::new()),
                    BackendConfig::Redis(url) => Arc::new(RedisBackend::from_url(url)?),
                };
                Dispatcher::CommandBridge(KvBridge::new(backend).with_ttl(self.kv_ttl))
            }
        })
    }
}
