use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use super::command::{Command, Verb};
use crate::error::BackendError;

/// TTL applied to every `SET`; the text protocol has no way to supply one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

pub const GET_USAGE: &str = "[ERROR]: No key passed, syntax is GET key";
pub const SET_USAGE: &str = "[ERROR]: No key or value, command is SET KEY VALUE";
pub const UNKNOWN_COMMAND: &str =
    "Unknown command, supported commands are GET key and SET key value";

/// Key-value store the command protocol is bridged to.
///
/// One instance is shared by every connection task, so implementations must be
/// safe for concurrent use without outside locking.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// `Ok(None)` on a miss.
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError>;
}

/// Executes parsed commands against a [`KvBackend`], turning every outcome
/// into the text sent back to the client.
#[derive(Clone)]
pub struct KvBridge {
    backend: Arc<dyn KvBackend>,
    ttl: Duration,
}

impl KvBridge {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend,
            ttl: DEFAULT_TTL,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn execute(&self, command: &Command) -> String {
        match (command.verb, command.args.as_slice()) {
            (Verb::Get, [key, ..]) => self.get(key).await,
            (Verb::Get, []) => GET_USAGE.to_owned(),
            (Verb::Set, [key, value, ..]) => self.set(key, value).await,
            (Verb::Set, _) => SET_USAGE.to_owned(),
            (Verb::Unknown, _) => {
                tracing::warn!(args = ?command.args, "unknown command");
                UNKNOWN_COMMAND.to_owned()
            }
        }
    }

    async fn get(&self, key: &str) -> String {
        tracing::debug!(key, "GET");
        match self.backend.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => no_value(key),
            Err(e) => {
                tracing::warn!(key, error = %e, "backend GET failed");
                no_value(key)
            }
        }
    }

    async fn set(&self, key: &str, value: &str) -> String {
        tracing::debug!(key, ttl = ?self.ttl, "SET");
        match self.backend.set(key, value, self.ttl).await {
            Ok(()) => format!("Successfully set {key} to {value}, retrieve it using GET {key}"),
            Err(e) => {
                tracing::warn!(key, error = %e, "backend SET failed");
                format!("[ERROR]: Could not set value, reason: {e}")
            }
        }
    }
}

fn no_value(key: &str) -> String {
    format!("[ERROR]: No value for key {key}, try giving it a value")
}
