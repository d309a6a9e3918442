use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::{error::BackendError, protocol::KvBackend};

/// In-process store with per-key expiry. Expired keys are evicted lazily on read.
#[derive(Default)]
pub struct MemoryBackend {
    entries: DashMap<String, Entry>,
}

struct Entry {
    value: String,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool { self.expires_at.is_none_or(|at| at > now) }
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Number of stored keys, expired ones included until they are read.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_live(now) {
                return Ok(Some(entry.value.clone()));
            }
        }
        // guard dropped above; removing while holding it would deadlock the shard
        self.entries.remove_if(key, |_, e| !e.is_live(now));
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), BackendError> {
        self.entries.insert(
            key.to_owned(),
            Entry {
                value: value.to_owned(),
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_and_overwrites() {
        let kv = MemoryBackend::new();
        kv.set("a", "1", Duration::from_secs(60)).await.unwrap();
        kv.set("a", "2", Duration::from_secs(60)).await.unwrap();
        assert_eq!(kv.get("a").await.unwrap().as_deref(), Some("2"));
        assert_eq!(kv.get("b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let kv = MemoryBackend::new();
        kv.set("a", "1", Duration::ZERO).await.unwrap();
        assert_eq!(kv.get("a").await.unwrap(), None);
        assert!(kv.is_empty());
    }

    #[tokio::test]
    async fn unrepresentable_ttl_never_expires() {
        let kv = MemoryBackend::new();
        kv.set("a", "1", Duration::from_secs(u64::MAX)).await.unwrap();
        kv.set("b", "2", Duration::MAX).await.unwrap();
        assert_eq!(kv.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(kv.get("b").await.unwrap().as_deref(), Some("2"));
        assert_eq!(kv.len(), 2);
    }
}
