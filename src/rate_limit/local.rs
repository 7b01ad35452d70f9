use super::store::{AcquireOutcome, AttemptStore, StoreBackend};
use super::types::{parse_timestamp, within_window};
use crate::error::Result;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// Process-local attempt store used when Redis is not configured.
///
/// Entries carry no TTL and live until reset or process exit. Per-key
/// locking inside `DashMap` makes `acquire_if_idle` atomic across threads.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    /// Create a new, empty store
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of tracked keys (for testing/monitoring)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Memory
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set_with_expiry(&self, key: &str, _ttl_secs: u64, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<String> {
        Ok("PONG".to_string())
    }

    async fn acquire_if_idle(
        &self,
        key: &str,
        now_ms: u64,
        window_ms: u64,
        _ttl_secs: u64,
    ) -> Result<AcquireOutcome> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let last_attempt_ms = parse_timestamp(key, entry.get())?;
                if within_window(last_attempt_ms, now_ms, window_ms) {
                    debug!(key, last_attempt_ms, "Attempt held by existing record");
                    return Ok(AcquireOutcome::Held { last_attempt_ms });
                }
                entry.insert(now_ms.to_string());
                Ok(AcquireOutcome::Acquired)
            }
            Entry::Vacant(entry) => {
                debug!(key, "Creating attempt record");
                entry.insert(now_ms.to_string());
                Ok(AcquireOutcome::Acquired)
            }
        }
    }
}
