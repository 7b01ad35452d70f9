use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

/// Which attempt store served a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Shared Redis store
    Redis,
    /// Process-local fallback map
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Redis => "redis",
            StoreBackend::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an atomic check-and-record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// No blocking record existed; `now` has been written
    Acquired,
    /// A record inside the window already exists and was left untouched
    Held { last_attempt_ms: u64 },
}

/// Key-value capability backing the limiter.
///
/// Values are opaque strings; the limiter owns the timestamp encoding.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    fn backend(&self) -> StoreBackend;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write `value` under `key`, expiring after `ttl_secs` where supported
    async fn set_with_expiry(&self, key: &str, ttl_secs: u64, value: &str) -> Result<()>;

    /// Remove `key`; absent keys are not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Liveness probe, answers "PONG"
    async fn ping(&self) -> Result<String>;

    /// Write `now_ms` under `key` unless a record within `window_ms` exists,
    /// as one atomic step.
    async fn acquire_if_idle(
        &self,
        key: &str,
        now_ms: u64,
        window_ms: u64,
        ttl_secs: u64,
    ) -> Result<AcquireOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_labels() {
        assert_eq!(StoreBackend::Redis.to_string(), "redis");
        assert_eq!(StoreBackend::Memory.as_str(), "memory");
    }
}
