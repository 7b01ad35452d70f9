use super::clock::{Clock, SystemClock};
use super::connector::{NoStore, StoreConnector};
use super::local::MemoryStore;
use super::store::{AcquireOutcome, AttemptStore, StoreBackend};
use super::types::{parse_timestamp, within_window, DebugInfo, RateLimitConfig, RateLimitDecision};
use crate::error::Result;
use crate::identity::ClientIdentifier;
use crate::metrics;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-client purchase limiter.
///
/// Every call picks its store afresh: Redis when the connector reports it
/// configured, the in-process [`MemoryStore`] otherwise. All window
/// arithmetic lives here, so both stores produce identical decisions.
pub struct RateLimiter {
    config: RateLimitConfig,
    connector: Arc<dyn StoreConnector>,
    fallback: Arc<MemoryStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter backed by `connector`, falling back to memory
    pub fn new(config: RateLimitConfig, connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            config,
            connector,
            fallback: Arc::new(MemoryStore::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a limiter that only ever uses the in-memory store
    pub fn local_only(config: RateLimitConfig) -> Self {
        info!("Initializing local-only rate limiter");
        Self::new(config, Arc::new(NoStore))
    }

    /// Replace the clock (tests, replay)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The in-memory fallback store (for testing/monitoring)
    pub fn fallback(&self) -> &Arc<MemoryStore> {
        &self.fallback
    }

    /// Store serving this call
    async fn select_store(&self) -> Result<Arc<dyn AttemptStore>> {
        match self.connector.connect().await? {
            Some(store) => Ok(store),
            None => Ok(self.fallback.clone() as Arc<dyn AttemptStore>),
        }
    }

    async fn last_attempt(&self, store: &dyn AttemptStore, key: &str) -> Result<Option<u64>> {
        store
            .get(key)
            .await?
            .map(|raw| parse_timestamp(key, &raw))
            .transpose()
    }

    /// Decide whether `client` may purchase now. Read-only.
    pub async fn check_admission(&self, client: &ClientIdentifier) -> Result<RateLimitDecision> {
        let store = self.select_store().await?;
        let key = self.config.storage_key(&client.id);
        let last_attempt = self.last_attempt(store.as_ref(), &key).await.map_err(|e| {
            metrics::record_store_error(store.backend(), "check");
            e
        })?;
        let now = self.clock.now_ms();

        let decision = match last_attempt {
            Some(last) if within_window(last, now, self.config.window_ms()) => {
                RateLimitDecision::denied(last, &self.config)
            }
            _ => RateLimitDecision::allowed(now, &self.config),
        };

        debug!(
            client_id = %client.id,
            backend = %store.backend(),
            allowed = decision.allowed,
            reset_at = decision.reset_at,
            "Admission checked"
        );
        metrics::record_admission(store.backend(), decision.allowed);

        Ok(decision)
    }

    /// Record `now` as the client's latest attempt.
    ///
    /// Unconditional: callers should only do this after an allowed
    /// [`check_admission`](Self::check_admission). Use
    /// [`try_acquire`](Self::try_acquire) when concurrent requests for one
    /// client must not both get through.
    pub async fn record_attempt(&self, client: &ClientIdentifier) -> Result<()> {
        let store = self.select_store().await?;
        let key = self.config.storage_key(&client.id);
        let now = self.clock.now_ms();

        store
            .set_with_expiry(&key, self.config.key_ttl_secs(), &now.to_string())
            .await
            .map_err(|e| {
                metrics::record_store_error(store.backend(), "record");
                e
            })?;

        debug!(client_id = %client.id, backend = %store.backend(), now, "Attempt recorded");
        Ok(())
    }

    /// Check and record in one atomic step.
    ///
    /// Of two concurrent calls for the same client, exactly one is allowed;
    /// the other gets a denial anchored to the winner's attempt. Returns the
    /// decision with the timestamp it was made at; derive `Retry-After` and
    /// receipts from that timestamp, not from a later clock read.
    pub async fn try_acquire(&self, client: &ClientIdentifier) -> Result<(RateLimitDecision, u64)> {
        let store = self.select_store().await?;
        let key = self.config.storage_key(&client.id);
        let now = self.clock.now_ms();

        let outcome = store
            .acquire_if_idle(
                &key,
                now,
                self.config.window_ms(),
                self.config.key_ttl_secs(),
            )
            .await
            .map_err(|e| {
                metrics::record_store_error(store.backend(), "acquire");
                e
            })?;

        let decision = match outcome {
            AcquireOutcome::Acquired => RateLimitDecision::allowed(now, &self.config),
            AcquireOutcome::Held { last_attempt_ms } => {
                warn!(
                    client_id = %client.id,
                    backend = %store.backend(),
                    last_attempt_ms,
                    "Rate limit exceeded"
                );
                RateLimitDecision::denied(last_attempt_ms, &self.config)
            }
        };
        metrics::record_admission(store.backend(), decision.allowed);

        Ok((decision, now))
    }

    /// Forget the client's attempt. Safe to call any number of times.
    pub async fn reset_admission(&self, client: &ClientIdentifier) -> Result<()> {
        let store = self.select_store().await?;
        let key = self.config.storage_key(&client.id);

        store.delete(&key).await.map_err(|e| {
            metrics::record_store_error(store.backend(), "reset");
            e
        })?;

        debug!(client_id = %client.id, backend = %store.backend(), "Attempt record reset");
        Ok(())
    }

    /// Snapshot of the client's limiter state; never writes.
    pub async fn inspect(&self, client: &ClientIdentifier) -> Result<DebugInfo> {
        let store = self.select_store().await?;
        let key = self.config.storage_key(&client.id);
        let last_attempt = self.last_attempt(store.as_ref(), &key).await.map_err(|e| {
            metrics::record_store_error(store.backend(), "inspect");
            e
        })?;
        let now = self.clock.now_ms();
        let window_ms = self.config.window_ms();

        let info = match last_attempt {
            None => DebugInfo {
                client_id: client.id.clone(),
                timestamp: now,
                window_start: now,
                window_end: now.saturating_add(window_ms),
                request_count: 0,
                is_allowed: true,
            },
            Some(last) => {
                let is_allowed = !within_window(last, now, window_ms);
                DebugInfo {
                    client_id: client.id.clone(),
                    timestamp: now,
                    window_start: last,
                    window_end: last.saturating_add(window_ms),
                    request_count: if is_allowed { 0 } else { 1 },
                    is_allowed,
                }
            }
        };

        Ok(info)
    }

    /// Ping the store serving calls right now
    pub async fn store_status(&self) -> Result<StoreBackend> {
        let store = self.select_store().await?;
        let reply = store.ping().await.map_err(|e| {
            metrics::record_store_error(store.backend(), "ping");
            e
        })?;
        debug!(backend = %store.backend(), reply = %reply, "Store ping");
        Ok(store.backend())
    }

    /// Drop the cached persistent store client; the next call reconnects
    pub async fn reset_store_client(&self) {
        self.connector.reset().await;
    }
}
