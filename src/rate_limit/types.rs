use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};

/// Rate limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Length of the fixed window (in seconds)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Maximum number of purchases allowed per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Namespace prepended to every attempt key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Extra lifetime given to persisted attempt keys past the window
    #[serde(default = "default_key_ttl_grace_secs")]
    pub key_ttl_grace_secs: u64,
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_requests() -> u32 {
    1
}

fn default_key_prefix() -> String {
    "rate-limit:buy-corn".to_string()
}

fn default_key_ttl_grace_secs() -> u64 {
    5
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
            key_prefix: default_key_prefix(),
            key_ttl_grace_secs: default_key_ttl_grace_secs(),
        }
    }
}

impl RateLimitConfig {
    pub fn window_ms(&self) -> u64 {
        self.window_secs.saturating_mul(1000)
    }

    /// Expiry applied to persisted attempt keys
    pub fn key_ttl_secs(&self) -> u64 {
        self.window_secs.saturating_add(self.key_ttl_grace_secs)
    }

    /// Namespaced storage key for a client id.
    ///
    /// Only the raw id is used, so an address and a session that happen to
    /// share the same string share one bucket.
    pub fn storage_key(&self, client_id: &str) -> String {
        format!("{}:{}", self.key_prefix, client_id)
    }
}

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    /// Whether the purchase may proceed
    pub allowed: bool,
    /// Purchases left in the window once this one is recorded
    pub remaining: u32,
    /// Epoch milliseconds at which the window closes
    pub reset_at: u64,
    /// Total limit
    pub limit: u32,
}

impl RateLimitDecision {
    /// A fresh window opening at `now_ms`
    pub fn allowed(now_ms: u64, config: &RateLimitConfig) -> Self {
        Self {
            allowed: true,
            remaining: config.max_requests.saturating_sub(1),
            reset_at: now_ms.saturating_add(config.window_ms()),
            limit: config.max_requests,
        }
    }

    /// A denial anchored to the blocking attempt, not to the current time
    pub fn denied(last_attempt_ms: u64, config: &RateLimitConfig) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_at: last_attempt_ms.saturating_add(config.window_ms()),
            limit: config.max_requests,
        }
    }

    /// Reset time in unix seconds, as sent in `X-RateLimit-Reset`
    pub fn reset_secs(&self) -> u64 {
        self.reset_at / 1000
    }

    /// Seconds until the window closes, rounded up, as sent in `Retry-After`
    pub fn retry_after_secs(&self, now_ms: u64) -> u64 {
        self.reset_at.saturating_sub(now_ms).div_ceil(1000)
    }
}

/// Read-only snapshot of a client's limiter state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub client_id: String,
    pub timestamp: u64,
    pub window_start: u64,
    pub window_end: u64,
    pub request_count: u32,
    pub is_allowed: bool,
}

/// Whether an attempt recorded at `last_attempt_ms` still blocks at `now_ms`.
///
/// The single source of window arithmetic for the engine and the in-memory
/// store; the Redis acquire script mirrors it.
pub fn within_window(last_attempt_ms: u64, now_ms: u64, window_ms: u64) -> bool {
    now_ms.saturating_sub(last_attempt_ms) < window_ms
}

/// Parse a stored attempt timestamp
pub fn parse_timestamp(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| GateError::CorruptRecord {
            key: key.to_string(),
            value: raw.to_string(),
        })
}

/// Window boundary cases shared by the store tests:
/// `(last_attempt_ms, now_ms, still_blocked)` for a 60 s window
#[cfg(test)]
pub(crate) const WINDOW_CASES: &[(u64, u64, bool)] = &[
    (0, 0, true),
    (0, 59_999, true),
    (0, 60_000, false),
    (0, 120_000, false),
    // Clock skew: a record from the future still blocks
    (10_000, 5_000, true),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key() {
        let config = RateLimitConfig::default();
        assert_eq!(
            config.storage_key("192.168.1.1"),
            "rate-limit:buy-corn:192.168.1.1"
        );
        assert_eq!(config.storage_key(""), "rate-limit:buy-corn:");
    }

    #[test]
    fn test_rate_limit_config_defaults() {
        let config = RateLimitConfig::default();

        assert_eq!(config.max_requests, 1);
        assert_eq!(config.window_ms(), 60_000);
        assert_eq!(config.key_ttl_secs(), 65);
    }

    #[test]
    fn test_decisions() {
        let config = RateLimitConfig::default();

        let allowed = RateLimitDecision::allowed(1_000, &config);
        assert!(allowed.allowed);
        assert_eq!(allowed.remaining, 0);
        assert_eq!(allowed.limit, 1);
        assert_eq!(allowed.reset_at, 61_000);

        let denied = RateLimitDecision::denied(500, &config);
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.reset_at, 60_500);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let config = RateLimitConfig::default();
        let now = 1_700_000_000_000;

        let denied = RateLimitDecision::denied(now - 15_000, &config);
        assert_eq!(denied.reset_at, now + 45_000);
        assert_eq!(denied.retry_after_secs(now), 45);

        let denied = RateLimitDecision::denied(now - 15_001, &config);
        assert_eq!(denied.retry_after_secs(now), 45);

        let denied = RateLimitDecision::denied(now - 59_999, &config);
        assert_eq!(denied.retry_after_secs(now), 1);

        let denied = RateLimitDecision::denied(now, &config);
        assert_eq!(denied.retry_after_secs(now), 60);
    }

    #[test]
    fn test_reset_secs_floors() {
        let config = RateLimitConfig::default();
        let decision = RateLimitDecision::allowed(1_999, &config);
        assert_eq!(decision.reset_secs(), 61);
    }

    #[test]
    fn test_within_window_boundaries() {
        for &(last, now, blocked) in WINDOW_CASES {
            assert_eq!(within_window(last, now, 60_000), blocked, "last={last} now={now}");
        }
    }

    #[test]
    fn test_huge_window_saturates() {
        let config = RateLimitConfig {
            window_secs: u64::MAX,
            ..RateLimitConfig::default()
        };

        assert_eq!(config.window_ms(), u64::MAX);
        assert_eq!(config.key_ttl_secs(), u64::MAX);
        assert_eq!(RateLimitDecision::allowed(1_000, &config).reset_at, u64::MAX);
        assert!(within_window(0, 1_700_000_000_000, config.window_ms()));
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("k", "1700000000000").unwrap(), 1_700_000_000_000);
        assert!(matches!(
            parse_timestamp("k", "not-a-number"),
            Err(GateError::CorruptRecord { .. })
        ));
    }
}
