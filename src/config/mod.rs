use crate::error::{GateError, Result};
use crate::rate_limit::retry::RetryConfig;
use crate::rate_limit::types::RateLimitConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Longest accepted purchase window (one day)
pub const MAX_WINDOW_SECS: u64 = 86_400;

/// Main corn-gate configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Purchase rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Persistent attempt store
    #[serde(default)]
    pub store: StoreConfig,
    /// Rate limit header names
    #[serde(default)]
    pub headers: HeaderNames,
    /// User-facing messages
    #[serde(default)]
    pub messages: Messages,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Redis store configuration.
///
/// Credentials are never read from the file, only the names of the
/// environment variables holding them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Environment variable holding the Redis URL
    #[serde(default = "default_url_env")]
    pub url_env: String,
    /// Environment variable holding the Redis password / token
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Per-command timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Retry policy for failed connections and commands
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Names of the rate limit response headers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderNames {
    #[serde(default = "default_limit_header")]
    pub limit: String,
    #[serde(default = "default_remaining_header")]
    pub remaining: String,
    #[serde(default = "default_reset_header")]
    pub reset: String,
}

/// Messages returned to purchase callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Messages {
    #[serde(default = "default_rate_limit_exceeded")]
    pub rate_limit_exceeded: String,
    #[serde(default = "default_purchase_success")]
    pub purchase_success: String,
    #[serde(default = "default_internal_error")]
    pub internal_error: String,
    #[serde(default = "default_method_not_allowed")]
    pub method_not_allowed: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_url_env() -> String {
    "REDIS_URL".to_string()
}

fn default_token_env() -> String {
    "REDIS_TOKEN".to_string()
}

fn default_request_timeout_ms() -> u64 {
    2000
}

fn default_limit_header() -> String {
    "X-RateLimit-Limit".to_string()
}

fn default_remaining_header() -> String {
    "X-RateLimit-Remaining".to_string()
}

fn default_reset_header() -> String {
    "X-RateLimit-Reset".to_string()
}

fn default_rate_limit_exceeded() -> String {
    "Too many requests. Please wait before trying again.".to_string()
}

fn default_purchase_success() -> String {
    "Corn purchased successfully".to_string()
}

fn default_internal_error() -> String {
    "Internal server error. Please try again later".to_string()
}

fn default_method_not_allowed() -> String {
    "Method not allowed. Use POST to purchase corn.".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url_env: default_url_env(),
            token_env: default_token_env(),
            request_timeout_ms: default_request_timeout_ms(),
            retry: RetryConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self {
            limit: default_limit_header(),
            remaining: default_remaining_header(),
            reset: default_reset_header(),
        }
    }
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            rate_limit_exceeded: default_rate_limit_exceeded(),
            purchase_success: default_purchase_success(),
            internal_error: default_internal_error(),
            method_not_allowed: default_method_not_allowed(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GateError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| GateError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.window_secs == 0 {
            return Err(GateError::Config(
                "Rate limit window must be > 0".to_string(),
            ));
        }
        if self.rate_limit.window_secs > MAX_WINDOW_SECS {
            return Err(GateError::Config(format!(
                "Rate limit window must be <= {} seconds",
                MAX_WINDOW_SECS
            )));
        }
        if self.rate_limit.max_requests == 0 {
            return Err(GateError::Config(
                "Rate limit max_requests must be > 0".to_string(),
            ));
        }
        if self.rate_limit.key_prefix.is_empty() {
            return Err(GateError::Config(
                "Rate limit key prefix cannot be empty".to_string(),
            ));
        }

        for name in [
            &self.headers.limit,
            &self.headers.remaining,
            &self.headers.reset,
        ] {
            if http::HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(GateError::Config(format!(
                    "Invalid header name: '{}'",
                    name
                )));
            }
        }

        if self.store.url_env.is_empty() || self.store.token_env.is_empty() {
            return Err(GateError::Config(
                "Store credential variable names cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
