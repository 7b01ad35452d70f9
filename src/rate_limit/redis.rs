use super::lua_scripts::ACQUIRE_IF_IDLE_SCRIPT;
use super::retry::RetryExecutor;
use super::store::{AcquireOutcome, AttemptStore, StoreBackend};
use crate::config::StoreConfig;
use crate::error::{GateError, Result};
use crate::secrets::StoreCredentials;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Cmd, FromRedisValue, IntoConnectionInfo, Script};
use secrecy::ExposeSecret;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Redis-backed attempt store
pub struct RedisStore {
    /// Redis connection manager
    connection: ConnectionManager,
    /// Retry policy for connectivity failures
    retry: RetryExecutor,
    /// Per-command timeout
    request_timeout: Duration,
    /// Check-and-record script
    acquire_script: Script,
}

impl RedisStore {
    /// Connect to Redis.
    ///
    /// Malformed credentials are a `Config` error; an unreachable server is
    /// `StoreUnavailable`.
    pub async fn connect(credentials: &StoreCredentials, settings: &StoreConfig) -> Result<Self> {
        let mut info = credentials
            .url
            .as_str()
            .into_connection_info()
            .map_err(|e| GateError::Config(format!("Invalid Redis URL: {}", e)))?;
        let token = credentials.token.expose_secret();
        if !token.is_empty() {
            info.redis.password = Some(token.clone());
        }

        let client = redis::Client::open(info)
            .map_err(|e| GateError::Config(format!("Invalid Redis configuration: {}", e)))?;

        let retry = RetryExecutor::new(settings.retry.clone());
        let request_timeout = settings.request_timeout();

        let connection = retry
            .execute_with_predicate(
                || {
                    let client = client.clone();
                    async move {
                        match tokio::time::timeout(request_timeout, ConnectionManager::new(client))
                            .await
                        {
                            Ok(result) => result.map_err(GateError::from),
                            Err(_) => Err(GateError::StoreUnavailable(
                                "timed out connecting to Redis".to_string(),
                            )),
                        }
                    }
                },
                GateError::is_unavailable,
            )
            .await?;

        info!("Connected to Redis attempt store");

        Ok(Self {
            connection,
            retry,
            request_timeout,
            acquire_script: Script::new(ACQUIRE_IF_IDLE_SCRIPT),
        })
    }

    /// Run one command with the request timeout, retrying connectivity failures
    async fn query<T: FromRedisValue>(&self, op: &'static str, cmd: Cmd) -> Result<T> {
        let timeout = self.request_timeout;
        self.retry
            .execute_with_predicate(
                || {
                    let mut connection = self.connection.clone();
                    let cmd = cmd.clone();
                    async move {
                        match tokio::time::timeout(timeout, cmd.query_async::<_, T>(&mut connection))
                            .await
                        {
                            Ok(result) => result.map_err(GateError::from),
                            Err(_) => Err(GateError::StoreUnavailable(format!(
                                "Redis {} timed out after {:?}",
                                op, timeout
                            ))),
                        }
                    }
                },
                GateError::is_unavailable,
            )
            .await
            .map_err(|e| {
                warn!(op, error = %e, "Redis command failed");
                e
            })
    }
}

#[async_trait]
impl AttemptStore for RedisStore {
    fn backend(&self) -> StoreBackend {
        StoreBackend::Redis
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.query("GET", cmd).await
    }

    async fn set_with_expiry(&self, key: &str, ttl_secs: u64, value: &str) -> Result<()> {
        let mut cmd = redis::cmd("SETEX");
        cmd.arg(key).arg(ttl_secs).arg(value);
        self.query("SETEX", cmd).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        let removed: i64 = self.query("DEL", cmd).await?;
        debug!(key, removed, "Deleted attempt record");
        Ok(())
    }

    async fn ping(&self) -> Result<String> {
        self.query("PING", redis::cmd("PING")).await
    }

    async fn acquire_if_idle(
        &self,
        key: &str,
        now_ms: u64,
        window_ms: u64,
        ttl_secs: u64,
    ) -> Result<AcquireOutcome> {
        let timeout = self.request_timeout;

        // Not retried: a timed-out script may already have written `now`
        let mut connection = self.connection.clone();
        let mut invocation = self.acquire_script.prepare_invoke();
        invocation.key(key).arg(now_ms).arg(window_ms).arg(ttl_secs);

        let reply = invocation.invoke_async::<_, Vec<u64>>(&mut connection);
        let result = match tokio::time::timeout(timeout, reply).await {
            Ok(result) => result.map_err(|e| {
                if e.code() == Some("corrupt") || e.to_string().contains("corrupt attempt record")
                {
                    GateError::CorruptRecord {
                        key: key.to_string(),
                        value: e.to_string(),
                    }
                } else {
                    GateError::from(e)
                }
            })?,
            Err(_) => {
                return Err(GateError::StoreUnavailable(format!(
                    "Redis acquire timed out after {:?}",
                    timeout
                )))
            }
        };

        match result.as_slice() {
            [1, _] => Ok(AcquireOutcome::Acquired),
            [0, last_attempt_ms] => Ok(AcquireOutcome::Held {
                last_attempt_ms: *last_attempt_ms,
            }),
            other => Err(GateError::Store(format!(
                "Unexpected acquire script reply: {:?}",
                other
            ))),
        }
    }
}
