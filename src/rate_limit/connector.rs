use super::redis::RedisStore;
use super::store::AttemptStore;
use crate::config::StoreConfig;
use crate::error::Result;
use crate::secrets::CredentialSource;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Resolves the persistent attempt store for a limiter call.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// The persistent store, or `None` when it is not configured
    async fn connect(&self) -> Result<Option<Arc<dyn AttemptStore>>>;

    /// Drop any cached client so the next call builds a fresh one
    async fn reset(&self);
}

/// Connector for deployments without a persistent store
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStore;

#[async_trait]
impl StoreConnector for NoStore {
    async fn connect(&self) -> Result<Option<Arc<dyn AttemptStore>>> {
        Ok(None)
    }

    async fn reset(&self) {}
}

/// Lazily connects to Redis when credentials are present and reuses the
/// client afterwards.
///
/// Credentials are re-read on every call. Failed connections are not
/// cached, so fixing the environment takes effect on the next call.
pub struct RedisConnector {
    settings: StoreConfig,
    credentials: Arc<dyn CredentialSource>,
    client: Mutex<Option<Arc<RedisStore>>>,
}

impl RedisConnector {
    pub fn new(settings: StoreConfig, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            settings,
            credentials,
            client: Mutex::new(None),
        }
    }

    /// Whether a client has been built and cached
    pub async fn is_connected(&self) -> bool {
        self.client.lock().await.is_some()
    }
}

#[async_trait]
impl StoreConnector for RedisConnector {
    async fn connect(&self) -> Result<Option<Arc<dyn AttemptStore>>> {
        let Some(credentials) = self.credentials.load() else {
            return Ok(None);
        };

        if let Some(store) = self.client.lock().await.as_ref() {
            return Ok(Some(store.clone() as Arc<dyn AttemptStore>));
        }

        // Connect outside the lock; callers must not queue behind a slow attempt
        debug!("Building Redis attempt store client");
        let store = Arc::new(RedisStore::connect(&credentials, &self.settings).await.map_err(
            |e| {
                error!(error = %e, "Failed to build Redis attempt store client");
                e
            },
        )?);

        // Keep whichever client was cached first
        let mut client = self.client.lock().await;
        let store = client.get_or_insert(store).clone();

        Ok(Some(store as Arc<dyn AttemptStore>))
    }

    async fn reset(&self) {
        debug!("Dropping cached Redis attempt store client");
        self.client.lock().await.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GateError;
    use crate::secrets::StaticCredentials;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_no_store_is_unconfigured() {
        assert!(NoStore.connect().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_credentials_mean_no_store() {
        let connector = RedisConnector::new(
            StoreConfig::default(),
            Arc::new(StaticCredentials::none()),
        );

        assert!(connector.connect().await.unwrap().is_none());
        assert!(!connector.is_connected().await);
    }

    #[tokio::test]
    async fn test_malformed_credentials_fail_every_call() {
        let connector = RedisConnector::new(
            StoreConfig::default(),
            Arc::new(StaticCredentials::new("::not-a-url::", "token")),
        );

        for _ in 0..2 {
            let result = connector.connect().await;
            assert!(matches!(result, Err(GateError::Config(_))));
        }
        assert!(!connector.is_connected().await);
    }

    #[tokio::test]
    async fn test_failed_connects_run_concurrently() {
        let mut settings = StoreConfig::default();
        settings.request_timeout_ms = 300;
        settings.retry.max_retries = 0;
        let connector = Arc::new(RedisConnector::new(
            settings,
            // Unroutable, so every attempt hangs until the request timeout
            Arc::new(StaticCredentials::new("redis://10.255.255.1:6379", "token")),
        ));

        let started = Instant::now();
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let connector = connector.clone();
                tokio::spawn(async move { connector.connect().await.is_err() })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        // Serialized attempts would take 6 x 300 ms
        assert!(started.elapsed() < Duration::from_millis(1_200));
        assert!(!connector.is_connected().await);
    }

    #[tokio::test]
    #[ignore] // Requires Redis
    async fn test_client_is_reused_until_reset() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let token = std::env::var("REDIS_TOKEN").unwrap_or_default();
        let connector = RedisConnector::new(
            StoreConfig::default(),
            Arc::new(StaticCredentials::new(&url, &token)),
        );

        let first = connector.connect().await.unwrap().unwrap();
        let second = connector.connect().await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        connector.reset().await;
        assert!(!connector.is_connected().await);

        let third = connector.connect().await.unwrap().unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }
}
