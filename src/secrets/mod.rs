use secrecy::Secret;
use std::env;

/// Secret string wrapper that prevents accidental exposure
pub type SecretString = Secret<String>;

/// Connection credentials for the persistent attempt store
#[derive(Debug, Clone)]
pub struct StoreCredentials {
    /// Store URL, e.g. `redis://cache.internal:6379`
    pub url: String,
    /// Password / access token
    pub token: SecretString,
}

impl StoreCredentials {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: Secret::new(token.into()),
        }
    }
}

/// Where store credentials come from.
///
/// Consulted on every limiter call; `None` means the persistent store is not
/// configured and the in-memory fallback is used.
pub trait CredentialSource: Send + Sync {
    fn load(&self) -> Option<StoreCredentials>;
}

/// Environment variable credentials, re-read on every call
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    url_var: String,
    token_var: String,
}

impl EnvCredentials {
    pub fn new(url_var: &str, token_var: &str) -> Self {
        Self {
            url_var: url_var.to_string(),
            token_var: token_var.to_string(),
        }
    }

    fn read(var: &str) -> Option<String> {
        env::var(var).ok().filter(|v| !v.trim().is_empty())
    }
}

impl CredentialSource for EnvCredentials {
    fn load(&self) -> Option<StoreCredentials> {
        let url = Self::read(&self.url_var)?;
        let token = Self::read(&self.token_var)?;
        Some(StoreCredentials::new(url, token))
    }
}

/// Fixed credentials (for testing or embedding)
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    credentials: Option<StoreCredentials>,
}

impl StaticCredentials {
    pub fn new(url: &str, token: &str) -> Self {
        Self {
            credentials: Some(StoreCredentials::new(url, token)),
        }
    }

    pub fn none() -> Self {
        Self { credentials: None }
    }
}

impl CredentialSource for StaticCredentials {
    fn load(&self) -> Option<StoreCredentials> {
        self.credentials.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_env_credentials_require_both_vars() {
        let source = EnvCredentials::new("CORN_GATE_TEST_URL_A", "CORN_GATE_TEST_TOKEN_A");
        assert!(source.load().is_none());

        std::env::set_var("CORN_GATE_TEST_URL_A", "redis://127.0.0.1:6379");
        assert!(source.load().is_none());

        std::env::set_var("CORN_GATE_TEST_TOKEN_A", "s3cret");
        let creds = source.load().unwrap();
        assert_eq!(creds.url, "redis://127.0.0.1:6379");
        assert_eq!(creds.token.expose_secret(), "s3cret");

        std::env::remove_var("CORN_GATE_TEST_URL_A");
        std::env::remove_var("CORN_GATE_TEST_TOKEN_A");
    }

    #[test]
    fn test_env_credentials_blank_counts_as_missing() {
        std::env::set_var("CORN_GATE_TEST_URL_B", "redis://127.0.0.1:6379");
        std::env::set_var("CORN_GATE_TEST_TOKEN_B", "   ");

        let source = EnvCredentials::new("CORN_GATE_TEST_URL_B", "CORN_GATE_TEST_TOKEN_B");
        assert!(source.load().is_none());

        std::env::remove_var("CORN_GATE_TEST_URL_B");
        std::env::remove_var("CORN_GATE_TEST_TOKEN_B");
    }

    #[test]
    fn test_token_is_redacted_in_debug() {
        let creds = StoreCredentials::new("redis://localhost", "hunter2");
        assert!(!format!("{:?}", creds).contains("hunter2"));
    }

    #[test]
    fn test_static_credentials() {
        assert!(StaticCredentials::none().load().is_none());
        assert!(StaticCredentials::new("redis://x", "t").load().is_some());
    }
}
