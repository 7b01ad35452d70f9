use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type for corn-gate operations
pub type Result<T> = std::result::Result<T, GateError>;

/// Corn-gate error types
#[derive(Error, Debug)]
pub enum GateError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The attempt store could not be reached (connection refused, dropped, timed out)
    #[error("Attempt store unavailable: {0}")]
    StoreUnavailable(String),

    /// The attempt store answered, but with an error
    #[error("Attempt store error: {0}")]
    Store(String),

    #[error("Corrupt attempt record under key '{key}': {value:?}")]
    CorruptRecord { key: String, value: String },

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GateError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GateError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::CorruptRecord { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GateError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the failure is a connectivity problem worth retrying
    pub fn is_unavailable(&self) -> bool {
        matches!(self, GateError::StoreUnavailable(_))
    }
}

impl From<redis::RedisError> for GateError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
        {
            GateError::StoreUnavailable(e.to_string())
        } else {
            GateError::Store(e.to_string())
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            GateError::StoreUnavailable("refused".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GateError::Config("missing".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GateError::CorruptRecord {
                key: "k".to_string(),
                value: "v".to_string()
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_display() {
        let err = GateError::CorruptRecord {
            key: "rate-limit:buy-corn:1.2.3.4".to_string(),
            value: "abc".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Corrupt attempt record under key 'rate-limit:buy-corn:1.2.3.4': \"abc\""
        );
    }

    #[test]
    fn test_redis_io_error_is_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: GateError = redis::RedisError::from(io).into();
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_redis_response_error_is_not_unavailable() {
        let redis_err = redis::RedisError::from((redis::ErrorKind::ResponseError, "WRONGTYPE"));
        let err: GateError = redis_err.into();
        assert!(!err.is_unavailable());
        assert!(matches!(err, GateError::Store(_)));
    }
}
