use crate::config::AppConfig;
use crate::error::{GateError, Result};
use crate::identity::ClientIdentifier;
use crate::metrics;
use crate::rate_limit::{RateLimitDecision, RateLimiter};
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, TimeZone, Utc};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared state of the purchase routes
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<RateLimiter>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(limiter: RateLimiter, config: AppConfig) -> Self {
        Self {
            limiter: Arc::new(limiter),
            config: Arc::new(config),
        }
    }
}

/// Purchase response body
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BuyResponse {
    Success {
        success: bool,
        message: String,
        data: PurchaseData,
    },
    Failure {
        success: bool,
        error: String,
        #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
        retry_after: Option<u64>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseData {
    pub purchased_at: String,
    pub next_purchase_allowed_at: String,
}

fn rfc3339(epoch_ms: u64) -> String {
    Utc.timestamp_millis_opt(epoch_ms as i64)
        .single()
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| GateError::Internal(format!("Invalid header name '{}': {}", name, e)))
}

fn header_value(value: impl ToString) -> Result<HeaderValue> {
    HeaderValue::from_str(&value.to_string())
        .map_err(|e| GateError::Internal(format!("Invalid header value: {}", e)))
}

/// `X-RateLimit-*` headers for a decision
fn rate_limit_headers(
    config: &AppConfig,
    decision: &RateLimitDecision,
    remaining: u32,
) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(header_name(&config.headers.limit)?, header_value(decision.limit)?);
    headers.insert(header_name(&config.headers.remaining)?, header_value(remaining)?);
    headers.insert(
        header_name(&config.headers.reset)?,
        header_value(decision.reset_secs())?,
    );
    Ok(headers)
}

/// 429 Too Many Requests with rate limit headers and `Retry-After`
fn rate_limited_response(
    config: &AppConfig,
    decision: &RateLimitDecision,
    now_ms: u64,
) -> Result<Response> {
    let retry_after = decision.retry_after_secs(now_ms);
    let mut headers = rate_limit_headers(config, decision, decision.remaining)?;
    headers.insert(header::RETRY_AFTER, header_value(retry_after)?);

    let body = BuyResponse::Failure {
        success: false,
        error: config.messages.rate_limit_exceeded.clone(),
        retry_after: Some(retry_after),
    };

    Ok((StatusCode::TOO_MANY_REQUESTS, headers, Json(body)).into_response())
}

/// 200 with the purchase receipt
fn purchase_response(
    config: &AppConfig,
    decision: &RateLimitDecision,
    now_ms: u64,
) -> Result<Response> {
    // The attempt is already recorded, so nothing remains in this window
    let headers = rate_limit_headers(config, decision, 0)?;

    let body = BuyResponse::Success {
        success: true,
        message: config.messages.purchase_success.clone(),
        data: PurchaseData {
            purchased_at: rfc3339(now_ms),
            next_purchase_allowed_at: rfc3339(decision.reset_at),
        },
    };

    Ok((StatusCode::OK, headers, Json(body)).into_response())
}

fn internal_error_response(config: &AppConfig) -> Response {
    let body = BuyResponse::Failure {
        success: false,
        error: config.messages.internal_error.clone(),
        retry_after: None,
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// `POST /api/buy`: buy one corn, at most once per window per client
pub async fn buy_handler(State(state): State<AppState>, client: ClientIdentifier) -> Response {
    let timer = metrics::Timer::new("POST", "/api/buy");

    let response = match buy(&state, &client).await {
        Ok(response) => response,
        Err(e) => {
            error!(client_id = %client.id, error = %e, "Error in /api/buy");
            internal_error_response(&state.config)
        }
    };

    timer.record(response.status().as_u16());
    response
}

async fn buy(state: &AppState, client: &ClientIdentifier) -> Result<Response> {
    let (decision, now) = state.limiter.try_acquire(client).await?;

    if !decision.allowed {
        warn!(
            client_id = %client.id,
            reset_at = decision.reset_at,
            "Purchase rejected by rate limit"
        );
        return rate_limited_response(&state.config, &decision, now);
    }

    info!(client_id = %client.id, "Corn purchased");
    metrics::record_purchase();
    purchase_response(&state.config, &decision, now)
}

/// `GET /api/buy`
pub async fn method_not_allowed(State(state): State<AppState>) -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        Json(json!({ "error": state.config.messages.method_not_allowed })),
    )
        .into_response()
}

/// `GET /api/buy/status`: the caller's limiter snapshot
pub async fn status_handler(State(state): State<AppState>, client: ClientIdentifier) -> Response {
    match state.limiter.inspect(&client).await {
        Ok(info) => Json(info).into_response(),
        Err(e) => {
            error!(client_id = %client.id, error = %e, "Error in /api/buy/status");
            internal_error_response(&state.config)
        }
    }
}

/// `DELETE /api/buy`: dismiss the caller's cooldown
pub async fn dismiss_handler(State(state): State<AppState>, client: ClientIdentifier) -> Response {
    match state.limiter.reset_admission(&client).await {
        Ok(()) => {
            info!(client_id = %client.id, "Purchase cooldown dismissed");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            error!(client_id = %client.id, error = %e, "Error in DELETE /api/buy");
            internal_error_response(&state.config)
        }
    }
}

/// `GET /health`: probe the store currently serving calls
pub async fn health_handler(State(state): State<AppState>) -> Response {
    match state.limiter.store_status().await {
        Ok(backend) => Json(json!({ "status": "ok", "store": backend.as_str() })).into_response(),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (
                e.status_code(),
                Json(json!({ "status": "degraded", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimitConfig;

    #[test]
    fn test_rate_limited_response() {
        let config = AppConfig::default();
        let now = 1_700_000_015_000;
        let decision = RateLimitDecision::denied(now - 15_000, &RateLimitConfig::default());

        let response = rate_limited_response(&config, &decision, now).unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let headers = response.headers();
        assert_eq!(headers.get("X-RateLimit-Limit").unwrap(), "1");
        assert_eq!(headers.get("X-RateLimit-Remaining").unwrap(), "0");
        assert_eq!(headers.get("X-RateLimit-Reset").unwrap(), "1700000060");
        assert_eq!(headers.get("Retry-After").unwrap(), "45");
    }

    #[test]
    fn test_purchase_response_headers() {
        let config = AppConfig::default();
        let now = 1_700_000_000_000;
        let decision = RateLimitDecision::allowed(now, &RateLimitConfig::default());

        let response = purchase_response(&config, &decision, now).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("X-RateLimit-Remaining").unwrap(), "0");
        assert_eq!(response.headers().get("X-RateLimit-Reset").unwrap(), "1700000060");
        assert!(response.headers().get("Retry-After").is_none());
    }

    #[test]
    fn test_custom_header_names() {
        let mut config = AppConfig::default();
        config.headers.limit = "RateLimit-Limit".to_string();
        let decision = RateLimitDecision::allowed(0, &RateLimitConfig::default());

        let headers = rate_limit_headers(&config, &decision, 0).unwrap();
        assert_eq!(headers.get("RateLimit-Limit").unwrap(), "1");
        assert!(headers.get("X-RateLimit-Limit").is_none());
    }

    #[test]
    fn test_rfc3339() {
        assert_eq!(rfc3339(0), "1970-01-01T00:00:00.000Z");
        assert_eq!(rfc3339(1_700_000_000_123), "2023-11-14T22:13:20.123Z");
    }
}
