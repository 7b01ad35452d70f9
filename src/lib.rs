pub mod config;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod rate_limit;
pub mod routes;
pub mod secrets;

use crate::config::AppConfig;
use crate::error::{GateError, Result};
use crate::metrics::{metrics_handler, MetricsService};
use crate::rate_limit::{RateLimiter, RedisConnector};
use crate::routes::{
    buy_handler, dismiss_handler, health_handler, method_not_allowed, status_handler, AppState,
};
use crate::secrets::EnvCredentials;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the limiter for `config`: Redis when the credential variables are
/// set at call time, in-memory otherwise.
pub fn build_limiter(config: &AppConfig) -> RateLimiter {
    let credentials = EnvCredentials::new(&config.store.url_env, &config.store.token_env);
    let connector = RedisConnector::new(config.store.clone(), Arc::new(credentials));
    RateLimiter::new(config.rate_limit.clone(), Arc::new(connector))
}

/// Assemble the HTTP router
pub fn build_router(state: AppState, metrics: Option<MetricsService>) -> Router {
    let mut app = Router::new()
        .route(
            "/api/buy",
            get(method_not_allowed)
                .post(buy_handler)
                .delete(dismiss_handler),
        )
        .route("/api/buy/status", get(status_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    if let Some(metrics) = metrics {
        app = app.merge(
            Router::new()
                .route("/metrics", get(metrics_handler))
                .with_state(metrics),
        );
    }

    app.layer(TraceLayer::new_for_http())
}

/// Initialize the corn-gate server
pub async fn init_server(config: AppConfig) -> Result<()> {
    config.validate()?;

    info!("Starting corn-gate");
    info!(
        "Server listening on {}:{}",
        config.server.host, config.server.port
    );
    info!(
        window_secs = config.rate_limit.window_secs,
        max_requests = config.rate_limit.max_requests,
        key_prefix = %config.rate_limit.key_prefix,
        "Purchase rate limit configured"
    );

    let metrics = MetricsService::new()?;
    let limiter = build_limiter(&config);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = build_router(AppState::new(limiter, config), Some(metrics));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(GateError::Io)?;

    info!("corn-gate ready to accept connections");

    axum::serve(listener, app)
        .await
        .map_err(|e| GateError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

/// Initialize tracing/logging.
///
/// `LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "corn_gate=debug,tower_http=debug".into());

    if std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false) {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}
