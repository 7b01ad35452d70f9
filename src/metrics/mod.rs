use crate::error::{GateError, Result};
use crate::rate_limit::StoreBackend;
use axum::{
    body::Body,
    extract::State,
    http::{Response, StatusCode},
    response::IntoResponse,
};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Metrics service for collecting and exposing Prometheus metrics
#[derive(Clone)]
pub struct MetricsService {
    handle: Arc<PrometheusHandle>,
}

impl MetricsService {
    /// Install the global recorder. Only succeeds once per process.
    pub fn new() -> Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            GateError::Internal(format!("Failed to install metrics recorder: {}", e))
        })?;

        Self::register_metrics();

        info!("Metrics service initialized successfully");

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    /// Register all metrics with descriptions
    fn register_metrics() {
        describe_counter!(
            "corn_gate_requests_total",
            "Total number of HTTP requests received"
        );
        describe_histogram!(
            "corn_gate_request_duration_seconds",
            "HTTP request latencies in seconds"
        );
        describe_counter!(
            "corn_gate_admissions_total",
            "Admission decisions by store backend and outcome"
        );
        describe_counter!(
            "corn_gate_store_errors_total",
            "Attempt store failures by backend and operation"
        );
        describe_counter!(
            "corn_gate_purchases_total",
            "Completed corn purchases"
        );

        debug!("All metrics registered with descriptions");
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Metrics endpoint handler
pub async fn metrics_handler(State(service): State<MetricsService>) -> impl IntoResponse {
    let metrics = service.render();
    let mut response = Response::new(Body::from(metrics));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        "Content-Type",
        http::HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}

/// Record a handled request
pub fn record_request(method: &str, path: &str, status: u16, duration: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!("corn_gate_requests_total", &labels).increment(1);
    histogram!("corn_gate_request_duration_seconds", &labels).record(duration);
}

/// Record an admission decision
pub fn record_admission(backend: StoreBackend, allowed: bool) {
    let labels = [
        ("backend", backend.as_str().to_string()),
        (
            "outcome",
            if allowed { "allowed" } else { "denied" }.to_string(),
        ),
    ];
    counter!("corn_gate_admissions_total", &labels).increment(1);
}

/// Record a failed store operation
pub fn record_store_error(backend: StoreBackend, operation: &str) {
    let labels = [
        ("backend", backend.as_str().to_string()),
        ("operation", operation.to_string()),
    ];
    counter!("corn_gate_store_errors_total", &labels).increment(1);
}

/// Record a completed purchase
pub fn record_purchase() {
    counter!("corn_gate_purchases_total").increment(1);
}

/// Timer for measuring request duration
pub struct Timer {
    start: Instant,
    method: String,
    path: String,
}

impl Timer {
    /// Start a new timer for a request
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            start: Instant::now(),
            method: method.to_string(),
            path: path.to_string(),
        }
    }

    /// Record the elapsed time with the given status code
    pub fn record(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();
        record_request(&self.method, &self.path, status, duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_creation() {
        let timer = Timer::new("POST", "/api/buy");
        assert_eq!(timer.method, "POST");
        assert_eq!(timer.path, "/api/buy");
        timer.record(200);
    }

    #[tokio::test]
    async fn test_metrics_service_creation() {
        // The recorder is process-global; another test may have installed it
        match MetricsService::new() {
            Ok(service) => {
                record_purchase();
                assert!(service.render().contains("corn_gate_purchases_total"));
            }
            Err(e) => {
                assert!(e.to_string().contains("recorder") || e.to_string().contains("install"));
            }
        }
    }

    #[test]
    fn test_record_functions_dont_panic() {
        record_request("POST", "/api/buy", 429, 0.002);
        record_admission(StoreBackend::Memory, true);
        record_admission(StoreBackend::Redis, false);
        record_store_error(StoreBackend::Redis, "check");
        record_purchase();
    }
}
