use crate::error::{BridgeError, Result};
use axum::{extract::State, http::header, response::IntoResponse};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
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
    /// Create a new metrics service and install it as the global recorder
    pub fn new() -> Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            BridgeError::Internal(format!("Failed to install metrics recorder: {}", e))
        })?;

        // Register all metrics with descriptions
        Self::register_metrics();

        info!("Metrics service initialized successfully");

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    /// Create a metrics service whose recorder is not installed globally.
    /// Used when several routers share one process, as in tests.
    pub fn detached() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        Self {
            handle: Arc::new(recorder.handle()),
        }
    }

    /// Register all metrics with descriptions
    fn register_metrics() {
        describe_counter!(
            "lint_bridge_requests_total",
            "Total number of JSON-RPC requests handled"
        );
        describe_histogram!(
            "lint_bridge_request_duration_seconds",
            "JSON-RPC request latencies in seconds"
        );

        // Upstream metrics
        describe_counter!(
            "lint_bridge_upstream_calls_total",
            "Total number of individual attempts against the upstream linter"
        );
        describe_histogram!(
            "lint_bridge_upstream_duration_seconds",
            "Upstream linter attempt latencies in seconds"
        );
        describe_counter!(
            "lint_bridge_retries_total",
            "Total number of retries scheduled for upstream calls"
        );

        // Circuit breaker metrics
        describe_gauge!(
            "lint_bridge_circuit_breaker_state",
            "Circuit breaker state (0 = closed, 1 = open, 2 = half-open)"
        );
        describe_counter!(
            "lint_bridge_circuit_breaker_transitions_total",
            "Total number of circuit breaker state transitions"
        );
        describe_counter!(
            "lint_bridge_circuit_breaker_rejections_total",
            "Total number of calls rejected by an open circuit"
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
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        service.render(),
    )
}

/// Record a handled JSON-RPC request
pub fn record_request(method: &str, outcome: &str, duration: f64) {
    let labels = [
        ("method", method.to_string()),
        ("outcome", outcome.to_string()),
    ];

    counter!("lint_bridge_requests_total", &labels).increment(1);
    histogram!("lint_bridge_request_duration_seconds", &labels).record(duration);
}

/// Record a single attempt against the upstream linter
pub fn record_upstream_call(operation: &str, outcome: &str, duration: f64) {
    let labels = [
        ("operation", operation.to_string()),
        ("outcome", outcome.to_string()),
    ];

    counter!("lint_bridge_upstream_calls_total", &labels).increment(1);
    histogram!("lint_bridge_upstream_duration_seconds", &labels).record(duration);
}

/// Record a scheduled retry
pub fn record_retry(operation: &str) {
    let labels = [("operation", operation.to_string())];
    counter!("lint_bridge_retries_total", &labels).increment(1);
}

/// Record circuit breaker state
/// State: 0 = Closed, 1 = Open, 2 = HalfOpen
pub fn record_circuit_breaker_state(breaker: &str, state: u8) {
    let labels = [("breaker", breaker.to_string())];
    gauge!("lint_bridge_circuit_breaker_state", &labels).set(state as f64);
}

/// Record circuit breaker transition
pub fn record_circuit_breaker_transition(breaker: &str, from_state: &str, to_state: &str) {
    let labels = [
        ("breaker", breaker.to_string()),
        ("from", from_state.to_string()),
        ("to", to_state.to_string()),
    ];
    counter!("lint_bridge_circuit_breaker_transitions_total", &labels).increment(1);
}

/// Record a call rejected by an open circuit
pub fn record_circuit_breaker_rejection(breaker: &str) {
    let labels = [("breaker", breaker.to_string())];
    counter!("lint_bridge_circuit_breaker_rejections_total", &labels).increment(1);
}

/// Timer for measuring JSON-RPC request duration
pub struct Timer {
    start: Instant,
    method: String,
}

impl Timer {
    /// Start a new timer for a request
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            method: method.into(),
        }
    }

    /// Record the elapsed time with the given outcome
    pub fn record(self, outcome: &str) {
        let duration = self.start.elapsed().as_secs_f64();
        record_request(&self.method, outcome, duration);
    }

    /// Get the elapsed time in seconds
    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_creation() {
        let timer = Timer::new("tools/call");
        assert_eq!(timer.method, "tools/call");
        assert!(timer.elapsed() >= 0.0);
    }

    #[test]
    fn test_detached_service_renders() {
        let service = MetricsService::detached();
        record_request("ping", "ok", 0.001);
        // Global macros never reach a detached recorder
        assert!(!service.render().contains("lint_bridge_requests_total"));
    }

    #[test]
    fn test_record_functions_dont_panic() {
        // These functions should not panic even if recorder isn't installed
        record_request("tools/call", "ok", 0.123);
        record_upstream_call("lint", "success", 0.456);
        record_retry("lint");
        record_circuit_breaker_state("linter", 1);
        record_circuit_breaker_transition("linter", "CLOSED", "OPEN");
        record_circuit_breaker_rejection("linter");
    }
}
