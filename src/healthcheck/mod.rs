use crate::resilience::CircuitState;
use crate::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use tracing::debug;

/// Health endpoint body
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// `ok` while the breaker is closed, `degraded` otherwise
    pub status: &'static str,
    pub upstream: UpstreamHealth,
    pub circuit_breaker: BreakerHealth,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpstreamHealth {
    pub reachable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakerHealth {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_in_ms: Option<u64>,
}

/// Health endpoint handler
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    let reachable = match state.backend.ping().await {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "Upstream health probe failed");
            false
        }
    };

    let breaker = &state.breaker;
    let circuit_state = breaker.state().await;

    Json(HealthReport {
        status: if circuit_state == CircuitState::Closed {
            "ok"
        } else {
            "degraded"
        },
        upstream: UpstreamHealth { reachable },
        circuit_breaker: BreakerHealth {
            name: breaker.name().to_string(),
            state: circuit_state,
            failure_count: breaker.failure_count().await,
            retry_in_ms: breaker.retry_in().await.map(|d| d.as_millis() as u64),
        },
    })
}
