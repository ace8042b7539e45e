pub mod config;
pub mod error;
pub mod healthcheck;
pub mod linter;
pub mod mcp;
pub mod metrics;
pub mod observability;
pub mod resilience;

pub use observability::init_tracing;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::healthcheck::health_handler;
use crate::linter::{LintBackend, LinterClient};
use crate::mcp::mcp_handler;
use crate::metrics::{metrics_handler, MetricsService};
use crate::resilience::{CircuitBreaker, GuardedCaller};
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared handler state
#[derive(Clone, FromRef)]
pub struct AppState {
    /// Lint results for tool calls
    pub backend: Arc<dyn LintBackend>,
    /// Breaker guarding the backend, read by the health endpoint
    pub breaker: Arc<CircuitBreaker>,
    pub metrics: MetricsService,
}

/// Build the HTTP application
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/mcp", post(mcp_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Initialize the bridge server
pub async fn init_bridge(config: BridgeConfig) -> Result<()> {
    // Validate configuration
    config.validate()?;

    info!("Starting lint bridge");

    let metrics = MetricsService::new()?;
    let guard = GuardedCaller::new(config.circuit_breaker.clone(), config.retry.clone());
    let client = LinterClient::new(&config.upstream, guard.clone())?;

    let state = AppState {
        backend: Arc::new(client),
        breaker: guard.breaker().clone(),
        metrics,
    };

    // Bind and serve
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(addr = %addr, upstream = %config.upstream.base_url, "Lint bridge ready to accept connections");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| BridgeError::Internal(format!("Server error: {}", e)))?;

    info!("Lint bridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
