use super::types::CircuitState;
use crate::metrics;
use std::fmt::{Debug, Display};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Receives resilience events from a [`RetryManager`](super::RetryManager)
/// or [`CircuitBreaker`](super::CircuitBreaker).
///
/// Every hook has a no-op default so implementors only override what they
/// care about.
pub trait ResilienceObserver: Send + Sync + Debug {
    /// A retry is about to be attempted after `delay`
    fn retry_scheduled(&self, _label: &str, _attempt: u32, _delay: Duration, _error: &dyn Display) {}

    /// The operation succeeded after at least one retry
    fn recovered(&self, _label: &str, _attempts: u32) {}

    /// Every attempt failed; the last error is being returned
    fn retries_exhausted(&self, _label: &str, _attempts: u32, _error: &dyn Display) {}

    /// A guarded call failed and was counted by the breaker
    fn failure_recorded(&self, _breaker: &str, _label: &str, _failure_count: u32, _error: &dyn Display) {}

    /// A call was short-circuited without invoking the operation
    fn call_rejected(&self, _breaker: &str, _label: &str, _retry_in: Duration) {}

    /// The breaker moved from one state to another
    fn state_changed(&self, _breaker: &str, _from: CircuitState, _to: CircuitState) {}
}

/// Observer that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ResilienceObserver for NoopObserver {}

/// Default observer: structured `tracing` events plus Prometheus metrics
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ResilienceObserver for TracingObserver {
    fn retry_scheduled(&self, label: &str, attempt: u32, delay: Duration, error: &dyn Display) {
        debug!(
            operation = label,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Operation failed, retrying after backoff"
        );
        metrics::record_retry(label);
    }

    fn recovered(&self, label: &str, attempts: u32) {
        info!(operation = label, attempts, "Operation succeeded after retries");
    }

    fn retries_exhausted(&self, label: &str, attempts: u32, error: &dyn Display) {
        warn!(
            operation = label,
            attempts,
            error = %error,
            "Operation failed after max retries"
        );
    }

    fn failure_recorded(&self, breaker: &str, label: &str, failure_count: u32, error: &dyn Display) {
        debug!(
            breaker,
            operation = label,
            failure_count,
            error = %error,
            "Guarded call failed"
        );
    }

    fn call_rejected(&self, breaker: &str, label: &str, retry_in: Duration) {
        debug!(
            breaker,
            operation = label,
            retry_in_ms = retry_in.as_millis() as u64,
            "Circuit breaker open, rejecting call"
        );
        metrics::record_circuit_breaker_rejection(breaker);
    }

    fn state_changed(&self, breaker: &str, from: CircuitState, to: CircuitState) {
        match to {
            CircuitState::Open => warn!(breaker, from = %from, "Circuit breaker opening"),
            _ => info!(breaker, from = %from, to = %to, "Circuit breaker state changed"),
        }
        metrics::record_circuit_breaker_state(breaker, to.as_gauge());
        metrics::record_circuit_breaker_transition(breaker, &from.to_string(), &to.to_string());
    }
}
