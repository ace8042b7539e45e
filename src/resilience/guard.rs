use super::breaker::{CallError, CircuitBreaker};
use super::observer::{ResilienceObserver, TracingObserver};
use super::retry::RetryManager;
use super::types::{CircuitBreakerConfig, CircuitState, RetryConfig};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

/// Breaker/retry pair guarding one upstream dependency.
///
/// The breaker decides whether to attempt at all; inside an admitted call the
/// retry manager absorbs transient failures, so the breaker only ever sees
/// the final outcome of the retried call.
#[derive(Debug, Clone)]
pub struct GuardedCaller {
    breaker: Arc<CircuitBreaker>,
    retry: RetryManager,
}

impl GuardedCaller {
    /// Create a new guarded caller reporting through [`TracingObserver`]
    pub fn new(breaker: CircuitBreakerConfig, retry: RetryConfig) -> Self {
        Self::with_observer(breaker, retry, Arc::new(TracingObserver))
    }

    pub fn with_observer(
        breaker: CircuitBreakerConfig,
        retry: RetryConfig,
        observer: Arc<dyn ResilienceObserver>,
    ) -> Self {
        Self {
            breaker: Arc::new(CircuitBreaker::with_observer(breaker, observer.clone())),
            retry: RetryManager::with_observer(retry, observer),
        }
    }

    /// Run `operation` through the breaker, retrying inside the admitted call
    pub async fn call<F, Fut, T, E>(&self, operation: F, label: Option<&str>) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.breaker
            .execute(|| self.retry.execute_with_retry(operation, label), label)
            .await
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn retry(&self) -> &RetryManager {
        &self.retry
    }

    /// Get the state of the underlying breaker
    pub async fn state(&self) -> CircuitState {
        self.breaker.state().await
    }
}
