//! Retry and circuit-breaking for calls to the upstream linter.

pub mod breaker;
pub mod guard;
pub mod observer;
pub mod retry;
pub mod types;

pub use breaker::{CallError, CircuitBreaker};
pub use guard::GuardedCaller;
pub use observer::{NoopObserver, ResilienceObserver, TracingObserver};
pub use retry::{DelaySchedule, RetryManager};
pub use types::{CircuitBreakerConfig, CircuitState, RetryConfig};

/// Label used when a caller does not name the guarded operation
pub(crate) const DEFAULT_LABEL: &str = "operation";
