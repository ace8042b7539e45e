use super::observer::{ResilienceObserver, TracingObserver};
use super::types::RetryConfig;
use super::DEFAULT_LABEL;
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Jitter band applied around each computed delay (0.75x to 1.25x)
const JITTER_FACTOR: f64 = 0.25;

/// Retries a fallible async operation with exponential backoff and jitter
#[derive(Debug, Clone)]
pub struct RetryManager {
    config: RetryConfig,
    observer: Arc<dyn ResilienceObserver>,
}

impl RetryManager {
    /// Create a new retry manager reporting through [`TracingObserver`]
    pub fn new(config: RetryConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// Create a new retry manager reporting through `observer`
    pub fn with_observer(config: RetryConfig, observer: Arc<dyn ResilienceObserver>) -> Self {
        Self { config, observer }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it succeeds or `max_retries + 1` attempts fail.
    ///
    /// Every error is treated as retryable. The error of the final attempt is
    /// returned as-is.
    pub async fn execute_with_retry<F, Fut, T, E>(
        &self,
        mut operation: F,
        label: Option<&str>,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let label = label.unwrap_or(DEFAULT_LABEL);
        let mut schedule = self.delay_schedule();
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        self.observer.recovered(label, attempt);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    if attempt > self.config.max_retries {
                        self.observer.retries_exhausted(label, attempt, &e);
                        return Err(e);
                    }

                    let wait = schedule.next_delay();
                    self.observer.retry_scheduled(label, attempt + 1, wait, &e);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Delays to wait before each successive retry
    pub fn delay_schedule(&self) -> DelaySchedule {
        DelaySchedule {
            backoff: self.create_backoff(),
            max_delay: self.config.max_delay(),
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        let randomization = if self.config.jitter { JITTER_FACTOR } else { 0.0 };

        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.config.initial_delay().min(self.config.max_delay()))
            .with_max_interval(self.config.max_delay())
            .with_multiplier(self.config.backoff_factor)
            .with_randomization_factor(randomization)
            .with_max_elapsed_time(None) // attempts are bounded by max_retries
            .build()
    }
}

/// Sequence of retry delays: retry `k` waits
/// `min(initial * factor^(k-1), max)`, scaled into the jitter band when
/// enabled and floored to whole milliseconds.
pub struct DelaySchedule {
    backoff: ExponentialBackoff,
    max_delay: Duration,
}

impl DelaySchedule {
    pub fn next_delay(&mut self) -> Duration {
        // max_elapsed_time is disabled so the backoff never runs dry
        let wait = self.backoff.next_backoff().unwrap_or(self.max_delay);
        Duration::from_millis(wait.as_millis() as u64)
    }
}

impl Iterator for DelaySchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        Some(self.next_delay())
    }
}
