use lint_bridge::resilience::{
    CallError, CircuitBreaker, CircuitBreakerConfig, CircuitState, GuardedCaller,
    ResilienceObserver, RetryConfig, RetryManager,
};
use std::fmt::Display;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{advance, sleep, Instant};

/// Observer that keeps every event for later assertions
#[derive(Debug, Default)]
struct Recorder {
    transitions: Mutex<Vec<(CircuitState, CircuitState)>>,
    retries: Mutex<Vec<(u32, Duration)>>,
    rejections: AtomicU32,
    exhausted: AtomicU32,
}

impl Recorder {
    fn transitions(&self) -> Vec<(CircuitState, CircuitState)> {
        self.transitions.lock().unwrap().clone()
    }

    fn retries(&self) -> Vec<(u32, Duration)> {
        self.retries.lock().unwrap().clone()
    }
}

impl ResilienceObserver for Recorder {
    fn retry_scheduled(&self, _label: &str, attempt: u32, delay: Duration, _error: &dyn Display) {
        self.retries.lock().unwrap().push((attempt, delay));
    }

    fn retries_exhausted(&self, _label: &str, _attempts: u32, _error: &dyn Display) {
        self.exhausted.fetch_add(1, Ordering::SeqCst);
    }

    fn call_rejected(&self, _breaker: &str, _label: &str, _retry_in: Duration) {
        self.rejections.fetch_add(1, Ordering::SeqCst);
    }

    fn state_changed(&self, _breaker: &str, from: CircuitState, to: CircuitState) {
        self.transitions.lock().unwrap().push((from, to));
    }
}

fn breaker_config(failure_threshold: u32, reset_timeout_ms: u64) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold,
        reset_timeout_ms,
        name: "linter".to_string(),
    }
}

async fn failing_call(cb: &CircuitBreaker, invoked: &AtomicU32) -> Result<(), CallError<String>> {
    cb.execute(
        || {
            invoked.fetch_add(1, Ordering::SeqCst);
            async { Err("upstream unavailable".to_string()) }
        },
        Some("lint"),
    )
    .await
}

async fn succeeding_call(cb: &CircuitBreaker, invoked: &AtomicU32) -> Result<(), CallError<String>> {
    cb.execute(
        || {
            invoked.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        },
        Some("lint"),
    )
    .await
}

#[tokio::test(start_paused = true)]
async fn test_retry_scenario_exact_backoff() {
    let recorder = Arc::new(Recorder::default());
    let manager = RetryManager::with_observer(
        RetryConfig {
            max_retries: 2,
            initial_delay_ms: 100,
            backoff_factor: 2.0,
            jitter: false,
            ..Default::default()
        },
        recorder.clone(),
    );

    let attempts = AtomicU32::new(0);
    let start = Instant::now();
    let result = manager
        .execute_with_retry(
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("bad gateway") }
            },
            Some("lint"),
        )
        .await;

    assert_eq!(result, Err("bad gateway"));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(
        recorder.retries(),
        vec![(2, Duration::from_millis(100)), (3, Duration::from_millis(200))]
    );
    assert_eq!(recorder.exhausted.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_retry_success_invokes_once_regardless_of_budget() {
    for max_retries in [0, 3, 10] {
        let manager = RetryManager::new(RetryConfig {
            max_retries,
            ..Default::default()
        });
        let attempts = AtomicU32::new(0);
        let start = Instant::now();

        let value = manager
            .execute_with_retry(
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, String>(42) }
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}

#[tokio::test(start_paused = true)]
async fn test_jittered_retry_delays_stay_in_band() {
    let recorder = Arc::new(Recorder::default());
    let manager = RetryManager::with_observer(
        RetryConfig {
            max_retries: 5,
            ..Default::default()
        },
        recorder.clone(),
    );

    let _ = manager
        .execute_with_retry(|| async { Err::<(), _>("down") }, None)
        .await;

    let retries = recorder.retries();
    assert_eq!(retries.len(), 5);
    for (k, (_, delay)) in retries.iter().enumerate() {
        let base = (500.0 * 2f64.powi(k as i32)).min(5000.0);
        let ms = delay.as_millis() as f64;
        assert!(ms >= base * 0.75 && ms <= base * 1.25, "retry {} waited {}ms", k + 1, ms);
    }
}

#[tokio::test]
async fn test_default_threshold_rejects_sixth_call() {
    let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
    let invoked = AtomicU32::new(0);

    for _ in 0..5 {
        let err = failing_call(&cb, &invoked).await.unwrap_err();
        assert!(!err.is_open());
    }
    assert_eq!(invoked.load(Ordering::SeqCst), 5);
    assert_eq!(cb.state().await, CircuitState::Open);

    let err = failing_call(&cb, &invoked).await.unwrap_err();
    assert!(err.is_open());
    assert_eq!(invoked.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn test_open_window_boundaries() {
    let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
    let invoked = AtomicU32::new(0);
    for _ in 0..5 {
        let _ = failing_call(&cb, &invoked).await;
    }

    advance(Duration::from_millis(29_999)).await;
    assert!(succeeding_call(&cb, &invoked).await.unwrap_err().is_open());
    assert_eq!(invoked.load(Ordering::SeqCst), 5);

    advance(Duration::from_millis(2)).await;
    succeeding_call(&cb, &invoked).await.unwrap();
    assert_eq!(invoked.load(Ordering::SeqCst), 6);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_scenario_trip_reject_probe() {
    let recorder = Arc::new(Recorder::default());
    let cb = CircuitBreaker::with_observer(breaker_config(2, 1000), recorder.clone());
    let invoked = AtomicU32::new(0);

    let _ = failing_call(&cb, &invoked).await;
    let _ = failing_call(&cb, &invoked).await;
    assert_eq!(cb.state().await, CircuitState::Open);

    let err = failing_call(&cb, &invoked).await.unwrap_err();
    assert!(matches!(err, CallError::Open { ref breaker, .. } if breaker == "linter"));
    assert_eq!(invoked.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.rejections.load(Ordering::SeqCst), 1);

    sleep(Duration::from_millis(1000)).await;
    succeeding_call(&cb, &invoked).await.unwrap();
    assert_eq!(invoked.load(Ordering::SeqCst), 3);

    assert_eq!(
        recorder.transitions(),
        vec![
            (CircuitState::Closed, CircuitState::Open),
            (CircuitState::Open, CircuitState::HalfOpen),
            (CircuitState::HalfOpen, CircuitState::Closed),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_trial_requires_full_new_timeout() {
    let recorder = Arc::new(Recorder::default());
    let cb = CircuitBreaker::with_observer(breaker_config(5, 30_000), recorder.clone());
    let invoked = AtomicU32::new(0);
    for _ in 0..5 {
        let _ = failing_call(&cb, &invoked).await;
    }

    advance(Duration::from_millis(30_001)).await;
    assert!(!failing_call(&cb, &invoked).await.unwrap_err().is_open());
    assert_eq!(cb.state().await, CircuitState::Open);

    advance(Duration::from_millis(29_000)).await;
    assert!(succeeding_call(&cb, &invoked).await.unwrap_err().is_open());
    assert_eq!(invoked.load(Ordering::SeqCst), 6);

    assert_eq!(
        recorder.transitions(),
        vec![
            (CircuitState::Closed, CircuitState::Open),
            (CircuitState::Open, CircuitState::HalfOpen),
            (CircuitState::HalfOpen, CircuitState::Open),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_successful_trial_requires_threshold_to_retrip() {
    let cb = CircuitBreaker::new(breaker_config(5, 30_000));
    let invoked = AtomicU32::new(0);
    for _ in 0..5 {
        let _ = failing_call(&cb, &invoked).await;
    }

    advance(Duration::from_millis(30_001)).await;
    succeeding_call(&cb, &invoked).await.unwrap();
    assert_eq!(cb.failure_count().await, 0);

    for n in 1..5 {
        let _ = failing_call(&cb, &invoked).await;
        assert_eq!(cb.failure_count().await, n);
        assert_eq!(cb.state().await, CircuitState::Closed);
    }
    let _ = failing_call(&cb, &invoked).await;
    assert_eq!(cb.state().await, CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_composed_call_hides_internal_retries() {
    let guarded = GuardedCaller::new(
        breaker_config(2, 30_000),
        RetryConfig {
            max_retries: 2,
            initial_delay_ms: 100,
            jitter: false,
            ..Default::default()
        },
    );
    let attempts = AtomicU32::new(0);

    let value = guarded
        .call(
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(format!("attempt {} failed", n + 1))
                    } else {
                        Ok("linted")
                    }
                }
            },
            Some("lint"),
        )
        .await
        .unwrap();

    assert_eq!(value, "linted");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(guarded.breaker().failure_count().await, 0);
    assert_eq!(guarded.state().await, CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_composed_call_surfaces_last_error() {
    let guarded = GuardedCaller::new(
        breaker_config(5, 30_000),
        RetryConfig {
            max_retries: 1,
            jitter: false,
            ..Default::default()
        },
    );
    let attempts = AtomicU32::new(0);

    let err = guarded
        .call(
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move { Err::<(), _>(format!("attempt {} failed", n + 1)) }
            },
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::Operation(ref e) if e == "attempt 2 failed"));
    assert_eq!(guarded.breaker().failure_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_breaker_cancels_pending_transition() {
    let recorder = Arc::new(Recorder::default());
    let cb = CircuitBreaker::with_observer(breaker_config(1, 1000), recorder.clone());
    let invoked = AtomicU32::new(0);
    let _ = failing_call(&cb, &invoked).await;
    drop(cb);

    sleep(Duration::from_millis(2000)).await;
    assert_eq!(
        recorder.transitions(),
        vec![(CircuitState::Closed, CircuitState::Open)]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_open_circuit_once() {
    let recorder = Arc::new(Recorder::default());
    let cb = Arc::new(CircuitBreaker::with_observer(
        breaker_config(3, 60_000),
        recorder.clone(),
    ));

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..16 {
        let cb = cb.clone();
        tasks.spawn(async move {
            cb.execute(
                || async {
                    tokio::task::yield_now().await;
                    Err::<(), _>("down".to_string())
                },
                None,
            )
            .await
        });
    }
    while let Some(result) = tasks.join_next().await {
        assert!(result.unwrap().is_err());
    }

    assert_eq!(cb.state().await, CircuitState::Open);
    assert_eq!(
        recorder.transitions(),
        vec![(CircuitState::Closed, CircuitState::Open)]
    );
}
