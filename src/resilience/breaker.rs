use super::observer::{ResilienceObserver, TracingObserver};
use super::types::{CircuitBreakerConfig, CircuitState};
use super::DEFAULT_LABEL;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::debug;

/// Outcome of a call that went through a [`CircuitBreaker`]
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// The breaker short-circuited the call; the operation never ran
    #[error("circuit breaker '{breaker}' is open, retry in {}ms", .retry_in.as_millis())]
    Open { breaker: String, retry_in: Duration },

    /// The operation ran and failed with this error
    #[error("{0}")]
    Operation(E),
}

impl<E> CallError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, CallError::Open { .. })
    }

    /// The operation's own error, if the operation ran
    pub fn into_operation(self) -> Option<E> {
        match self {
            CallError::Operation(e) => Some(e),
            CallError::Open { .. } => None,
        }
    }
}

/// Circuit breaker guarding a single upstream dependency
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Configuration
    config: CircuitBreakerConfig,
    /// Shared state; the reset timer holds only a weak reference to it
    state: Arc<RwLock<State>>,
    observer: Arc<dyn ResilienceObserver>,
}

#[derive(Debug)]
struct State {
    /// Current circuit state
    circuit_state: CircuitState,
    /// Failures counted since the circuit last closed
    failure_count: u32,
    /// Earliest time a trial call is allowed while open
    next_attempt: Option<Instant>,
    /// Id of the half-open trial call in flight
    trial: Option<u64>,
    next_trial_id: u64,
    /// Pending open -> half-open transition
    reset_timer: Option<AbortHandle>,
    /// Bumped every time a reset timer is scheduled or cancelled
    timer_generation: u64,
}

impl State {
    fn cancel_reset_timer(&mut self) {
        self.timer_generation += 1;
        if let Some(timer) = self.reset_timer.take() {
            timer.abort();
        }
    }
}

impl Drop for State {
    fn drop(&mut self) {
        self.cancel_reset_timer();
    }
}

/// How a call was let through
enum Admission {
    Normal,
    Trial(TrialGuard),
}

/// Releases the half-open trial slot if the call is abandoned before it
/// reports an outcome.
struct TrialGuard {
    state: Weak<RwLock<State>>,
    id: u64,
    armed: bool,
}

impl TrialGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TrialGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let id = self.id;
        let release = move |state: &mut State| {
            if state.trial == Some(id) {
                state.trial = None;
            }
        };

        if let Ok(mut guard) = state.try_write() {
            release(&mut *guard);
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { release(&mut *state.write().await) });
        }
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker reporting through [`TracingObserver`]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// Create a new circuit breaker reporting through `observer`
    pub fn with_observer(config: CircuitBreakerConfig, observer: Arc<dyn ResilienceObserver>) -> Self {
        debug!(
            breaker = %config.name,
            failure_threshold = config.failure_threshold,
            reset_timeout_ms = config.reset_timeout_ms,
            "Creating circuit breaker"
        );

        Self {
            config,
            state: Arc::new(RwLock::new(State {
                circuit_state: CircuitState::Closed,
                failure_count: 0,
                next_attempt: None,
                trial: None,
                next_trial_id: 0,
                reset_timer: None,
                timer_generation: 0,
            })),
            observer,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Run `operation` unless the circuit is open.
    ///
    /// Rejections surface as [`CallError::Open`] without invoking the
    /// operation; operation failures surface unchanged as
    /// [`CallError::Operation`].
    pub async fn execute<F, Fut, T, E>(&self, operation: F, label: Option<&str>) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let label = label.unwrap_or(DEFAULT_LABEL);

        let admission = match self.admit(label).await {
            Ok(admission) => admission,
            Err(retry_in) => {
                return Err(CallError::Open {
                    breaker: self.config.name.clone(),
                    retry_in,
                })
            }
        };

        match operation().await {
            Ok(value) => {
                self.record_success(admission).await;
                Ok(value)
            }
            Err(e) => {
                self.record_failure(admission, label, &e).await;
                Err(CallError::Operation(e))
            }
        }
    }

    /// Get current state
    pub async fn state(&self) -> CircuitState {
        self.state.read().await.circuit_state
    }

    /// Get the number of failures counted since the circuit last closed
    pub async fn failure_count(&self) -> u32 {
        self.state.read().await.failure_count
    }

    /// Time left until a trial call is allowed, if the circuit is open
    pub async fn retry_in(&self) -> Option<Duration> {
        let state = self.state.read().await;
        match (state.circuit_state, state.next_attempt) {
            (CircuitState::Open, Some(next)) => Some(next.saturating_duration_since(Instant::now())),
            _ => None,
        }
    }

    /// Force the circuit closed, discarding failure history
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        if state.circuit_state != CircuitState::Closed {
            self.transition_to_closed(&mut state);
        } else {
            state.failure_count = 0;
        }
    }

    /// Decide whether a call may run; on rejection returns the time left
    /// until the next trial is allowed.
    async fn admit(&self, label: &str) -> Result<Admission, Duration> {
        let mut state = self.state.write().await;

        match state.circuit_state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let now = Instant::now();
                match state.next_attempt {
                    Some(next) if now < next => {
                        let retry_in = next - now;
                        self.observer.call_rejected(&self.config.name, label, retry_in);
                        Err(retry_in)
                    }
                    _ => {
                        self.transition_to_half_open(&mut state);
                        Ok(self.start_trial(&mut state))
                    }
                }
            }
            CircuitState::HalfOpen => {
                if state.trial.is_some() {
                    self.observer.call_rejected(&self.config.name, label, Duration::ZERO);
                    Err(Duration::ZERO)
                } else {
                    Ok(self.start_trial(&mut state))
                }
            }
        }
    }

    fn start_trial(&self, state: &mut State) -> Admission {
        let id = state.next_trial_id;
        state.next_trial_id += 1;
        state.trial = Some(id);

        debug!(breaker = %self.config.name, trial = id, "Allowing half-open trial call");

        Admission::Trial(TrialGuard {
            state: Arc::downgrade(&self.state),
            id,
            armed: true,
        })
    }

    async fn record_success(&self, mut admission: Admission) {
        let mut state = self.state.write().await;

        match (&mut admission, state.circuit_state) {
            (Admission::Trial(trial), CircuitState::HalfOpen) if state.trial == Some(trial.id) => {
                trial.disarm();
                self.transition_to_closed(&mut state);
            }
            (Admission::Trial(trial), _) => {
                trial.disarm();
                debug!(breaker = %self.config.name, "Ignoring success of superseded trial");
            }
            (Admission::Normal, _) => {
                // Closed-state successes leave the failure count untouched
            }
        }
    }

    async fn record_failure<E: Display>(&self, mut admission: Admission, label: &str, error: &E) {
        let mut state = self.state.write().await;

        match (&mut admission, state.circuit_state) {
            (Admission::Normal, CircuitState::Closed) => {
                state.failure_count += 1;
                self.observer
                    .failure_recorded(&self.config.name, label, state.failure_count, error);

                if state.failure_count >= self.config.failure_threshold {
                    self.transition_to_open(&mut state);
                }
            }
            (Admission::Trial(trial), CircuitState::HalfOpen) if state.trial == Some(trial.id) => {
                trial.disarm();
                state.failure_count += 1;
                self.observer
                    .failure_recorded(&self.config.name, label, state.failure_count, error);
                // Half-open tolerates no failures
                self.transition_to_open(&mut state);
            }
            (Admission::Trial(trial), _) => {
                trial.disarm();
                debug!(breaker = %self.config.name, "Ignoring failure of superseded trial");
            }
            (Admission::Normal, current) => {
                debug!(
                    breaker = %self.config.name,
                    state = %current,
                    "Ignoring failure of call admitted before the circuit opened"
                );
            }
        }
    }

    /// Transition to open state and schedule the move to half-open
    fn transition_to_open(&self, state: &mut State) {
        let from = state.circuit_state;
        let reset_timeout = self.config.reset_timeout();

        state.circuit_state = CircuitState::Open;
        state.next_attempt = Some(Instant::now() + reset_timeout);
        state.trial = None;
        state.cancel_reset_timer();

        let generation = state.timer_generation;
        let shared = Arc::downgrade(&self.state);
        let observer = self.observer.clone();
        let name = self.config.name.clone();

        let timer = tokio::spawn(async move {
            tokio::time::sleep(reset_timeout).await;
            let Some(shared) = shared.upgrade() else {
                return;
            };
            let mut state = shared.write().await;
            if state.timer_generation != generation || state.circuit_state != CircuitState::Open {
                return;
            }
            state.reset_timer = None;
            enter_half_open(&mut state);
            observer.state_changed(&name, CircuitState::Open, CircuitState::HalfOpen);
        });
        state.reset_timer = Some(timer.abort_handle());

        self.observer
            .state_changed(&self.config.name, from, CircuitState::Open);
    }

    /// Transition to half-open state
    fn transition_to_half_open(&self, state: &mut State) {
        // Only an open circuit moves to half-open
        if state.circuit_state != CircuitState::Open {
            return;
        }
        state.cancel_reset_timer();
        enter_half_open(state);
        self.observer
            .state_changed(&self.config.name, CircuitState::Open, CircuitState::HalfOpen);
    }

    /// Transition to closed state
    fn transition_to_closed(&self, state: &mut State) {
        let from = state.circuit_state;

        state.cancel_reset_timer();
        state.circuit_state = CircuitState::Closed;
        state.failure_count = 0;
        state.next_attempt = None;
        state.trial = None;

        self.observer
            .state_changed(&self.config.name, from, CircuitState::Closed);
    }
}

fn enter_half_open(state: &mut State) {
    state.circuit_state = CircuitState::HalfOpen;
    state.next_attempt = None;
    state.trial = None;
}
