//! Per-dependency circuit breaker.
//!
//! Observes a sliding window of call outcomes. When the failure rate in the
//! window reaches a threshold the circuit opens and short-circuits further
//! calls until `wait_duration_in_open` has elapsed, at which point exactly
//! one probe call is admitted to decide whether to close again.

use crate::error::ResilienceError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn label(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub name: String,
    /// Number of most-recent outcomes considered when computing the failure rate.
    pub window_size: usize,
    /// Failure rate in `[0.0, 1.0]` at which the circuit opens. The window
    /// must be full before this is evaluated.
    pub failure_rate_threshold: f64,
    /// How long the circuit stays open before admitting a probe call.
    pub wait_duration_in_open: Duration,
}

impl CircuitBreakerConfig {
    pub fn new(name: impl Into<String>, wait_duration_in_open: Duration) -> Self {
        Self {
            name: name.into(),
            window_size: 10,
            failure_rate_threshold: 0.5,
            wait_duration_in_open,
        }
    }
}

struct Inner {
    state: CircuitState,
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    /// Set while the single admitted probe call is in flight; prevents a
    /// second caller from being admitted before the probe resolves.
    probe_in_flight: bool,
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

enum Admission {
    Proceed,
    Probe,
    Reject { retry_after_seconds: u64 },
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                window: VecDeque::with_capacity(16),
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.admit() {
            Admission::Reject { retry_after_seconds } => {
                return Err(ResilienceError::CircuitOpen {
                    dependency: self.config.name.clone(),
                    retry_after_seconds,
                })
            }
            Admission::Proceed | Admission::Probe => {}
        }

        let result = operation().await;
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        result.map_err(ResilienceError::Inner)
    }

    fn admit(&self) -> Admission {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Admission::Proceed,
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Admission::Reject { retry_after_seconds: 1 }
                } else {
                    inner.probe_in_flight = true;
                    Admission::Probe
                }
            }
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or_else(Instant::now);
                let elapsed = opened_at.elapsed();
                if elapsed >= self.config.wait_duration_in_open {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    info!(dependency = %self.config.name, "circuit half-open, admitting probe call");
                    Admission::Probe
                } else {
                    let remaining = self.config.wait_duration_in_open - elapsed;
                    Admission::Reject {
                        retry_after_seconds: remaining.as_secs().max(1),
                    }
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.probe_in_flight = false;
                inner.state = CircuitState::Closed;
                inner.window.clear();
                inner.opened_at = None;
                info!(dependency = %self.config.name, "circuit closed after successful probe");
            }
            CircuitState::Closed => {
                push_outcome(&mut inner.window, true, self.config.window_size);
            }
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.probe_in_flight = false;
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                warn!(dependency = %self.config.name, "probe call failed, circuit re-opened");
            }
            CircuitState::Closed => {
                push_outcome(&mut inner.window, false, self.config.window_size);
                let full = inner.window.len() >= self.config.window_size;
                if full {
                    let failures = inner.window.iter().filter(|ok| !**ok).count();
                    let rate = failures as f64 / inner.window.len() as f64;
                    if rate >= self.config.failure_rate_threshold {
                        inner.state = CircuitState::Open;
                        inner.opened_at = Some(Instant::now());
                        warn!(
                            dependency = %self.config.name,
                            failure_rate = rate,
                            "circuit opened"
                        );
                    }
                }
            }
            CircuitState::Open => {}
        }
    }
}

fn push_outcome(window: &mut VecDeque<bool>, ok: bool, max: usize) {
    window.push_back(ok);
    while window.len() > max {
        window.pop_front();
    }
}

/// Shared handle, one per named dependency.
pub type SharedCircuitBreaker = Arc<CircuitBreaker>;

#[cfg(test)]
mod tests {
    use super::*;

    fn config(wait: Duration) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new("test-dep", wait)
    }

    #[tokio::test]
    async fn closed_circuit_allows_calls() {
        let cb = CircuitBreaker::new(config(Duration::from_millis(10)));
        let result = cb.call(|| async { Ok::<_, String>(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn opens_after_failure_rate_threshold_reached_over_full_window() {
        let cb = CircuitBreaker::new(config(Duration::from_secs(60)));
        for _ in 0..5 {
            let _ = cb.call(|| async { Err::<(), _>("boom") }).await;
        }
        for _ in 0..4 {
            let _ = cb.call(|| async { Ok::<_, &str>(()) }).await;
        }
        // Window not yet full (9/10), still closed.
        assert_eq!(cb.state(), CircuitState::Closed);

        let _ = cb.call(|| async { Ok::<_, &str>(()) }).await;
        // Window full: 5 failures / 10 = 50% >= threshold.
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn sequential_deterministic_failures_cause_exactly_one_transition() {
        let cb = CircuitBreaker::new(config(Duration::from_secs(60)));
        for _ in 0..10 {
            let _ = cb.call(|| async { Err::<(), _>("boom") }).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        // Further failing calls while open are rejected, not recorded into
        // a second open transition.
        let result = cb.call(|| async { Err::<(), _>("boom") }).await;
        assert!(matches!(result, Err(ResilienceError::CircuitOpen { .. })));
    }

    #[tokio::test]
    async fn open_circuit_rejects_calls_until_wait_duration_elapses() {
        let cb = CircuitBreaker::new(config(Duration::from_millis(30)));
        for _ in 0..10 {
            let _ = cb.call(|| async { Err::<(), _>("boom") }).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let rejected = cb.call(|| async { Ok::<_, &str>(()) }).await;
        assert!(rejected.unwrap_err().is_circuit_open());

        tokio::time::sleep(Duration::from_millis(40)).await;

        let admitted = cb.call(|| async { Ok::<_, &str>(()) }).await;
        assert!(admitted.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens_the_circuit() {
        let cb = CircuitBreaker::new(config(Duration::from_millis(20)));
        for _ in 0..10 {
            let _ = cb.call(|| async { Err::<(), _>("boom") }).await;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;

        let probe = cb.call(|| async { Err::<(), _>("still broken") }).await;
        assert!(probe.is_err());
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn half_open_admits_exactly_one_concurrent_probe() {
        let cb = Arc::new(CircuitBreaker::new(config(Duration::from_millis(10))));
        for _ in 0..10 {
            let _ = cb.call(|| async { Err::<(), _>("boom") }).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        let barrier = Arc::new(tokio::sync::Barrier::new(5));
        let mut handles = Vec::new();
        for _ in 0..5 {
            let cb = cb.clone();
            let barrier = barrier.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                cb.call(|| async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, &str>(())
                })
                .await
            }));
        }

        let mut admitted = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1, "exactly one probe call should be admitted");
    }
}
