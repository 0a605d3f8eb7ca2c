use rand::Rng;
use std::time::Duration;

/// Exponential backoff schedule with multiplicative jitter. Defaults match
/// the documented contract: `initial=1000ms`, `multiplier=2.0`,
/// `maxInterval=30000ms`, `maxAttempts=3`.
#[derive(Debug, Clone)]
pub struct RetryBackoffConfig {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    pub max_attempts: u32,
}

impl Default for RetryBackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(1000),
            multiplier: 2.0,
            max_interval: Duration::from_millis(30_000),
            max_attempts: 3,
        }
    }
}

impl RetryBackoffConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            initial_interval: Duration::from_millis(
                std::env::var("RETRY_INITIAL_INTERVAL_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.initial_interval.as_millis() as u64),
            ),
            multiplier: std::env::var("RETRY_MULTIPLIER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.multiplier),
            max_interval: Duration::from_millis(
                std::env::var("RETRY_MAX_INTERVAL_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.max_interval.as_millis() as u64),
            ),
            max_attempts: std::env::var("RETRY_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_attempts),
        }
    }

    /// Delay before attempt `attempt` (1-indexed), before jitter.
    fn base_delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let delay_ms = self.initial_interval.as_millis() as f64 * self.multiplier.powi(attempt as i32 - 1);
        let capped = delay_ms.min(self.max_interval.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Base delay with multiplicative jitter in `[0.8, 1.2]` applied.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let factor = rand::thread_rng().gen_range(0.8..=1.2);
        Duration::from_millis((base.as_millis() as f64 * factor) as u64)
    }
}
