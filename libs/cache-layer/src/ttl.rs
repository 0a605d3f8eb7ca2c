use rand::Rng;
use std::time::Duration;

/// `base ± uniform(jitter)`, clamped to at least one second (§4.5, Testable
/// Property 7). Same-instant cache writes from many callers don't expire in
/// lockstep and thundering-herd on the primary store.
#[derive(Debug, Clone, Copy)]
pub struct TtlPolicy {
    pub base: Duration,
    pub jitter: Duration,
}

impl TtlPolicy {
    pub const fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    /// Cache-aside search (§4.5.1): 60s base, 10s jitter.
    pub const fn search() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_secs(10))
    }

    /// Cache-aside detail (§4.5.2): 300s base. Jitter fraction matches the
    /// search preset's 1-in-6 ratio.
    pub const fn detail() -> Self {
        Self::new(Duration::from_secs(300), Duration::from_secs(50))
    }

    pub fn jittered(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.base;
        }
        let spread = self.jitter.as_secs_f64();
        let delta = rand::thread_rng().gen_range(-spread..=spread);
        let secs = (self.base.as_secs_f64() + delta).max(1.0);
        Duration::from_secs_f64(secs)
    }
}
