use crate::error::CacheError;
use crate::metrics::CacheMetrics;
use crate::stale::StaleShadow;
use crate::stampede::StampedeLock;
use crate::store::CacheStore;
use crate::ttl::TtlPolicy;
use resilience::SharedCircuitBreaker;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How many times a lock loser polls the cache for the winner's rebuild
/// before giving up on it (§4.5.4: "poll the cache briefly").
const REBUILD_POLL_ATTEMPTS: u32 = 3;
const REBUILD_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Cache-aside read-through for search and detail lookups (§4.5.1, §4.5.2).
///
/// Redis access is wrapped in a `cache`-kind circuit breaker: while it's
/// open, calls bypass the cache entirely and go straight to `loader` — the
/// documented degradation for a dead cache, not a dead primary store.
pub struct CacheAside {
    store: CacheStore,
    breaker: SharedCircuitBreaker,
    ttl: TtlPolicy,
    stampede: StampedeLock,
    stale: StaleShadow,
    metrics: Option<CacheMetrics>,
}

impl CacheAside {
    pub fn new(store: CacheStore, breaker: SharedCircuitBreaker, ttl: TtlPolicy, stampede: StampedeLock) -> Self {
        let stale = StaleShadow::new(store.clone());
        Self { store, breaker, ttl, stampede, stale, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: CacheMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn pattern(&self) -> &str {
        self.store.key_prefix()
    }

    pub async fn get_or_load<T, F, Fut>(&self, key: &str, loader: F) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned + Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        let store = self.store.clone();
        let read_key = key.to_string();
        let read = self.breaker.call(|| async move { store.get::<T>(&read_key).await }).await;

        match read {
            Ok(Some(value)) => {
                if let Some(metrics) = &self.metrics {
                    metrics.hits.with_label_values(&[self.pattern()]).inc();
                }
                Ok(value)
            }
            Ok(None) => {
                if let Some(metrics) = &self.metrics {
                    metrics.misses.with_label_values(&[self.pattern()]).inc();
                }
                self.rebuild_guarded(key, loader).await
            }
            Err(e) if e.is_circuit_open() => {
                debug!(key, "cache circuit open, bypassing cache for this read");
                loader().await
            }
            Err(e) => {
                warn!(key, error = %e, "cache read failed, falling through to primary store");
                self.rebuild_guarded(key, loader).await
            }
        }
    }

    /// Stampede-guarded rebuild for a hot-key miss (§4.5.4): one caller wins
    /// `tryLock` and rebuilds; the rest poll briefly for its result, then
    /// fall back to the stale shadow, then rebuild unguarded as a last
    /// resort rather than hang.
    async fn rebuild_guarded<T, F, Fut>(&self, key: &str, loader: F) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned + Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        let won = match self.stampede.try_lock(key).await {
            Ok(won) => won,
            Err(e) => {
                warn!(key, error = %e, "stampede lock unavailable, rebuilding without coordination");
                true
            }
        };

        if won {
            if let Some(metrics) = &self.metrics {
                metrics.stampede_locks_acquired.with_label_values(&[self.pattern()]).inc();
            }
            let value = loader().await?;
            self.populate(key, &value).await;
            self.stale.set(key, &value).await;
            if let Err(e) = self.stampede.unlock(key).await {
                warn!(key, error = %e, "failed to release stampede lock");
            }
            return Ok(value);
        }

        for _ in 0..REBUILD_POLL_ATTEMPTS {
            tokio::time::sleep(REBUILD_POLL_INTERVAL).await;
            if let Ok(Some(value)) = self.store.get::<T>(key).await {
                return Ok(value);
            }
        }

        if let Ok(Some(value)) = self.stale.get::<T>(key).await {
            if let Some(metrics) = &self.metrics {
                metrics.stale_served.with_label_values(&[self.pattern()]).inc();
            }
            debug!(key, "serving stale shadow copy while the rebuild winner populates the cache");
            return Ok(value);
        }

        warn!(key, "rebuild winner never populated the cache and no stale copy exists, rebuilding unguarded");
        loader().await
    }

    async fn populate<T: Serialize + Clone>(&self, key: &str, value: &T) {
        let store = self.store.clone();
        let write_key = key.to_string();
        let write_value = value.clone();
        let ttl = self.ttl.jittered();
        if let Err(e) = self.breaker.call(|| async move { store.set(&write_key, &write_value, ttl).await }).await {
            if !e.is_circuit_open() {
                warn!(key, error = %e, "failed to populate cache after a miss");
            }
        }
    }

    /// Explicit eviction of one key (detail cache, on write or status change).
    pub async fn evict(&self, key: &str) {
        if let Err(e) = self.store.del(key).await {
            warn!(key, error = %e, "failed to evict cache key");
        }
    }

    /// `search:*` prefix invalidation on any write to the indexed aggregate.
    pub async fn invalidate_all(&self, prefix: &str) {
        match self.store.invalidate_prefix(prefix).await {
            Ok(_) => {
                if let Some(metrics) = &self.metrics {
                    metrics.invalidations.with_label_values(&[self.pattern()]).inc();
                }
            }
            Err(e) => warn!(prefix, error = %e, "failed to invalidate cache prefix"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resilience::{CircuitBreaker, CircuitBreakerConfig};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn breaker() -> SharedCircuitBreaker {
        Arc::new(CircuitBreaker::new(CircuitBreakerConfig::new("cache", Duration::from_secs(15))))
    }

    #[tokio::test]
    async fn loader_runs_once_more_than_zero_times_on_every_call_path() {
        // Without a live Redis connection we can't exercise `get_or_load`
        // end to end here; covered by the Redis-gated integration suite.
        // This guards the pure TTL/breaker wiring compiles and the loader
        // type bounds are satisfiable.
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let loader = move || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>(42u32)
            }
        };
        let result = loader().await.unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn breaker_builds_with_the_cache_preset_wait_duration() {
        let cb = breaker();
        assert_eq!(cb.state(), resilience::CircuitState::Closed);
    }
}
