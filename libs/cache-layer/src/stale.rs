use crate::error::CacheResult;
use crate::store::CacheStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

/// Long-TTL shadow copy written alongside the primary cache entry (§4.5.5).
/// Read only on degraded paths (write-through stale-fallback, stampede
/// serve-stale). Writes are best-effort: a failure here must never fail the
/// request that triggered it.
#[derive(Clone)]
pub struct StaleShadow {
    store: CacheStore,
    ttl: Duration,
}

impl StaleShadow {
    /// Long enough to outlive any plausible primary-store outage.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

    pub fn new(store: CacheStore) -> Self {
        Self { store, ttl: Self::DEFAULT_TTL }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn shadow_key(key: &str) -> String {
        format!("stale:{key}")
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        self.store.get(&Self::shadow_key(key)).await
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = self.store.set(&Self::shadow_key(key), value, self.ttl).await {
            warn!(key, error = %e, "failed to write stale shadow copy (best-effort)");
        }
    }
}
