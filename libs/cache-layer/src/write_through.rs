use crate::error::CacheError;
use crate::stale::StaleShadow;
use crate::store::CacheStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Write-through profile cache (§4.5.3): read populates on miss, write
/// updates the primary and the cache together. `loader` is expected to wrap
/// its own `db`-kind circuit breaker; when it fails, `read` falls back to
/// the stale shadow rather than retrying here.
pub struct WriteThroughProfile {
    store: CacheStore,
    stale: StaleShadow,
    ttl: Duration,
}

impl WriteThroughProfile {
    /// §4.5.3: fixed 30-minute TTL, no jitter documented for this pattern.
    pub const TTL: Duration = Duration::from_secs(30 * 60);

    pub fn new(store: CacheStore) -> Self {
        let stale = StaleShadow::new(store.clone());
        Self { store, stale, ttl: Self::TTL }
    }

    pub async fn read<T, F, Fut>(&self, key: &str, loader: F) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned + Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        match self.store.get::<T>(key).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(e) => warn!(key, error = %e, "write-through cache read failed, falling through to primary"),
        }

        match loader().await {
            Ok(value) => {
                self.write(key, &value).await;
                Ok(value)
            }
            Err(primary_err) => {
                warn!(key, error = %primary_err, "primary store unavailable, attempting stale-fallback read");
                match self.stale.get::<T>(key).await {
                    Ok(Some(value)) => Ok(value),
                    _ => Err(CacheError::Unavailable(key.to_string())),
                }
            }
        }
    }

    /// Update primary, then this. Caller is responsible for the primary
    /// write itself; this only updates the cache + shadow copy afterward.
    pub async fn write<T: Serialize + Clone>(&self, key: &str, value: &T) {
        if let Err(e) = self.store.set(key, value, self.ttl).await {
            warn!(key, error = %e, "write-through cache population failed");
        }
        self.stale.set(key, value).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_is_thirty_minutes() {
        assert_eq!(WriteThroughProfile::TTL, Duration::from_secs(1800));
    }
}
