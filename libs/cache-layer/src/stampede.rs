use crate::error::CacheResult;
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::debug;

/// Distributed rebuild lock for hot-key misses (§4.5.4). One instance wins
/// `try_lock`; the rest should poll the cache briefly or serve a stale copy
/// rather than all stampeding the primary store at once.
///
/// Same `SET NX PX` primitive as [`idempotency_store::IdempotencyStore`],
/// scoped to a `lock:` prefix and a much shorter TTL.
#[derive(Clone)]
pub struct StampedeLock {
    redis: ConnectionManager,
    key_prefix: String,
}

impl StampedeLock {
    /// Bounds how long a crashed holder blocks the key (§4.5.4).
    pub const LOCK_TTL: Duration = Duration::from_secs(10);

    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis,
            key_prefix: String::new(),
        }
    }

    /// Scopes lock keys the same way [`crate::store::CacheStore`] scopes
    /// cache keys, so two `CacheAside` instances over the same Redis
    /// connection (e.g. `search`, `detail`) never contend on the same lock.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn lock_key(&self, key: &str) -> String {
        format_lock_key(&self.key_prefix, key)
    }

    pub async fn try_lock(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.redis.clone();
        let lock_key = self.lock_key(key);

        let acquired: Option<String> = redis::cmd("SET")
            .arg(&lock_key)
            .arg("1")
            .arg("NX")
            .arg("PX")
            .arg(Self::LOCK_TTL.as_millis() as u64)
            .query_async(&mut conn)
            .await?;

        let won = acquired.is_some();
        debug!(key, won, "stampede lock attempt");
        Ok(won)
    }

    pub async fn unlock(&self, key: &str) -> CacheResult<()> {
        use redis::AsyncCommands;
        let mut conn = self.redis.clone();
        let _: () = conn.del(self.lock_key(key)).await?;
        Ok(())
    }
}

fn format_lock_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        format!("lock:{key}")
    } else {
        format!("lock:{prefix}:{key}")
    }
}
