//! Short-lived keyed store guarding against duplicate effects.
//!
//! Two modes share one Redis-backed primitive (`SET key val NX PX ttl_ms`):
//!
//! - **Dedup mode** (`acquire`/`release`): the consumer runtime calls
//!   `acquire` before invoking a handler; on `Duplicate` the handler MUST
//!   NOT run again. `release` undoes the acquire so a recoverable failure
//!   can be retried without waiting out the TTL.
//! - **Memoize mode** (`acquire_or_replay`/`store_response`): used for
//!   HTTP retries keyed by a client-supplied idempotency header. The first
//!   caller gets `FirstTime`; once the handler succeeds and calls
//!   `store_response`, replays return the cached response without
//!   re-invoking the handler.
//!
//! The TTL passed to `acquire` must exceed the worst-case consumer lag —
//! the documented floor is 24h, after an incident where a 60-second TTL
//! produced duplicate notifications once redelivery lag exceeded it.

mod error;

pub use error::{IdempotencyError, IdempotencyResult};

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Floor for dedup TTLs (§4.3): must exceed worst-case consumer lag.
pub const MIN_DEDUP_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The key was not present; the caller may proceed and must eventually
    /// either keep it set (success) or call [`IdempotencyStore::release`]
    /// (recoverable failure, to allow a retry).
    FirstTime,
    /// The key was already present; the caller MUST NOT re-invoke the
    /// effectful operation.
    Duplicate,
}

#[derive(Debug, Clone)]
pub enum ReplayOutcome<T> {
    FirstTime,
    Replay(T),
}

#[derive(Clone)]
pub struct IdempotencyStore {
    redis: ConnectionManager,
    key_prefix: String,
}

impl IdempotencyStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis,
            key_prefix: "idem".to_string(),
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    /// Atomic `setIfAbsent(key, "1", ttl)`. Returns [`AcquireOutcome::Duplicate`]
    /// without touching the key's TTL if it's already set.
    pub async fn acquire(&self, key: &str, ttl: Duration) -> IdempotencyResult<AcquireOutcome> {
        let mut conn = self.redis.clone();
        let namespaced = self.namespaced(key);

        let set: Option<String> = redis::cmd("SET")
            .arg(&namespaced)
            .arg("1")
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;

        if set.is_some() {
            debug!(key = %namespaced, "idempotency key acquired");
            Ok(AcquireOutcome::FirstTime)
        } else {
            debug!(key = %namespaced, "idempotency key already present, duplicate");
            Ok(AcquireOutcome::Duplicate)
        }
    }

    /// Release a previously acquired key so a deliberate retry is allowed
    /// after a recoverable handler failure (§4.3 step 5). Never call this
    /// after a successful effect — that would permit a true duplicate.
    pub async fn release(&self, key: &str) -> IdempotencyResult<()> {
        let mut conn = self.redis.clone();
        let namespaced = self.namespaced(key);
        let _: () = conn.del(&namespaced).await?;
        debug!(key = %namespaced, "idempotency key released");
        Ok(())
    }

    /// Memoize-mode acquire: same `SET NX PX` as [`Self::acquire`], but the
    /// value slot carries a previously stored response when present, so a
    /// replayed request can return it without invoking the handler.
    pub async fn acquire_or_replay<T: DeserializeOwned>(
        &self,
        key: &str,
        ttl: Duration,
    ) -> IdempotencyResult<ReplayOutcome<T>> {
        let mut conn = self.redis.clone();
        let namespaced = self.namespaced(key);

        let set: Option<String> = redis::cmd("SET")
            .arg(&namespaced)
            .arg("")
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;

        if set.is_some() {
            return Ok(ReplayOutcome::FirstTime);
        }

        let stored: String = conn.get(&namespaced).await?;
        if stored.is_empty() {
            // Handler is still in flight (placeholder value, no response
            // stored yet); treat as a fresh attempt rather than blocking.
            return Ok(ReplayOutcome::FirstTime);
        }

        let response: T = serde_json::from_str(&stored)?;
        Ok(ReplayOutcome::Replay(response))
    }

    /// Store the handler's response under `key` after it succeeds, so a
    /// subsequent `acquire_or_replay` for the same client-supplied
    /// idempotency key returns it without re-invoking the handler.
    pub async fn store_response<T: Serialize>(
        &self,
        key: &str,
        response: &T,
        ttl: Duration,
    ) -> IdempotencyResult<()> {
        let mut conn = self.redis.clone();
        let namespaced = self.namespaced(key);
        let serialized = serde_json::to_string(response)?;

        let _: () = conn
            .set_ex(&namespaced, serialized, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }
}
