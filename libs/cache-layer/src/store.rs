use crate::error::CacheResult;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Thin JSON-over-Redis primitive. Holds no policy of its own — TTL choice,
/// circuit-breaking, and fallback live one layer up in [`crate::aside`] and
/// [`crate::write_through`].
#[derive(Clone)]
pub struct CacheStore {
    redis: ConnectionManager,
    key_prefix: String,
}

impl CacheStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis,
            key_prefix: String::new(),
        }
    }

    /// Scopes every key under `{prefix}:`. Leave unset to use the literal
    /// `search:*` / `detail:{id}` keys §4.5 documents.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// The prefix this store namespaces keys under, e.g. for labeling
    /// metrics by cache pattern (`search`, `detail`, `profile`).
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    fn namespaced(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.key_prefix, key)
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let mut conn = self.redis.clone();
        let namespaced = self.namespaced(key);
        let raw: Option<String> = conn.get(&namespaced).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.redis.clone();
        let namespaced = self.namespaced(key);
        let serialized = serde_json::to_string(value)?;
        let _: () = conn.set_ex(&namespaced, serialized, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    pub async fn del(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.redis.clone();
        let namespaced = self.namespaced(key);
        let _: () = conn.del(&namespaced).await?;
        Ok(())
    }

    /// `SCAN` the namespaced `{prefix}*` pattern and `DEL` every match
    /// (§4.5.1). Acceptable because writes that trigger invalidation are
    /// rare relative to reads.
    pub async fn invalidate_prefix(&self, prefix: &str) -> CacheResult<u64> {
        let mut conn = self.redis.clone();
        let pattern = format!("{}*", self.namespaced(prefix));
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let removed: u64 = conn.del(&keys).await?;
                deleted += removed;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = %pattern, deleted, "invalidated cache keys by prefix");
        Ok(deleted)
    }
}
