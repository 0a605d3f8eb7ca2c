//! Sliding-window rate limiter keyed by `(action_key, limit, window)`.
//!
//! A single `EVAL` round trip increments the counter and, on the first
//! increment in the window, sets its TTL. Store failures fail open: the
//! limiter is a defense-in-depth layer and must not itself cause outages.

use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::warn;

const INCR_AND_EXPIRE: &str = r#"
    local current = redis.call('INCR', KEYS[1])
    if current == 1 then
        redis.call('EXPIRE', KEYS[1], ARGV[1])
    end
    return current
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Limited,
}

#[derive(Clone)]
pub struct RateLimiter {
    redis: ConnectionManager,
    key_prefix: String,
}

impl RateLimiter {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis,
            key_prefix: "rate_limit".to_string(),
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// `bypass` is set by the ingress layer from a load-test header; this
    /// crate never parses headers itself.
    pub async fn check(
        &self,
        action_key: &str,
        limit: u32,
        window: Duration,
        bypass: bool,
    ) -> Admission {
        if bypass {
            return Admission::Allowed;
        }

        let key = format!("{}:{}", self.key_prefix, action_key);
        let mut conn = self.redis.clone();

        let count: Result<i64, redis::RedisError> = redis::cmd("EVAL")
            .arg(INCR_AND_EXPIRE)
            .arg(1)
            .arg(&key)
            .arg(window.as_secs().max(1) as i64)
            .query_async(&mut conn)
            .await;

        match count {
            Ok(count) => {
                if count as u64 <= limit as u64 {
                    Admission::Allowed
                } else {
                    Admission::Limited
                }
            }
            Err(e) => {
                warn!(action_key, error = %e, "rate limiter store unavailable, failing open");
                Admission::Allowed
            }
        }
    }
}
