//! Builds the gateway's cache primitives (§4.5): search cache-aside over
//! Redis, behind a `cache`-kind circuit breaker and a stampede lock so a
//! hot-key miss rebuilds once rather than once per concurrent reader.
//!
//! Detail cache-aside (§4.5.2) and write-through profile (§4.5.3) are
//! implemented and tested in `cache_layer` itself but have no caller in this
//! binary — the gateway is an event-delivery core with no detail/profile
//! read endpoint of its own — so they are not constructed here. See
//! DESIGN.md.

use cache_layer::{CacheAside, CacheMetrics, CacheStore, StampedeLock, TtlPolicy};
use redis::aio::ConnectionManager;
use resilience::{presets, CircuitBreaker};
use std::sync::Arc;

pub const SEARCH_PREFIX: &str = "search";

pub struct GatewayCache {
    pub search: CacheAside,
}

impl GatewayCache {
    pub fn new(redis: ConnectionManager) -> Self {
        let store = CacheStore::new(redis.clone()).with_key_prefix(SEARCH_PREFIX);
        let stampede = StampedeLock::new(redis).with_key_prefix(SEARCH_PREFIX);
        let breaker = Arc::new(CircuitBreaker::new(presets::cache_config()));

        let search = CacheAside::new(store, breaker, TtlPolicy::search(), stampede)
            .with_metrics(CacheMetrics::new("gateway"));

        Self { search }
    }
}
