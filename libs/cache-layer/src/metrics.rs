use prometheus::{IntCounterVec, Opts};
use tracing::warn;

#[derive(Clone)]
pub struct CacheMetrics {
    pub hits: IntCounterVec,
    pub misses: IntCounterVec,
    pub stale_served: IntCounterVec,
    pub stampede_locks_acquired: IntCounterVec,
    pub invalidations: IntCounterVec,
}

impl CacheMetrics {
    pub fn new(service: &str) -> Self {
        let registry = prometheus::default_registry();

        let hits = IntCounterVec::new(
            Opts::new("cache_hits_total", "Cache-aside / write-through reads served from cache")
                .const_label("service", service.to_string()),
            &["pattern"],
        )
        .expect("valid metric opts for cache_hits_total");

        let misses = IntCounterVec::new(
            Opts::new("cache_misses_total", "Cache-aside / write-through reads that fell through to the primary store")
                .const_label("service", service.to_string()),
            &["pattern"],
        )
        .expect("valid metric opts for cache_misses_total");

        let stale_served = IntCounterVec::new(
            Opts::new("cache_stale_served_total", "Reads served from the stale shadow copy on primary-store failure")
                .const_label("service", service.to_string()),
            &["pattern"],
        )
        .expect("valid metric opts for cache_stale_served_total");

        let stampede_locks_acquired = IntCounterVec::new(
            Opts::new("cache_stampede_locks_acquired_total", "Hot-key rebuild locks won")
                .const_label("service", service.to_string()),
            &["pattern"],
        )
        .expect("valid metric opts for cache_stampede_locks_acquired_total");

        let invalidations = IntCounterVec::new(
            Opts::new("cache_invalidations_total", "Prefix/key invalidations performed")
                .const_label("service", service.to_string()),
            &["pattern"],
        )
        .expect("valid metric opts for cache_invalidations_total");

        for metric in [
            Box::new(hits.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(misses.clone()),
            Box::new(stale_served.clone()),
            Box::new(stampede_locks_acquired.clone()),
            Box::new(invalidations.clone()),
        ] {
            if let Err(e) = registry.register(metric) {
                warn!("failed to register cache-layer metric: {}", e);
            }
        }

        Self {
            hits,
            misses,
            stale_served,
            stampede_locks_acquired,
            invalidations,
        }
    }
}
