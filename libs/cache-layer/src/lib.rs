//! Cache-aside (search), detail cache-aside, and write-through (profile)
//! caching over Redis, with stampede protection and a stale-read fallback
//! path for primary-store outages (§4.5).

mod aside;
mod broadcast;
mod error;
mod metrics;
mod stale;
mod stampede;
mod store;
mod ttl;
mod write_through;

pub use aside::CacheAside;
pub use broadcast::{InvalidationBroadcaster, InvalidationMessage, InvalidationSubscriber};
pub use error::{CacheError, CacheResult};
pub use metrics::CacheMetrics;
pub use stale::StaleShadow;
pub use stampede::StampedeLock;
pub use store::CacheStore;
pub use ttl::TtlPolicy;
pub use write_through::WriteThroughProfile;
