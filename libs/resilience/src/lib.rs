//! Cross-cutting resilience primitives: circuit breakers, bulkheads, and a
//! sliding-window rate limiter. Every dependency call in the core passes
//! through one of these before it reaches the network.

pub mod bulkhead;
pub mod circuit_breaker;
pub mod error;
pub mod metrics;
pub mod presets;
pub mod rate_limiter;

pub use bulkhead::Bulkhead;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, SharedCircuitBreaker};
pub use error::ResilienceError;
pub use metrics::ResilienceMetrics;
pub use rate_limiter::{Admission, RateLimiter};
