//! Retry / DLQ pipeline: a single-concurrency consumer of the retry topic
//! that waits out an exponential, jittered backoff and re-invokes the
//! original handler, independent of any particular channel's business
//! logic or idempotency mechanics.

mod backoff;
mod consumer;
mod error;
mod metrics;

pub use backoff::RetryBackoffConfig;
pub use consumer::{RetryConsumer, RetryableHandler};
pub use error::{RetryError, RetryResult};
pub use metrics::RetryMetrics;
