//! Transactional Outbox: atomic domain-write + event-write, with a
//! background poller that publishes unpublished rows to the event bus in
//! FIFO, per-key order.
//!
//! Command handlers call [`OutboxRepository::insert`] inside their own
//! database transaction; [`OutboxPublisher`] is a separate process-wide
//! task that reads unpublished rows outside any transaction and ships them
//! to the bus. The two are decoupled so a crash between a successful bus
//! publish and the row update simply republishes on the next pass —
//! downstream consumers are expected to be idempotent (see
//! `consumer-runtime` and `idempotency-store`).

mod error;
pub mod metrics;
mod publisher;
mod repository;

pub use error::{OutboxError, OutboxResult};
pub use metrics::OutboxMetrics;
pub use publisher::{OutboxPublisher, OutboxPublisherConfig, PublishBatchResult};
pub use repository::{OutboxRepository, SqlxOutboxRepository};
