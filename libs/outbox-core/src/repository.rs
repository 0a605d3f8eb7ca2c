use crate::error::{OutboxError, OutboxResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use event_contracts::OutboxEvent;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

/// Storage operations on outbox rows. `insert` must be called inside an
/// already-open transaction so the domain write and the outbox row commit or
/// roll back together.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event: &OutboxEvent,
    ) -> OutboxResult<()>;

    /// Unpublished, non-dead-lettered events in FIFO `created_at` order.
    async fn get_unpublished(&self, limit: i64, max_retries: i32) -> OutboxResult<Vec<OutboxEvent>>;

    async fn mark_published(&self, event_id: Uuid) -> OutboxResult<()>;

    async fn mark_failed(&self, event_id: Uuid) -> OutboxResult<()>;

    /// `(pending_count, oldest_pending_age_seconds)`; age is 0 when nothing pending.
    async fn pending_stats(&self) -> OutboxResult<(i64, i64)>;
}

pub struct SqlxOutboxRepository {
    pool: PgPool,
}

impl SqlxOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reset `published`/`retry_count` for events created since `ts`, so the
    /// next poll republishes them. Operator tool for replaying a window.
    pub async fn replay_since(&self, ts: DateTime<Utc>) -> OutboxResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE outbox_events
            SET published = false, published_at = NULL, retry_count = 0
            WHERE created_at >= $1
            "#,
        )
        .bind(ts)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }

    /// Reset events by id range (inclusive) for operational backfill.
    pub async fn replay_range(&self, from_id: Uuid, to_id: Uuid) -> OutboxResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE outbox_events
            SET published = false, published_at = NULL, retry_count = 0
            WHERE id BETWEEN $1 AND $2
            "#,
        )
        .bind(from_id)
        .bind(to_id)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }
}

#[async_trait]
impl OutboxRepository for SqlxOutboxRepository {
    async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event: &OutboxEvent,
    ) -> OutboxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO outbox_events (
                id, aggregate_type, aggregate_id, event_type, payload,
                topic, partition_key, published, published_at, retry_count, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(event.id)
        .bind(&event.aggregate_type)
        .bind(event.aggregate_id)
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(&event.topic)
        .bind(&event.partition_key)
        .bind(event.published)
        .bind(event.published_at)
        .bind(event.retry_count)
        .bind(event.created_at)
        .execute(&mut **tx)
        .await?;

        debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            aggregate_id = event.aggregate_id,
            "event inserted into outbox"
        );

        Ok(())
    }

    async fn get_unpublished(
        &self,
        limit: i64,
        max_retries: i32,
    ) -> OutboxResult<Vec<OutboxEvent>> {
        let events = sqlx::query_as::<_, OutboxEvent>(
            r#"
            SELECT id, aggregate_type, aggregate_id, event_type, payload,
                   topic, partition_key, published, published_at, retry_count, created_at
            FROM outbox_events
            WHERE published = false AND retry_count < $2
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .bind(max_retries)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = events.len(), "fetched unpublished outbox events");
        Ok(events)
    }

    async fn mark_published(&self, event_id: Uuid) -> OutboxResult<()> {
        let result = sqlx::query(
            "UPDATE outbox_events SET published = true, published_at = NOW() WHERE id = $1",
        )
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(event_id = %event_id, "event not found when marking as published");
            return Err(OutboxError::EventNotFound(event_id));
        }

        Ok(())
    }

    async fn mark_failed(&self, event_id: Uuid) -> OutboxResult<()> {
        let result = sqlx::query("UPDATE outbox_events SET retry_count = retry_count + 1 WHERE id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!(event_id = %event_id, "event not found when marking as failed");
            return Err(OutboxError::EventNotFound(event_id));
        }

        Ok(())
    }

    async fn pending_stats(&self) -> OutboxResult<(i64, i64)> {
        let row: (i64, Option<i64>) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*)::BIGINT AS pending,
                EXTRACT(EPOCH FROM (NOW() - MIN(created_at)))::BIGINT AS age_seconds
            FROM outbox_events
            WHERE published = false
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok((row.0, row.1.unwrap_or(0)))
    }
}
