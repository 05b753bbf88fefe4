use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::outbox_item::{NewOutboxItem, OutboxItem, OutboxStatus};

// Durable record store for outbox items. The dispatcher is the only writer
// after creation; claim_batch is the atomic queued -> in_flight transition
// that makes concurrent dispatcher workers safe.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OutboxStore: Send + Sync {
    async fn enqueue(&self, item: NewOutboxItem) -> Result<OutboxItem>;
    async fn requeue_elapsed(&self, now: DateTime<Utc>) -> Result<u64>;
    async fn claim_batch(&self, limit: i64, now: DateTime<Utc>) -> Result<Vec<OutboxItem>>;
    async fn release(&self, id: Uuid) -> Result<()>;
    async fn mark_sent(&self, id: Uuid, attempt_count: i32, response: JsonValue) -> Result<()>;
    async fn mark_failed(
        &self,
        id: Uuid,
        attempt_count: i32,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<()>;
    async fn mark_dead_letter(&self, id: Uuid, attempt_count: i32, error: &str) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<OutboxItem>>;
    async fn list(&self, status: Option<OutboxStatus>, limit: i64) -> Result<Vec<OutboxItem>>;
    async fn reset_for_retry(&self, id: Uuid) -> Result<OutboxItem>;
}

#[derive(Clone)]
pub struct PgOutboxStore {
    pool: PgPool,
}

impl PgOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    async fn enqueue(&self, item: NewOutboxItem) -> Result<OutboxItem> {
        let inserted = sqlx::query_as::<_, OutboxItem>(
            r#"
            INSERT INTO outbox_items (id, integration_id, operation, payload, status, attempt_count, idempotency_key)
            VALUES ($1, $2, $3, $4, 'queued', 0, $5)
            ON CONFLICT (idempotency_key) WHERE idempotency_key IS NOT NULL DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&item.integration_id)
        .bind(&item.operation)
        .bind(&item.payload)
        .bind(&item.idempotency_key)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(row);
        }

        // Producer re-sent an idempotency key we already hold.
        let existing = sqlx::query_as::<_, OutboxItem>(
            r#"SELECT * FROM outbox_items WHERE idempotency_key = $1"#,
        )
        .bind(&item.idempotency_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(existing)
    }

    async fn requeue_elapsed(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_items
            SET status = 'queued', updated_at = NOW()
            WHERE status = 'failed' AND next_attempt_at IS NOT NULL AND next_attempt_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn claim_batch(&self, limit: i64, now: DateTime<Utc>) -> Result<Vec<OutboxItem>> {
        let items = sqlx::query_as::<_, OutboxItem>(
            r#"
            UPDATE outbox_items
            SET status = 'in_flight', updated_at = NOW()
            WHERE id IN (
                SELECT id FROM outbox_items
                WHERE status = 'queued'
                  AND (next_attempt_at IS NULL OR next_attempt_at <= $2)
                ORDER BY created_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT $1
            )
            RETURNING *
            "#,
        )
        .bind(limit)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn release(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"UPDATE outbox_items SET status = 'queued', updated_at = NOW() WHERE id = $1 AND status = 'in_flight'"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_sent(&self, id: Uuid, attempt_count: i32, response: JsonValue) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outbox_items
            SET status = 'sent', provider_response = $2, attempt_count = $3,
                last_error = NULL, next_attempt_at = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(response)
        .bind(attempt_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        attempt_count: i32,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outbox_items
            SET status = 'failed', last_error = $2, attempt_count = $3,
                next_attempt_at = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(attempt_count)
        .bind(next_attempt_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_dead_letter(&self, id: Uuid, attempt_count: i32, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outbox_items
            SET status = 'dead_letter', last_error = $2, attempt_count = $3,
                next_attempt_at = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(attempt_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<OutboxItem>> {
        let item = sqlx::query_as::<_, OutboxItem>(r#"SELECT * FROM outbox_items WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    async fn list(&self, status: Option<OutboxStatus>, limit: i64) -> Result<Vec<OutboxItem>> {
        let items = sqlx::query_as::<_, OutboxItem>(
            r#"
            SELECT * FROM outbox_items
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(status.map(|s| s.as_str().to_string()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn reset_for_retry(&self, id: Uuid) -> Result<OutboxItem> {
        let reset = sqlx::query_as::<_, OutboxItem>(
            r#"
            UPDATE outbox_items
            SET status = 'queued', attempt_count = 0, last_error = NULL,
                next_attempt_at = NULL, updated_at = NOW()
            WHERE id = $1 AND status IN ('failed', 'dead_letter')
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match reset {
            Some(item) => Ok(item),
            None => match self.get(id).await? {
                Some(item) => Err(Error::Conflict(format!(
                    "Outbox item {} is {} and cannot be retried",
                    id, item.status
                ))),
                None => Err(Error::NotFound(format!("Outbox item {} not found", id))),
            },
        }
    }
}
