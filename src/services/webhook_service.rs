use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::webhook_event::{NewWebhookEvent, WebhookEvent};
use crate::utils::{secrets, signature};

pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

// Replay records must outlive the provider's own retry window; rows are
// TTL-purged by a background task.
#[async_trait]
pub trait ReplayStore: Send + Sync {
    // Atomic insert-if-absent; returns false when the event was already seen.
    async fn record_if_absent(&self, event: NewWebhookEvent) -> Result<bool>;
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

#[derive(Clone)]
pub struct PgReplayStore {
    pool: PgPool,
}

impl PgReplayStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReplayStore for PgReplayStore {
    async fn record_if_absent(&self, event: NewWebhookEvent) -> Result<bool> {
        let inserted = sqlx::query_as::<_, WebhookEvent>(
            r#"
            INSERT INTO webhook_events (id, provider, event_id, event_type, payload)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (provider, event_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&event.provider)
        .bind(&event.event_id)
        .bind(&event.event_type)
        .bind(&event.payload)
        .fetch_optional(&self.pool)
        .await?;
        Ok(inserted.is_some())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(r#"DELETE FROM webhook_events WHERE received_at < $1"#)
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed { event_id: String },
    Duplicate { event_id: String },
}

#[derive(Clone)]
pub struct WebhookGuard {
    replay: Arc<dyn ReplayStore>,
    tolerance: Duration,
}

impl WebhookGuard {
    pub fn new(replay: Arc<dyn ReplayStore>) -> Self {
        Self {
            replay,
            tolerance: Duration::seconds(TIMESTAMP_TOLERANCE_SECS),
        }
    }

    // RECEIVED -> SIGNATURE_VERIFIED -> TIMESTAMP_VALID -> DEDUPED ->
    // PROCESSED | REJECTED. Every rejection is a structured error, never a
    // silent drop; duplicates are acknowledged so providers stop retrying.
    pub async fn process(
        &self,
        provider: &str,
        signature_header: Option<&str>,
        raw_body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<WebhookOutcome> {
        let Some(secret) = secrets::webhook_secret(provider) else {
            return Err(Error::Forbidden(format!(
                "No webhook secret configured for {}",
                provider
            )));
        };

        let Some(header) = signature_header else {
            return Err(Error::Forbidden("Missing webhook signature".to_string()));
        };
        let Some((timestamp, provided)) = signature::parse_signature_header(header) else {
            return Err(Error::Forbidden("Malformed webhook signature".to_string()));
        };
        if !signature::verify_signature(&secret, timestamp, raw_body, &provided) {
            return Err(Error::Forbidden("Invalid webhook signature".to_string()));
        }

        // Replay of a captured, validly-signed request still fails here.
        if now.timestamp() - timestamp > self.tolerance.num_seconds() {
            return Err(Error::Forbidden("Timestamp too old".to_string()));
        }

        let payload: JsonValue = serde_json::from_slice(raw_body)
            .map_err(|_| Error::BadRequest("Malformed webhook body".to_string()))?;
        let Some(event_id) = payload.get("id").and_then(JsonValue::as_str) else {
            return Err(Error::BadRequest("Webhook body missing event id".to_string()));
        };
        let event_id = event_id.to_string();
        let event_type = payload
            .get("type")
            .and_then(JsonValue::as_str)
            .map(String::from);

        let recorded = self
            .replay
            .record_if_absent(NewWebhookEvent {
                provider: provider.to_string(),
                event_id: event_id.clone(),
                event_type,
                payload,
            })
            .await?;

        if recorded {
            Ok(WebhookOutcome::Processed { event_id })
        } else {
            Ok(WebhookOutcome::Duplicate { event_id })
        }
    }

    pub async fn purge_expired(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.replay.purge_older_than(cutoff).await
    }
}
