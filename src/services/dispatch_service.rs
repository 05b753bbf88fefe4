use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::error::Result;
use crate::models::outbox_item::OutboxItem;
use crate::providers::{AdapterRegistry, DeliveryOutcome};
use crate::services::limiter_service::IntegrationLimiter;
use crate::services::outbox_service::OutboxStore;
use crate::utils::backoff;

#[derive(Debug, Default, Clone, Copy, Serialize, ToSchema)]
pub struct DispatchReport {
    pub processed: u64,
    pub sent: u64,
    pub failed: u64,
    pub dead_letter: u64,
}

#[derive(Clone)]
pub struct DispatchService {
    store: Arc<dyn OutboxStore>,
    registry: Arc<AdapterRegistry>,
    limiter: IntegrationLimiter,
}

impl DispatchService {
    pub fn new(
        store: Arc<dyn OutboxStore>,
        registry: Arc<AdapterRegistry>,
        limiter: IntegrationLimiter,
    ) -> Self {
        Self {
            store,
            registry,
            limiter,
        }
    }

    pub async fn dispatch(&self, batch_size: i64) -> Result<DispatchReport> {
        let now = Utc::now();

        match self.store.requeue_elapsed(now).await {
            Ok(requeued) if requeued > 0 => {
                info!("Requeued {} items with elapsed backoff", requeued);
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "Failed to requeue elapsed items"),
        }

        let items = self.store.claim_batch(batch_size, now).await?;
        let mut report = DispatchReport::default();

        for item in items {
            if let Err(e) = self.dispatch_one(&item, &mut report).await {
                // Store failures never abort the batch; the claim is left
                // for a later pass or operator intervention.
                error!(item_id = %item.id, error = %e, "Outbox item update failed");
            }
        }

        Ok(report)
    }

    // For worker loops: returns whether this pass attempted anything.
    pub async fn run_once(&self, batch_size: i64) -> Result<bool> {
        let report = self.dispatch(batch_size).await?;
        Ok(report.processed > 0)
    }

    async fn dispatch_one(&self, item: &OutboxItem, report: &mut DispatchReport) -> Result<()> {
        if !self.limiter.acquire(&item.integration_id) {
            // Provider at its ceiling: put the claim back untouched, no
            // attempt is counted.
            self.store.release(item.id).await?;
            return Ok(());
        }

        let adapter = self.registry.resolve(&item.integration_id);
        let outcome = adapter.send(item).await;
        self.limiter.release(&item.integration_id);

        let attempt_count = item.attempt_count + 1;
        match outcome {
            DeliveryOutcome::Success { data } => {
                self.store.mark_sent(item.id, attempt_count, data).await?;
                info!(item_id = %item.id, integration = %item.integration_id, "Outbox item sent");
                report.sent += 1;
            }
            DeliveryOutcome::PermanentFailure { error } => {
                self.store
                    .mark_dead_letter(item.id, attempt_count, &error)
                    .await?;
                warn!(
                    item_id = %item.id,
                    integration = %item.integration_id,
                    error = %error,
                    "Permanent failure, dead-lettered"
                );
                report.dead_letter += 1;
            }
            DeliveryOutcome::TransientFailure { error } => {
                if attempt_count >= backoff::MAX_ATTEMPTS {
                    self.store
                        .mark_dead_letter(item.id, attempt_count, &error)
                        .await?;
                    warn!(
                        item_id = %item.id,
                        integration = %item.integration_id,
                        error = %error,
                        "Max attempts exhausted, dead-lettered"
                    );
                    report.dead_letter += 1;
                } else {
                    let next_attempt_at = Utc::now() + backoff::delay(attempt_count);
                    self.store
                        .mark_failed(item.id, attempt_count, &error, next_attempt_at)
                        .await?;
                    warn!(
                        item_id = %item.id,
                        integration = %item.integration_id,
                        attempt = attempt_count,
                        error = %error,
                        "Delivery failed, rescheduled"
                    );
                    report.failed += 1;
                }
            }
        }

        report.processed += 1;
        Ok(())
    }
}
