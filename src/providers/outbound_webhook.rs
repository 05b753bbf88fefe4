use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value as JsonValue};

use super::{network_failure, outcome_from_response, DeliveryOutcome, ProviderAdapter};
use crate::models::outbox_item::OutboxItem;
use crate::utils::url_guard;

// Deliveries to user-configured URLs (zapier hooks, custom endpoints).
// The target must clear the SSRF allow-list before any request is made.
pub struct OutboundWebhookAdapter {
    client: Client,
    extra_allow: Vec<String>,
}

impl OutboundWebhookAdapter {
    pub fn new(client: Client, extra_allow: Vec<String>) -> Self {
        Self {
            client,
            extra_allow,
        }
    }
}

#[async_trait]
impl ProviderAdapter for OutboundWebhookAdapter {
    async fn send(&self, item: &OutboxItem) -> DeliveryOutcome {
        let Some(raw_url) = item.payload.get("url").and_then(JsonValue::as_str) else {
            return DeliveryOutcome::permanent("Webhook payload missing target url");
        };

        let url = match url_guard::validate_outbound_url(
            &item.integration_id,
            raw_url,
            &self.extra_allow,
        ) {
            Ok(url) => url,
            Err(err) => return DeliveryOutcome::permanent(err.to_string()),
        };

        let body = item.payload.get("body").cloned().unwrap_or_else(|| json!({}));

        let result = self.client.post(url).json(&body).send().await;

        match result {
            Ok(response) => outcome_from_response(response).await,
            Err(err) => network_failure(err),
        }
    }
}
