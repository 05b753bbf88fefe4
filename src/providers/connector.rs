use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use super::{network_failure, outcome_from_response, DeliveryOutcome, ProviderAdapter};
use crate::models::outbox_item::OutboxItem;
use crate::utils::secrets;

// OAuth-backed integrations (Google Workspace, Slack, Notion, LinkedIn,
// TikTok) all route through the shared connector service, which holds the
// per-workspace OAuth grants. The outbox only knows the connector endpoint.
pub struct ConnectorAdapter {
    client: Client,
    base_url: Option<String>,
}

impl ConnectorAdapter {
    pub fn new(client: Client, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        if let Some(ref url) = base_url {
            info!("OAuth connector enabled, base URL: {}", url);
        } else {
            info!("OAuth connector disabled (CONNECTOR_BASE_URL not set)");
        }

        Self { client, base_url }
    }
}

#[async_trait]
impl ProviderAdapter for ConnectorAdapter {
    async fn send(&self, item: &OutboxItem) -> DeliveryOutcome {
        let Some(base_url) = &self.base_url else {
            return DeliveryOutcome::permanent("Connector base URL not configured");
        };
        let Some(service_token) = secrets::get("CONNECTOR_SERVICE_TOKEN") else {
            return DeliveryOutcome::permanent("CONNECTOR_SERVICE_TOKEN not configured");
        };

        let url = format!("{}/{}/{}", base_url, item.integration_id, item.operation);

        let result = self
            .client
            .post(&url)
            .bearer_auth(service_token)
            .json(&item.payload)
            .send()
            .await;

        match result {
            Ok(response) => outcome_from_response(response).await,
            Err(err) => network_failure(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn unconfigured_connector_is_permanent() {
        let adapter = ConnectorAdapter::new(Client::new(), None);
        let item = OutboxItem {
            id: Uuid::new_v4(),
            integration_id: "slack".to_string(),
            operation: "post_message".to_string(),
            payload: json!({"channel": "#general", "text": "hi"}),
            status: "in_flight".to_string(),
            attempt_count: 0,
            last_error: None,
            next_attempt_at: None,
            idempotency_key: None,
            provider_response: None,
            created_at: None,
            updated_at: None,
        };
        assert_eq!(
            adapter.send(&item).await,
            DeliveryOutcome::permanent("Connector base URL not configured")
        );
    }
}
