use async_trait::async_trait;
use reqwest::Client;

use super::{network_failure, outcome_from_response, DeliveryOutcome, ProviderAdapter};
use crate::models::outbox_item::OutboxItem;
use crate::utils::secrets;

const RESEND_EMAILS_URL: &str = "https://api.resend.com/emails";

pub struct ResendAdapter {
    client: Client,
}

impl ResendAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderAdapter for ResendAdapter {
    async fn send(&self, item: &OutboxItem) -> DeliveryOutcome {
        let Some(api_key) = secrets::get("RESEND_API_KEY") else {
            return DeliveryOutcome::permanent("RESEND_API_KEY not configured");
        };

        let result = self
            .client
            .post(RESEND_EMAILS_URL)
            .bearer_auth(api_key)
            .json(&item.payload)
            .send()
            .await;

        match result {
            Ok(response) => outcome_from_response(response).await,
            Err(err) => network_failure(err),
        }
    }
}
