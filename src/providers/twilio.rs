use async_trait::async_trait;
use base64::prelude::*;
use reqwest::Client;
use serde_json::Value as JsonValue;

use super::{network_failure, outcome_from_response, DeliveryOutcome, ProviderAdapter};
use crate::models::outbox_item::OutboxItem;
use crate::utils::secrets;

pub struct TwilioAdapter {
    client: Client,
}

impl TwilioAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

// Twilio expects form encoding and Basic auth, unlike the JSON/Bearer
// providers.
fn form_pairs(payload: &JsonValue) -> Vec<(String, String)> {
    let Some(object) = payload.as_object() else {
        return Vec::new();
    };
    object
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), rendered)
        })
        .collect()
}

#[async_trait]
impl ProviderAdapter for TwilioAdapter {
    async fn send(&self, item: &OutboxItem) -> DeliveryOutcome {
        let (Some(account_sid), Some(auth_token)) = (
            secrets::get("TWILIO_ACCOUNT_SID"),
            secrets::get("TWILIO_AUTH_TOKEN"),
        ) else {
            return DeliveryOutcome::permanent("Twilio credentials not configured");
        };

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            account_sid
        );
        let basic = BASE64_STANDARD.encode(format!("{}:{}", account_sid, auth_token));

        let result = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {}", basic))
            .form(&form_pairs(&item.payload))
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

    #[test]
    fn form_pairs_render_scalars_without_quotes() {
        let payload = json!({"To": "+15551234567", "Body": "hi", "MaxPrice": 0.5});
        let mut pairs = form_pairs(&payload);
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("Body".to_string(), "hi".to_string()),
                ("MaxPrice".to_string(), "0.5".to_string()),
                ("To".to_string(), "+15551234567".to_string()),
            ]
        );
    }

    #[test]
    fn non_object_payload_yields_no_pairs() {
        assert!(form_pairs(&json!("just a string")).is_empty());
    }
}
