pub mod connector;
pub mod outbound_webhook;
pub mod resend;
pub mod twilio;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::{json, Value as JsonValue};

use crate::config::Config;
use crate::models::outbox_item::OutboxItem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Success { data: JsonValue },
    TransientFailure { error: String },
    PermanentFailure { error: String },
}

impl DeliveryOutcome {
    pub fn transient(error: impl Into<String>) -> Self {
        DeliveryOutcome::TransientFailure {
            error: error.into(),
        }
    }

    pub fn permanent(error: impl Into<String>) -> Self {
        DeliveryOutcome::PermanentFailure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryOutcome::Success { .. })
    }
}

// Adapters convert a claimed outbox item into one provider call. Every
// failure mode (network, non-2xx, missing credentials) comes back as a
// DeliveryOutcome variant; send never returns Err.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn send(&self, item: &OutboxItem) -> DeliveryOutcome;
}

const OAUTH_CONNECTOR_INTEGRATIONS: &[&str] = &[
    "google_sheets",
    "google_drive",
    "google_docs",
    "google_slides",
    "google_calendar",
    "slack",
    "notion",
    "linkedin",
    "tiktok",
];

const OUTBOUND_WEBHOOK_INTEGRATIONS: &[&str] = &["zapier", "custom_api"];

pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    fallback: Arc<dyn ProviderAdapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
            fallback: Arc::new(UnknownAdapter),
        }
    }

    pub fn register(&mut self, integration_id: &str, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(integration_id.to_string(), adapter);
    }

    pub fn resolve(&self, integration_id: &str) -> Arc<dyn ProviderAdapter> {
        self.adapters
            .get(integration_id)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    pub fn with_defaults(client: reqwest::Client, config: &Config) -> Self {
        let mut registry = Self::new();

        registry.register("resend", Arc::new(resend::ResendAdapter::new(client.clone())));
        registry.register("twilio", Arc::new(twilio::TwilioAdapter::new(client.clone())));

        let connector = Arc::new(connector::ConnectorAdapter::new(
            client.clone(),
            config.connector_base_url.clone(),
        ));
        for id in OAUTH_CONNECTOR_INTEGRATIONS {
            registry.register(id, connector.clone());
        }

        let outbound = Arc::new(outbound_webhook::OutboundWebhookAdapter::new(
            client,
            config.custom_webhook_allow.clone(),
        ));
        for id in OUTBOUND_WEBHOOK_INTEGRATIONS {
            registry.register(id, outbound.clone());
        }

        registry
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

struct UnknownAdapter;

#[async_trait]
impl ProviderAdapter for UnknownAdapter {
    async fn send(&self, item: &OutboxItem) -> DeliveryOutcome {
        DeliveryOutcome::permanent(format!("Unknown integration: {}", item.integration_id))
    }
}

pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

pub(crate) fn failure_from_status(status: StatusCode, body: &str) -> DeliveryOutcome {
    let message = serde_json::from_str::<JsonValue>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.trim().to_string());
    let error = format!("HTTP {}: {}", status.as_u16(), message);
    if is_transient_status(status) {
        DeliveryOutcome::transient(error)
    } else {
        DeliveryOutcome::permanent(error)
    }
}

pub(crate) async fn outcome_from_response(response: reqwest::Response) -> DeliveryOutcome {
    let status = StatusCode::from_u16(response.status().as_u16())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_success() {
        let data = response.json::<JsonValue>().await.unwrap_or_else(|_| json!({}));
        DeliveryOutcome::Success { data }
    } else {
        let body = response.text().await.unwrap_or_default();
        failure_from_status(status, &body)
    }
}

pub(crate) fn network_failure(err: reqwest::Error) -> DeliveryOutcome {
    DeliveryOutcome::transient(format!("Network error: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn item(integration_id: &str) -> OutboxItem {
        OutboxItem {
            id: Uuid::new_v4(),
            integration_id: integration_id.to_string(),
            operation: "send".to_string(),
            payload: json!({}),
            status: "in_flight".to_string(),
            attempt_count: 0,
            last_error: None,
            next_attempt_at: None,
            idempotency_key: None,
            provider_response: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn unknown_integration_fails_deterministically() {
        let registry = AdapterRegistry::new();
        let adapter = registry.resolve("monday");
        let outcome = tokio_test::block_on(adapter.send(&item("monday")));
        assert_eq!(
            outcome,
            DeliveryOutcome::permanent("Unknown integration: monday")
        );
    }

    #[test]
    fn status_classification() {
        assert!(is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_transient_status(StatusCode::BAD_GATEWAY));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::REQUEST_TIMEOUT));
        assert!(!is_transient_status(StatusCode::BAD_REQUEST));
        assert!(!is_transient_status(StatusCode::NOT_FOUND));
        assert!(!is_transient_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn failure_messages_prefer_provider_message() {
        let outcome = failure_from_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message":"Invalid `to` address"}"#,
        );
        assert_eq!(
            outcome,
            DeliveryOutcome::permanent("HTTP 422: Invalid `to` address")
        );

        let outcome = failure_from_status(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(
            outcome,
            DeliveryOutcome::transient("HTTP 502: upstream down")
        );
    }
}
