mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use common::{FailingMarkStore, MemoryOutboxStore, ScriptedAdapter};
use outbox_backend::models::outbox_item::NewOutboxItem;
use outbox_backend::providers::{AdapterRegistry, DeliveryOutcome};
use outbox_backend::services::dispatch_service::DispatchService;
use outbox_backend::services::limiter_service::{
    default_rate_limits, IntegrationLimiter, RateLimitPolicy,
};
use outbox_backend::services::outbox_service::OutboxStore;

fn new_item(integration_id: &str) -> NewOutboxItem {
    NewOutboxItem {
        integration_id: integration_id.to_string(),
        operation: "send_email".to_string(),
        payload: json!({"to": "a@x.com"}),
        idempotency_key: None,
    }
}

// Generous per-test quota so repeated passes inside one second are not
// throttled; the limiter behavior itself has dedicated tests.
fn dispatcher_with(
    store: Arc<MemoryOutboxStore>,
    integration_id: &str,
    adapter: Arc<ScriptedAdapter>,
) -> DispatchService {
    let mut registry = AdapterRegistry::new();
    registry.register(integration_id, adapter);
    let mut policies = std::collections::HashMap::new();
    policies.insert(integration_id.to_string(), RateLimitPolicy::new(1_000, 10));
    DispatchService::new(store, Arc::new(registry), IntegrationLimiter::new(policies))
}

#[tokio::test]
async fn successful_delivery_marks_sent() {
    let store = MemoryOutboxStore::new();
    let item = store.enqueue(new_item("resend")).await.unwrap();

    let adapter = ScriptedAdapter::always(DeliveryOutcome::Success {
        data: json!({"id": "email_1"}),
    });
    let dispatcher = dispatcher_with(store.clone(), "resend", adapter);

    let report = dispatcher.dispatch(50).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.dead_letter, 0);

    let stored = store.snapshot(item.id).unwrap();
    assert_eq!(stored.status, "sent");
    assert_eq!(stored.attempt_count, 1);
    assert_eq!(stored.provider_response, Some(json!({"id": "email_1"})));
}

#[tokio::test]
async fn transient_failures_dead_letter_after_five_attempts() {
    let store = MemoryOutboxStore::new();
    let item = store.enqueue(new_item("resend")).await.unwrap();

    let adapter = ScriptedAdapter::always(DeliveryOutcome::transient("HTTP 503: upstream down"));
    let dispatcher = dispatcher_with(store.clone(), "resend", adapter);

    for pass in 1..=5 {
        let report = dispatcher.dispatch(50).await.unwrap();
        assert_eq!(report.processed, 1, "pass {}", pass);

        let stored = store.snapshot(item.id).unwrap();
        assert_eq!(stored.attempt_count, pass);
        if pass < 5 {
            assert_eq!(stored.status, "failed");
            assert!(stored.next_attempt_at.unwrap() > Utc::now());
            // backoff window elapses before the next pass
            store.expire_backoff(item.id);
        } else {
            assert_eq!(stored.status, "dead_letter");
            assert_eq!(
                stored.last_error.as_deref(),
                Some("HTTP 503: upstream down")
            );
            assert_eq!(stored.next_attempt_at, None);
        }
    }

    // Terminal: later passes never pick the item up again.
    let report = dispatcher.dispatch(50).await.unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(store.snapshot(item.id).unwrap().attempt_count, 5);
}

#[tokio::test]
async fn future_next_attempt_is_left_untouched() {
    let store = MemoryOutboxStore::new();
    let item = store.enqueue(new_item("resend")).await.unwrap();
    store.set_next_attempt(item.id, Some(Utc::now() + Duration::minutes(10)));

    let adapter = ScriptedAdapter::always(DeliveryOutcome::Success { data: json!({}) });
    let dispatcher = dispatcher_with(store.clone(), "resend", adapter);

    let report = dispatcher.dispatch(50).await.unwrap();
    assert_eq!(report.processed, 0);

    let stored = store.snapshot(item.id).unwrap();
    assert_eq!(stored.status, "queued");
    assert_eq!(stored.attempt_count, 0);
}

#[tokio::test]
async fn permanent_failure_dead_letters_immediately() {
    let store = MemoryOutboxStore::new();
    let item = store.enqueue(new_item("resend")).await.unwrap();

    let adapter =
        ScriptedAdapter::always(DeliveryOutcome::permanent("HTTP 422: Invalid `to` address"));
    let dispatcher = dispatcher_with(store.clone(), "resend", adapter);

    let report = dispatcher.dispatch(50).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.dead_letter, 1);

    let stored = store.snapshot(item.id).unwrap();
    assert_eq!(stored.status, "dead_letter");
    assert_eq!(stored.attempt_count, 1);
    assert_eq!(
        stored.last_error.as_deref(),
        Some("HTTP 422: Invalid `to` address")
    );
}

#[tokio::test]
async fn unknown_integration_fails_without_retries() {
    let store = MemoryOutboxStore::new();
    let item = store.enqueue(new_item("whatsapp")).await.unwrap();

    let dispatcher = DispatchService::new(
        store.clone(),
        Arc::new(AdapterRegistry::new()),
        IntegrationLimiter::new(default_rate_limits()),
    );

    let report = dispatcher.dispatch(50).await.unwrap();
    assert_eq!(report.dead_letter, 1);

    let stored = store.snapshot(item.id).unwrap();
    assert_eq!(stored.status, "dead_letter");
    assert_eq!(
        stored.last_error.as_deref(),
        Some("Unknown integration: whatsapp")
    );
}

#[tokio::test]
async fn rate_limited_items_are_skipped_without_counting_an_attempt() {
    let store = MemoryOutboxStore::new();
    let first = store.enqueue(new_item("slack")).await.unwrap();
    let second = store.enqueue(new_item("slack")).await.unwrap();

    let adapter = ScriptedAdapter::always(DeliveryOutcome::Success { data: json!({}) });
    let mut registry = AdapterRegistry::new();
    registry.register("slack", adapter);
    let mut policies = std::collections::HashMap::new();
    policies.insert("slack".to_string(), RateLimitPolicy::new(1, 1));
    let dispatcher = DispatchService::new(
        store.clone(),
        Arc::new(registry),
        IntegrationLimiter::new(policies),
    );

    let report = dispatcher.dispatch(50).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.sent, 1);

    assert_eq!(store.snapshot(first.id).unwrap().status, "sent");
    let skipped = store.snapshot(second.id).unwrap();
    assert_eq!(skipped.status, "queued");
    assert_eq!(skipped.attempt_count, 0);
}

#[tokio::test]
async fn store_failure_on_one_item_does_not_abort_the_batch() {
    let inner = MemoryOutboxStore::new();
    let first = inner.enqueue(new_item("resend")).await.unwrap();
    let second = inner.enqueue(new_item("resend")).await.unwrap();

    let store = Arc::new(FailingMarkStore {
        inner: inner.clone(),
        fail_mark_sent_for: first.id,
    });

    let adapter = ScriptedAdapter::always(DeliveryOutcome::Success { data: json!({}) });
    let mut registry = AdapterRegistry::new();
    registry.register("resend", adapter);
    let dispatcher = DispatchService::new(
        store,
        Arc::new(registry),
        IntegrationLimiter::new(default_rate_limits()),
    );

    let report = dispatcher.dispatch(50).await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(inner.snapshot(second.id).unwrap().status, "sent");
}

#[tokio::test]
async fn operator_retry_resets_dead_letter_items() {
    let store = MemoryOutboxStore::new();
    let item = store.enqueue(new_item("resend")).await.unwrap();

    let adapter = ScriptedAdapter::always(DeliveryOutcome::permanent("HTTP 401: revoked"));
    let dispatcher = dispatcher_with(store.clone(), "resend", adapter);
    dispatcher.dispatch(50).await.unwrap();
    assert_eq!(store.snapshot(item.id).unwrap().status, "dead_letter");

    let reset = store.reset_for_retry(item.id).await.unwrap();
    assert_eq!(reset.status, "queued");
    assert_eq!(reset.attempt_count, 0);
    assert_eq!(reset.last_error, None);
}

#[tokio::test]
async fn retry_is_rejected_for_sent_items() {
    let store = MemoryOutboxStore::new();
    let item = store.enqueue(new_item("resend")).await.unwrap();

    let adapter = ScriptedAdapter::always(DeliveryOutcome::Success { data: json!({}) });
    let dispatcher = dispatcher_with(store.clone(), "resend", adapter);
    dispatcher.dispatch(50).await.unwrap();

    let err = store.reset_for_retry(item.id).await.unwrap_err();
    assert!(matches!(err, outbox_backend::error::Error::Conflict(_)));
}

#[tokio::test]
async fn idempotency_key_returns_the_existing_item() {
    let store = MemoryOutboxStore::new();
    let mut first = new_item("resend");
    first.idempotency_key = Some("evt-42".to_string());
    let mut second = new_item("resend");
    second.idempotency_key = Some("evt-42".to_string());

    let a = store.enqueue(first).await.unwrap();
    let b = store.enqueue(second).await.unwrap();
    assert_eq!(a.id, b.id);
}

#[tokio::test]
async fn mixed_outcomes_are_counted_separately() {
    let store = MemoryOutboxStore::new();
    store.enqueue(new_item("resend")).await.unwrap();
    let failing = store.enqueue(new_item("twilio")).await.unwrap();
    store.enqueue(new_item("monday")).await.unwrap();

    let mut registry = AdapterRegistry::new();
    registry.register(
        "resend",
        ScriptedAdapter::always(DeliveryOutcome::Success { data: json!({}) }),
    );
    registry.register(
        "twilio",
        ScriptedAdapter::always(DeliveryOutcome::transient("HTTP 500: flaky")),
    );
    let dispatcher = DispatchService::new(
        store.clone(),
        Arc::new(registry),
        IntegrationLimiter::new(default_rate_limits()),
    );

    let report = dispatcher.dispatch(50).await.unwrap();
    assert_eq!(report.processed, 3);
    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.dead_letter, 1);

    let rescheduled = store.snapshot(failing.id).unwrap();
    assert_eq!(rescheduled.status, "failed");
    assert!(rescheduled.next_attempt_at.is_some());
}

#[tokio::test]
async fn batch_size_bounds_the_claim() {
    let store = MemoryOutboxStore::new();
    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(store.enqueue(new_item("resend")).await.unwrap().id);
    }

    let adapter = ScriptedAdapter::always(DeliveryOutcome::Success { data: json!({}) });
    let dispatcher = dispatcher_with(store.clone(), "resend", adapter);

    let report = dispatcher.dispatch(2).await.unwrap();
    assert_eq!(report.processed, 2);

    // Oldest-created first
    assert_eq!(store.snapshot(ids[0]).unwrap().status, "sent");
    assert_eq!(store.snapshot(ids[1]).unwrap().status, "sent");
    assert_eq!(store.snapshot(ids[2]).unwrap().status, "queued");
}
