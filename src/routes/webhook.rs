use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use tracing::info;

use crate::{
    dto::webhook_dto::WebhookAck,
    error::Result,
    services::webhook_service::WebhookOutcome,
    utils::signature::SIGNATURE_HEADER,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/webhook/{provider}",
    params(("provider" = String, Path, description = "Integration id of the sender")),
    responses(
        (status = 200, description = "Event accepted (duplicates flagged)", body = WebhookAck),
        (status = 400, description = "Malformed body"),
        (status = 403, description = "Signature, timestamp, or secret rejected")
    )
)]
#[axum::debug_handler]
pub async fn handle_provider_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let signature_header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = state
        .webhook_guard
        .process(&provider, signature_header, &body, Utc::now())
        .await?;

    match outcome {
        WebhookOutcome::Processed { event_id } => {
            info!(provider = %provider, event_id = %event_id, "Webhook event recorded");
            Ok(Json(WebhookAck::ok()))
        }
        WebhookOutcome::Duplicate { event_id } => {
            info!(provider = %provider, event_id = %event_id, "Duplicate webhook delivery ignored");
            Ok(Json(WebhookAck::duplicate()))
        }
    }
}
