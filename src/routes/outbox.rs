use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::outbox_dto::{DispatchPayload, EnqueuePayload, EnqueueResponse, OutboxListQuery},
    error::{Error, Result},
    models::outbox_item::{NewOutboxItem, OutboxStatus},
    services::dispatch_service::DispatchReport,
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/outbox",
    request_body = EnqueuePayload,
    responses(
        (status = 201, description = "Outbox item enqueued", body = EnqueueResponse),
        (status = 400, description = "Invalid payload")
    )
)]
#[axum::debug_handler]
pub async fn enqueue(
    State(state): State<AppState>,
    Json(payload): Json<EnqueuePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let item = state
        .outbox
        .enqueue(NewOutboxItem {
            integration_id: payload.integration_id,
            operation: payload.operation,
            payload: payload.payload,
            idempotency_key: payload.idempotency_key,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(EnqueueResponse {
            id: item.id,
            status: item.status,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/outbox/dispatch",
    request_body = DispatchPayload,
    responses(
        (status = 200, description = "Batch dispatched", body = DispatchReport),
        (status = 403, description = "Admin role required")
    )
)]
#[axum::debug_handler]
pub async fn dispatch(
    State(state): State<AppState>,
    Json(payload): Json<DispatchPayload>,
) -> Result<impl IntoResponse> {
    let config = crate::config::get_config();
    let batch_size = payload
        .batch_size
        .unwrap_or(config.dispatch_batch_size)
        .clamp(1, 500);

    let report = tokio::time::timeout(
        std::time::Duration::from_secs(config.dispatch_timeout_secs),
        state.dispatcher.dispatch(batch_size),
    )
    .await
    .map_err(|_| Error::Internal("Dispatch invocation timed out".to_string()))??;

    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/api/outbox",
    params(
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("limit" = Option<i64>, Query, description = "Max rows, default 50")
    ),
    responses(
        (status = 200, description = "Outbox items, newest first"),
        (status = 400, description = "Unknown status filter")
    )
)]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<OutboxListQuery>,
) -> Result<impl IntoResponse> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(
            OutboxStatus::parse(raw)
                .ok_or_else(|| Error::BadRequest(format!("Unknown status: {}", raw)))?,
        ),
        None => None,
    };
    let limit = query.limit.unwrap_or(50).clamp(1, 200);

    let items = state.outbox.list(status, limit).await?;
    Ok(Json(json!({ "items": items })))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let item = state
        .outbox
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Outbox item {} not found", id)))?;
    Ok(Json(item))
}

#[utoipa::path(
    post,
    path = "/api/outbox/{id}/retry",
    params(("id" = Uuid, Path, description = "Outbox item id")),
    responses(
        (status = 200, description = "Item reset to queued"),
        (status = 404, description = "Unknown item"),
        (status = 409, description = "Item is not failed or dead_letter")
    )
)]
#[axum::debug_handler]
pub async fn retry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let item = state.outbox.reset_for_retry(id).await?;
    tracing::info!(item_id = %id, "Operator reset outbox item to queued");
    Ok(Json(item))
}
