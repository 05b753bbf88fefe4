use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct EnqueuePayload {
    #[validate(length(min = 1, max = 64))]
    pub integration_id: String,
    #[validate(length(min = 1, max = 128))]
    pub operation: String,
    #[schema(value_type = Object)]
    pub payload: JsonValue,
    #[validate(length(min = 1, max = 128))]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EnqueueResponse {
    pub id: Uuid,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct DispatchPayload {
    pub batch_size: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutboxListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}
