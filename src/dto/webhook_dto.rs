use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl WebhookAck {
    pub fn ok() -> Self {
        Self {
            received: true,
            warning: None,
        }
    }

    pub fn duplicate() -> Self {
        Self {
            received: true,
            warning: Some("duplicate".to_string()),
        }
    }
}
