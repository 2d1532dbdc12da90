use crate::models::schedule_audit::NextStep;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProcessConversationPayload {
    #[validate(required)]
    pub conversation_id: Option<Uuid>,
    #[validate(required)]
    pub interview_id: Option<Uuid>,
    #[validate(required, length(min = 1))]
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessConversationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<NextStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}
