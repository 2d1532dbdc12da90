use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub interview_id: Uuid,
    pub message_id: String,
    pub from_email: String,
    pub to_email: String,
    pub subject: String,
    pub body: String,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateConversationMessage {
    pub interview_id: Uuid,
    pub message_id: String,
    pub from_email: String,
    pub to_email: String,
    pub subject: String,
    pub body: String,
}
