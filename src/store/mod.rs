pub mod memory;
pub mod postgres;

use crate::error::Result;
use crate::models::conversation::{ConversationMessage, CreateConversationMessage};
use crate::models::interview::{Interview, InterviewStatus, Meeting};
use crate::models::schedule_audit::CreateScheduleAudit;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Result of trying to claim a conversation message for processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    AlreadyProcessed,
}

#[async_trait]
pub trait InterviewStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Interview>>;

    /// Updates the status only if `expected_version` still matches.
    /// Returns `Error::Conflict` when another writer got there first.
    async fn set_status(
        &self,
        id: Uuid,
        status: InterviewStatus,
        expected_version: i64,
    ) -> Result<Interview>;

    async fn set_matching_slot(
        &self,
        id: Uuid,
        slot: DateTime<Utc>,
        expected_version: i64,
    ) -> Result<Interview>;

    async fn record_meeting(
        &self,
        id: Uuid,
        meeting: &Meeting,
        expected_version: i64,
    ) -> Result<Interview>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<ConversationMessage>>;

    async fn list_for_interview(&self, interview_id: Uuid) -> Result<Vec<ConversationMessage>>;

    /// Flips `processed` from false to true in one statement. Exactly one
    /// caller can win the flip for a given message.
    async fn claim(&self, id: Uuid) -> Result<ClaimOutcome>;

    async fn release(&self, id: Uuid) -> Result<()>;

    async fn append(&self, message: CreateConversationMessage) -> Result<ConversationMessage>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn upsert(&self, audit: CreateScheduleAudit) -> Result<()>;

    async fn complete(&self, conversation_id: Uuid, interview_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn refresh_token(&self, user_id: Uuid) -> Result<Option<String>>;
}
