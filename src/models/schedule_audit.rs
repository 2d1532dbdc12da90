use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextStep {
    #[serde(rename = "email_to_candidate")]
    EmailCandidate,
    #[serde(rename = "email_to_interviewer")]
    EmailInterviewer,
    #[serde(rename = "confirm_event")]
    ConfirmEvent,
    #[serde(rename = "human_intervention")]
    HumanIntervention,
}

impl NextStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            NextStep::EmailCandidate => "email_to_candidate",
            NextStep::EmailInterviewer => "email_to_interviewer",
            NextStep::ConfirmEvent => "confirm_event",
            NextStep::HumanIntervention => "human_intervention",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduleAudit {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub interview_id: Uuid,
    pub message_id: String,
    pub decision: JsonValue,
    pub next_step: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateScheduleAudit {
    pub conversation_id: Uuid,
    pub interview_id: Uuid,
    pub message_id: String,
    pub decision: JsonValue,
    pub next_step: NextStep,
}
