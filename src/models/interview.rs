use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterviewStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "email_to_candidate")]
    EmailToCandidate,
    #[serde(rename = "email_to_interviewer")]
    EmailToInterviewer,
    #[serde(rename = "Scheduled")]
    Scheduled,
    #[serde(rename = "failed")]
    Failed,
}

impl InterviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStatus::Pending => "pending",
            InterviewStatus::EmailToCandidate => "email_to_candidate",
            InterviewStatus::EmailToInterviewer => "email_to_interviewer",
            InterviewStatus::Scheduled => "Scheduled",
            InterviewStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "email_to_candidate" => InterviewStatus::EmailToCandidate,
            "email_to_interviewer" => InterviewStatus::EmailToInterviewer,
            "Scheduled" => InterviewStatus::Scheduled,
            "failed" => InterviewStatus::Failed,
            _ => InterviewStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub link: String,
    pub time_stamp: DateTime<Utc>,
    pub event_id: String,
    pub platform: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interview {
    pub id: Uuid,
    pub candidate_email: String,
    pub interviewer_email: String,
    pub recruiter_email: String,
    pub created_by: Uuid,
    pub resume_url: Option<String>,
    pub agenda: Option<String>,
    pub instructions: Option<String>,
    pub status: InterviewStatus,
    pub matching_slot: Option<DateTime<Utc>>,
    pub meeting: Option<Meeting>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels_round_trip() {
        let all = [
            InterviewStatus::Pending,
            InterviewStatus::EmailToCandidate,
            InterviewStatus::EmailToInterviewer,
            InterviewStatus::Scheduled,
            InterviewStatus::Failed,
        ];
        for status in all {
            assert_eq!(InterviewStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn unknown_status_falls_back_to_pending() {
        assert_eq!(InterviewStatus::parse("archived"), InterviewStatus::Pending);
    }

    #[test]
    fn scheduled_keeps_its_historical_capitalization() {
        assert_eq!(InterviewStatus::Scheduled.as_str(), "Scheduled");
    }
}
