use crate::error::{Error, Result};
use crate::models::conversation::{ConversationMessage, CreateConversationMessage};
use crate::models::interview::{Interview, InterviewStatus, Meeting};
use crate::models::schedule_audit::{CreateScheduleAudit, ScheduleAudit};
use crate::store::{AuditStore, ClaimOutcome, ConversationStore, InterviewStore, TokenStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    interviews: HashMap<Uuid, Interview>,
    messages: Vec<ConversationMessage>,
    audits: HashMap<(Uuid, Uuid), ScheduleAudit>,
    tokens: HashMap<Uuid, String>,
}

/// In-memory store with the same observable behavior as the Postgres one.
/// Used by tests and by local runs without a database.
#[derive(Clone, Default)]
pub struct MemoryScheduleStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_interview(&self, interview: Interview) {
        let mut state = self.state.lock().unwrap();
        state.interviews.insert(interview.id, interview);
    }

    pub fn seed_message(&self, message: ConversationMessage) {
        let mut state = self.state.lock().unwrap();
        state.messages.push(message);
    }

    pub fn seed_refresh_token(&self, user_id: Uuid, token: &str) {
        let mut state = self.state.lock().unwrap();
        state.tokens.insert(user_id, token.to_string());
    }

    pub fn interview(&self, id: Uuid) -> Option<Interview> {
        self.state.lock().unwrap().interviews.get(&id).cloned()
    }

    pub fn message(&self, id: Uuid) -> Option<ConversationMessage> {
        let state = self.state.lock().unwrap();
        state.messages.iter().find(|m| m.id == id).cloned()
    }

    pub fn messages_for(&self, interview_id: Uuid) -> Vec<ConversationMessage> {
        let state = self.state.lock().unwrap();
        state
            .messages
            .iter()
            .filter(|m| m.interview_id == interview_id)
            .cloned()
            .collect()
    }

    pub fn audit(&self, conversation_id: Uuid, interview_id: Uuid) -> Option<ScheduleAudit> {
        let state = self.state.lock().unwrap();
        state.audits.get(&(conversation_id, interview_id)).cloned()
    }

    // A missing row and a stale version are indistinguishable to the SQL
    // zero-row update, so both surface as conflicts here too.
    fn update_interview<F>(&self, id: Uuid, expected_version: i64, apply: F) -> Result<Interview>
    where
        F: FnOnce(&mut Interview),
    {
        let mut state = self.state.lock().unwrap();
        match state.interviews.get_mut(&id) {
            Some(interview) if interview.version == expected_version => {
                apply(interview);
                interview.version += 1;
                interview.updated_at = Utc::now();
                Ok(interview.clone())
            }
            _ => Err(Error::Conflict(format!(
                "Interview {} was modified concurrently",
                id
            ))),
        }
    }
}

#[async_trait]
impl InterviewStore for MemoryScheduleStore {
    async fn get(&self, id: Uuid) -> Result<Option<Interview>> {
        Ok(self.interview(id))
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: InterviewStatus,
        expected_version: i64,
    ) -> Result<Interview> {
        self.update_interview(id, expected_version, |interview| {
            interview.status = status;
        })
    }

    async fn set_matching_slot(
        &self,
        id: Uuid,
        slot: DateTime<Utc>,
        expected_version: i64,
    ) -> Result<Interview> {
        self.update_interview(id, expected_version, |interview| {
            interview.matching_slot = Some(slot);
        })
    }

    async fn record_meeting(
        &self,
        id: Uuid,
        meeting: &Meeting,
        expected_version: i64,
    ) -> Result<Interview> {
        self.update_interview(id, expected_version, |interview| {
            interview.status = InterviewStatus::Scheduled;
            interview.meeting = Some(meeting.clone());
        })
    }
}

#[async_trait]
impl ConversationStore for MemoryScheduleStore {
    async fn get(&self, id: Uuid) -> Result<Option<ConversationMessage>> {
        Ok(self.message(id))
    }

    async fn list_for_interview(&self, interview_id: Uuid) -> Result<Vec<ConversationMessage>> {
        let mut messages = self.messages_for(interview_id);
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn claim(&self, id: Uuid) -> Result<ClaimOutcome> {
        let mut state = self.state.lock().unwrap();
        match state.messages.iter_mut().find(|m| m.id == id) {
            Some(message) if !message.processed => {
                message.processed = true;
                Ok(ClaimOutcome::Claimed)
            }
            _ => Ok(ClaimOutcome::AlreadyProcessed),
        }
    }

    async fn release(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = state.messages.iter_mut().find(|m| m.id == id) {
            message.processed = false;
        }
        Ok(())
    }

    async fn append(&self, message: CreateConversationMessage) -> Result<ConversationMessage> {
        let inserted = ConversationMessage {
            id: Uuid::new_v4(),
            interview_id: message.interview_id,
            message_id: message.message_id,
            from_email: message.from_email,
            to_email: message.to_email,
            subject: message.subject,
            body: message.body,
            processed: false,
            created_at: Utc::now(),
        };

        let mut state = self.state.lock().unwrap();
        state.messages.push(inserted.clone());
        Ok(inserted)
    }
}

#[async_trait]
impl AuditStore for MemoryScheduleStore {
    async fn upsert(&self, audit: CreateScheduleAudit) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        state
            .audits
            .entry((audit.conversation_id, audit.interview_id))
            .and_modify(|existing| {
                existing.message_id = audit.message_id.clone();
                existing.decision = audit.decision.clone();
                existing.next_step = audit.next_step.as_str().to_string();
                existing.status = "pending".to_string();
                existing.updated_at = now;
            })
            .or_insert_with(|| ScheduleAudit {
                id: Uuid::new_v4(),
                conversation_id: audit.conversation_id,
                interview_id: audit.interview_id,
                message_id: audit.message_id.clone(),
                decision: audit.decision.clone(),
                next_step: audit.next_step.as_str().to_string(),
                status: "pending".to_string(),
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }

    async fn complete(&self, conversation_id: Uuid, interview_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(audit) = state.audits.get_mut(&(conversation_id, interview_id)) {
            audit.status = "completed".to_string();
            audit.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryScheduleStore {
    async fn refresh_token(&self, user_id: Uuid) -> Result<Option<String>> {
        Ok(self.state.lock().unwrap().tokens.get(&user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_interview() -> Interview {
        Interview {
            id: Uuid::new_v4(),
            candidate_email: "candidate@example.com".to_string(),
            interviewer_email: "interviewer@example.com".to_string(),
            recruiter_email: "recruiter@example.com".to_string(),
            created_by: Uuid::new_v4(),
            resume_url: None,
            agenda: None,
            instructions: None,
            status: InterviewStatus::Pending,
            matching_slot: None,
            meeting: None,
            version: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_message(interview_id: Uuid) -> ConversationMessage {
        ConversationMessage {
            id: Uuid::new_v4(),
            interview_id,
            message_id: "provider-msg-1".to_string(),
            from_email: "candidate@example.com".to_string(),
            to_email: "recruiter@example.com".to_string(),
            subject: "Re: Interview".to_string(),
            body: "Tuesday works for me".to_string(),
            processed: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn claim_has_a_single_winner() {
        let store = MemoryScheduleStore::new();
        let message = sample_message(Uuid::new_v4());
        let id = message.id;
        store.seed_message(message);

        assert_eq!(store.claim(id).await.unwrap(), ClaimOutcome::Claimed);
        assert_eq!(
            store.claim(id).await.unwrap(),
            ClaimOutcome::AlreadyProcessed
        );

        store.release(id).await.unwrap();
        assert_eq!(store.claim(id).await.unwrap(), ClaimOutcome::Claimed);
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = MemoryScheduleStore::new();
        let interview = sample_interview();
        let id = interview.id;
        store.seed_interview(interview);

        let updated = store
            .set_status(id, InterviewStatus::EmailToCandidate, 0)
            .await
            .unwrap();
        assert_eq!(updated.version, 1);

        let stale = store.set_status(id, InterviewStatus::Failed, 0).await;
        assert!(matches!(stale, Err(Error::Conflict(_))));
        assert_eq!(
            store.interview(id).unwrap().status,
            InterviewStatus::EmailToCandidate
        );
    }

    #[tokio::test]
    async fn append_assigns_id_and_starts_unprocessed() {
        let store = MemoryScheduleStore::new();
        let interview_id = Uuid::new_v4();

        let appended = store
            .append(CreateConversationMessage {
                interview_id,
                message_id: "generated-1752944400000".to_string(),
                from_email: "recruiter@example.com".to_string(),
                to_email: "candidate@example.com".to_string(),
                subject: "Interview".to_string(),
                body: "<p>Does Tuesday work?</p>".to_string(),
            })
            .await
            .unwrap();

        assert!(!appended.processed);
        assert_eq!(store.messages_for(interview_id).len(), 1);
    }

    #[tokio::test]
    async fn audit_upsert_overwrites_and_complete_marks_done() {
        let store = MemoryScheduleStore::new();
        let conversation_id = Uuid::new_v4();
        let interview_id = Uuid::new_v4();

        let create = |step: crate::models::schedule_audit::NextStep| CreateScheduleAudit {
            conversation_id,
            interview_id,
            message_id: "provider-msg-1".to_string(),
            decision: serde_json::json!({}),
            next_step: step,
        };

        store
            .upsert(create(crate::models::schedule_audit::NextStep::EmailCandidate))
            .await
            .unwrap();
        store
            .upsert(create(crate::models::schedule_audit::NextStep::ConfirmEvent))
            .await
            .unwrap();

        let audit = store.audit(conversation_id, interview_id).unwrap();
        assert_eq!(audit.next_step, "confirm_event");
        assert_eq!(audit.status, "pending");

        store.complete(conversation_id, interview_id).await.unwrap();
        let audit = store.audit(conversation_id, interview_id).unwrap();
        assert_eq!(audit.status, "completed");
    }
}
