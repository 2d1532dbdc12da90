use crate::error::{Error, Result};
use crate::models::conversation::{ConversationMessage, CreateConversationMessage};
use crate::models::interview::{Interview, InterviewStatus, Meeting};
use crate::models::schedule_audit::CreateScheduleAudit;
use crate::store::{AuditStore, ClaimOutcome, ConversationStore, InterviewStore, TokenStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Clone)]
pub struct PgScheduleStore {
    pool: PgPool,
}

impl PgScheduleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_interview(row: &PgRow) -> Result<Interview> {
    let meeting_link: Option<String> = row.try_get("meeting_link")?;
    let meeting_time: Option<DateTime<Utc>> = row.try_get("meeting_time")?;
    let meeting_event_id: Option<String> = row.try_get("meeting_event_id")?;
    let meeting_platform: Option<String> = row.try_get("meeting_platform")?;

    let meeting = match (meeting_link, meeting_time, meeting_event_id, meeting_platform) {
        (Some(link), Some(time_stamp), Some(event_id), Some(platform)) => Some(Meeting {
            link,
            time_stamp,
            event_id,
            platform,
        }),
        _ => None,
    };

    let status: String = row.try_get("status")?;

    Ok(Interview {
        id: row.try_get("id")?,
        candidate_email: row.try_get("candidate_email")?,
        interviewer_email: row.try_get("interviewer_email")?,
        recruiter_email: row.try_get("recruiter_email")?,
        created_by: row.try_get("created_by")?,
        resume_url: row.try_get("resume_url")?,
        agenda: row.try_get("agenda")?,
        instructions: row.try_get("instructions")?,
        status: InterviewStatus::parse(&status),
        matching_slot: row.try_get("matching_slot")?,
        meeting,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl InterviewStore for PgScheduleStore {
    async fn get(&self, id: Uuid) -> Result<Option<Interview>> {
        let row = sqlx::query("SELECT * FROM interviews WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_interview).transpose()
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: InterviewStatus,
        expected_version: i64,
    ) -> Result<Interview> {
        let row = sqlx::query(
            r#"
            UPDATE interviews
            SET status = $1, version = version + 1, updated_at = NOW()
            WHERE id = $2 AND version = $3
            RETURNING *
            "#,
        )
        .bind(status.as_str())
        .bind(id)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => map_interview(&row),
            None => Err(Error::Conflict(format!(
                "Interview {} was modified concurrently",
                id
            ))),
        }
    }

    async fn set_matching_slot(
        &self,
        id: Uuid,
        slot: DateTime<Utc>,
        expected_version: i64,
    ) -> Result<Interview> {
        let row = sqlx::query(
            r#"
            UPDATE interviews
            SET matching_slot = $1, version = version + 1, updated_at = NOW()
            WHERE id = $2 AND version = $3
            RETURNING *
            "#,
        )
        .bind(slot)
        .bind(id)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => map_interview(&row),
            None => Err(Error::Conflict(format!(
                "Interview {} was modified concurrently",
                id
            ))),
        }
    }

    async fn record_meeting(
        &self,
        id: Uuid,
        meeting: &Meeting,
        expected_version: i64,
    ) -> Result<Interview> {
        let row = sqlx::query(
            r#"
            UPDATE interviews
            SET status = $1,
                meeting_link = $2,
                meeting_time = $3,
                meeting_event_id = $4,
                meeting_platform = $5,
                version = version + 1,
                updated_at = NOW()
            WHERE id = $6 AND version = $7
            RETURNING *
            "#,
        )
        .bind(InterviewStatus::Scheduled.as_str())
        .bind(&meeting.link)
        .bind(meeting.time_stamp)
        .bind(&meeting.event_id)
        .bind(&meeting.platform)
        .bind(id)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => map_interview(&row),
            None => Err(Error::Conflict(format!(
                "Interview {} was modified concurrently",
                id
            ))),
        }
    }
}

#[async_trait]
impl ConversationStore for PgScheduleStore {
    async fn get(&self, id: Uuid) -> Result<Option<ConversationMessage>> {
        let message = sqlx::query_as::<_, ConversationMessage>(
            "SELECT * FROM conversation_messages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(message)
    }

    async fn list_for_interview(&self, interview_id: Uuid) -> Result<Vec<ConversationMessage>> {
        let messages = sqlx::query_as::<_, ConversationMessage>(
            "SELECT * FROM conversation_messages WHERE interview_id = $1 ORDER BY created_at ASC",
        )
        .bind(interview_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn claim(&self, id: Uuid) -> Result<ClaimOutcome> {
        let result = sqlx::query(
            "UPDATE conversation_messages SET processed = TRUE WHERE id = $1 AND processed = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            Ok(ClaimOutcome::Claimed)
        } else {
            Ok(ClaimOutcome::AlreadyProcessed)
        }
    }

    async fn release(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE conversation_messages SET processed = FALSE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn append(&self, message: CreateConversationMessage) -> Result<ConversationMessage> {
        let inserted = sqlx::query_as::<_, ConversationMessage>(
            r#"
            INSERT INTO conversation_messages (interview_id, message_id, from_email, to_email, subject, body)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(message.interview_id)
        .bind(&message.message_id)
        .bind(&message.from_email)
        .bind(&message.to_email)
        .bind(&message.subject)
        .bind(&message.body)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }
}

#[async_trait]
impl AuditStore for PgScheduleStore {
    async fn upsert(&self, audit: CreateScheduleAudit) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO schedule_audits (conversation_id, interview_id, message_id, decision, next_step, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            ON CONFLICT (conversation_id, interview_id) DO UPDATE
            SET message_id = EXCLUDED.message_id,
                decision = EXCLUDED.decision,
                next_step = EXCLUDED.next_step,
                status = 'pending',
                updated_at = NOW()
            "#,
        )
        .bind(audit.conversation_id)
        .bind(audit.interview_id)
        .bind(&audit.message_id)
        .bind(&audit.decision)
        .bind(audit.next_step.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn complete(&self, conversation_id: Uuid, interview_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE schedule_audits
            SET status = 'completed', updated_at = NOW()
            WHERE conversation_id = $1 AND interview_id = $2
            "#,
        )
        .bind(conversation_id)
        .bind(interview_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl TokenStore for PgScheduleStore {
    async fn refresh_token(&self, user_id: Uuid) -> Result<Option<String>> {
        let row = sqlx::query("SELECT refresh_token FROM oauth_tokens WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row
            .map(|r| r.try_get::<String, _>("refresh_token"))
            .transpose()?)
    }
}
