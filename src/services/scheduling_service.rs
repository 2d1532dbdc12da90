use crate::error::{Error, Result};
use crate::models::conversation::{ConversationMessage, CreateConversationMessage};
use crate::models::decision::{Decision, NextActor};
use crate::models::interview::{Interview, InterviewStatus, Meeting};
use crate::models::schedule_audit::{CreateScheduleAudit, NextStep};
use crate::services::calendar_service::{CalendarClient, CalendarEventRequest};
use crate::services::email_service::{EmailSender, OutboundEmail};
use crate::services::extraction_service::{ExtractionInput, SlotExtractor};
use crate::services::transcript::build_transcript;
use crate::store::{AuditStore, ClaimOutcome, ConversationStore, InterviewStore, TokenStore};
use crate::utils::time::{parse_slot, synthesized_message_id};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ScheduleOutcome {
    pub next_step: Option<NextStep>,
    pub response: Option<String>,
}

/// Agreed slots always win. Otherwise the decision names whoever has to
/// reply next, and anything unclear goes to a human.
pub fn resolve_next_step(decision: &Decision) -> NextStep {
    if !decision.matching_slots.is_empty() {
        return NextStep::ConfirmEvent;
    }

    match decision.next_action_taker {
        NextActor::Interviewer => NextStep::EmailInterviewer,
        NextActor::Candidate => NextStep::EmailCandidate,
        NextActor::Scheduler | NextActor::Human | NextActor::Unknown => {
            NextStep::HumanIntervention
        }
    }
}

#[derive(Clone)]
pub struct SchedulingService {
    interviews: Arc<dyn InterviewStore>,
    conversations: Arc<dyn ConversationStore>,
    audits: Arc<dyn AuditStore>,
    tokens: Arc<dyn TokenStore>,
    extractor: Arc<dyn SlotExtractor>,
    mailer: Arc<dyn EmailSender>,
    calendar: Arc<dyn CalendarClient>,
}

impl SchedulingService {
    pub fn new(
        interviews: Arc<dyn InterviewStore>,
        conversations: Arc<dyn ConversationStore>,
        audits: Arc<dyn AuditStore>,
        tokens: Arc<dyn TokenStore>,
        extractor: Arc<dyn SlotExtractor>,
        mailer: Arc<dyn EmailSender>,
        calendar: Arc<dyn CalendarClient>,
    ) -> Self {
        Self {
            interviews,
            conversations,
            audits,
            tokens,
            extractor,
            mailer,
            calendar,
        }
    }

    /// Handles one inbound conversation message end to end. Claims the
    /// message first so concurrent deliveries of the same webhook cannot
    /// trigger duplicate emails or events.
    pub async fn process(
        &self,
        conversation_id: Uuid,
        interview_id: Uuid,
        message_id: &str,
    ) -> Result<ScheduleOutcome> {
        let message = self.conversations.get(conversation_id).await?.ok_or_else(|| {
            Error::NotFound(format!("Conversation message {} not found", conversation_id))
        })?;

        let interview = self
            .interviews
            .get(interview_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Interview {} not found", interview_id)))?;

        if message.interview_id != interview.id {
            return Err(Error::BadRequest(format!(
                "Message {} does not belong to interview {}",
                conversation_id, interview_id
            )));
        }

        if message.processed {
            tracing::info!(conversation_id = %conversation_id, "Message already processed, skipping");
            return Ok(already_processed());
        }

        if self.conversations.claim(conversation_id).await? == ClaimOutcome::AlreadyProcessed {
            tracing::info!(conversation_id = %conversation_id, "Lost the claim race, skipping");
            return Ok(already_processed());
        }

        match self.run_claimed(&interview, &message, message_id).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                // Nothing irreversible happened if we got here, so hand the
                // message back for a retry.
                if let Err(release_err) = self.conversations.release(conversation_id).await {
                    tracing::error!(
                        conversation_id = %conversation_id,
                        error = %release_err,
                        "Failed to release claim"
                    );
                }
                Err(err)
            }
        }
    }

    async fn run_claimed(
        &self,
        interview: &Interview,
        message: &ConversationMessage,
        provider_message_id: &str,
    ) -> Result<ScheduleOutcome> {
        let history = self.conversations.list_for_interview(interview.id).await?;
        let transcript = build_transcript(interview, &history);

        let input = ExtractionInput {
            transcript,
            subject: message.subject.clone(),
            interviewer_email: interview.interviewer_email.clone(),
            candidate_email: interview.candidate_email.clone(),
            recruiter_email: interview.recruiter_email.clone(),
            from_email: message.from_email.clone(),
            to_email: message.to_email.clone(),
        };

        let decision = match self.extractor.extract(&input).await {
            Ok(decision) => decision.sanitized(),
            Err(err) => {
                tracing::error!(interview_id = %interview.id, error = %err, "Slot extraction failed");
                self.mark_failed_best_effort(interview).await;
                return Err(err);
            }
        };

        let next_step = resolve_next_step(&decision);
        tracing::info!(
            interview_id = %interview.id,
            conversation_id = %message.id,
            next_step = next_step.as_str(),
            "Resolved next scheduling step"
        );

        self.audits
            .upsert(CreateScheduleAudit {
                conversation_id: message.id,
                interview_id: interview.id,
                message_id: provider_message_id.to_string(),
                decision: serde_json::to_value(&decision)?,
                next_step,
            })
            .await?;

        let outcome = match next_step {
            NextStep::EmailCandidate | NextStep::EmailInterviewer => {
                self.execute_email(interview, message, &decision, next_step)
                    .await?
            }
            NextStep::ConfirmEvent => self.execute_confirm(interview, message, &decision).await?,
            NextStep::HumanIntervention => self.execute_human(interview, &decision).await?,
        };

        self.audits.complete(message.id, interview.id).await?;
        Ok(outcome)
    }

    async fn execute_email(
        &self,
        interview: &Interview,
        message: &ConversationMessage,
        decision: &Decision,
        step: NextStep,
    ) -> Result<ScheduleOutcome> {
        let (to, status) = if step == NextStep::EmailInterviewer {
            (
                interview.interviewer_email.clone(),
                InterviewStatus::EmailToInterviewer,
            )
        } else {
            (
                interview.candidate_email.clone(),
                InterviewStatus::EmailToCandidate,
            )
        };

        let html = decision
            .next_action_metadata
            .email_content
            .clone()
            .unwrap_or_default();

        let sent = self
            .mailer
            .send(&OutboundEmail {
                to: to.clone(),
                from: interview.recruiter_email.clone(),
                subject: message.subject.clone(),
                html: html.clone(),
                sender_user_id: interview.created_by,
            })
            .await?;

        let stored_message_id = sent.message_id.unwrap_or_else(synthesized_message_id);

        self.conversations
            .append(CreateConversationMessage {
                interview_id: interview.id,
                message_id: stored_message_id,
                from_email: interview.recruiter_email.clone(),
                to_email: to,
                subject: message.subject.clone(),
                body: html.clone(),
            })
            .await?;

        // The email is out, so a concurrent edit must not abort the status
        // update. Reapply it on top of the fresh row instead.
        self.apply_status(interview, status, true).await?;

        Ok(ScheduleOutcome {
            next_step: Some(step),
            response: Some(html),
        })
    }

    async fn execute_confirm(
        &self,
        interview: &Interview,
        message: &ConversationMessage,
        decision: &Decision,
    ) -> Result<ScheduleOutcome> {
        let raw_slot = decision
            .matching_slots
            .first()
            .ok_or_else(|| Error::Internal("Confirm step without matching slots".to_string()))?;
        let slot = parse_slot(raw_slot)
            .map_err(|e| Error::Internal(format!("Unparseable matching slot {}: {}", raw_slot, e)))?;

        // The agreed time must survive a later calendar failure.
        let interview = self
            .interviews
            .set_matching_slot(interview.id, slot, interview.version)
            .await?;

        let Some(refresh_token) = self.tokens.refresh_token(interview.created_by).await? else {
            tracing::warn!(
                interview_id = %interview.id,
                user_id = %interview.created_by,
                "No Google refresh token on file"
            );
            self.apply_status(&interview, InterviewStatus::Failed, false)
                .await?;
            return Ok(ScheduleOutcome {
                next_step: Some(NextStep::ConfirmEvent),
                response: Some(
                    "No calendar credentials on file; interview flagged for manual scheduling"
                        .to_string(),
                ),
            });
        };

        let request = CalendarEventRequest {
            refresh_token,
            candidate_email: interview.candidate_email.clone(),
            interviewer_email: interview.interviewer_email.clone(),
            subject: message.subject.clone(),
            starts_at: slot,
            agenda: interview.agenda.clone(),
            instructions: interview.instructions.clone(),
            resume_url: interview.resume_url.clone(),
        };

        match self.calendar.create_event(&request).await {
            Ok(event) => {
                let response = if event.meeting_link.is_empty() {
                    "Interview scheduled (no conferencing link returned)".to_string()
                } else {
                    event.meeting_link.clone()
                };
                let meeting = Meeting {
                    link: event.meeting_link,
                    time_stamp: slot,
                    event_id: event.event_id,
                    platform: "google_meet".to_string(),
                };
                self.record_meeting(&interview, &meeting).await?;
                tracing::info!(
                    interview_id = %interview.id,
                    event_id = %meeting.event_id,
                    "Interview scheduled"
                );
                Ok(ScheduleOutcome {
                    next_step: Some(NextStep::ConfirmEvent),
                    response: Some(response),
                })
            }
            Err(err) => {
                tracing::error!(
                    interview_id = %interview.id,
                    error = %err,
                    "Calendar event creation failed"
                );
                self.apply_status(&interview, InterviewStatus::Failed, false)
                    .await?;
                Ok(ScheduleOutcome {
                    next_step: Some(NextStep::ConfirmEvent),
                    response: Some(
                        "Calendar event creation failed; interview flagged for manual scheduling"
                            .to_string(),
                    ),
                })
            }
        }
    }

    async fn execute_human(
        &self,
        interview: &Interview,
        decision: &Decision,
    ) -> Result<ScheduleOutcome> {
        let note = decision
            .next_action_metadata
            .message_for_human
            .clone()
            .unwrap_or_else(|| "Conversation needs manual follow-up".to_string());

        tracing::warn!(
            interview_id = %interview.id,
            note = %note,
            "Escalating to human intervention"
        );

        self.apply_status(interview, InterviewStatus::Failed, false)
            .await?;

        Ok(ScheduleOutcome {
            next_step: Some(NextStep::HumanIntervention),
            response: Some(note),
        })
    }

    async fn apply_status(
        &self,
        interview: &Interview,
        status: InterviewStatus,
        reapply_on_conflict: bool,
    ) -> Result<Interview> {
        match self
            .interviews
            .set_status(interview.id, status, interview.version)
            .await
        {
            Err(Error::Conflict(_)) if reapply_on_conflict => {
                tracing::warn!(
                    interview_id = %interview.id,
                    "Interview changed concurrently, reapplying status update"
                );
                let fresh = self.interviews.get(interview.id).await?.ok_or_else(|| {
                    Error::NotFound(format!("Interview {} not found", interview.id))
                })?;
                self.interviews
                    .set_status(interview.id, status, fresh.version)
                    .await
            }
            other => other,
        }
    }

    async fn record_meeting(&self, interview: &Interview, meeting: &Meeting) -> Result<Interview> {
        match self
            .interviews
            .record_meeting(interview.id, meeting, interview.version)
            .await
        {
            Err(Error::Conflict(_)) => {
                tracing::warn!(
                    interview_id = %interview.id,
                    "Interview changed concurrently, reapplying meeting record"
                );
                let fresh = self.interviews.get(interview.id).await?.ok_or_else(|| {
                    Error::NotFound(format!("Interview {} not found", interview.id))
                })?;
                self.interviews
                    .record_meeting(interview.id, meeting, fresh.version)
                    .await
            }
            other => other,
        }
    }

    async fn mark_failed_best_effort(&self, interview: &Interview) {
        if let Err(err) = self
            .apply_status(interview, InterviewStatus::Failed, true)
            .await
        {
            tracing::error!(
                interview_id = %interview.id,
                error = %err,
                "Could not mark interview failed"
            );
        }
    }
}

fn already_processed() -> ScheduleOutcome {
    ScheduleOutcome {
        next_step: None,
        response: Some("Message already processed".to_string()),
    }
}
