use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::post,
    Router,
};
use chrono::{TimeZone, Utc};
use scheduling_backend::error::{Error, Result};
use scheduling_backend::models::conversation::ConversationMessage;
use scheduling_backend::models::decision::{Decision, NextActionMetadata, NextActor};
use scheduling_backend::models::interview::{Interview, InterviewStatus};
use scheduling_backend::services::calendar_service::{
    CalendarClient, CalendarEventRequest, CreatedEvent,
};
use scheduling_backend::services::email_service::{EmailSender, OutboundEmail, SentEmail};
use scheduling_backend::services::extraction_service::{ExtractionInput, SlotExtractor};
use scheduling_backend::services::scheduling_service::SchedulingService;
use scheduling_backend::store::memory::MemoryScheduleStore;
use scheduling_backend::store::InterviewStore;
use scheduling_backend::AppState;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

struct StubExtractor {
    decision: Decision,
}

#[async_trait]
impl SlotExtractor for StubExtractor {
    async fn extract(&self, _input: &ExtractionInput) -> Result<Decision> {
        Ok(self.decision.clone())
    }
}

#[derive(Clone, Default)]
struct RecordingMailer {
    sent: Arc<Mutex<Vec<OutboundEmail>>>,
    fail: bool,
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<SentEmail> {
        if self.fail {
            return Err(Error::Email("Resend API Error 500".to_string()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(email.clone());
        Ok(SentEmail {
            message_id: Some(format!("resend-{}", sent.len())),
        })
    }
}

struct StubCalendar {
    fail: bool,
}

#[async_trait]
impl CalendarClient for StubCalendar {
    async fn create_event(&self, _request: &CalendarEventRequest) -> Result<CreatedEvent> {
        if self.fail {
            return Err(Error::Calendar("Google Calendar API Error 500".to_string()));
        }
        Ok(CreatedEvent {
            event_id: "evt-123".to_string(),
            meeting_link: "https://meet.google.com/abc-defg-hij".to_string(),
        })
    }
}

/// Extractor that edits the interview row mid-run, standing in for a
/// recruiter updating the record while the webhook is being handled.
struct RacingExtractor {
    store: MemoryScheduleStore,
    interview_id: Uuid,
    decision: Decision,
}

#[async_trait]
impl SlotExtractor for RacingExtractor {
    async fn extract(&self, _input: &ExtractionInput) -> Result<Decision> {
        InterviewStore::set_status(&self.store, self.interview_id, InterviewStatus::Pending, 0)
            .await?;
        Ok(self.decision.clone())
    }
}

fn sample_interview() -> Interview {
    Interview {
        id: Uuid::new_v4(),
        candidate_email: "candidate@example.com".to_string(),
        interviewer_email: "interviewer@example.com".to_string(),
        recruiter_email: "recruiter@example.com".to_string(),
        created_by: Uuid::new_v4(),
        resume_url: None,
        agenda: Some("Backend interview".to_string()),
        instructions: None,
        status: InterviewStatus::Pending,
        matching_slot: None,
        meeting: None,
        version: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn inbound_message(interview: &Interview, body: &str) -> ConversationMessage {
    ConversationMessage {
        id: Uuid::new_v4(),
        interview_id: interview.id,
        message_id: "provider-msg-1".to_string(),
        from_email: interview.candidate_email.clone(),
        to_email: interview.recruiter_email.clone(),
        subject: "Re: Interview".to_string(),
        body: body.to_string(),
        processed: false,
        created_at: Utc::now(),
    }
}

fn email_decision(actor: NextActor, html: &str) -> Decision {
    Decision {
        next_action_taker: actor,
        next_action_metadata: NextActionMetadata {
            email_content: Some(html.to_string()),
            message_for_human: None,
        },
        ..Decision::default()
    }
}

fn build_app(
    store: &MemoryScheduleStore,
    extractor: impl SlotExtractor + 'static,
    mailer: impl EmailSender + 'static,
    calendar: impl CalendarClient + 'static,
) -> Router {
    let scheduling_service = SchedulingService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(extractor),
        Arc::new(mailer),
        Arc::new(calendar),
    );

    Router::new()
        .route(
            "/api/scheduling/process",
            post(scheduling_backend::routes::scheduling::process_conversation),
        )
        .with_state(AppState { scheduling_service })
}

async fn post_process(app: Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/scheduling/process")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn missing_fields_return_400() {
    let store = MemoryScheduleStore::new();
    let app = build_app(
        &store,
        StubExtractor {
            decision: Decision::default(),
        },
        RecordingMailer::default(),
        StubCalendar { fail: false },
    );

    let (status, body) = post_process(app, json!({ "interviewId": Uuid::new_v4() })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn unknown_conversation_returns_404() {
    let store = MemoryScheduleStore::new();
    let app = build_app(
        &store,
        StubExtractor {
            decision: Decision::default(),
        },
        RecordingMailer::default(),
        StubCalendar { fail: false },
    );

    let (status, body) = post_process(
        app,
        json!({
            "conversationId": Uuid::new_v4(),
            "interviewId": Uuid::new_v4(),
            "messageId": "provider-msg-1",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn mismatched_message_returns_400() {
    let store = MemoryScheduleStore::new();
    let interview = sample_interview();
    store.seed_interview(interview.clone());

    let other = sample_interview();
    let message = inbound_message(&other, "hello");
    store.seed_message(message.clone());

    let app = build_app(
        &store,
        StubExtractor {
            decision: Decision::default(),
        },
        RecordingMailer::default(),
        StubCalendar { fail: false },
    );

    let (status, _) = post_process(
        app,
        json!({
            "conversationId": message.id,
            "interviewId": interview.id,
            "messageId": "provider-msg-1",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn email_next_step_sends_and_persists() {
    let store = MemoryScheduleStore::new();
    let interview = sample_interview();
    let message = inbound_message(&interview, "What times work for you?");
    store.seed_interview(interview.clone());
    store.seed_message(message.clone());

    let mailer = RecordingMailer::default();
    let app = build_app(
        &store,
        StubExtractor {
            decision: email_decision(
                NextActor::Interviewer,
                "<p>Could you share your availability?</p>",
            ),
        },
        mailer.clone(),
        StubCalendar { fail: false },
    );

    let (status, body) = post_process(
        app,
        json!({
            "conversationId": message.id,
            "interviewId": interview.id,
            "messageId": "provider-msg-1",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["nextStep"], json!("email_to_interviewer"));
    assert_eq!(
        body["response"],
        json!("<p>Could you share your availability?</p>")
    );

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "interviewer@example.com");
    assert_eq!(sent[0].from, "recruiter@example.com");
    drop(sent);

    let messages = store.messages_for(interview.id);
    assert_eq!(messages.len(), 2);
    let outbound = messages.iter().find(|m| m.id != message.id).unwrap();
    assert_eq!(outbound.from_email, "recruiter@example.com");
    assert_eq!(outbound.message_id, "resend-1");
    assert!(!outbound.processed);

    assert!(store.message(message.id).unwrap().processed);
    assert_eq!(
        store.interview(interview.id).unwrap().status,
        InterviewStatus::EmailToInterviewer
    );

    let audit = store.audit(message.id, interview.id).unwrap();
    assert_eq!(audit.next_step, "email_to_interviewer");
    assert_eq!(audit.status, "completed");
}

#[tokio::test]
async fn repeating_the_webhook_is_a_noop() {
    let store = MemoryScheduleStore::new();
    let interview = sample_interview();
    let message = inbound_message(&interview, "What times work for you?");
    store.seed_interview(interview.clone());
    store.seed_message(message.clone());

    let mailer = RecordingMailer::default();
    let app = build_app(
        &store,
        StubExtractor {
            decision: email_decision(NextActor::Candidate, "<p>Does Tuesday work?</p>"),
        },
        mailer.clone(),
        StubCalendar { fail: false },
    );

    let payload = json!({
        "conversationId": message.id,
        "interviewId": interview.id,
        "messageId": "provider-msg-1",
    });

    let (first_status, _) = post_process(app.clone(), payload.clone()).await;
    assert_eq!(first_status, StatusCode::OK);

    let (second_status, second_body) = post_process(app, payload).await;
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(second_body["success"], json!(true));
    assert!(second_body.get("nextStep").is_none());
    assert_eq!(second_body["response"], json!("Message already processed"));

    assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    assert_eq!(store.messages_for(interview.id).len(), 2);
}

#[tokio::test]
async fn matching_slot_schedules_the_event() {
    let store = MemoryScheduleStore::new();
    let interview = sample_interview();
    let message = inbound_message(&interview, "Tuesday 10:00 works, see you then");
    store.seed_interview(interview.clone());
    store.seed_message(message.clone());
    store.seed_refresh_token(interview.created_by, "refresh-1");

    let app = build_app(
        &store,
        StubExtractor {
            decision: Decision {
                matching_slots: vec![
                    "2025-07-20T10:00:00Z".to_string(),
                    "2025-07-21T10:00:00Z".to_string(),
                ],
                next_action_taker: NextActor::Scheduler,
                ..Decision::default()
            },
        },
        RecordingMailer::default(),
        StubCalendar { fail: false },
    );

    let (status, body) = post_process(
        app,
        json!({
            "conversationId": message.id,
            "interviewId": interview.id,
            "messageId": "provider-msg-1",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nextStep"], json!("confirm_event"));
    assert_eq!(body["response"], json!("https://meet.google.com/abc-defg-hij"));

    let stored = store.interview(interview.id).unwrap();
    assert_eq!(stored.status, InterviewStatus::Scheduled);

    let first_slot = Utc.with_ymd_and_hms(2025, 7, 20, 10, 0, 0).unwrap();
    assert_eq!(stored.matching_slot, Some(first_slot));

    let meeting = stored.meeting.unwrap();
    assert_eq!(meeting.event_id, "evt-123");
    assert_eq!(meeting.link, "https://meet.google.com/abc-defg-hij");
    assert_eq!(meeting.time_stamp, first_slot);
    assert_eq!(meeting.platform, "google_meet");
}

#[tokio::test]
async fn missing_calendar_credentials_flag_the_interview() {
    let store = MemoryScheduleStore::new();
    let interview = sample_interview();
    let message = inbound_message(&interview, "Tuesday 10:00 works");
    store.seed_interview(interview.clone());
    store.seed_message(message.clone());

    let app = build_app(
        &store,
        StubExtractor {
            decision: Decision {
                matching_slots: vec!["2025-07-20T10:00:00Z".to_string()],
                ..Decision::default()
            },
        },
        RecordingMailer::default(),
        StubCalendar { fail: false },
    );

    let (status, body) = post_process(
        app,
        json!({
            "conversationId": message.id,
            "interviewId": interview.id,
            "messageId": "provider-msg-1",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nextStep"], json!("confirm_event"));
    assert!(body["response"]
        .as_str()
        .unwrap()
        .contains("No calendar credentials"));

    let stored = store.interview(interview.id).unwrap();
    assert_eq!(stored.status, InterviewStatus::Failed);
    assert!(stored.meeting.is_none());
}

#[tokio::test]
async fn calendar_failure_keeps_the_claim_and_returns_200() {
    let store = MemoryScheduleStore::new();
    let interview = sample_interview();
    let message = inbound_message(&interview, "Tuesday 10:00 works");
    store.seed_interview(interview.clone());
    store.seed_message(message.clone());
    store.seed_refresh_token(interview.created_by, "refresh-1");

    let app = build_app(
        &store,
        StubExtractor {
            decision: Decision {
                matching_slots: vec!["2025-07-20T10:00:00Z".to_string()],
                ..Decision::default()
            },
        },
        RecordingMailer::default(),
        StubCalendar { fail: true },
    );

    let (status, body) = post_process(
        app,
        json!({
            "conversationId": message.id,
            "interviewId": interview.id,
            "messageId": "provider-msg-1",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["response"]
        .as_str()
        .unwrap()
        .contains("Calendar event creation failed"));

    let stored = store.interview(interview.id).unwrap();
    assert_eq!(stored.status, InterviewStatus::Failed);
    assert_eq!(
        stored.matching_slot,
        Some(Utc.with_ymd_and_hms(2025, 7, 20, 10, 0, 0).unwrap())
    );
    assert!(store.message(message.id).unwrap().processed);
}

#[tokio::test]
async fn email_failure_returns_500_and_releases_the_claim() {
    let store = MemoryScheduleStore::new();
    let interview = sample_interview();
    let message = inbound_message(&interview, "What times work?");
    store.seed_interview(interview.clone());
    store.seed_message(message.clone());

    let app = build_app(
        &store,
        StubExtractor {
            decision: email_decision(NextActor::Candidate, "<p>Does Tuesday work?</p>"),
        },
        RecordingMailer {
            fail: true,
            ..RecordingMailer::default()
        },
        StubCalendar { fail: false },
    );

    let (status, body) = post_process(
        app,
        json!({
            "conversationId": message.id,
            "interviewId": interview.id,
            "messageId": "provider-msg-1",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], json!(false));

    assert!(!store.message(message.id).unwrap().processed);
    assert_eq!(store.messages_for(interview.id).len(), 1);
}

#[tokio::test]
async fn concurrent_edit_returns_409_and_releases_the_claim() {
    let store = MemoryScheduleStore::new();
    let interview = sample_interview();
    let message = inbound_message(&interview, "Tuesday 10:00 works");
    store.seed_interview(interview.clone());
    store.seed_message(message.clone());
    store.seed_refresh_token(interview.created_by, "refresh-1");

    let app = build_app(
        &store,
        RacingExtractor {
            store: store.clone(),
            interview_id: interview.id,
            decision: Decision {
                matching_slots: vec!["2025-07-20T10:00:00Z".to_string()],
                next_action_taker: NextActor::Scheduler,
                ..Decision::default()
            },
        },
        RecordingMailer::default(),
        StubCalendar { fail: false },
    );

    let (status, body) = post_process(
        app,
        json!({
            "conversationId": message.id,
            "interviewId": interview.id,
            "messageId": "provider-msg-1",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], json!(false));
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("modified concurrently"));

    // Released for a retry against the fresh row.
    assert!(!store.message(message.id).unwrap().processed);

    let stored = store.interview(interview.id).unwrap();
    assert_eq!(stored.status, InterviewStatus::Pending);
    assert_eq!(stored.matching_slot, None);

    // The run aborted before completion, so the ledger row stays pending.
    let audit = store.audit(message.id, interview.id).unwrap();
    assert_eq!(audit.status, "pending");
}
