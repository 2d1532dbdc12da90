use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::{
    dto::scheduling_dto::{ProcessConversationPayload, ProcessConversationResponse},
    error::{Error, Result},
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/scheduling/process",
    request_body = ProcessConversationPayload,
    responses(
        (status = 200, description = "Message processed", body = Json<ProcessConversationResponse>),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Interview or message not found"),
        (status = 409, description = "Interview was modified concurrently"),
        (status = 500, description = "Processing failed")
    )
)]
#[axum::debug_handler]
pub async fn process_conversation(
    State(state): State<AppState>,
    Json(payload): Json<ProcessConversationPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let conversation_id = payload
        .conversation_id
        .ok_or_else(|| Error::BadRequest("conversationId is required".to_string()))?;
    let interview_id = payload
        .interview_id
        .ok_or_else(|| Error::BadRequest("interviewId is required".to_string()))?;
    let message_id = payload
        .message_id
        .ok_or_else(|| Error::BadRequest("messageId is required".to_string()))?;

    let outcome = state
        .scheduling_service
        .process(conversation_id, interview_id, &message_id)
        .await?;

    Ok(Json(ProcessConversationResponse {
        success: true,
        next_step: outcome.next_step,
        response: outcome.response,
    }))
}
