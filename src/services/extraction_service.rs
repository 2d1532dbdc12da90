use crate::error::{Error, Result};
use crate::models::decision::Decision;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::time::Duration;

/// Everything the model needs to decide the next scheduling step.
#[derive(Debug, Clone)]
pub struct ExtractionInput {
    pub transcript: String,
    pub subject: String,
    pub interviewer_email: String,
    pub candidate_email: String,
    pub recruiter_email: String,
    pub from_email: String,
    pub to_email: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SlotExtractor: Send + Sync {
    async fn extract(&self, input: &ExtractionInput) -> Result<Decision>;
}

#[derive(Clone)]
pub struct OpenAiExtractor {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiExtractor {
    pub fn new(api_key: String, model: String, client: Client) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }

    async fn chat_openai(&self, payload: JsonValue) -> Result<JsonValue> {
        let res = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .map_err(|e| Error::Extraction(format!("OpenAI request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(Error::Extraction(format!(
                "OpenAI API Error {}: {}",
                status, text
            )));
        }

        let body: JsonValue = res
            .json()
            .await
            .map_err(|e| Error::Extraction(format!("OpenAI response was not JSON: {}", e)))?;

        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .and_then(|s| serde_json::from_str(s).ok())
            .ok_or_else(|| Error::Extraction("Invalid OpenAI response format".to_string()))
    }
}

#[async_trait]
impl SlotExtractor for OpenAiExtractor {
    async fn extract(&self, input: &ExtractionInput) -> Result<Decision> {
        let system_prompt = r#"You are an interview scheduling assistant. You read an email conversation between a recruiter, a candidate and an interviewer, then decide the next scheduling step. The output must be a valid JSON object.

Rules:
1. Every transcript line starts with a bracketed UTC timestamp. Use it to resolve relative expressions like "tomorrow at 3pm" into absolute times.
2. All slot values MUST be absolute ISO-8601 UTC timestamps, e.g. "2025-07-22T14:00:00Z". Never output relative expressions.
3. 'interviewerSlots' lists times the interviewer offered. 'candidateSlots' lists times the candidate offered.
4. 'matchingSlots' lists times both sides agreed on. A plain confirmation of a previously proposed time ("that works", "see you then") counts as agreement on that time.
5. 'nextActionTaker' is whoever must act next: "interviewer" if the interviewer still has to reply, "candidate" if the candidate still has to reply, "scheduler" once a time is agreed and the event can be booked, "human" when the conversation is stuck or unclear.
6. When the next step is emailing someone, put the complete HTML body in 'nextActionMetadata.emailContent'. Write in the recruiter's voice, short and polite.
7. When escalating to a human, explain why in 'nextActionMetadata.messageForHuman'.

Return JSON:
{
  "interviewerSlots": ["2025-07-22T14:00:00Z"],
  "candidateSlots": [],
  "matchingSlots": [],
  "nextActionTaker": "interviewer",
  "nextActionMetadata": { "emailContent": "<p>...</p>", "messageForHuman": null }
}"#;

        let user_data = serde_json::json!({
            "transcript": input.transcript,
            "subject": input.subject,
            "interviewerEmail": input.interviewer_email,
            "candidateEmail": input.candidate_email,
            "recruiterEmail": input.recruiter_email,
            "from": input.from_email,
            "to": input.to_email,
        });

        let payload = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": serde_json::to_string(&user_data).unwrap()}
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.2
        });

        let resp = self.chat_openai(payload).await?;
        let decision: Decision = serde_json::from_value(resp)
            .map_err(|e| Error::Extraction(format!("Malformed decision payload: {}", e)))?;
        Ok(decision)
    }
}
