use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::time::Duration;
use uuid::Uuid;
use validator::ValidateEmail;

#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub html: String,
    pub sender_user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    /// Provider-assigned id, when the provider returns one.
    pub message_id: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<SentEmail>;
}

#[derive(Clone)]
pub struct ResendMailer {
    client: Client,
    api_key: String,
    from_name: String,
}

impl ResendMailer {
    pub fn new(api_key: String, from_name: String, client: Client) -> Self {
        Self {
            client,
            api_key,
            from_name,
        }
    }
}

#[async_trait]
impl EmailSender for ResendMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<SentEmail> {
        if !email.to.validate_email() {
            return Err(Error::Email(format!(
                "Invalid recipient address: {}",
                email.to
            )));
        }
        if !email.from.validate_email() {
            return Err(Error::Email(format!(
                "Invalid sender address: {}",
                email.from
            )));
        }

        let payload = serde_json::json!({
            "from": format!("{} <{}>", self.from_name, email.from),
            "to": [email.to],
            "subject": email.subject,
            "html": email.html,
        });

        tracing::debug!(sender = %email.sender_user_id, to = %email.to, "Sending email via Resend");

        let res = self
            .client
            .post("https://api.resend.com/emails")
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| Error::Email(format!("Resend request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(Error::Email(format!("Resend API Error {}: {}", status, text)));
        }

        let body: JsonValue = res
            .json()
            .await
            .map_err(|e| Error::Email(format!("Resend response was not JSON: {}", e)))?;

        let message_id = body
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Ok(SentEmail { message_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_malformed_addresses_before_calling_the_provider() {
        let mailer = ResendMailer::new(
            "re_test_key".to_string(),
            "Scheduling Team".to_string(),
            Client::new(),
        );

        let email = OutboundEmail {
            to: "not-an-address".to_string(),
            from: "recruiter@example.com".to_string(),
            subject: "Interview".to_string(),
            html: "<p>hi</p>".to_string(),
            sender_user_id: Uuid::new_v4(),
        };

        let err = mailer.send(&email).await.unwrap_err();
        assert!(err.to_string().contains("Invalid recipient address"));
    }
}
