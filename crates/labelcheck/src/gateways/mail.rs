//! Outbound mail gateway.

use async_trait::async_trait;
use serde_json::json;

use crate::config::MailConfig;

/// One outbound message with an optional PDF attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachment: Option<MailAttachment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MailAttachment {
    pub filename: String,
    pub content_base64: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport failed: {0}")]
    Transport(String),
    #[error("mail endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Boundary to the mail provider. `configured` lets the pipeline downgrade
/// delivery to a skip instead of attempting a send that cannot succeed.
#[async_trait]
pub trait MailGateway: Send + Sync {
    fn configured(&self) -> bool {
        true
    }

    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// reqwest-backed client for the Resend REST API. Without an API key the
/// client reports itself unconfigured and refuses to send.
#[derive(Clone)]
pub struct ResendMailer {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl std::fmt::Debug for ResendMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendMailer")
            .field("base_url", &self.base_url)
            .field("api_key_present", &self.configured())
            .finish_non_exhaustive()
    }
}

impl ResendMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| MailError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MailGateway for ResendMailer {
    fn configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let Some(api_key) = self.api_key.as_deref().filter(|key| !key.is_empty()) else {
            return Err(MailError::Transport("no api key configured".to_string()));
        };

        let mut body = json!({
            "from": message.from,
            "to": [message.to],
            "subject": message.subject,
            "html": message.html,
        });
        if let Some(attachment) = &message.attachment {
            body["attachments"] = json!([{
                "filename": attachment.filename,
                "content": attachment.content_base64,
                "content_type": "application/pdf",
            }]);
        }

        let url = format!("{}/emails", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| MailError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_reports_unconfigured() {
        let mailer = ResendMailer::new(&MailConfig {
            api_key: None,
            base_url: "https://api.resend.com".to_string(),
            from: "AVA LabelCheck <onboarding@resend.dev>".to_string(),
        })
        .expect("mailer builds");
        assert!(!mailer.configured());
    }

    #[test]
    fn empty_api_key_reports_unconfigured() {
        let mailer = ResendMailer::new(&MailConfig {
            api_key: Some(String::new()),
            base_url: "https://api.resend.com".to_string(),
            from: "AVA LabelCheck <onboarding@resend.dev>".to_string(),
        })
        .expect("mailer builds");
        assert!(!mailer.configured());
    }

    #[test]
    fn present_api_key_reports_configured() {
        let mailer = ResendMailer::new(&MailConfig {
            api_key: Some("re_123".to_string()),
            base_url: "https://api.resend.com/".to_string(),
            from: "AVA LabelCheck <onboarding@resend.dev>".to_string(),
        })
        .expect("mailer builds");
        assert!(mailer.configured());
        assert_eq!(mailer.base_url, "https://api.resend.com");
    }
}
