//! Hosted language model gateway.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::ModelConfig;

/// Prompt payload for a single chat completion. `user_parts` are sent as
/// ordered text segments; the optional image rides along as an `image_url`
/// segment for multimodal models.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPrompt {
    pub system: String,
    pub user_parts: Vec<String>,
    pub image_data_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelCallError {
    #[error("model transport failed: {0}")]
    Transport(String),
    #[error("model endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model reply carries no assistant content")]
    EmptyReply,
}

/// Boundary to the hosted model. One call, no retry logic; the extraction
/// stage owns the retry budget.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn complete(&self, prompt: &ChatPrompt) -> Result<String, ModelCallError>;
}

/// reqwest-backed client for the OpenAI chat completions API.
#[derive(Clone)]
pub struct OpenAiChatClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl std::fmt::Debug for OpenAiChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAiChatClient {
    pub fn new(config: &ModelConfig) -> Result<Self, ModelCallError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ModelCallError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request_body(&self, prompt: &ChatPrompt) -> Value {
        let mut content: Vec<Value> = prompt
            .user_parts
            .iter()
            .map(|part| json!({ "type": "text", "text": part }))
            .collect();

        if let Some(url) = &prompt.image_data_url {
            content.push(json!({ "type": "image_url", "image_url": { "url": url } }));
        }

        json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": content },
            ],
        })
    }
}

#[async_trait]
impl ModelGateway for OpenAiChatClient {
    async fn complete(&self, prompt: &ChatPrompt) -> Result<String, ModelCallError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|err| ModelCallError::Transport(err.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|err| ModelCallError::Transport(err.to_string()))?;

        if !status.is_success() {
            return Err(ModelCallError::Status {
                status: status.as_u16(),
                body: body.to_string(),
            });
        }

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or(ModelCallError::EmptyReply)?;

        Ok(content.to_string())
    }
}
