//! OpenAI-compatible chat completions adapter.
//!
//! Works against any server exposing `POST {base_url}/v1/chat/completions`
//! (OpenAI, Azure-style proxies, local model servers).

use super::{AgentSettings, build_client, status_error, transport_error};
use async_trait::async_trait;
use consensus_application::{Agent, AgentError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Chat completion request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatMessage,
}

/// Agent backed by an OpenAI-compatible chat completions endpoint
pub struct OpenAiAgent {
    settings: AgentSettings,
    client: reqwest::Client,
}

impl OpenAiAgent {
    pub fn new(settings: AgentSettings) -> Result<Self, reqwest::Error> {
        let client = build_client(settings.timeout)?;
        Ok(Self { settings, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.settings.base_url)
    }

    pub(crate) fn request_body(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(self.settings.system_prompt.clone()),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(prompt.to_string()),
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        }
    }
}

/// Text of the first choice
pub(crate) fn extract_text(response: ChatResponse) -> Result<String, AgentError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::InvalidResponse("no choices in response".to_string()))?;
    match choice.message.content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(AgentError::EmptyResponse),
    }
}

#[async_trait]
impl Agent for OpenAiAgent {
    fn name(&self) -> &str {
        &self.settings.name
    }

    async fn generate_response(&self, prompt: &str) -> Result<String, AgentError> {
        info!(
            "Requesting response from {} ({})",
            self.settings.name, self.settings.model
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("OpenAI", status, &body));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::InvalidResponse(e.to_string()))?;
        let text = extract_text(body)?;
        debug!("{} returned {} bytes", self.settings.name, text.len());
        Ok(text)
    }
}
